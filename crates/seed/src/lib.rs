//! Seed driver for the ELK connector.
//!
//! Generates synthetic records, loads them into a fresh index, runs a sample
//! search and removes the index again. Useful for smoke-testing a cluster and
//! its mutual-TLS setup.

pub mod config;
pub mod generator;
pub mod samples;
pub mod seeder;

pub use config::SeedConfig;
pub use generator::{DataGenerator, ItemKind, Record};
pub use seeder::{SeedReport, seed};

use anyhow::Context;
use elk_connector::{Cluster, ClusterSettings, KibanaClient, RetryPolicy};
use tracing::warn;

/// Initializes the tracing subscriber.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("elk_seed={level},elk_connector={level}", level = level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Loads cluster settings, applying command line overrides.
pub fn load_settings(config: &SeedConfig) -> anyhow::Result<ClusterSettings> {
    let mut settings = ClusterSettings::from_env().context("Invalid cluster settings")?;
    if config.persistent {
        settings.retry = RetryPolicy::persistent()
            .with_backoff(settings.retry.backoff_delay)
            .with_notice_at(settings.retry.still_retrying_notice_at);
    }
    Ok(settings)
}

/// Runs the full seeding flow against the cluster named in the environment.
pub async fn run(config: SeedConfig) -> anyhow::Result<SeedReport> {
    let settings = load_settings(&config)?;
    let cluster = Cluster::from_settings(&settings).context("Failed to prepare TLS context")?;

    // Ctrl-C stops connection retries at the next backoff
    let cancel = cluster.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling connection attempts");
            cancel.cancel();
        }
    });

    let kibana = if config.skip_kibana {
        None
    } else {
        let client = KibanaClient::new(
            &settings.kibana_host,
            settings.credentials.username(),
            settings.credentials.password(),
        )?;
        Some(client.summary().await)
    };

    let mut generator = match config.seed {
        Some(seed) => DataGenerator::with_seed(seed),
        None => DataGenerator::new(),
    };

    let mut report = seed(&cluster, &config, &mut generator).await?;
    report.kibana = kibana;
    Ok(report)
}
