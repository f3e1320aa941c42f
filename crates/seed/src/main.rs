//! ELK seed driver.

use clap::Parser;
use elk_seed::{SeedConfig, init_logging, run};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = SeedConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        index = %config.index,
        documents = config.documents,
        persistent = config.persistent,
        "Starting seed run"
    );

    let report = run(config).await?;

    info!(
        indexed = report.indexed,
        deleted = report.deleted,
        "Seed run finished"
    );
    Ok(())
}
