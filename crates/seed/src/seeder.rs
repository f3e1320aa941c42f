//! End-to-end seeding run against one cluster.

use anyhow::Context;
use elk_connector::{
    ClientFactory, Cluster, ClusterHealth, ClusterInfo, ConnectionState, CreateIndexOutcome,
    IndexInfo, KibanaSummary, SearchOutcome,
};
use tracing::{debug, info, warn};

use crate::config::SeedConfig;
use crate::generator::DataGenerator;
use crate::samples;

const PROGRESS_EVERY: usize = 100;

/// What a seeding run observed.
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub health: Option<ClusterHealth>,
    pub info: Option<ClusterInfo>,
    pub created: Option<CreateIndexOutcome>,
    pub indexed: usize,
    pub index_info: Option<IndexInfo>,
    pub search: Option<SearchOutcome>,
    pub deleted: bool,
    pub kibana: Option<KibanaSummary>,
}

/// Connects, seeds the configured index, searches it and cleans up.
///
/// The connection is closed on every path; a failure to close after an
/// earlier error is logged and the earlier error is returned.
pub async fn seed<F: ClientFactory>(
    cluster: &Cluster<F>,
    config: &SeedConfig,
    generator: &mut DataGenerator,
) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();

    cluster
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", cluster.host()))?;

    match run_steps(cluster, config, generator, &mut report).await {
        Ok(()) => {
            cluster.close().await.context("Failed to close connection")?;
            Ok(report)
        }
        Err(e) => {
            if cluster.state() == ConnectionState::Connected {
                if let Err(close_err) = cluster.close().await {
                    warn!(error = %close_err, "Failed to close connection after error");
                }
            }
            Err(e)
        }
    }
}

async fn run_steps<F: ClientFactory>(
    cluster: &Cluster<F>,
    config: &SeedConfig,
    generator: &mut DataGenerator,
    report: &mut SeedReport,
) -> anyhow::Result<()> {
    report.health = Some(cluster.health().await.context("Failed to read cluster health")?);
    report.info = Some(cluster.info().await.context("Failed to read cluster info")?);

    let created = cluster
        .create_index(&config.index, samples::index_body())
        .await
        .with_context(|| format!("Failed to create index {}", config.index))?;
    report.created = Some(created);

    cluster
        .put_alias(&config.index, &config.alias)
        .await
        .with_context(|| format!("Failed to create alias {}", config.alias))?;

    for n in 1..=config.documents {
        let document = generator.generate_random_data();
        cluster
            .index_document(&config.index, document)
            .await
            .with_context(|| format!("Failed to index document {} of {}", n, config.documents))?;
        report.indexed = n;
        if n % PROGRESS_EVERY == 0 {
            debug!(indexed = n, total = config.documents, "Indexing progress");
        }
    }
    info!(index = %config.index, documents = report.indexed, "Documents indexed");

    let index_info = cluster
        .get_index_info(&config.index)
        .await
        .with_context(|| format!("Failed to read index {}", config.index))?;
    info!(
        index = %index_info.name,
        exists = index_info.exists,
        doc_count = index_info.doc_count,
        "Index info"
    );
    report.index_info = Some(index_info);

    let search = cluster
        .search(&config.index, &config.search_options())
        .await
        .context("Search failed")?;
    match search {
        SearchOutcome::Found(ref response) => {
            info!(
                total = response.total(),
                returned = response.hits.hits.len(),
                took_ms = response.took,
                "Search results"
            );
            if let Some(ref aggregations) = response.aggregations {
                for (name, result) in aggregations {
                    info!(aggregation = %name, result = %result, "Aggregation");
                }
            }
        }
        SearchOutcome::IndexMissing => {
            warn!(index = %config.index, "Index disappeared before search");
        }
    }
    report.search = Some(search);

    if config.keep_index {
        info!(index = %config.index, "Keeping index");
    } else {
        cluster
            .delete_index(&config.index)
            .await
            .with_context(|| format!("Failed to delete index {}", config.index))?;
        report.deleted = true;
    }

    Ok(())
}
