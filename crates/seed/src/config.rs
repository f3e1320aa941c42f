//! Command line configuration for the seed driver.
//!
//! Cluster credentials come from the environment (see
//! [`elk_connector::settings`]); this module only covers what the driver does
//! with the connection. A `.env` file in the working directory is loaded
//! before parsing.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SEED_DOCUMENTS` | 900 | Documents to generate and index |
//! | `SEED_INDEX` | test_index_1 | Index to create |
//! | `SEED_ALIAS` | test_alias | Alias to point at the index |
//! | `SEED_RANDOM_SEED` | - | Seed for reproducible documents |
//! | `SEED_LOG_LEVEL` | info | Log level |

use clap::Parser;
use elk_connector::SearchOptions;

use crate::samples;

/// Seed driver configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "elk-seed")]
#[command(about = "Seed an Elasticsearch index with synthetic records and query it back")]
pub struct SeedConfig {
    /// Number of generated documents to index.
    #[arg(short = 'n', long, env = "SEED_DOCUMENTS", default_value = "900")]
    pub documents: usize,

    /// Index to create, fill and search.
    #[arg(long, env = "SEED_INDEX", default_value = samples::INDEX_NAME)]
    pub index: String,

    /// Alias to point at the index.
    #[arg(long, env = "SEED_ALIAS", default_value = samples::ALIAS_NAME)]
    pub alias: String,

    /// Named sample query to run.
    #[arg(long, default_value = "match_all_query")]
    pub query: String,

    /// Named sample filter to apply.
    #[arg(long)]
    pub filter: Option<String>,

    /// Named sample sort.
    #[arg(long, default_value = "sort_desc")]
    pub sort: String,

    /// Named sample aggregation.
    #[arg(long, default_value = "aggregation1")]
    pub aggregation: String,

    /// Page size for the search.
    #[arg(long, default_value = "100")]
    pub limit: u64,

    /// Page offset for the search.
    #[arg(long, default_value = "0")]
    pub offset: u64,

    /// Seed for the record generator.
    #[arg(long, env = "SEED_RANDOM_SEED")]
    pub seed: Option<u64>,

    /// Retry the initial connection until it succeeds or is interrupted.
    #[arg(long)]
    pub persistent: bool,

    /// Leave the index in place when done.
    #[arg(long)]
    pub keep_index: bool,

    /// Do not query Kibana.
    #[arg(long)]
    pub skip_kibana: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "SEED_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            documents: 900,
            index: samples::INDEX_NAME.to_string(),
            alias: samples::ALIAS_NAME.to_string(),
            query: "match_all_query".to_string(),
            filter: None,
            sort: "sort_desc".to_string(),
            aggregation: "aggregation1".to_string(),
            limit: 100,
            offset: 0,
            seed: None,
            persistent: false,
            keep_index: false,
            skip_kibana: false,
            log_level: "info".to_string(),
        }
    }
}

impl SeedConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.index.trim().is_empty() {
            errors.push("Index name cannot be empty".to_string());
        }

        if self.alias.trim().is_empty() {
            errors.push("Alias name cannot be empty".to_string());
        }

        if samples::query(&self.query).is_none() {
            errors.push(format!(
                "Unknown query '{}' (expected one of {})",
                self.query,
                samples::QUERY_NAMES.join(", ")
            ));
        }

        if let Some(ref filter) = self.filter {
            if samples::filters(filter).is_none() {
                errors.push(format!(
                    "Unknown filter '{}' (expected one of {})",
                    filter,
                    samples::FILTER_NAMES.join(", ")
                ));
            }
        }

        if samples::sort(&self.sort).is_none() {
            errors.push(format!(
                "Unknown sort '{}' (expected one of {})",
                self.sort,
                samples::SORT_NAMES.join(", ")
            ));
        }

        if samples::aggregations(&self.aggregation).is_none() {
            errors.push(format!(
                "Unknown aggregation '{}' (expected one of {})",
                self.aggregation,
                samples::AGGREGATION_NAMES.join(", ")
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Builds search options from the named samples. Unknown names are skipped.
    pub fn search_options(&self) -> SearchOptions {
        let mut options = SearchOptions::new()
            .with_limit(self.limit)
            .with_offset(self.offset);
        if let Some(query) = samples::query(&self.query) {
            options = options.with_query(query);
        }
        if let Some(filters) = self.filter.as_deref().and_then(samples::filters) {
            options = options.with_filters(filters);
        }
        if let Some(sort) = samples::sort(&self.sort) {
            options = options.with_sort(sort);
        }
        if let Some(aggregations) = samples::aggregations(&self.aggregation) {
            options = options.with_aggregations(aggregations);
        }
        options
    }
}
