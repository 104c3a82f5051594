//! CLI command implementations

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::auth::StaticToken;
use crate::cache::MemoryCache;
use crate::client::ApiClient;
use crate::config::{
    DEFAULT_PAGE_PARALLELISM, DEFAULT_REGION_PARALLELISM, DEFAULT_STRUCTURE_PARALLELISM,
    HTTP_CONNECT_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS,
};
use crate::shutdown::SharedShutdown;
use crate::sink::ElasticsearchSink;
use crate::sync::{StructurePlan, SyncConfig, SyncOrchestrator};
use crate::{metrics, resources};

pub mod error;

pub use error::CliError;

/// Sync market orders from the remote API into the search index
#[derive(Debug, Parser)]
#[command(name = "market-sync", version, about)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one full sync cycle
    Sync(SyncArgs),
}

/// Arguments for the sync command
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Region ids to sync (comma separated); defaults to the universe list
    #[arg(long, value_delimiter = ',')]
    pub regions: Vec<i64>,

    /// Skip the authenticated structure phase
    #[arg(long)]
    pub skip_structures: bool,

    /// Target index name (overrides MARKET_INDEX)
    #[arg(long)]
    pub index: Option<String>,

    /// Concurrent regions
    #[arg(long, default_value_t = DEFAULT_REGION_PARALLELISM)]
    pub region_parallelism: usize,

    /// Concurrent page requests per region
    #[arg(long, default_value_t = DEFAULT_PAGE_PARALLELISM)]
    pub page_parallelism: usize,

    /// Concurrent structures
    #[arg(long, default_value_t = DEFAULT_STRUCTURE_PARALLELISM)]
    pub structure_parallelism: usize,

    /// Bind a Prometheus scrape endpoint (e.g. 0.0.0.0:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

fn required_env(name: &str) -> Result<String, CliError> {
    std::env::var(name)
        .map_err(|_| CliError::Configuration(format!("missing required environment variable {name}")))
}

/// Execute the sync command.
pub async fn run_sync(args: SyncArgs, shutdown: SharedShutdown) -> Result<(), CliError> {
    if let Some(addr) = args.metrics_addr {
        metrics::init_metrics(addr)
            .await
            .map_err(|e| CliError::Configuration(e.to_string()))?;
    }

    let http = Arc::new(
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| CliError::Configuration(format!("failed to build HTTP client: {e}")))?,
    );
    let client = Arc::new(ApiClient::new(http.clone(), Arc::new(MemoryCache::new())));

    let sink = ElasticsearchSink::new(http, required_env("ES_HOST")?);

    let mut config = SyncConfig {
        region_parallelism: args.region_parallelism,
        page_parallelism: args.page_parallelism,
        structure_parallelism: args.structure_parallelism,
        ..SyncConfig::default()
    };
    if let Ok(base) = std::env::var("MARKET_API_BASE") {
        config.api_base_url = base;
    }
    if let Some(index) = args.index {
        config.index = index;
    } else if let Ok(index) = std::env::var("MARKET_INDEX") {
        config.index = index;
    }

    let regions = if args.regions.is_empty() {
        let url = required_env("UNIVERSE_LIST_URL")?;
        resources::fetch_region_ids(&client, &url).await?
    } else {
        args.regions
    };

    let structures = if args.skip_structures {
        None
    } else {
        Some(StructurePlan {
            directory_url: required_env("STRUCTURE_INFO_URL")?,
            token_provider: Arc::new(StaticToken::new(required_env("MARKET_ACCESS_TOKEN")?)),
        })
    };

    let orchestrator = SyncOrchestrator::new(client, config).with_shutdown(shutdown);
    let report = orchestrator
        .run(&regions, structures.as_ref(), &sink)
        .await?;

    info!(
        total_records = report.total_records,
        failed_partitions = report.failed_partitions,
        "sync finished"
    );
    Ok(())
}
