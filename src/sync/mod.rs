//! Multi-region sync orchestration
//!
//! One sync cycle runs a fetch → aggregate → relabel → persist pipeline for
//! every region concurrently, with total concurrency capped across
//! partitions, and optionally a structure phase whose orders need
//! location-directory enrichment before aggregation. A partition's failure
//! degrades the report; only an empty-handed cycle or a missing credential
//! escalates.

use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::aggregate::aggregate_orders;
use crate::auth::{AuthError, TokenProvider};
use crate::client::pool::RequestPool;
use crate::client::{ApiClient, ClientError};
use crate::config::{
    clamp_parallelism, DEFAULT_PAGE_PARALLELISM, DEFAULT_REGION_PARALLELISM,
    DEFAULT_STRUCTURE_PARALLELISM,
};
use crate::fetcher::{PaginatedFetcher, RegionOrdersSource, StructureOrdersSource};
use crate::resources::{self, ResourceError};
use crate::shutdown::SharedShutdown;
use crate::sink::{OrderSink, SinkError};
use crate::OrderDocument;

/// Sync errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Every partition failed to produce data; the cycle is worthless
    #[error("no partition produced any data")]
    AllPartitionsFailed,

    /// No valid credential for the structure phase
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// A static lookup resource was unavailable or malformed
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    /// The sink refused a batch
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// A partition's fetch failed outright
    #[error("fetch error: {0}")]
    Fetch(#[from] ClientError),
}

/// Tuning for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the remote market API
    pub api_base_url: String,
    /// Index name handed to the sink with every batch
    pub index: String,
    /// How many regions sync concurrently
    pub region_parallelism: usize,
    /// How many pages fetch concurrently within one partition
    pub page_parallelism: usize,
    /// How many structures fetch concurrently
    pub structure_parallelism: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://esi.evetech.net/latest".to_string(),
            index: "market-data".to_string(),
            region_parallelism: DEFAULT_REGION_PARALLELISM,
            page_parallelism: DEFAULT_PAGE_PARALLELISM,
            structure_parallelism: DEFAULT_STRUCTURE_PARALLELISM,
        }
    }
}

/// The structure phase: where its directory lives and who signs its requests.
pub struct StructurePlan {
    /// URL of the structure location directory
    pub directory_url: String,
    /// Credential source for the authenticated endpoint
    pub token_provider: Arc<dyn TokenProvider>,
}

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Documents handed to the sink across all partitions
    pub total_records: u64,
    /// Partitions that completed their pipeline
    pub synced_partitions: u32,
    /// Partitions that failed outright
    pub failed_partitions: u32,
    /// Pages dropped inside otherwise-successful partitions
    pub failed_pages: u32,
    /// Structure orders dropped for lack of directory metadata
    pub enrichment_misses: u64,
}

#[derive(Debug, Default)]
struct PartitionStats {
    records: u64,
    failed_pages: u32,
}

/// Composes fetching, aggregation and persistence across partitions.
pub struct SyncOrchestrator {
    client: Arc<ApiClient>,
    config: SyncConfig,
    shutdown: Option<SharedShutdown>,
}

impl SyncOrchestrator {
    /// Create an orchestrator over a shared client.
    pub fn new(client: Arc<ApiClient>, config: SyncConfig) -> Self {
        Self {
            client,
            config,
            shutdown: None,
        }
    }

    /// Attach a shared shutdown handle for cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run one sync cycle.
    ///
    /// Regions are independent partitions; each failure is contained and
    /// logged. The structure phase runs first when planned, mirroring how
    /// its smaller result set fronts the cycle. Fatal conditions are a
    /// credential failure for an enabled structure phase and a cycle in
    /// which no partition produced data.
    pub async fn run(
        &self,
        regions: &[i64],
        structures: Option<&StructurePlan>,
        sink: &dyn OrderSink,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let mut attempted = regions.len() as u32;

        if let Some(plan) = structures {
            attempted += 1;
            match self.sync_structures(plan, sink).await {
                Ok(stats) => {
                    report.total_records += stats.total_records;
                    report.synced_partitions += stats.synced_partitions;
                    report.failed_partitions += stats.failed_partitions;
                    report.failed_pages += stats.failed_pages;
                    report.enrichment_misses += stats.enrichment_misses;
                }
                Err(SyncError::Auth(e)) => return Err(SyncError::Auth(e)),
                Err(e) => {
                    error!(error = %e, "structure phase failed");
                    report.failed_partitions += 1;
                }
            }
        }

        self.sync_regions(regions, sink, &mut report).await;

        if attempted > 0 && report.synced_partitions == 0 {
            return Err(SyncError::AllPartitionsFailed);
        }

        info!(
            total_records = report.total_records,
            synced_partitions = report.synced_partitions,
            failed_partitions = report.failed_partitions,
            failed_pages = report.failed_pages,
            enrichment_misses = report.enrichment_misses,
            "sync cycle complete"
        );
        Ok(report)
    }

    async fn sync_regions(&self, regions: &[i64], sink: &dyn OrderSink, report: &mut SyncReport) {
        let total = regions.len();
        if total == 0 {
            return;
        }

        let results = futures_util::stream::iter(regions.iter().copied().map(|region_id| {
            async move { (region_id, self.sync_region(region_id, sink).await) }
        }))
        .buffer_unordered(clamp_parallelism(self.config.region_parallelism));
        futures_util::pin_mut!(results);

        let mut completed = 0usize;
        while let Some((region_id, result)) = results.next().await {
            completed += 1;
            match result {
                Ok(stats) => {
                    report.synced_partitions += 1;
                    report.total_records += stats.records;
                    report.failed_pages += stats.failed_pages;
                }
                Err(e) => {
                    error!(region_id, error = %e, "region sync failed");
                    report.failed_partitions += 1;
                }
            }
            info!(
                completed,
                total,
                percent = (completed * 100) / total,
                "region sync progress"
            );
        }
    }

    async fn sync_region(
        &self,
        region_id: i64,
        sink: &dyn OrderSink,
    ) -> Result<PartitionStats, SyncError> {
        let source =
            RegionOrdersSource::new(self.client.clone(), &self.config.api_base_url, region_id);
        let outcome = self.page_fetcher().fetch_all_pages(&source).await?;

        let aggregated = aggregate_orders(outcome.orders, None);
        let documents: Vec<OrderDocument> = aggregated
            .into_iter()
            .map(|order| OrderDocument::from_region_order(order, region_id))
            .collect();

        sink.bulk_index(&self.config.index, &documents).await?;

        debug!(
            region_id,
            documents = documents.len(),
            failed_pages = outcome.failed_pages,
            "region synced"
        );
        Ok(PartitionStats {
            records: documents.len() as u64,
            failed_pages: outcome.failed_pages,
        })
    }

    async fn sync_structures(
        &self,
        plan: &StructurePlan,
        sink: &dyn OrderSink,
    ) -> Result<SyncReport, SyncError> {
        let mut stats = SyncReport::default();
        let token = plan.token_provider.access_token().await?;
        let directory =
            resources::fetch_location_directory(&self.client, &plan.directory_url).await?;

        let structure_ids: Vec<i64> = directory.ids().collect();
        let total = structure_ids.len();
        info!(structures = total, "processing structures");
        if total == 0 {
            stats.synced_partitions += 1;
            return Ok(stats);
        }

        let fetcher = self.page_fetcher();
        let mut pool = RequestPool::new(self.config.structure_parallelism);
        if let Some(shutdown) = &self.shutdown {
            pool = pool.with_shutdown(shutdown.clone());
        }

        let results = pool.stream(structure_ids, |structure_id| {
            let source = StructureOrdersSource::new(
                self.client.clone(),
                &self.config.api_base_url,
                structure_id,
                token.clone(),
            );
            let fetcher = fetcher.clone();
            async move { fetcher.fetch_all_pages(&source).await }
        });
        futures_util::pin_mut!(results);

        let mut orders = Vec::new();
        let mut completed = 0usize;
        while let Some((structure_id, result)) = results.next().await {
            completed += 1;
            match result {
                Ok(mut outcome) => {
                    stats.synced_partitions += 1;
                    stats.failed_pages += outcome.failed_pages;
                    orders.append(&mut outcome.orders);
                }
                Err(e) => {
                    warn!(structure_id, error = %e, "structure fetch failed");
                    stats.failed_partitions += 1;
                }
            }
            if completed % 25 == 0 || completed == total {
                info!(
                    completed,
                    total,
                    percent = (completed * 100) / total,
                    "structure fetch progress"
                );
            }
        }

        let (enriched, misses) = enrich_structure_orders(orders, &directory);
        stats.enrichment_misses += misses;

        let aggregated = aggregate_orders(enriched, Some(&directory));
        let documents: Vec<OrderDocument> = aggregated
            .into_iter()
            .filter_map(|order| {
                directory
                    .get(order.location_id)
                    .copied()
                    .map(|info| OrderDocument::from_structure_order(order, &info))
            })
            .collect();

        sink.bulk_index(&self.config.index, &documents).await?;

        info!(documents = documents.len(), "structure phase complete");
        stats.total_records = documents.len() as u64;
        Ok(stats)
    }

    fn page_fetcher(&self) -> PaginatedFetcher {
        let mut fetcher = PaginatedFetcher::new(self.config.page_parallelism);
        if let Some(shutdown) = &self.shutdown {
            fetcher = fetcher.with_shutdown(shutdown.clone());
        }
        fetcher
    }
}

/// Keep the structure orders the directory can place, dropping the rest.
///
/// An order whose structure the directory does not know has no region to
/// land in; it is logged and counted, never fatal. Returns the surviving
/// orders and the miss count.
pub fn enrich_structure_orders(
    orders: Vec<crate::RawOrder>,
    directory: &resources::LocationDirectory,
) -> (Vec<crate::RawOrder>, u64) {
    let mut enriched = Vec::with_capacity(orders.len());
    let mut misses = 0u64;
    for order in orders {
        if directory.contains(order.location_id) {
            enriched.push(order);
        } else {
            warn!(
                location_id = order.location_id,
                "no directory entry for structure order"
            );
            misses += 1;
        }
    }
    (enriched, misses)
}
