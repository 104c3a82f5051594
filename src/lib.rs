//! # Market Sync Library
//!
//! A resilient fetch-and-aggregate engine for large, frequently-changing
//! market-order datasets served by a rate-limited paginated API.
//!
//! ## Features
//!
//! - **Conditional caching**: HTTP responses are cached against their
//!   `expires` header and revalidated with `If-None-Match` entity tags
//! - **Concurrent pagination**: page 1 discovers the page count, the
//!   remaining pages are fetched through a bounded request pool
//! - **Rate-limit backoff**: the remote's remaining error budget is read
//!   from response headers and fetching throttles with a doubling backoff
//!   when the budget runs low
//! - **Best-order aggregation**: redundant orders collapse into the single
//!   best buy (highest price) and best sell (lowest price) per
//!   (location, item) pair
//! - **Partial-failure isolation**: a failed page degrades one page, a
//!   failed region degrades one region, and neither aborts its siblings
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`cache`] - HTTP response cache with per-entry expiry
//! - [`client`] - Conditional HTTP client and concurrent request pool
//! - [`fetcher`] - Paginated fetch orchestration with rate-limit throttling
//! - [`aggregate`] - Best-order reduction per (location, item) key
//! - [`sync`] - Multi-region sync orchestration and enrichment
//! - [`resources`] - Static lookup resources (region list, location directory)
//! - [`sink`] - Bulk persistence boundary
//! - [`auth`] - Opaque access-token boundary
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use market_sync::cache::MemoryCache;
//! use market_sync::client::ApiClient;
//! use market_sync::fetcher::{PaginatedFetcher, RegionOrdersSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = Arc::new(reqwest::Client::new());
//! let client = Arc::new(ApiClient::new(http, Arc::new(MemoryCache::new())));
//!
//! let source = RegionOrdersSource::new(
//!     client.clone(),
//!     "https://esi.evetech.net/latest",
//!     10000002,
//! );
//! let outcome = PaginatedFetcher::new(20).fetch_all_pages(&source).await?;
//! println!("{} orders, {} failed pages", outcome.orders.len(), outcome.failed_pages);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Best-order aggregation
pub mod aggregate;

/// Access-token boundary
pub mod auth;

/// HTTP response cache
pub mod cache;

/// CLI command implementations
pub mod cli;

/// Conditional HTTP client and request pool
pub mod client;

/// Tuning constants and backoff schedules
pub mod config;

/// Paginated fetch orchestration
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// Static lookup resources
pub mod resources;

/// Bulk persistence boundary
pub mod sink;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Multi-region sync orchestration
pub mod sync;

// Re-export commonly used types
pub use client::ApiClient;
pub use sync::{SyncOrchestrator, SyncReport};

/// A single market order as delivered by the remote API.
///
/// Arrives untrusted; the typed shape is validated at the response boundary
/// and a page that fails to deserialize is discarded rather than propagated.
/// Fields the API adds later survive round-tripping through [`RawOrder::extra`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawOrder {
    /// Remote order identifier
    pub order_id: i64,
    /// Item type identifier
    pub type_id: i32,
    /// Location (station or structure) the order is placed at
    pub location_id: i64,
    /// Unit price
    pub price: Decimal,
    /// True for buy orders, false for sell orders
    #[serde(default)]
    pub is_buy_order: bool,
    /// Time the order was issued
    pub issued: DateTime<Utc>,
    /// Quantity still open
    pub volume_remain: i64,
    /// Quantity the order was issued with
    pub volume_total: i64,
    /// Minimum fill quantity
    #[serde(default)]
    pub min_volume: i64,
    /// Order lifetime in days
    #[serde(default)]
    pub duration: i32,
    /// Delivery range (e.g. "station", "region", or a jump count)
    #[serde(default)]
    pub range: String,
    /// Solar system, present on region endpoints but not structure endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<i64>,
    /// Passthrough for fields this crate does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawOrder {
    /// Validate order data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.order_id <= 0 {
            return Err(format!("Order id must be positive, got {}", self.order_id));
        }

        if self.location_id <= 0 {
            return Err(format!(
                "Location id must be positive, got {}",
                self.location_id
            ));
        }

        if self.price < Decimal::ZERO {
            return Err(format!("Price must be non-negative, got {}", self.price));
        }

        if self.volume_remain < 0 || self.volume_remain > self.volume_total {
            return Err(format!(
                "Remaining volume ({}) must be within 0..={}",
                self.volume_remain, self.volume_total
            ));
        }

        Ok(())
    }
}

/// A market order in its emission form, ready for bulk persistence.
///
/// The raw `location_id` is relabeled to `station_id` and the record gains
/// its region (and, for structure orders, solar system) from enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderDocument {
    /// Remote order identifier
    pub order_id: i64,
    /// Item type identifier
    pub type_id: i32,
    /// Station or structure the order is placed at
    pub station_id: i64,
    /// Region the location belongs to
    pub region_id: i64,
    /// Solar system, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_id: Option<i64>,
    /// Unit price
    pub price: Decimal,
    /// True for buy orders, false for sell orders
    pub is_buy_order: bool,
    /// Time the order was issued
    pub issued: DateTime<Utc>,
    /// Quantity still open
    pub volume_remain: i64,
    /// Quantity the order was issued with
    pub volume_total: i64,
    /// Minimum fill quantity
    pub min_volume: i64,
    /// Order lifetime in days
    pub duration: i32,
    /// Delivery range
    pub range: String,
    /// True when the order lives on a player structure rather than a station
    pub citadel: bool,
    /// Passthrough for fields this crate does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OrderDocument {
    fn from_order(order: RawOrder, region_id: i64, system_id: Option<i64>, citadel: bool) -> Self {
        Self {
            order_id: order.order_id,
            type_id: order.type_id,
            station_id: order.location_id,
            region_id,
            system_id,
            price: order.price,
            is_buy_order: order.is_buy_order,
            issued: order.issued,
            volume_remain: order.volume_remain,
            volume_total: order.volume_total,
            min_volume: order.min_volume,
            duration: order.duration,
            range: order.range,
            citadel,
            extra: order.extra,
        }
    }

    /// Relabel an order fetched from a region partition.
    pub fn from_region_order(order: RawOrder, region_id: i64) -> Self {
        let system_id = order.system_id;
        Self::from_order(order, region_id, system_id, false)
    }

    /// Relabel an order fetched from a player structure, enriched with the
    /// structure's parent system and region.
    pub fn from_structure_order(order: RawOrder, info: &resources::LocationInfo) -> Self {
        Self::from_order(order, info.region_id, Some(info.system_id), true)
    }
}
