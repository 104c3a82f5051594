//! Market-order page sources
//!
//! Two paginated endpoints serve orders: the public per-region endpoint and
//! the token-authenticated per-structure endpoint. Both advertise their page
//! count and the remaining error budget in response headers.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::client::{ApiClient, ApiResponse, ClientResult, RequestOptions};
use crate::fetcher::{PageResult, PageSource};
use crate::RawOrder;

/// Public market orders of one region.
pub struct RegionOrdersSource {
    client: Arc<ApiClient>,
    base_url: String,
    region_id: i64,
}

impl RegionOrdersSource {
    /// Create a source for one region.
    pub fn new(client: Arc<ApiClient>, base_url: impl Into<String>, region_id: i64) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            region_id,
        }
    }

    fn page_url(&self, page: u32) -> String {
        format!(
            "{}/markets/{}/orders/?datasource=tranquility&order_type=all&page={}",
            self.base_url, self.region_id, page
        )
    }
}

#[async_trait]
impl PageSource for RegionOrdersSource {
    async fn fetch_page(&self, page: u32) -> ClientResult<PageResult> {
        let url = self.page_url(page);
        let response = self.client.get(&url, &RequestOptions::strict()).await?;
        Ok(parse_order_page(page, &response))
    }

    fn label(&self) -> String {
        format!("region {}", self.region_id)
    }
}

/// Market orders of one player structure; requires an access token.
pub struct StructureOrdersSource {
    client: Arc<ApiClient>,
    base_url: String,
    structure_id: i64,
    token: String,
}

impl StructureOrdersSource {
    /// Create a source for one structure.
    ///
    /// The token is an opaque credential; it is attached as a bearer header
    /// and never inspected.
    pub fn new(
        client: Arc<ApiClient>,
        base_url: impl Into<String>,
        structure_id: i64,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            structure_id,
            token: token.into(),
        }
    }

    fn page_url(&self, page: u32) -> String {
        format!(
            "{}/markets/structures/{}/?datasource=tranquility&page={}",
            self.base_url, self.structure_id, page
        )
    }
}

#[async_trait]
impl PageSource for StructureOrdersSource {
    async fn fetch_page(&self, page: u32) -> ClientResult<PageResult> {
        let url = self.page_url(page);
        let opts = RequestOptions::strict().with_bearer(self.token.clone());
        let response = self.client.get(&url, &opts).await?;
        Ok(parse_order_page(page, &response))
    }

    fn label(&self) -> String {
        format!("structure {}", self.structure_id)
    }
}

/// Turn a raw response into a [`PageResult`].
///
/// A payload that is not a sequence of orders is logged and discarded; the
/// page still contributes its headers so pagination and throttling proceed.
fn parse_order_page(page: u32, response: &ApiResponse) -> PageResult {
    let orders = match response.json::<Vec<RawOrder>>() {
        Ok(orders) => orders,
        Err(e) => {
            warn!(url = %response.url, page, error = %e, "discarding non-order page payload");
            Vec::new()
        }
    };

    PageResult {
        page,
        orders,
        pages: response.page_count().unwrap_or(1),
        error_limit_remain: response.error_limit_remain(),
    }
}
