//! Bulk persistence boundary
//!
//! The engine's output contract is a sequence of serializable records; what
//! the datastore does with them (index lifecycle, aliasing, refresh) is its
//! own business. The provided implementation speaks the Elasticsearch bulk
//! protocol, which is what the deployed sink runs.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::metrics;
use crate::OrderDocument;

/// Sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink was unreachable
    #[error("sink transport error: {0}")]
    Transport(String),

    /// The sink rejected the request outright
    #[error("sink rejected bulk request with status {0}")]
    Rejected(u16),

    /// The sink accepted the request but reported item-level failures
    #[error("bulk response reported item failures")]
    PartialFailure,

    /// A record failed to serialize
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Receives aggregated order documents for bulk persistence.
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Persist a batch of documents into the named index.
    async fn bulk_index(&self, index: &str, documents: &[OrderDocument]) -> Result<(), SinkError>;
}

/// Elasticsearch-compatible bulk sink.
pub struct ElasticsearchSink {
    http: Arc<reqwest::Client>,
    base_url: String,
}

impl ElasticsearchSink {
    /// Create a sink against a cluster base URL (no trailing slash).
    pub fn new(http: Arc<reqwest::Client>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn bulk_body(index: &str, documents: &[OrderDocument]) -> Result<String, SinkError> {
        let mut body = String::new();
        for document in documents {
            body.push_str(&serde_json::to_string(
                &serde_json::json!({"index": {"_index": index}}),
            )?);
            body.push('\n');
            body.push_str(&serde_json::to_string(document)?);
            body.push('\n');
        }
        Ok(body)
    }
}

#[async_trait]
impl OrderSink for ElasticsearchSink {
    async fn bulk_index(&self, index: &str, documents: &[OrderDocument]) -> Result<(), SinkError> {
        if documents.is_empty() {
            debug!(index, "nothing to persist");
            return Ok(());
        }

        let body = Self::bulk_body(index, documents)?;
        let url = format!("{}/_bulk", self.base_url);

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(status.as_u16()));
        }

        let summary: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        if summary.get("errors").and_then(|v| v.as_bool()) == Some(true) {
            return Err(SinkError::PartialFailure);
        }

        info!(index, documents = documents.len(), "bulk indexed documents");
        metrics::record_documents_indexed(documents.len() as u64);
        Ok(())
    }
}
