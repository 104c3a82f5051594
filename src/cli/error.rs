//! CLI error types and conversions

use crate::client::ClientError;
use crate::resources::ResourceError;
use crate::sync::SyncError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Sync error
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Resource error
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Client error
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}
