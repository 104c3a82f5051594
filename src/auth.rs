//! Access-token boundary
//!
//! The engine treats credentials as opaque strings attached to requests.
//! Acquiring and refreshing them is the provider's problem, invoked once
//! before a fetch operation begins; a provider that cannot produce a token
//! is the one fatal credential condition.

use async_trait::async_trait;

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No valid credential could be obtained
    #[error("credential unavailable: {0}")]
    Unavailable(String),
}

/// Supplies an opaque bearer token for authenticated endpoints.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Produce a token valid for the next fetch operation.
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// A fixed token, handed in from the environment.
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap an already-acquired token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        if self.0.is_empty() {
            return Err(AuthError::Unavailable("empty access token".to_string()));
        }
        Ok(self.0.clone())
    }
}
