//! Error types for the synapse crates.
//!
//! The taxonomy is deliberate: configuration errors are fatal and raised at
//! construction; client errors are recoverable and handled inside strategies
//! (degrade, never propagate out of a prune pass); context errors cover the
//! manager's own import surface.

use std::time::Duration;

/// Invalid strategy or manager configuration. Fatal, raised at construction,
/// never silently corrected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A numeric parameter fell below its minimum.
    #[error("{field} must be at least {min}, got {got}")]
    TooSmall {
        /// The offending parameter.
        field: &'static str,
        /// The required minimum.
        min: usize,
        /// The supplied value.
        got: usize,
    },
    /// A parameter must lie within `[0, 1]`.
    #[error("{field} must be within [0, 1], got {got}")]
    OutOfUnitRange {
        /// The offending parameter.
        field: &'static str,
        /// The supplied value.
        got: f32,
    },
    /// A parameter must be strictly positive.
    #[error("{field} must be positive, got {got}")]
    NotPositive {
        /// The offending parameter.
        field: &'static str,
        /// The supplied value.
        got: f32,
    },
    /// Two parameters violate a required ordering.
    #[error("{smaller} ({smaller_value}) must be less than {larger} ({larger_value})")]
    OrderViolation {
        /// The parameter that must be smaller.
        smaller: &'static str,
        /// Its supplied value.
        smaller_value: usize,
        /// The parameter that must be larger.
        larger: &'static str,
        /// Its supplied value.
        larger_value: usize,
    },
}

/// Errors from LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Network-level error (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Rate limited by the provider.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit {
        /// Suggested retry delay, if provided by the API.
        retry_after: Option<Duration>,
    },
    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// Authentication/authorization failure.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Any other provider error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether this error is likely transient and the request can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit { .. } | Self::Timeout(_))
    }
}

/// Errors from embedding client operations.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Network-level error (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Rate limited by the provider.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit {
        /// Suggested retry delay, if provided by the API.
        retry_after: Option<Duration>,
    },
    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// Authentication/authorization failure.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Any other embedding error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl EmbeddingError {
    /// Whether this error is likely transient and the request can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit { .. } | Self::Timeout(_))
    }
}

/// Errors from context manager operations.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// An imported snapshot violates the token-total invariant.
    #[error("import failed: {0}")]
    Import(String),
    /// Serialization/deserialization of a snapshot failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
