//! Error types for the cubecache engine.

use crate::id::TableId;
use std::sync::Arc;

/// Result type alias for cubecache operations.
pub type Result<T> = std::result::Result<T, CubeError>;

/// Main error type for the cache-and-query engine.
///
/// The type is `Clone` because a failed fetch is memoized inside a shared
/// future and handed to every caller awaiting it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CubeError {
    /// Data was offered to the cache for a table whose schema is not cached
    #[error("Cannot cache data for table {table}: no metadata entry is cached for it")]
    OrphanedData { table: TableId },

    /// A From/To filter boundary matched no value code
    #[error("No value code matches boundary pattern '{pattern}'")]
    UnmatchedBoundary { pattern: String },

    /// A header read was attempted on a forward-only stream
    #[error("Source stream for table {table} is not seekable")]
    UnseekableSource { table: TableId },

    /// A header keyword was not present in the table header
    #[error("Header keyword '{key}' not found in table {table}")]
    MissingKey { table: TableId, key: String },

    /// Connector I/O failure
    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[source] Arc<std::io::Error>),

    /// Invalid selection or filter input
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// No connector registered for a database
    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CubeError {
    /// Create a new invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new unmatched boundary error
    pub fn unmatched_boundary(pattern: impl Into<String>) -> Self {
        Self::UnmatchedBoundary {
            pattern: pattern.into(),
        }
    }

    /// Create a new missing key error
    pub fn missing_key(table: TableId, key: impl Into<String>) -> Self {
        Self::MissingKey {
            table,
            key: key.into(),
        }
    }

    /// Check if this is an orphaned data error
    pub fn is_orphaned_data(&self) -> bool {
        matches!(self, Self::OrphanedData { .. })
    }

    /// Check if this is an unmatched boundary error
    pub fn is_unmatched_boundary(&self) -> bool {
        matches!(self, Self::UnmatchedBoundary { .. })
    }

    /// Check if this is a source I/O error
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_))
    }

    /// Check if this is an invariant violation
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

impl From<std::io::Error> for CubeError {
    fn from(err: std::io::Error) -> Self {
        Self::SourceUnavailable(Arc::new(err))
    }
}
