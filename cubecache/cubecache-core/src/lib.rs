//! Core types for the cubecache cache-and-query engine.
//!
//! This crate provides the identities, selections, schema model, error
//! handling, configuration and collaborator traits shared by the query and
//! cache crates.

pub mod config;
pub mod error;
pub mod id;
pub mod schema;
pub mod selection;
pub mod traits;
pub mod value;

pub use config::{CacheConfig, DatabaseConfig, EngineConfig, ExpirationConfig};
pub use error::{CubeError, Result};
pub use id::{DatabaseId, TableId};
pub use schema::{Dimension, DimensionValue, TableSchema};
pub use selection::{DimensionSelection, Selection};
pub use traits::{AsyncReadSeek, Connector, SchemaReader, SourceStream};
pub use value::{DataValue, MissingCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{CubeError, Result};
    pub use crate::id::{DatabaseId, TableId};
    pub use crate::schema::{Dimension, DimensionValue, TableSchema};
    pub use crate::selection::{DimensionSelection, Selection};
    pub use crate::traits::{Connector, SchemaReader, SourceStream};
    pub use crate::value::DataValue;
}
