//! Cache-and-query engine for multidimensional statistical tables.
//!
//! [`DataFacade`] serves file lists, schemas and data selections of PX tables
//! through a shared bounded cache. Concurrent requests for the same artifact
//! share one source read, and a cached selection also answers requests for
//! any of its subsets.

pub mod entry;
pub mod facade;
pub mod header;
pub mod keys;
pub mod manager;
mod store;
pub mod telemetry;

pub use entry::{DataEntry, MetadataEntry, SharedData, SharedResult, SharedSchema};
pub use facade::DataFacade;
pub use keys::CacheKey;
pub use manager::{CacheManager, CacheStatistics};

pub use cubecache_core::{
    CubeError, DataValue, DatabaseConfig, DatabaseId, EngineConfig, Result, Selection, TableId,
    TableSchema,
};
pub use cubecache_query::{Filter, SelectionResolver};
