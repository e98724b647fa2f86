//! Cache key derivation.
//!
//! Every key is a blake3 digest of a fixed category tag followed by the
//! length-prefixed fields of the entity, truncated to 64 bits. The tag keeps
//! categories apart even when their entities are structurally identical.

use cubecache_core::id::{DatabaseId, TableId};
use cubecache_core::selection::Selection;
use std::fmt;

/// Key of one entry in the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Kinds of cached artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    FileList,
    LastModified,
    Metadata,
    Data,
}

impl Category {
    const fn tag(self) -> &'static [u8] {
        match self {
            Category::FileList => b"cubecache/file-list/v1",
            Category::LastModified => b"cubecache/last-modified/v1",
            Category::Metadata => b"cubecache/metadata/v1",
            Category::Data => b"cubecache/data/v1",
        }
    }
}

struct KeyBuilder(blake3::Hasher);

impl KeyBuilder {
    fn new(category: Category) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(category.tag());
        Self(hasher)
    }

    fn str(mut self, value: &str) -> Self {
        self.0.update(&(value.len() as u64).to_le_bytes());
        self.0.update(value.as_bytes());
        self
    }

    fn count(mut self, n: usize) -> Self {
        self.0.update(&(n as u64).to_le_bytes());
        self
    }

    fn table(self, table: &TableId) -> Self {
        self.str(table.database().as_str()).str(table.name())
    }

    fn finish(self) -> CacheKey {
        let digest = self.0.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.as_bytes()[..8]);
        CacheKey(u64::from_le_bytes(bytes))
    }
}

/// Key of a database's file list
pub fn file_list_key(database: &DatabaseId) -> CacheKey {
    KeyBuilder::new(Category::FileList)
        .str(database.as_str())
        .finish()
}

/// Key of a table's last-modified timestamp
pub fn last_modified_key(table: &TableId) -> CacheKey {
    KeyBuilder::new(Category::LastModified).table(table).finish()
}

/// Key of a table's metadata entry
pub fn metadata_key(table: &TableId) -> CacheKey {
    KeyBuilder::new(Category::Metadata).table(table).finish()
}

/// Key of one cached selection of a table.
///
/// Sensitive to dimension order and to code order within each dimension.
pub fn data_key(table: &TableId, selection: &Selection) -> CacheKey {
    let mut builder = KeyBuilder::new(Category::Data)
        .table(table)
        .count(selection.len());
    for dim in selection.dimensions() {
        builder = builder.str(&dim.code).count(dim.values.len());
        for code in &dim.values {
            builder = builder.str(code);
        }
    }
    builder.finish()
}
