//! Values kept in the shared store.
//!
//! Entries hold shared futures rather than resolved values so that every
//! caller asking for the same artifact awaits the same fetch, and sees the
//! same failure if it fails.

use crate::keys::{CacheKey, Category};
use chrono::{DateTime, Utc};
use cubecache_core::error::Result;
use cubecache_core::id::TableId;
use cubecache_core::schema::TableSchema;
use cubecache_core::selection::Selection;
use cubecache_core::value::DataValue;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Weak};

/// A memoized fetch of `T`.
pub type SharedResult<T> = Shared<BoxFuture<'static, Result<Arc<T>>>>;

pub type SharedSchema = SharedResult<TableSchema>;
pub type SharedData = SharedResult<Vec<DataValue>>;
pub type SharedFileList = SharedResult<Vec<TableId>>;
pub type SharedTimestamp = Shared<BoxFuture<'static, Result<DateTime<Utc>>>>;

/// Wrap a fetch so that it runs at most once for any number of awaiters.
pub fn share<T, F>(fetch: F) -> SharedResult<T>
where
    T: Send + Sync + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    fetch.map(|result| result.map(Arc::new)).boxed().shared()
}

/// An already resolved value, for explicit cache population.
pub fn resolved<T: Send + Sync + 'static>(value: T) -> SharedResult<T> {
    share(futures::future::ready(Ok(value)))
}

/// A memoized timestamp fetch.
pub fn share_timestamp<F>(fetch: F) -> SharedTimestamp
where
    F: Future<Output = Result<DateTime<Utc>>> + Send + 'static,
{
    fetch.boxed().shared()
}

/// Cached schema of one table plus the selections cached against it.
pub struct MetadataEntry {
    table: TableId,
    schema: SharedSchema,
    cached_at: DateTime<Utc>,
    /// Selections whose data entries depend on this schema
    related: DashMap<Selection, Weak<DataEntry>>,
}

impl MetadataEntry {
    pub fn new(table: TableId, schema: SharedSchema) -> Self {
        Self {
            table,
            schema,
            cached_at: Utc::now(),
            related: DashMap::new(),
        }
    }

    pub fn table(&self) -> &TableId {
        &self.table
    }

    pub fn schema(&self) -> SharedSchema {
        self.schema.clone()
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    /// Track a data entry; re-adding a selection replaces its previous entry.
    pub fn add_related_selection(&self, selection: Selection, entry: &Arc<DataEntry>) {
        self.related.insert(selection, Arc::downgrade(entry));
    }

    /// Snapshot of the tracked selections.
    pub fn related_selections(&self) -> Vec<(Selection, Weak<DataEntry>)> {
        self.related
            .iter()
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect()
    }

    /// Stop tracking a selection.
    pub fn remove_related_selection(&self, selection: &Selection) -> Option<Weak<DataEntry>> {
        self.related.remove(selection).map(|(_, entry)| entry)
    }

    /// Stop tracking `entry`, unless its selection has since been re-cached
    /// with a different entry.
    pub fn untrack(&self, entry: &DataEntry) -> bool {
        self.related
            .remove_if(entry.selection(), |_, tracked| {
                std::ptr::eq(tracked.as_ptr(), entry)
            })
            .is_some()
    }

    pub fn related_count(&self) -> usize {
        self.related.len()
    }

    /// Remove and return every tracked entry.
    pub(crate) fn drain_related(&self) -> Vec<Weak<DataEntry>> {
        let selections: Vec<Selection> = self.related.iter().map(|item| item.key().clone()).collect();
        selections
            .iter()
            .filter_map(|selection| self.remove_related_selection(selection))
            .collect()
    }
}

impl std::fmt::Debug for MetadataEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataEntry")
            .field("table", &self.table)
            .field("cached_at", &self.cached_at)
            .field("related", &self.related.len())
            .finish()
    }
}

/// Cached data of one selection of a table.
pub struct DataEntry {
    key: CacheKey,
    table: TableId,
    selection: Selection,
    data: SharedData,
    cached_at: DateTime<Utc>,
}

impl DataEntry {
    pub fn new(key: CacheKey, table: TableId, selection: Selection, data: SharedData) -> Self {
        Self {
            key,
            table,
            selection,
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// The table whose metadata entry tracks this selection
    pub fn table(&self) -> &TableId {
        &self.table
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn data(&self) -> SharedData {
        self.data.clone()
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }
}

impl std::fmt::Debug for DataEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataEntry")
            .field("key", &self.key)
            .field("table", &self.table)
            .field("selection", &self.selection)
            .field("cached_at", &self.cached_at)
            .finish()
    }
}

/// Everything the shared store can hold.
#[derive(Clone)]
pub(crate) enum CacheValue {
    FileList(SharedFileList),
    LastModified(SharedTimestamp),
    Metadata(Arc<MetadataEntry>),
    Data(Arc<DataEntry>),
}

impl CacheValue {
    pub(crate) fn category(&self) -> Category {
        match self {
            CacheValue::FileList(_) => Category::FileList,
            CacheValue::LastModified(_) => Category::LastModified,
            CacheValue::Metadata(_) => Category::Metadata,
            CacheValue::Data(_) => Category::Data,
        }
    }

    /// Weight against the store capacity: a data entry weighs its cell count.
    pub(crate) fn weight(&self) -> u32 {
        match self {
            CacheValue::Data(entry) => {
                u32::try_from(entry.selection.cell_count().max(1)).unwrap_or(u32::MAX)
            }
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::data_key;
    use cubecache_core::id::DatabaseId;

    fn table() -> TableId {
        TableId::new(DatabaseId::new("db"), "t.px")
    }

    fn data_entry(selection: &Selection) -> Arc<DataEntry> {
        Arc::new(DataEntry::new(
            data_key(&table(), selection),
            table(),
            selection.clone(),
            resolved(vec![DataValue::from(1.0)]),
        ))
    }

    #[tokio::test]
    async fn test_shared_future_runs_once() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let shared = share(async move {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(42)
        });

        let (a, b) = tokio::join!(shared.clone(), shared.clone());
        assert_eq!(*a.unwrap(), 42);
        assert_eq!(*b.unwrap(), 42);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_re_adding_selection_updates() {
        let meta = MetadataEntry::new(table(), resolved(TableSchema::new(table(), vec![])));
        let selection = Selection::new([("d", vec!["a"])]).unwrap();

        let first = data_entry(&selection);
        let second = data_entry(&selection);
        meta.add_related_selection(selection.clone(), &first);
        meta.add_related_selection(selection.clone(), &second);

        assert_eq!(meta.related_count(), 1);
        let (_, tracked) = &meta.related_selections()[0];
        assert!(Arc::ptr_eq(&tracked.upgrade().unwrap(), &second));
    }

    #[test]
    fn test_untrack_ignores_replaced_entry() {
        let meta = MetadataEntry::new(table(), resolved(TableSchema::new(table(), vec![])));
        let selection = Selection::new([("d", vec!["a"])]).unwrap();

        let old = data_entry(&selection);
        let new = data_entry(&selection);
        meta.add_related_selection(selection.clone(), &new);

        assert!(!meta.untrack(&old));
        assert_eq!(meta.related_count(), 1);
        assert!(meta.untrack(&new));
        assert_eq!(meta.related_count(), 0);
    }

    #[test]
    fn test_registry_does_not_keep_data_alive() {
        let meta = MetadataEntry::new(table(), resolved(TableSchema::new(table(), vec![])));
        let selection = Selection::new([("d", vec!["a"])]).unwrap();
        let entry = data_entry(&selection);
        meta.add_related_selection(selection, &entry);
        drop(entry);

        let drained = meta.drain_related();
        assert_eq!(drained.len(), 1);
        assert!(drained[0].upgrade().is_none());
        assert_eq!(meta.related_count(), 0);
    }
}
