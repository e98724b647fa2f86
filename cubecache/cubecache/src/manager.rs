//! Entry storage and retrieval over the shared bounded store.
//!
//! Data entries always hang off the metadata entry of their table: the
//! metadata entry keeps a weak registry of the selections cached against its
//! schema. Removing a metadata entry for any reason removes those selections,
//! and removing a data entry untracks it from its parent.

use crate::entry::{
    CacheValue, DataEntry, MetadataEntry, SharedData, SharedFileList, SharedSchema,
    SharedTimestamp,
};
use crate::keys::{data_key, file_list_key, last_modified_key, metadata_key};
use crate::store::CacheStore;
use cubecache_core::config::CacheConfig;
use cubecache_core::error::{CubeError, Result};
use cubecache_core::id::{DatabaseId, TableId};
use cubecache_core::selection::Selection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache of file lists, timestamps, schemas and data selections.
pub struct CacheManager {
    store: CacheStore,
    stats: CacheStats,
}

impl CacheManager {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            store: CacheStore::new(config),
            stats: CacheStats::default(),
        }
    }

    // ========================================================================
    // File lists
    // ========================================================================

    pub fn try_get_file_list(&self, database: &DatabaseId) -> Option<SharedFileList> {
        self.process_evictions();
        match self.store.get(&file_list_key(database)) {
            Some(CacheValue::FileList(list)) => Some(list),
            _ => None,
        }
    }

    pub fn set_file_list(&self, database: &DatabaseId, files: SharedFileList) {
        self.process_evictions();
        self.store
            .insert(file_list_key(database), CacheValue::FileList(files));
    }

    pub fn remove_file_list(&self, database: &DatabaseId) -> bool {
        self.process_evictions();
        self.store.remove(&file_list_key(database)).is_some()
    }

    // ========================================================================
    // Last-modified timestamps
    // ========================================================================

    pub fn try_get_last_modified(&self, table: &TableId) -> Option<SharedTimestamp> {
        self.process_evictions();
        match self.store.get(&last_modified_key(table)) {
            Some(CacheValue::LastModified(timestamp)) => Some(timestamp),
            _ => None,
        }
    }

    pub fn set_last_modified(&self, table: &TableId, timestamp: SharedTimestamp) {
        self.process_evictions();
        self.store
            .insert(last_modified_key(table), CacheValue::LastModified(timestamp));
    }

    pub fn remove_last_modified(&self, table: &TableId) -> bool {
        self.process_evictions();
        self.store.remove(&last_modified_key(table)).is_some()
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn try_get_metadata(&self, table: &TableId) -> Option<Arc<MetadataEntry>> {
        self.process_evictions();
        self.lookup_metadata(table)
    }

    /// Cache the schema of `table`.
    ///
    /// Replacing an existing entry removes every selection cached against
    /// the replaced schema.
    pub fn set_metadata(&self, table: &TableId, schema: SharedSchema) -> Arc<MetadataEntry> {
        self.process_evictions();

        let entry = Arc::new(MetadataEntry::new(table.clone(), schema));
        let previous = self
            .store
            .insert(metadata_key(table), CacheValue::Metadata(Arc::clone(&entry)));

        if let Some(CacheValue::Metadata(old)) = previous {
            if !Arc::ptr_eq(&old, &entry) {
                debug!("Replaced metadata of {}", table);
                self.cascade(&old);
            }
        }

        entry
    }

    /// Remove the schema of `table` together with its cached selections.
    pub fn remove_metadata(&self, table: &TableId) -> bool {
        self.process_evictions();
        match self.store.remove(&metadata_key(table)) {
            Some(CacheValue::Metadata(entry)) => {
                self.cascade(&entry);
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    // ========================================================================
    // Data
    // ========================================================================

    /// Exact lookup of one selection.
    pub fn try_get_data_exact(&self, table: &TableId, selection: &Selection) -> Option<Arc<DataEntry>> {
        self.process_evictions();

        match self.lookup_data(table, selection) {
            Some(entry) => {
                self.stats.exact_hits.fetch_add(1, Ordering::Relaxed);
                debug!("Data cache hit for {} {}", table, selection);
                Some(entry)
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Data cache miss for {} {}", table, selection);
                None
            }
        }
    }

    /// Cache `data` for `selection` of `table`.
    ///
    /// Any cached selection of the table that is a proper subset of
    /// `selection` is dropped.
    ///
    /// # Errors
    ///
    /// Returns `OrphanedData` if no schema is cached for `table`; nothing is
    /// stored in that case.
    pub fn set_data(
        &self,
        table: &TableId,
        selection: &Selection,
        data: SharedData,
    ) -> Result<Arc<DataEntry>> {
        self.process_evictions();

        let metadata = self.lookup_metadata(table).ok_or_else(|| CubeError::OrphanedData {
            table: table.clone(),
        })?;

        let key = data_key(table, selection);
        let entry = Arc::new(DataEntry::new(key, table.clone(), selection.clone(), data));
        self.store.insert(key, CacheValue::Data(Arc::clone(&entry)));
        metadata.add_related_selection(selection.clone(), &entry);
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);

        // The parent may have been removed while the entry was being wired
        let parent_alive = matches!(
            self.lookup_metadata(table),
            Some(current) if Arc::ptr_eq(&current, &metadata)
        );
        if !parent_alive {
            metadata.untrack(&entry);
            self.remove_data_if_same(&entry);
            return Err(CubeError::OrphanedData {
                table: table.clone(),
            });
        }

        for (tracked, weak) in metadata.related_selections() {
            if !tracked.is_proper_subset_of(selection) {
                continue;
            }
            metadata.remove_related_selection(&tracked);
            if let Some(pruned) = weak.upgrade() {
                self.remove_data_if_same(&pruned);
            }
            self.stats.prunes.fetch_add(1, Ordering::Relaxed);
            debug!("Pruned {} {} superseded by {}", table, tracked, selection);
        }

        Ok(entry)
    }

    /// Find a cached selection of `table` containing `requested`.
    ///
    /// Tracked selections whose entry is no longer in the store are skipped.
    pub fn try_get_data_superset(
        &self,
        table: &TableId,
        requested: &Selection,
    ) -> Option<Arc<DataEntry>> {
        self.process_evictions();

        let metadata = match self.lookup_metadata(table) {
            Some(metadata) => metadata,
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        for (tracked, weak) in metadata.related_selections() {
            if !requested.is_subset_of(&tracked) {
                continue;
            }
            let Some(candidate) = weak.upgrade() else {
                continue;
            };
            let live = matches!(
                self.store.get(&candidate.key()),
                Some(CacheValue::Data(current)) if Arc::ptr_eq(&current, &candidate)
            );
            if live {
                self.stats.superset_hits.fetch_add(1, Ordering::Relaxed);
                debug!("Data cache superset hit for {} {} in {}", table, requested, tracked);
                return Some(candidate);
            }
            debug!("Skipping stale tracked selection {} of {}", tracked, table);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Apply dependency cleanup for entries the store evicted on its own.
    pub fn process_evictions(&self) {
        for (key, value) in self.store.take_evicted() {
            match value {
                CacheValue::Metadata(entry) => {
                    if entry.related_count() > 0 {
                        warn!(
                            "Metadata of {} evicted ({}); dropping {} dependent selections",
                            entry.table(),
                            key,
                            entry.related_count()
                        );
                    }
                    self.cascade(&entry);
                }
                CacheValue::Data(entry) => {
                    if let Some(parent) = self.lookup_metadata(entry.table()) {
                        parent.untrack(&entry);
                    }
                    debug!("Data {} {} evicted", entry.table(), entry.selection());
                }
                CacheValue::FileList(_) | CacheValue::LastModified(_) => {}
            }
        }
    }

    /// Run the store's pending housekeeping, then apply its evictions.
    pub fn run_pending_tasks(&self) {
        self.store.run_pending_tasks();
        self.process_evictions();
    }

    pub fn entry_count(&self) -> u64 {
        self.store.entry_count()
    }

    pub fn stats(&self) -> CacheStatistics {
        self.stats.snapshot(self.store.entry_count(), self.store.weighted_size())
    }

    fn lookup_metadata(&self, table: &TableId) -> Option<Arc<MetadataEntry>> {
        match self.store.get(&metadata_key(table)) {
            Some(CacheValue::Metadata(entry)) if entry.table() == table => Some(entry),
            _ => None,
        }
    }

    fn lookup_data(&self, table: &TableId, selection: &Selection) -> Option<Arc<DataEntry>> {
        match self.store.get(&data_key(table, selection)) {
            Some(CacheValue::Data(entry))
                if entry.table() == table && entry.selection() == selection =>
            {
                Some(entry)
            }
            _ => None,
        }
    }

    /// Remove every selection tracked by a metadata entry that left the store.
    fn cascade(&self, metadata: &MetadataEntry) {
        for weak in metadata.drain_related() {
            if let Some(entry) = weak.upgrade() {
                if self.remove_data_if_same(&entry) {
                    self.stats.cascades.fetch_add(1, Ordering::Relaxed);
                    debug!("Cascade removed {} {}", entry.table(), entry.selection());
                }
            }
        }
    }

    /// Remove `entry` from the store unless its key now holds a newer entry.
    fn remove_data_if_same(&self, entry: &Arc<DataEntry>) -> bool {
        let same = matches!(
            self.store.get(&entry.key()),
            Some(CacheValue::Data(current)) if Arc::ptr_eq(&current, entry)
        );
        same && self.store.remove(&entry.key()).is_some()
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("entries", &self.store.entry_count())
            .finish()
    }
}

#[derive(Default)]
struct CacheStats {
    exact_hits: AtomicU64,
    superset_hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    prunes: AtomicU64,
    cascades: AtomicU64,
}

impl CacheStats {
    fn snapshot(&self, entries: u64, weighted_size: u64) -> CacheStatistics {
        let exact_hits = self.exact_hits.load(Ordering::Relaxed);
        let superset_hits = self.superset_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = exact_hits + superset_hits + misses;
        let hit_rate = if lookups > 0 {
            (exact_hits + superset_hits) as f64 / lookups as f64
        } else {
            0.0
        };

        CacheStatistics {
            exact_hits,
            superset_hits,
            misses,
            inserts: self.inserts.load(Ordering::Relaxed),
            prunes: self.prunes.load(Ordering::Relaxed),
            cascades: self.cascades.load(Ordering::Relaxed),
            entries,
            weighted_size,
            hit_rate,
        }
    }
}

/// Snapshot of data cache statistics.
///
/// A data request that misses the exact lookup and then hits a superset
/// counts one miss and one superset hit.
#[derive(Debug, Clone, Copy)]
pub struct CacheStatistics {
    pub exact_hits: u64,
    pub superset_hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub prunes: u64,
    pub cascades: u64,
    pub entries: u64,
    pub weighted_size: u64,
    pub hit_rate: f64,
}
