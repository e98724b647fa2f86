//! Read-through access to tables of registered databases.
//!
//! Every artifact moves through `not requested -> in flight -> cached ->
//! invalidated`. A miss stores the shared fetch before awaiting it, so
//! concurrent requests for the same artifact wait on one connector call and
//! observe the same outcome.

use crate::entry::{
    resolved, share, share_timestamp, DataEntry, MetadataEntry, SharedData, SharedSchema,
};
use crate::header::read_header_value;
use crate::manager::CacheManager;
use chrono::{DateTime, Utc};
use cubecache_core::config::{DatabaseConfig, EngineConfig};
use cubecache_core::error::{CubeError, Result};
use cubecache_core::id::{DatabaseId, TableId};
use cubecache_core::schema::TableSchema;
use cubecache_core::selection::Selection;
use cubecache_core::traits::{Connector, SchemaReader};
use cubecache_core::value::DataValue;
use cubecache_query::filter::SelectionResolver;
use cubecache_query::project;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

struct DatabaseBinding {
    connector: Arc<dyn Connector>,
    revalidation: Option<Duration>,
}

/// Cache-backed entry point for file lists, schemas and data.
pub struct DataFacade {
    cache: Arc<CacheManager>,
    reader: Arc<dyn SchemaReader>,
    databases: HashMap<DatabaseId, DatabaseBinding>,
    configured: Vec<DatabaseConfig>,
    resolver: SelectionResolver,
}

/// A schema lookup, with the source timestamp if one was fetched on the way.
struct CheckedSchema {
    schema: Arc<TableSchema>,
    observed: Option<DateTime<Utc>>,
}

impl DataFacade {
    pub fn new(config: &EngineConfig, reader: Arc<dyn SchemaReader>) -> Self {
        Self {
            cache: Arc::new(CacheManager::new(&config.cache)),
            reader,
            databases: HashMap::new(),
            configured: config.databases.clone(),
            resolver: SelectionResolver::new(config.cache.default_time_window),
        }
    }

    /// Register `connector` under `config`.
    pub fn with_database(mut self, config: DatabaseConfig, connector: Arc<dyn Connector>) -> Self {
        self.register(config, connector);
        self
    }

    /// Register `connector` for a database, using its configured settings if any.
    pub fn with_connector(mut self, database: DatabaseId, connector: Arc<dyn Connector>) -> Self {
        let config = self
            .configured
            .iter()
            .find(|c| c.id == database.as_str())
            .cloned()
            .unwrap_or_else(|| DatabaseConfig::new(database.as_str()));
        self.register(config, connector);
        self
    }

    fn register(&mut self, config: DatabaseConfig, connector: Arc<dyn Connector>) {
        debug!(
            "Registering database {} (revalidation: {:?})",
            config.id,
            config.revalidation_interval()
        );
        self.databases.insert(
            config.database_id(),
            DatabaseBinding {
                connector,
                revalidation: config.revalidation_interval(),
            },
        );
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Resolver applying the configured default time window.
    pub fn resolver(&self) -> &SelectionResolver {
        &self.resolver
    }

    // ========================================================================
    // File lists and timestamps
    // ========================================================================

    /// Tables of `database`.
    pub async fn get_file_list(&self, database: &DatabaseId) -> Result<Arc<Vec<TableId>>> {
        let binding = self.binding(database)?;

        let files = match self.cache.try_get_file_list(database) {
            Some(files) => files,
            None => {
                debug!("Listing files of {}", database);
                let connector = Arc::clone(&binding.connector);
                let owner = database.clone();
                let files = share(async move {
                    let names = connector.list_files().await?;
                    Ok(names
                        .into_iter()
                        .map(|name| TableId::new(owner.clone(), name))
                        .collect::<Vec<_>>())
                });
                self.cache.set_file_list(database, files.clone());
                files
            }
        };

        files.await
    }

    /// Last modification time of `table` at its source.
    pub async fn get_last_modified(&self, table: &TableId) -> Result<DateTime<Utc>> {
        let binding = self.binding(table.database())?;

        let timestamp = match self.cache.try_get_last_modified(table) {
            Some(timestamp) => timestamp,
            None => {
                let connector = Arc::clone(&binding.connector);
                let name = table.name().to_string();
                let timestamp = share_timestamp(async move { connector.last_modified(&name).await });
                self.cache.set_last_modified(table, timestamp.clone());
                timestamp
            }
        };

        timestamp.await
    }

    // ========================================================================
    // Schemas and data
    // ========================================================================

    /// Schema of `table`.
    pub async fn get_metadata(&self, table: &TableId) -> Result<Arc<TableSchema>> {
        Ok(self.checked_schema(table).await?.schema)
    }

    /// Data of `selection`, row-major in schema dimension order.
    ///
    /// Served from an exact cache hit, else projected from a cached superset,
    /// else read from the source and cached.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation, before any cache lookup, when
    /// `selection` does not list the schema's dimensions in schema order or
    /// names codes the table does not have.
    pub async fn get_data(&self, table: &TableId, selection: &Selection) -> Result<Arc<Vec<DataValue>>> {
        let binding = self.binding(table.database())?;
        let CheckedSchema { schema, mut observed } = self.checked_schema(table).await?;
        let full = check_selection(&schema, selection)?;

        if let Some(entry) = self.cache.try_get_data_exact(table, selection) {
            if self.is_current(binding, table, entry.cached_at(), &mut observed).await? {
                return entry.data().await;
            }
        } else if let Some(entry) = self.cache.try_get_data_superset(table, selection) {
            if self.is_current(binding, table, entry.cached_at(), &mut observed).await? {
                return self.project_from(&entry, selection).await;
            }
        }

        debug!("Reading {} {} from source", table, selection);
        let data = self.fetch_data(binding, table, schema, full, selection.clone());
        self.cache.set_data(table, selection, data.clone())?;
        data.await
    }

    async fn project_from(&self, entry: &DataEntry, selection: &Selection) -> Result<Arc<Vec<DataValue>>> {
        let cached = entry.data().await?;
        Ok(Arc::new(project(entry.selection(), &cached, selection)?))
    }

    async fn checked_schema(&self, table: &TableId) -> Result<CheckedSchema> {
        let binding = self.binding(table.database())?;
        let mut observed = None;

        let mut cached = self.cache.try_get_metadata(table);
        if let Some(entry) = &cached {
            if !self.is_current(binding, table, entry.cached_at(), &mut observed).await? {
                cached = None;
            }
        }
        let entry = match cached {
            Some(entry) => entry,
            None => self.load_metadata(binding, table),
        };

        Ok(CheckedSchema {
            schema: entry.schema().await?,
            observed,
        })
    }

    /// Whether an entry cached at `cached_at` may still be served.
    ///
    /// Checks the source at most once per request; the timestamp fetched is
    /// kept in `observed` for later checks of the same request.
    async fn is_current(
        &self,
        binding: &DatabaseBinding,
        table: &TableId,
        cached_at: DateTime<Utc>,
        observed: &mut Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let Some(interval) = binding.revalidation else {
            return Ok(true);
        };
        let age = Utc::now()
            .signed_duration_since(cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if age < interval {
            return Ok(true);
        }

        let modified = match *observed {
            Some(modified) => modified,
            None => {
                let modified = binding.connector.last_modified(table.name()).await?;
                self.cache
                    .set_last_modified(table, share_timestamp(futures::future::ready(Ok(modified))));
                *observed = Some(modified);
                modified
            }
        };

        if modified > cached_at {
            warn!("{} changed at source since {}, refetching", table, cached_at);
            return Ok(false);
        }
        Ok(true)
    }

    fn load_metadata(&self, binding: &DatabaseBinding, table: &TableId) -> Arc<MetadataEntry> {
        debug!("Reading schema of {}", table);
        let connector = Arc::clone(&binding.connector);
        let reader = Arc::clone(&self.reader);
        let owner = table.clone();
        let schema: SharedSchema = share(async move {
            let mut stream = connector.read_stream(owner.name()).await?;
            reader.read_schema(&owner, &mut stream).await
        });
        self.cache.set_metadata(table, schema)
    }

    fn fetch_data(
        &self,
        binding: &DatabaseBinding,
        table: &TableId,
        schema: Arc<TableSchema>,
        full: Selection,
        selection: Selection,
    ) -> SharedData {
        let connector = Arc::clone(&binding.connector);
        let reader = Arc::clone(&self.reader);
        let owner = table.clone();
        share(async move {
            let mut stream = connector.read_stream(owner.name()).await?;
            let offset = reader.data_offset(&owner, &mut stream).await?;
            let values = reader.read_values(&owner, &mut stream, offset, &schema).await?;
            project(&full, &values, &selection)
        })
    }

    /// Cache already known data for `selection` of `table`.
    ///
    /// # Errors
    ///
    /// Returns `OrphanedData` if the table's schema is not cached, and an
    /// invariant violation when the cached schema is resolved and `selection`
    /// does not fit it.
    pub fn populate_data(&self, table: &TableId, selection: &Selection, values: Vec<DataValue>) -> Result<()> {
        if let Some(metadata) = self.cache.try_get_metadata(table) {
            if let Some(Ok(schema)) = metadata.schema().peek() {
                check_selection(schema, selection)?;
            }
        }
        self.cache.set_data(table, selection, resolved(values))?;
        Ok(())
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Forget the file list of `database` and the timestamps of its listed tables.
    pub fn clear_database(&self, database: &DatabaseId) {
        if let Some(files) = self.cache.try_get_file_list(database) {
            if let Some(Ok(tables)) = files.peek() {
                for table in tables.iter() {
                    self.cache.remove_last_modified(table);
                }
            }
        }
        self.cache.remove_file_list(database);
        info!("Cleared cache of database {}", database);
    }

    /// Forget the timestamp, schema and data of `table`.
    pub fn clear_table(&self, table: &TableId) {
        self.cache.remove_last_modified(table);
        self.cache.remove_metadata(table);
        info!("Cleared cache of table {}", table);
    }

    // ========================================================================
    // Direct reads
    // ========================================================================

    /// Display name of `database` in `language`.
    ///
    /// Taken from `Alias_<language>.txt`, else `Alias.txt`, else the database id.
    pub async fn get_database_name(&self, database: &DatabaseId, language: &str) -> Result<String> {
        let binding = self.binding(database)?;

        let mut candidates = Vec::with_capacity(2);
        if !language.is_empty() {
            candidates.push(format!("Alias_{}.txt", language));
        }
        candidates.push("Alias.txt".to_string());

        for name in candidates {
            if let Some(mut stream) = binding.connector.read_auxiliary(&name).await? {
                let mut bytes = Vec::new();
                stream.reader().read_to_end(&mut bytes).await?;
                let text = String::from_utf8_lossy(&bytes);
                return Ok(text.trim_start_matches('\u{feff}').trim().to_string());
            }
        }

        Ok(database.as_str().to_string())
    }

    /// One header value of `table`, read straight from the source.
    pub async fn get_single_header_value(&self, table: &TableId, key: &str) -> Result<String> {
        let binding = self.binding(table.database())?;
        let mut stream = binding.connector.read_stream(table.name()).await?;
        read_header_value(table, &mut stream, key).await
    }

    fn binding(&self, database: &DatabaseId) -> Result<&DatabaseBinding> {
        self.databases
            .get(database)
            .ok_or_else(|| CubeError::UnknownDatabase(database.to_string()))
    }
}

/// Full selection of `schema`, after checking that `selection` lists the
/// schema's dimensions in schema order with codes drawn from the table.
fn check_selection(schema: &TableSchema, selection: &Selection) -> Result<Selection> {
    let in_order = selection.len() == schema.dimensions.len()
        && selection
            .dimensions()
            .iter()
            .zip(&schema.dimensions)
            .all(|(requested, dim)| requested.code == dim.code);
    if !in_order {
        return Err(CubeError::invariant(format!(
            "selection {} does not follow the dimension order of {}",
            selection, schema.table
        )));
    }

    let full = schema.full_selection()?;
    if !selection.is_subset_of(&full) {
        return Err(CubeError::invariant(format!(
            "selection {} is not part of table {}",
            selection, schema.table
        )));
    }
    Ok(full)
}
