//! Counting fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cubecache::{DataFacade, DatabaseConfig, EngineConfig};
use cubecache_core::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const HEADER: &str = "CHARSET=\"ANSI\";\n\
TITLE=\"Population by \"\n\"region and year\";\n\
MATRIX=\"population\";\n\
DATA=\n0 1 2 3;\n";

pub fn database() -> DatabaseId {
    DatabaseId::new("stats")
}

pub fn table() -> TableId {
    TableId::new(database(), "population.px")
}

pub fn sel(dims: &[(&str, &[&str])]) -> Selection {
    Selection::new(dims.iter().map(|(d, v)| (*d, v.iter().copied()))).unwrap()
}

/// Two by two table: `dim1` is `v1, v2`, `dim2` is the time axis `2024, 2025`.
pub fn schema_for(table: &TableId) -> TableSchema {
    TableSchema::new(
        table.clone(),
        vec![
            Dimension::new(
                "dim1",
                "Dimension 1",
                vec![DimensionValue::new("v1", "Value 1"), DimensionValue::new("v2", "Value 2")],
            ),
            Dimension::new(
                "dim2",
                "Year",
                vec![DimensionValue::new("2024", "2024"), DimensionValue::new("2025", "2025")],
            )
            .time(),
        ],
    )
}

pub fn numbers(values: &[f64]) -> Vec<DataValue> {
    values.iter().copied().map(DataValue::from).collect()
}

// ============================================================================
// Connector
// ============================================================================

pub struct FakeConnector {
    files: Vec<String>,
    auxiliary: HashMap<String, String>,
    sequential: bool,
    modified: Mutex<DateTime<Utc>>,
    failing: AtomicBool,
    pub list_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub modified_calls: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            files: vec!["population.px".to_string(), "births.px".to_string()],
            auxiliary: HashMap::new(),
            sequential: false,
            modified: Mutex::new(Utc::now() - ChronoDuration::days(1)),
            failing: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            modified_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_auxiliary(mut self, name: &str, content: &str) -> Self {
        self.auxiliary.insert(name.to_string(), content.to_string());
        self
    }

    /// Hand out forward-only streams, like a blob store does.
    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    pub fn touch(&self, at: DateTime<Utc>) {
        *self.modified.lock() = at;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn streams(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn modified_checks(&self) -> usize {
        self.modified_calls.load(Ordering::SeqCst)
    }

    fn stream(&self, content: &str) -> SourceStream {
        let cursor = Cursor::new(content.as_bytes().to_vec());
        if self.sequential {
            SourceStream::sequential(cursor)
        } else {
            SourceStream::seekable(cursor)
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "share offline").into());
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn list_files(&self) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.check_available()?;
        Ok(self.files.clone())
    }

    async fn read_stream(&self, _file: &str) -> Result<SourceStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.check_available()?;
        Ok(self.stream(HEADER))
    }

    async fn last_modified(&self, _file: &str) -> Result<DateTime<Utc>> {
        self.modified_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(*self.modified.lock())
    }

    async fn read_auxiliary(&self, name: &str) -> Result<Option<SourceStream>> {
        self.check_available()?;
        Ok(self.auxiliary.get(name).map(|content| self.stream(content)))
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Serves [`schema_for`] and the cell values `0, 1, 2, ...` for any table.
#[derive(Default)]
pub struct FakeReader {
    pub schema_calls: AtomicUsize,
    pub value_calls: AtomicUsize,
}

impl FakeReader {
    pub fn schemas(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.value_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaReader for FakeReader {
    async fn read_schema(&self, table: &TableId, _stream: &mut SourceStream) -> Result<TableSchema> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        Ok(schema_for(table))
    }

    async fn data_offset(&self, _table: &TableId, _stream: &mut SourceStream) -> Result<u64> {
        Ok(0)
    }

    async fn read_values(
        &self,
        _table: &TableId,
        _stream: &mut SourceStream,
        _offset: u64,
        schema: &TableSchema,
    ) -> Result<Vec<DataValue>> {
        self.value_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok((0..schema.cell_count()).map(|i| DataValue::from(i as f64)).collect())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub facade: DataFacade,
    pub connector: Arc<FakeConnector>,
    pub reader: Arc<FakeReader>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(EngineConfig::default(), DatabaseConfig::new("stats"), FakeConnector::new())
    }

    pub fn with_database(database: DatabaseConfig) -> Self {
        Self::build(EngineConfig::default(), database, FakeConnector::new())
    }

    pub fn with_connector(connector: FakeConnector) -> Self {
        Self::build(EngineConfig::default(), DatabaseConfig::new("stats"), connector)
    }

    pub fn build(config: EngineConfig, database: DatabaseConfig, connector: FakeConnector) -> Self {
        let connector = Arc::new(connector);
        let reader = Arc::new(FakeReader::default());
        let facade = DataFacade::new(&config, reader.clone())
            .with_database(database, connector.clone());
        Self {
            facade,
            connector,
            reader,
        }
    }
}
