//! Interfaces of the collaborators the engine reads through.
//!
//! Storage connectors (filesystem, file share, blob storage) and the PX
//! reader live outside this workspace and plug in through these traits.

use crate::error::Result;
use crate::id::TableId;
use crate::schema::TableSchema;
use crate::value::DataValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::io::{AsyncRead, AsyncSeek};

/// Byte stream that can also seek.
pub trait AsyncReadSeek: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> AsyncReadSeek for T {}

/// A readable table or auxiliary file as handed out by a connector.
pub enum SourceStream {
    /// Random access source, e.g. a local or mounted file
    Seekable(Box<dyn AsyncReadSeek>),
    /// Forward-only source, e.g. a blob download
    Sequential(Box<dyn AsyncRead + Send + Unpin>),
}

impl SourceStream {
    pub fn seekable(inner: impl AsyncReadSeek + 'static) -> Self {
        Self::Seekable(Box::new(inner))
    }

    pub fn sequential(inner: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Sequential(Box::new(inner))
    }

    pub fn is_seekable(&self) -> bool {
        matches!(self, Self::Seekable(_))
    }

    /// View the stream as a plain reader regardless of its kind.
    pub fn reader(&mut self) -> &mut (dyn AsyncRead + Send + Unpin) {
        match self {
            Self::Seekable(inner) => inner as &mut (dyn AsyncRead + Send + Unpin),
            Self::Sequential(inner) => inner.as_mut(),
        }
    }
}

impl fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seekable(_) => f.write_str("SourceStream::Seekable"),
            Self::Sequential(_) => f.write_str("SourceStream::Sequential"),
        }
    }
}

/// Access to the files of one database.
#[async_trait]
pub trait Connector: Send + Sync {
    /// List the table files of the database
    async fn list_files(&self) -> Result<Vec<String>>;

    /// Open a table file for reading
    async fn read_stream(&self, file: &str) -> Result<SourceStream>;

    /// Last modification time of a table file
    async fn last_modified(&self, file: &str) -> Result<DateTime<Utc>>;

    /// Open an auxiliary (non-table) file, `None` when it does not exist
    async fn read_auxiliary(&self, name: &str) -> Result<Option<SourceStream>>;
}

/// Decoder for table files.
#[async_trait]
pub trait SchemaReader: Send + Sync {
    /// Parse the table header into its schema
    async fn read_schema(&self, table: &TableId, stream: &mut SourceStream) -> Result<TableSchema>;

    /// Byte offset at which the data section starts
    async fn data_offset(&self, table: &TableId, stream: &mut SourceStream) -> Result<u64>;

    /// Read every cell of the table, row-major in schema dimension order
    async fn read_values(
        &self,
        table: &TableId,
        stream: &mut SourceStream,
        offset: u64,
        schema: &TableSchema,
    ) -> Result<Vec<DataValue>>;
}
