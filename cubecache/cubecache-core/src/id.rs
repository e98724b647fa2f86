//! Identity types for databases and tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one logical collection of tables (one connector).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseId(String);

impl DatabaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatabaseId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifies one table file inside a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    database: DatabaseId,
    name: String,
}

impl TableId {
    pub fn new(database: DatabaseId, name: impl Into<String>) -> Self {
        Self {
            database,
            name: name.into(),
        }
    }

    /// The owning database
    pub fn database(&self) -> &DatabaseId {
        &self.database
    }

    /// The table's file name as the connector knows it
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database, self.name)
    }
}
