//! Table schema model produced by the external schema reader.

use crate::error::Result;
use crate::id::TableId;
use crate::selection::{DimensionSelection, Selection};
use serde::{Deserialize, Serialize};

/// One value of a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionValue {
    pub code: String,
    pub name: String,
}

impl DimensionValue {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// A named axis of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub code: String,
    pub name: String,
    pub values: Vec<DimensionValue>,
    /// Value used when a query does not mention this dimension
    #[serde(default)]
    pub elimination_value: Option<String>,
    /// Whether this dimension is the table's time axis
    #[serde(default)]
    pub is_time: bool,
}

impl Dimension {
    pub fn new(code: impl Into<String>, name: impl Into<String>, values: Vec<DimensionValue>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            values,
            elimination_value: None,
            is_time: false,
        }
    }

    /// Mark this dimension as the time axis.
    pub fn time(mut self) -> Self {
        self.is_time = true;
        self
    }

    /// Set the elimination value code.
    pub fn with_elimination(mut self, code: impl Into<String>) -> Self {
        self.elimination_value = Some(code.into());
        self
    }

    /// Value codes in declared order
    pub fn codes(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.iter().map(|v| v.code.as_str())
    }
}

/// Dimensions of one table, in data layout order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: TableId,
    pub dimensions: Vec<Dimension>,
}

impl TableSchema {
    pub fn new(table: TableId, dimensions: Vec<Dimension>) -> Self {
        Self { table, dimensions }
    }

    pub fn dimension(&self, code: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.code == code)
    }

    /// Every code of every dimension, i.e. the layout of the stored data.
    ///
    /// # Errors
    ///
    /// Fails when the schema repeats a dimension code.
    pub fn full_selection(&self) -> Result<Selection> {
        Selection::from_dimensions(
            self.dimensions
                .iter()
                .map(|d| DimensionSelection::new(d.code.clone(), d.codes().map(str::to_owned).collect()))
                .collect(),
        )
    }

    /// Number of cells in the full table
    pub fn cell_count(&self) -> usize {
        self.dimensions.iter().map(|d| d.values.len()).product()
    }
}
