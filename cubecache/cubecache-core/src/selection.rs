//! Selections: one ordered code list per dimension.

use crate::error::{CubeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The value codes chosen for one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionSelection {
    pub code: String,
    pub values: Vec<String>,
}

impl DimensionSelection {
    pub fn new(code: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            code: code.into(),
            values,
        }
    }
}

/// A rectangular slice descriptor over a table.
///
/// Dimension order follows the table schema and is significant for data
/// layout; code order inside a dimension is significant for indexing but not
/// for containment tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    dimensions: Vec<DimensionSelection>,
}

impl Selection {
    /// Build a selection from `(dimension, codes)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if a dimension code appears twice.
    pub fn new<I, D, V, C>(dimensions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (D, V)>,
        D: Into<String>,
        V: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let dimensions = dimensions
            .into_iter()
            .map(|(code, values)| {
                DimensionSelection::new(code, values.into_iter().map(Into::into).collect())
            })
            .collect();
        Self::from_dimensions(dimensions)
    }

    /// Build a selection from already constructed dimension selections.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if a dimension code appears twice.
    pub fn from_dimensions(dimensions: Vec<DimensionSelection>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(dimensions.len());
        for dim in &dimensions {
            if !seen.insert(dim.code.as_str()) {
                return Err(CubeError::invariant(format!(
                    "dimension '{}' appears more than once in selection",
                    dim.code
                )));
            }
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> &[DimensionSelection] {
        &self.dimensions
    }

    /// Codes selected for a dimension, if the dimension is part of the selection
    pub fn codes(&self, dimension: &str) -> Option<&[String]> {
        self.dimensions
            .iter()
            .find(|d| d.code == dimension)
            .map(|d| d.values.as_slice())
    }

    /// Number of dimensions
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Number of cells the selection addresses
    pub fn cell_count(&self) -> usize {
        self.dimensions.iter().map(|d| d.values.len()).product()
    }

    /// True when both selections cover the same dimensions and every
    /// dimension's codes are contained in `other`'s codes for it.
    pub fn is_subset_of(&self, other: &Selection) -> bool {
        if self.dimensions.len() != other.dimensions.len() {
            return false;
        }
        self.dimensions.iter().all(|dim| match other.codes(&dim.code) {
            Some(codes) => {
                let available: HashSet<&str> = codes.iter().map(String::as_str).collect();
                dim.values.iter().all(|code| available.contains(code.as_str()))
            }
            None => false,
        })
    }

    /// Subset that differs from `other` in at least one dimension's code set.
    pub fn is_proper_subset_of(&self, other: &Selection) -> bool {
        self.is_subset_of(other)
            && self.dimensions.iter().any(|dim| {
                let own: HashSet<&str> = dim.values.iter().map(String::as_str).collect();
                let theirs: HashSet<&str> = other
                    .codes(&dim.code)
                    .unwrap_or_default()
                    .iter()
                    .map(String::as_str)
                    .collect();
                own.len() < theirs.len()
            })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, dim) in self.dimensions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:[{}]", dim.code, dim.values.join(","))?;
        }
        f.write_str("}")
    }
}
