//! Cell values of a statistical table.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One data cell.
///
/// Missing cells carry the dot-code level used by PX files, where `"."` is
/// level 1 and `"......"` is level 6.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Number(f64),
    Missing(MissingCode),
}

impl DataValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Missing(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Missing-value marker level (1-6), serialized as its dot code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MissingCode(u8);

impl MissingCode {
    /// Parse a dot code such as `".."`; anything else is not a missing marker.
    pub fn from_dots(text: &str) -> Option<Self> {
        let level = text.len();
        if (1..=6).contains(&level) && text.bytes().all(|b| b == b'.') {
            Some(Self(level as u8))
        } else {
            None
        }
    }

    pub fn level(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for MissingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&".".repeat(self.0 as usize))
    }
}

impl Serialize for MissingCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MissingCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_dots(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid missing-value code '{}'", text)))
    }
}
