//! Dimension filters and selection resolution.

use crate::wildcard::{is_match, matches_any};
use cubecache_core::config::DEFAULT_TIME_WINDOW;
use cubecache_core::error::{CubeError, Result};
use cubecache_core::schema::{Dimension, TableSchema};
use cubecache_core::selection::{DimensionSelection, Selection};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// A value-code filter for one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Keep every code
    All,
    /// Keep codes matching any of the wildcard patterns
    Code(Vec<String>),
    /// Keep codes from the first match to the end
    From(String),
    /// Keep codes from the start through the first match
    To(String),
    /// Keep the first `n` codes
    First(i64),
    /// Keep the last `n` codes
    Last(i64),
}

impl Filter {
    /// Apply the filter to an ordered sequence of codes.
    ///
    /// The input is consumed lazily: `First` pulls at most `n` items.
    ///
    /// # Errors
    ///
    /// `From` and `To` fail with an unmatched boundary error when no code
    /// matches their pattern.
    pub fn apply<I, S>(&self, codes: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut codes = codes.into_iter();
        match self {
            Filter::All => Ok(codes.map(|c| c.as_ref().to_owned()).collect()),
            Filter::Code(patterns) => Ok(codes
                .filter(|c| matches_any(c.as_ref(), patterns))
                .map(|c| c.as_ref().to_owned())
                .collect()),
            Filter::From(pattern) => {
                let start = codes
                    .find(|c| is_match(c.as_ref(), pattern))
                    .ok_or_else(|| CubeError::unmatched_boundary(pattern.as_str()))?;
                Ok(std::iter::once(start)
                    .chain(codes)
                    .map(|c| c.as_ref().to_owned())
                    .collect())
            }
            Filter::To(pattern) => {
                let mut selected = Vec::new();
                for code in codes {
                    let code = code.as_ref();
                    selected.push(code.to_owned());
                    if is_match(code, pattern) {
                        return Ok(selected);
                    }
                }
                Err(CubeError::unmatched_boundary(pattern.as_str()))
            }
            Filter::First(n) => match usize::try_from(*n) {
                Ok(n) if n > 0 => Ok(codes.take(n).map(|c| c.as_ref().to_owned()).collect()),
                _ => Ok(Vec::new()),
            },
            Filter::Last(n) => match usize::try_from(*n) {
                Ok(n) if n > 0 => {
                    let mut window = VecDeque::with_capacity(n);
                    for code in codes {
                        if window.len() == n {
                            window.pop_front();
                        }
                        window.push_back(code.as_ref().to_owned());
                    }
                    Ok(window.into())
                }
                _ => Ok(Vec::new()),
            },
        }
    }
}

/// Pipe `codes` through a chain of filters.
///
/// Once an intermediate result is empty the remaining filters are skipped,
/// so conflicting filters produce an empty selection instead of an error.
///
/// # Errors
///
/// Propagates boundary errors raised while the chain is still non-empty.
pub fn apply_chain<S: AsRef<str>>(codes: &[S], chain: &[Filter]) -> Result<Vec<String>> {
    let Some((first, rest)) = chain.split_first() else {
        return Filter::All.apply(codes);
    };
    let mut current = first.apply(codes)?;
    for filter in rest {
        if current.is_empty() {
            break;
        }
        current = filter.apply(&current)?;
    }
    Ok(current)
}

/// Turns per-dimension filters into a selection over a schema.
#[derive(Debug, Clone, Copy)]
pub struct SelectionResolver {
    time_window: usize,
}

impl Default for SelectionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_WINDOW)
    }
}

impl SelectionResolver {
    /// Create a resolver that keeps `time_window` latest values of an
    /// unfiltered time axis.
    pub fn new(time_window: usize) -> Self {
        Self { time_window }
    }

    pub fn time_window(&self) -> usize {
        self.time_window
    }

    /// Resolve a selection from an ordered filter chain per dimension.
    ///
    /// # Errors
    ///
    /// Fails on filters for dimensions the schema does not have, and on
    /// unmatched From/To boundaries.
    pub fn filter_dimensions(
        &self,
        schema: &TableSchema,
        filters: &HashMap<String, Vec<Filter>>,
    ) -> Result<Selection> {
        check_known_dimensions(schema, filters.keys())?;
        self.resolve(schema, |dim, codes| {
            filters
                .get(&dim.code)
                .map(|chain| apply_chain(codes, chain))
        })
    }

    /// Resolve a selection from at most one filter per dimension.
    ///
    /// # Errors
    ///
    /// Same as [`SelectionResolver::filter_dimensions`].
    pub fn apply_to_schema(
        &self,
        schema: &TableSchema,
        filters: &HashMap<String, Filter>,
    ) -> Result<Selection> {
        check_known_dimensions(schema, filters.keys())?;
        self.resolve(schema, |dim, codes| {
            filters.get(&dim.code).map(|filter| filter.apply(codes))
        })
    }

    fn resolve<F>(&self, schema: &TableSchema, mut explicit: F) -> Result<Selection>
    where
        F: FnMut(&Dimension, &[&str]) -> Option<Result<Vec<String>>>,
    {
        let mut dimensions = Vec::with_capacity(schema.dimensions.len());
        for dim in &schema.dimensions {
            let codes: Vec<&str> = dim.codes().collect();
            let values = match explicit(dim, &codes) {
                Some(result) => result?,
                None => self.default_codes(dim, &codes)?,
            };
            dimensions.push(DimensionSelection::new(dim.code.clone(), values));
        }
        let selection = Selection::from_dimensions(dimensions)?;
        debug!("Resolved selection for {}: {}", schema.table, selection);
        Ok(selection)
    }

    fn default_codes(&self, dim: &Dimension, codes: &[&str]) -> Result<Vec<String>> {
        if let Some(elimination) = &dim.elimination_value {
            return Ok(vec![elimination.clone()]);
        }
        if dim.is_time {
            let window = i64::try_from(self.time_window).unwrap_or(i64::MAX);
            return Filter::Last(window).apply(codes);
        }
        Filter::All.apply(codes)
    }
}

fn check_known_dimensions<'a>(
    schema: &TableSchema,
    requested: impl Iterator<Item = &'a String>,
) -> Result<()> {
    for code in requested {
        if schema.dimension(code).is_none() {
            return Err(CubeError::invariant(format!(
                "filter given for unknown dimension '{}' of table {}",
                code, schema.table
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn codes() -> Vec<&'static str> {
        vec!["val0", "val1", "val2", "val3"]
    }

    #[test]
    fn test_all_is_identity() {
        assert_eq!(Filter::All.apply(codes()).unwrap(), codes());
    }

    #[test]
    fn test_code_keeps_input_order() {
        let filter = Filter::Code(vec!["val3".into(), "VAL1".into(), "val*".into()]);
        assert_eq!(filter.apply(codes()).unwrap(), codes());

        let filter = Filter::Code(vec!["val3".into(), "val1".into()]);
        assert_eq!(filter.apply(codes()).unwrap(), ["val1", "val3"]);
    }

    #[test]
    fn test_from_and_to() {
        assert_eq!(
            Filter::From("val2".into()).apply(codes()).unwrap(),
            ["val2", "val3"]
        );
        assert_eq!(
            Filter::To("val1".into()).apply(codes()).unwrap(),
            ["val0", "val1"]
        );
        assert_eq!(
            Filter::From("*".into()).apply(codes()).unwrap(),
            codes()
        );
    }

    #[test]
    fn test_unmatched_boundaries() {
        let err = Filter::From("nope".into()).apply(codes()).unwrap_err();
        assert!(err.is_unmatched_boundary());
        let err = Filter::To("nope".into()).apply(codes()).unwrap_err();
        assert!(err.is_unmatched_boundary());
        let empty: Vec<&str> = Vec::new();
        assert!(Filter::From("*".into()).apply(&empty).is_err());
    }

    #[test]
    fn test_first_and_last() {
        assert_eq!(Filter::First(2).apply(codes()).unwrap(), ["val0", "val1"]);
        assert_eq!(Filter::Last(2).apply(codes()).unwrap(), ["val2", "val3"]);
        assert_eq!(Filter::Last(10).apply(codes()).unwrap(), codes());
        assert!(Filter::First(0).apply(codes()).unwrap().is_empty());
        assert!(Filter::Last(-3).apply(codes()).unwrap().is_empty());
    }

    #[test]
    fn test_first_is_lazy() {
        let pulled = Cell::new(0);
        let lazy = (0..).map(|i| {
            pulled.set(pulled.get() + 1);
            format!("v{}", i)
        });
        let result = Filter::First(3).apply(lazy).unwrap();
        assert_eq!(result, ["v0", "v1", "v2"]);
        assert_eq!(pulled.get(), 3);
    }

    #[test]
    fn test_chain_conflict_yields_empty() {
        let chain = vec![Filter::From("val2".into()), Filter::Code(vec!["val0".into()])];
        assert!(apply_chain(&codes(), &chain).unwrap().is_empty());

        let chain = vec![
            Filter::Code(vec!["none".into()]),
            Filter::From("val1".into()),
        ];
        assert!(apply_chain(&codes(), &chain).unwrap().is_empty());
    }

    #[test]
    fn test_chain_pipes_in_order() {
        let chain = vec![Filter::From("val1".into()), Filter::First(2)];
        assert_eq!(apply_chain(&codes(), &chain).unwrap(), ["val1", "val2"]);
        assert_eq!(apply_chain(&codes(), &[]).unwrap(), codes());
    }

    #[test]
    fn test_filter_serialization() {
        let json = serde_json::to_string(&Filter::Last(5)).unwrap();
        assert_eq!(json, r#"{"last":5}"#);
        let parsed: Filter = serde_json::from_str(r#"{"code":["a*"]}"#).unwrap();
        assert_eq!(parsed, Filter::Code(vec!["a*".into()]));
    }
}
