//! Property and scenario tests for cubecache-query

use cubecache_core::prelude::*;
use cubecache_query::filter::{Filter, SelectionResolver};
use cubecache_query::{is_match, project};
use proptest::prelude::*;
use std::collections::HashMap;

fn schema() -> TableSchema {
    let values = |codes: &[&str]| -> Vec<DimensionValue> {
        codes.iter().map(|c| DimensionValue::new(*c, *c)).collect()
    };
    TableSchema::new(
        TableId::new(DatabaseId::new("db"), "table.px"),
        vec![
            Dimension::new("region", "Region", values(&["SSS", "049", "091", "092"])),
            Dimension::new("sex", "Sex", values(&["SSS", "1", "2"])).with_elimination("SSS"),
            Dimension::new("info", "Information", values(&["vaesto", "muutos"])),
            Dimension::new(
                "year",
                "Year",
                (1990..2025).map(|y| DimensionValue::new(y.to_string(), y.to_string())).collect(),
            )
            .time(),
        ],
    )
}

// ============================================================================
// Wildcard Tests
// ============================================================================

#[test]
fn test_wildcard_reference_cases() {
    assert!(is_match("bananana", "ba*na"));
    assert!(!is_match("foofobarfoobrbarfoobafoor", "*foobar*"));
    assert!(is_match("foo\0bar", "*foo*bar*"));
    assert!(is_match("x", "**"));
}

proptest! {
    #[test]
    fn prop_star_matches_anything(candidate in ".*") {
        prop_assert!(is_match(&candidate, "*"));
    }

    #[test]
    fn prop_literal_matches_itself(candidate in "[a-zA-Z0-9]{0,12}") {
        prop_assert!(is_match(&candidate, &candidate));
        prop_assert!(is_match(&candidate.to_uppercase(), &candidate.to_lowercase()));
    }

    #[test]
    fn prop_split_candidate_matches_with_stars(
        head in "[a-z]{0,5}",
        middle in "[a-z]{0,5}",
        tail in "[a-z]{0,5}",
        noise in "[a-z]{0,5}",
    ) {
        let candidate = format!("{}{}{}{}{}", head, noise, middle, noise, tail);
        let pattern = format!("{}*{}*{}", head, middle, tail);
        prop_assert!(is_match(&candidate, &pattern));
    }
}

// ============================================================================
// Selection Resolution Tests
// ============================================================================

#[test]
fn test_default_policy() {
    let selection = SelectionResolver::default()
        .filter_dimensions(&schema(), &HashMap::new())
        .unwrap();

    assert_eq!(selection.len(), 4);
    assert_eq!(selection.codes("region").unwrap().len(), 4);
    assert_eq!(selection.codes("sex").unwrap(), ["SSS"]);
    assert_eq!(selection.codes("info").unwrap(), ["vaesto", "muutos"]);

    let years = selection.codes("year").unwrap();
    assert_eq!(years.len(), 20);
    assert_eq!(years.first().map(String::as_str), Some("2005"));
    assert_eq!(years.last().map(String::as_str), Some("2024"));
}

#[test]
fn test_custom_time_window() {
    let selection = SelectionResolver::new(3)
        .apply_to_schema(&schema(), &HashMap::new())
        .unwrap();
    assert_eq!(selection.codes("year").unwrap(), ["2022", "2023", "2024"]);
}

#[test]
fn test_filter_chains_per_dimension() {
    let mut filters = HashMap::new();
    filters.insert(
        "region".to_string(),
        vec![Filter::Code(vec!["09*".into()]), Filter::Last(1)],
    );
    filters.insert("year".to_string(), vec![Filter::From("2023".into())]);
    filters.insert("sex".to_string(), vec![Filter::All]);

    let selection = SelectionResolver::default()
        .filter_dimensions(&schema(), &filters)
        .unwrap();

    let order: Vec<&str> = selection.dimensions().iter().map(|d| d.code.as_str()).collect();
    assert_eq!(order, ["region", "sex", "info", "year"]);
    assert_eq!(selection.codes("region").unwrap(), ["092"]);
    assert_eq!(selection.codes("sex").unwrap(), ["SSS", "1", "2"]);
    assert_eq!(selection.codes("year").unwrap(), ["2023", "2024"]);
}

#[test]
fn test_single_filter_per_dimension() {
    let mut filters = HashMap::new();
    filters.insert("info".to_string(), Filter::To("vaesto".into()));
    filters.insert("region".to_string(), Filter::First(2));

    let selection = SelectionResolver::default()
        .apply_to_schema(&schema(), &filters)
        .unwrap();
    assert_eq!(selection.codes("info").unwrap(), ["vaesto"]);
    assert_eq!(selection.codes("region").unwrap(), ["SSS", "049"]);
}

#[test]
fn test_unknown_dimension_is_invariant_violation() {
    let mut filters = HashMap::new();
    filters.insert("nope".to_string(), Filter::All);
    let err = SelectionResolver::default()
        .apply_to_schema(&schema(), &filters)
        .unwrap_err();
    assert!(err.is_invariant_violation());
}

#[test]
fn test_unmatched_boundary_propagates() {
    let mut filters = HashMap::new();
    filters.insert("year".to_string(), vec![Filter::From("1800".into())]);
    let err = SelectionResolver::default()
        .filter_dimensions(&schema(), &filters)
        .unwrap_err();
    assert!(matches!(err, CubeError::UnmatchedBoundary { pattern } if pattern == "1800"));
}

// ============================================================================
// Projection Tests
// ============================================================================

#[test]
fn test_resolved_selection_projects_from_full_table() {
    let schema = schema();
    let full = schema.full_selection().unwrap();
    let data: Vec<usize> = (0..full.cell_count()).collect();

    let mut filters = HashMap::new();
    filters.insert("region".to_string(), Filter::Code(vec!["091".into()]));
    filters.insert("sex".to_string(), Filter::Code(vec!["2".into()]));
    filters.insert("info".to_string(), Filter::Code(vec!["muutos".into()]));
    filters.insert("year".to_string(), Filter::Code(vec!["1990".into()]));
    let target = SelectionResolver::default()
        .apply_to_schema(&schema, &filters)
        .unwrap();

    // region 2, sex 2, info 1, year 0 with sizes 4 x 3 x 2 x 35
    let expected = ((2 * 3 + 2) * 2 + 1) * 35;
    assert_eq!(project(&full, &data, &target).unwrap(), vec![expected]);
}

fn cube_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..5, 1..4)
}

fn cube(sizes: &[usize]) -> Selection {
    Selection::new(
        sizes
            .iter()
            .enumerate()
            .map(|(d, &n)| (format!("d{}", d), (0..n).map(|i| format!("c{}", i)).collect::<Vec<_>>())),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn prop_full_projection_is_identity(sizes in cube_strategy()) {
        let source = cube(&sizes);
        let data: Vec<usize> = (0..source.cell_count()).collect();
        prop_assert_eq!(project(&source, &data, &source).unwrap(), data);
    }

    #[test]
    fn prop_projection_is_transitive(sizes in cube_strategy(), keep in 0usize..3) {
        let source = cube(&sizes);
        let data: Vec<usize> = (0..source.cell_count()).collect();

        // middle drops the first code when possible, target keeps at most `keep + 1`
        let middle = Selection::new(source.dimensions().iter().map(|d| {
            let skip = usize::from(d.values.len() > 1);
            (d.code.clone(), d.values[skip..].to_vec())
        })).unwrap();
        let target = Selection::new(middle.dimensions().iter().map(|d| {
            (d.code.clone(), d.values.iter().rev().take(keep + 1).cloned().collect::<Vec<_>>())
        })).unwrap();

        let via_middle = project(&middle, &project(&source, &data, &middle).unwrap(), &target).unwrap();
        let direct = project(&source, &data, &target).unwrap();
        prop_assert_eq!(via_middle, direct);
    }
}
