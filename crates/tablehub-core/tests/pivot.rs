mod common;

use serde_json::json;
use tablehub_core::{Operation, SheetError};

fn pivot(keys: &[&str], column: &str, aggregate: &str) -> Operation {
    Operation::Pivot {
        key_columns: keys.iter().map(|k| k.to_string()).collect(),
        pivot_column: column.to_string(),
        aggregate_column: aggregate.to_string(),
    }
}

#[test]
fn test_pivot_over_cap_is_rejected() {
    let fx = common::fixture();
    let wide = fx.root("wide");

    let err = fx.hub.dispatch(&wide, &pivot(&["k"], "p", "v")).unwrap_err();
    assert!(
        matches!(err, SheetError::PivotCardinality { cap: 35, .. }),
        "{err}"
    );
}

#[test]
fn test_pivot_at_cap() {
    let fx = common::fixture();
    let narrow = fx.root("narrow");

    let pivoted = fx.hub.dispatch(&narrow, &pivot(&["k"], "p", "v")).unwrap();
    let names = pivoted.column_names();
    assert_eq!(names.len(), 36);
    assert_eq!(names[0], "k");
    assert_eq!(names[1], "0");
    assert_eq!(names[35], "34");
    assert_eq!(pivoted.desc(), Some("piv"));

    let page = fx.hub.rows(&pivoted, 0, 10).unwrap();
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0][4], json!(6));
}

#[test]
fn test_pivot_null_values_become_nan_column() {
    let fx = common::fixture();
    let gaps = fx.root("gaps");

    let pivoted = fx.hub.dispatch(&gaps, &pivot(&["k"], "p", "v")).unwrap();
    assert_eq!(pivoted.column_names(), vec!["k", "x", "NaN"]);

    let sorted = fx
        .hub
        .dispatch(
            &pivoted,
            &Operation::Sort {
                column: "k".to_string(),
                ascending: true,
            },
        )
        .unwrap();
    let page = fx.hub.rows(&sorted, 0, 10).unwrap();
    assert_eq!(page.rows[0], vec![json!("a"), json!(1), json!(2)]);
    assert_eq!(page.rows[1], vec![json!("b"), json!(3), json!(null)]);
}

#[test]
fn test_pivot_on_large_unsigned_values() {
    let fx = common::fixture();
    let big = fx.root("big");

    let pivoted = fx.hub.dispatch(&big, &pivot(&["k"], "p", "v")).unwrap();
    assert_eq!(
        pivoted.column_names(),
        vec!["k", "1", "18446744073709551615"]
    );

    let page = fx.hub.rows(&pivoted, 0, 10).unwrap();
    assert_eq!(page.rows[0], vec![json!("a"), json!(10), json!(20)]);
}

#[test]
fn test_pivot_unknown_column_is_schema_error() {
    let fx = common::fixture();
    let gaps = fx.root("gaps");

    let err = fx.hub.dispatch(&gaps, &pivot(&["k"], "nope", "v")).unwrap_err();
    assert!(matches!(err, SheetError::Schema(_)), "{err}");
}
