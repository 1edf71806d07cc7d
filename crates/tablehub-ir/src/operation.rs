//! Operations a client can apply to a view

use serde::{Deserialize, Serialize};

/// `(column, value)`; a missing value matches NULL.
pub type FilterTerm = (String, Option<String>);

/// How the terms of a filter combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Every term must match
    #[default]
    All,
    /// Any one term may match
    Any,
}

/// Request to derive a new view from an existing one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Sort {
        column: String,
        #[serde(default = "default_true")]
        ascending: bool,
    },
    Filter {
        filters: Vec<FilterTerm>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns_to_return: Option<Vec<String>>,
        #[serde(default)]
        mode: FilterMode,
    },
    Frequency {
        columns: Vec<String>,
    },
    Pivot {
        key_columns: Vec<String>,
        pivot_column: String,
        aggregate_column: String,
    },
    Search {
        column: String,
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns_to_return: Option<Vec<String>>,
    },
    Facet {
        filters: Vec<FilterTerm>,
    },
    Open {
        row_index: usize,
    },
    /// Short-code form used by keyboard bindings (`sa`, `sd`)
    Generic {
        code: String,
        params: String,
    },
}

fn default_true() -> bool {
    true
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Sort { .. } => "sort",
            Operation::Filter { .. } => "filter",
            Operation::Frequency { .. } => "frequency",
            Operation::Pivot { .. } => "pivot",
            Operation::Search { .. } => "search",
            Operation::Facet { .. } => "facet",
            Operation::Open { .. } => "open",
            Operation::Generic { .. } => "generic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_wire_shape() {
        let json = r#"{"op":"filter","filters":[["party","D"],["state",null]],"mode":"any"}"#;
        let op: Operation = serde_json::from_str(json).unwrap();

        assert_eq!(
            op,
            Operation::Filter {
                filters: vec![
                    ("party".to_string(), Some("D".to_string())),
                    ("state".to_string(), None),
                ],
                columns_to_return: None,
                mode: FilterMode::Any,
            }
        );
    }

    #[test]
    fn test_sort_defaults_ascending() {
        let op: Operation = serde_json::from_str(r#"{"op":"sort","column":"votes"}"#).unwrap();
        assert_eq!(
            op,
            Operation::Sort {
                column: "votes".to_string(),
                ascending: true
            }
        );
        assert_eq!(op.name(), "sort");
    }
}
