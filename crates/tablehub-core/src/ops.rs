//! Operation dispatch: `Node × Operation → Node`

use std::sync::Arc;

use tablehub_ir::{position_of, Expr, FilterMode, FilterTerm, Literal, Operation, Predicate, Select, SelectItem};
use tracing::{debug, info, warn};

use crate::error::{Result, SheetError};
use crate::hub::Hub;
use crate::node::{Draft, Node, NodeKind};

fn unsupported(operation: impl Into<String>, node: &Node) -> SheetError {
    SheetError::UnsupportedOperation {
        operation: operation.into(),
        kind: node.kind().tag(),
    }
}

fn check_ident(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('\0') {
        return Err(SheetError::Schema(format!("invalid column name {name:?}")));
    }
    Ok(())
}

fn check_columns(node: &Node, names: &[String]) -> Result<()> {
    match names.iter().find(|n| position_of(node.columns(), n).is_none()) {
        Some(missing) => Err(SheetError::Schema(format!(
            "column `{missing}` does not exist in `{}`",
            node.label()
        ))),
        None => Ok(()),
    }
}

fn check_key_columns(key_columns: &[String], returned: &[String]) -> Result<()> {
    match key_columns.iter().find(|k| !returned.contains(k)) {
        Some(missing) => Err(SheetError::KeyColumn {
            key_columns: key_columns.to_vec(),
            missing: missing.clone(),
        }),
        None => Ok(()),
    }
}

fn equality_terms(filters: &[FilterTerm]) -> Result<Vec<Predicate>> {
    filters
        .iter()
        .map(|(column, value)| {
            check_ident(column)?;
            Ok(Expr::column(column.as_str()).equals(value.as_deref()))
        })
        .collect()
}

impl Hub {
    /// Derive a new view from `node`. On error nothing is stored.
    pub fn dispatch(&self, node: &Node, op: &Operation) -> Result<Arc<Node>> {
        debug!(id = node.id(), kind = node.kind().tag(), op = op.name(), "Dispatching");

        let result = match op {
            Operation::Sort { column, ascending } => self.sort(node, column, *ascending),
            Operation::Filter {
                filters,
                columns_to_return,
                mode,
            } => self.filter(node, filters, columns_to_return.as_deref(), *mode),
            Operation::Search {
                column,
                pattern,
                columns_to_return,
            } => self.search(node, column, pattern, columns_to_return.as_deref()),
            Operation::Frequency { columns } => self.frequency(node, columns),
            Operation::Pivot {
                key_columns,
                pivot_column,
                aggregate_column,
            } => self.pivot(node, key_columns, pivot_column, aggregate_column),
            Operation::Facet { filters } => match node.kind() {
                NodeKind::Frequency { .. } => self.facet(node, filters),
                _ => Err(unsupported(op.name(), node)),
            },
            Operation::Open { row_index } => match node.kind() {
                NodeKind::Listing {
                    child_table_names, ..
                } => self.open_row(node, child_table_names, *row_index),
                _ => Err(unsupported(op.name(), node)),
            },
            Operation::Generic { code, params } => match code.as_str() {
                "sa" => self.sort(node, params, true),
                "sd" => self.sort(node, params, false),
                other => Err(unsupported(format!("generic:{other}"), node)),
            },
        };

        match &result {
            Ok(derived) => info!(
                from = node.id(),
                to = derived.id(),
                op = op.name(),
                "Derived view"
            ),
            Err(e) => warn!(from = node.id(), op = op.name(), code = e.code(), error = %e, "Operation rejected"),
        }
        result
    }

    /// Sorting re-targets the same source: the result is a sibling of
    /// `node`, so a sorted frequency view still drills into its source.
    fn sort(&self, node: &Node, column: &str, ascending: bool) -> Result<Arc<Node>> {
        check_ident(column)?;
        let select = Select::wrap(node.select().clone()).order_by(column, ascending);
        let kind = match node.kind() {
            NodeKind::Frequency { key_columns } => NodeKind::Frequency {
                key_columns: key_columns.clone(),
            },
            _ => NodeKind::Table,
        };

        let mut draft = Draft::new(select, kind).params(node.params().to_vec());
        draft.desc = node.desc().map(str::to_string);
        self.build_sibling(node, draft)
    }

    fn filter(
        &self,
        node: &Node,
        filters: &[FilterTerm],
        columns: Option<&[String]>,
        mode: FilterMode,
    ) -> Result<Arc<Node>> {
        let terms = equality_terms(filters)?;
        let (predicate, desc) = match mode {
            FilterMode::All => (Predicate::All { terms }, "fil"),
            FilterMode::Any => (Predicate::Any { terms }, "fil2"),
        };
        let select = Select::wrap(node.select().clone())
            .filter(predicate)
            .columns(columns);
        self.narrow(node, select, None, desc, columns)
    }

    fn search(
        &self,
        node: &Node,
        column: &str,
        pattern: &str,
        columns: Option<&[String]>,
    ) -> Result<Arc<Node>> {
        check_ident(column)?;
        let predicate = Predicate::Holds {
            expr: Expr::call(
                "regexp_matches",
                vec![Expr::column(column), Expr::Parameter],
            ),
        };
        let select = Select::wrap(node.select().clone())
            .filter(predicate)
            .columns(columns);
        self.narrow(node, select, Some(pattern.to_string()), "search", columns)
    }

    /// Shared tail of filter and search. On a frequency view the result
    /// stays a frequency view over the same source.
    fn narrow(
        &self,
        node: &Node,
        select: Select,
        pattern: Option<String>,
        desc: &str,
        columns: Option<&[String]>,
    ) -> Result<Arc<Node>> {
        if let Some(columns) = columns {
            columns.iter().try_for_each(|c| check_ident(c))?;
        }

        match node.kind() {
            NodeKind::Frequency { key_columns } => {
                if let Some(columns) = columns {
                    check_key_columns(key_columns, columns)?;
                }
                let mut params = node.params().to_vec();
                params.extend(pattern);
                let desc = match desc {
                    "search" => "fsearch",
                    _ => "ffil",
                };
                let draft = Draft::new(
                    select,
                    NodeKind::Frequency {
                        key_columns: key_columns.clone(),
                    },
                )
                .params(params)
                .desc(desc);
                self.build_sibling(node, draft)
            }
            _ => {
                let draft = Draft::new(select, NodeKind::Table)
                    .params(pattern.into_iter().collect())
                    .desc(desc);
                self.build(draft, Some(node))
            }
        }
    }

    /// Build `draft` next to `node`: same parent, and the same engine when
    /// `node` picked its engine explicitly.
    fn build_sibling(&self, node: &Node, mut draft: Draft) -> Result<Arc<Node>> {
        if node.explicit_backend.is_some() {
            draft = draft.backend(node.engine().clone());
        }
        let parent = self.parent(node)?;
        self.build(draft, parent.as_deref())
    }

    fn frequency(&self, node: &Node, columns: &[String]) -> Result<Arc<Node>> {
        if columns.is_empty() {
            return Err(SheetError::Schema(
                "frequency needs at least one column".to_string(),
            ));
        }
        columns.iter().try_for_each(|c| check_ident(c))?;

        let mut grouped_items: Vec<SelectItem> = columns.iter().map(SelectItem::column).collect();
        grouped_items.push(Expr::CountStar.alias("num_rows"));
        let grouped = Select::wrap(node.select().clone())
            .group_by(columns)
            .project(grouped_items);

        let percentage = Expr::int(100)
            .mul(Expr::column("num_rows").cast("REAL"))
            .div(Expr::call("SUM", vec![Expr::column("num_rows")]).over_all())
            .alias("percentage");
        let select = Select::wrap(grouped)
            .project(vec![SelectItem::Wildcard, percentage])
            .order_by("num_rows", false);

        let draft = Draft::new(
            select,
            NodeKind::Frequency {
                key_columns: columns.to_vec(),
            },
        )
        .desc("freq");
        self.build(draft, Some(node))
    }

    /// One `MAX(CASE WHEN ...)` column per distinct pivot value, in the
    /// pivot column's sort order.
    fn pivot(
        &self,
        node: &Node,
        key_columns: &[String],
        pivot_column: &str,
        aggregate_column: &str,
    ) -> Result<Arc<Node>> {
        check_columns(node, key_columns)?;
        check_columns(node, &[pivot_column.to_string(), aggregate_column.to_string()])?;

        let cap = self.config.pivot_max_columns;
        let probe = Select::wrap(node.select().clone())
            .columns(Some(&[pivot_column.to_string()]))
            .distinct()
            .order_by(pivot_column, true)
            .window(0, cap as u64 + 1);
        let params = self.bound_params(node)?;
        let values = node.engine().query(&probe.lower().sql, &params)?;

        if values.rows.len() > cap {
            return Err(SheetError::PivotCardinality {
                column: pivot_column.to_string(),
                cap,
            });
        }
        debug!(column = pivot_column, values = values.rows.len(), "Pivoting");

        let mut items: Vec<SelectItem> = key_columns.iter().map(SelectItem::column).collect();
        for row in &values.rows {
            let value = row.first().map(Literal::from).unwrap_or(Literal::Null);
            let case = Expr::Case {
                when: Box::new(Expr::column(pivot_column).equals_literal(&value)),
                then: Box::new(Expr::column(aggregate_column)),
            };
            items.push(Expr::call("MAX", vec![case]).alias(value.label()));
        }

        let select = Select::wrap(node.select().clone())
            .group_by(key_columns)
            .project(items);
        self.build(Draft::new(select, NodeKind::Table).desc("piv"), Some(node))
    }

    /// Drill from an aggregated row back into the unaggregated source.
    fn facet(&self, node: &Node, filters: &[FilterTerm]) -> Result<Arc<Node>> {
        let source = self.parent(node)?.ok_or_else(|| {
            SheetError::Config(format!("frequency view `{}` has no source", node.id()))
        })?;
        self.filter(&source, filters, None, FilterMode::All)
    }

    fn open_row(
        &self,
        node: &Node,
        child_table_names: &[String],
        row_index: usize,
    ) -> Result<Arc<Node>> {
        let table = child_table_names
            .get(row_index)
            .ok_or(SheetError::RowOutOfRange {
                index: row_index,
                len: child_table_names.len(),
            })?;

        let draft = Draft::new(Select::from_table(table), NodeKind::Table)
            .backend(self.disk_engine()?)
            .name(Some(table.clone()))
            .desc(table.as_str());
        self.build(draft, Some(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_columns_must_be_returned() {
        let keys = vec!["party".to_string()];
        assert!(check_key_columns(&keys, &["party".to_string(), "num_rows".to_string()]).is_ok());

        let err = check_key_columns(&keys, &["num_rows".to_string()]).unwrap_err();
        assert_eq!(err.code(), "key_column");
    }

    #[test]
    fn test_equality_terms_match_null() {
        let terms = equality_terms(&[
            ("party".to_string(), Some("D".to_string())),
            ("state".to_string(), None),
        ])
        .unwrap();

        assert_eq!(terms[1], Predicate::IsNull { expr: Expr::column("state") });
        assert!(equality_terms(&[(String::new(), None)]).is_err());
    }
}
