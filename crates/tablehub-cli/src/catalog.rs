//! The `main` listing and the about page

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tablehub_core::{BackendKind, Hub, MemoryRows, Node, RootSource, TableInfo};
use tracing::info;

pub const ABOUT: &str = "# tablehub

Browse large tables by deriving views from them. Every view has a short id;
send it back with an operation to get a new view.

- `frequency` counts rows per group, `facet` drills back into a group
- `filter` and `search` narrow rows, `sort` reorders them
- `pivot` spreads one column's values into columns
";

/// One entry of the datasets file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub display_name: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    pub table_name: String,
}

pub fn load_datasets(path: impl AsRef<Path>) -> anyhow::Result<Vec<Dataset>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading datasets from {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Describe the database's own tables when no datasets file is configured.
pub fn from_tables(tables: &[TableInfo]) -> Vec<Dataset> {
    tables
        .iter()
        .map(|t| Dataset {
            display_name: t.name.clone(),
            details: Some(format!("{} columns, {} rows", t.column_count, t.row_count)),
            date: None,
            table_name: t.name.clone(),
        })
        .collect()
}

/// Register the `main` listing and the `about` page.
pub fn bootstrap(hub: &Hub, datasets: Vec<Dataset>) -> anyhow::Result<Arc<Node>> {
    let (rows, child_table_names): (Vec<_>, Vec<_>) = datasets
        .into_iter()
        .map(|d| {
            (
                vec![Some(d.display_name), d.details, d.date],
                d.table_name,
            )
        })
        .unzip();

    let data = MemoryRows {
        table: "main".to_string(),
        columns: vec!["name".to_string(), "details".to_string(), "date".to_string()],
        rows,
    };
    let count = child_table_names.len();
    let main = hub.create_root(
        RootSource::Listing {
            data,
            child_table_names,
            wrapped_columns: vec![1],
        },
        BackendKind::Memory,
        Some("main"),
    )?;
    hub.create_text("about", ABOUT)?;

    info!(id = main.id(), datasets = count, "Catalog ready");
    Ok(main)
}
