//! Views and their kind-specific state

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tablehub_duck::{BackendKind, Engine};
use tablehub_ir::{position_of, rows_digest, Column, Select};

/// Literal rows backing a memory view, all cells VARCHAR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRows {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A plain derived or source view
    Table,
    /// Group-by/count/percentage over `key_columns`
    Frequency { key_columns: Vec<String> },
    /// Literal rows loaded into a private memory engine
    Memory(MemoryRows),
    /// A table of tables; row `i` opens `child_table_names[i]`
    Listing {
        data: MemoryRows,
        child_table_names: Vec<String>,
    },
}

impl NodeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Table => "table",
            NodeKind::Frequency { .. } => "frequency",
            NodeKind::Memory(_) => "memory",
            NodeKind::Listing { .. } => "listing",
        }
    }

    pub fn memory_rows(&self) -> Option<&MemoryRows> {
        match self {
            NodeKind::Memory(data) | NodeKind::Listing { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Engine table holding this kind's literal rows, named `<table>_<digest>`
    /// so that roots over different rows lower to different SQL.
    pub(crate) fn literal_table(&self) -> Option<String> {
        let (data, links) = match self {
            NodeKind::Memory(data) => (data, &[] as &[String]),
            NodeKind::Listing {
                data,
                child_table_names,
            } => (data, child_table_names.as_slice()),
            _ => return None,
        };
        let digest = rows_digest(&data.columns, &data.rows, links);
        Some(format!("{}_{digest}", data.table))
    }
}

/// An immutable, persisted view.
///
/// Built only by [`crate::Hub`], which validates the schema and stores the
/// node before handing it out.
#[derive(Debug)]
pub struct Node {
    pub(crate) id: String,
    pub(crate) select: Select,
    pub(crate) sql: String,
    pub(crate) parent_id: Option<String>,
    pub(crate) params: Vec<String>,
    pub(crate) explicit_backend: Option<BackendKind>,
    pub(crate) engine: Arc<Engine>,
    pub(crate) name: Option<String>,
    pub(crate) desc: Option<String>,
    pub(crate) columns: Vec<Column>,
    pub(crate) order_hints: Vec<(String, bool)>,
    pub(crate) wrapped_columns: Vec<usize>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn select(&self) -> &Select {
        &self.select
    }

    /// The lowered query text the id was derived from
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// This view's own bound parameters, not including its ancestors'
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn backend(&self) -> BackendKind {
        self.engine.kind()
    }

    pub(crate) fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn order_hints(&self) -> &[(String, bool)] {
        &self.order_hints
    }

    /// Column indices a renderer should wrap
    pub fn wrapped_columns(&self) -> &[usize] {
        &self.wrapped_columns
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn key_columns(&self) -> Option<&[String]> {
        match &self.kind {
            NodeKind::Frequency { key_columns } => Some(key_columns),
            _ => None,
        }
    }

    pub fn key_column_indices(&self) -> Vec<usize> {
        self.key_columns()
            .unwrap_or_default()
            .iter()
            .filter_map(|k| position_of(&self.columns, k))
            .collect()
    }

    pub fn child_table_names(&self) -> Option<&[String]> {
        match &self.kind {
            NodeKind::Listing {
                child_table_names, ..
            } => Some(child_table_names),
            _ => None,
        }
    }

    /// Breadcrumb label: display name, then description, then `unk`.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.desc.as_deref())
            .unwrap_or("unk")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything a view is built from, before validation.
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    pub select: Select,
    pub params: Vec<String>,
    pub backend: Option<Arc<Engine>>,
    pub name: Option<String>,
    pub desc: Option<String>,
    pub wrapped_columns: Vec<usize>,
    pub kind: NodeKind,
}

impl Draft {
    pub fn new(select: Select, kind: NodeKind) -> Self {
        Self {
            select,
            params: Vec::new(),
            backend: None,
            name: None,
            desc: None,
            wrapped_columns: Vec::new(),
            kind,
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    pub fn backend(mut self, engine: Arc<Engine>) -> Self {
        self.backend = Some(engine);
        self
    }

    pub fn name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}
