//! The view hub: builds, persists and rehydrates views

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tablehub_duck::{BackendKind, Engine};
use tablehub_ir::{content_id, position_of, Select};
use tablehub_store::Store;
use tracing::{debug, info};

use crate::error::{Result, SheetError};
use crate::node::{Draft, MemoryRows, Node, NodeKind};
use crate::pages::PageCache;
use crate::record::NodeRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Durable DuckDB file, opened read-only
    pub database: Option<PathBuf>,
    /// Directory mirroring durable records
    pub store_directory: Option<PathBuf>,
    pub page_cache_capacity: usize,
    pub resident_capacity: usize,
    pub csv_channel_depth: usize,
    pub pivot_max_columns: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            database: None,
            store_directory: None,
            page_cache_capacity: 256,
            resident_capacity: 1024,
            csv_channel_depth: 1024,
            pivot_max_columns: 35,
        }
    }
}

/// What a root view reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSource {
    /// A table of the durable database
    Table(String),
    /// Literal rows, loaded into a private memory engine
    Rows(MemoryRows),
    /// Literal rows where row `i` describes durable table `child_table_names[i]`
    Listing {
        data: MemoryRows,
        child_table_names: Vec<String>,
        wrapped_columns: Vec<usize>,
    },
}

/// Picks the engine a view runs on.
///
/// The durable engine is shared; each memory root gets a fresh engine that
/// its descendants inherit.
pub(crate) struct Backends {
    disk: Option<Arc<Engine>>,
}

impl Backends {
    pub fn disk(&self) -> Result<Arc<Engine>> {
        self.disk
            .clone()
            .ok_or_else(|| SheetError::Config("no durable database is configured".to_string()))
    }

    pub fn memory(&self, kind: &NodeKind) -> Result<(Arc<Engine>, String)> {
        let (Some(data), Some(table)) = (kind.memory_rows(), kind.literal_table()) else {
            return Err(SheetError::Config(format!(
                "a {} view has no literal rows to load",
                kind.tag()
            )));
        };
        let engine = Engine::open_memory(&data.table)?;
        engine.load_records(&table, &data.columns, &data.rows)?;
        Ok((Arc::new(engine), table))
    }
}

pub struct Hub {
    backends: Backends,
    store: Store<Node>,
    resident: Mutex<LruCache<String, Arc<Node>>>,
    pub(crate) pages: PageCache,
    pub(crate) config: HubConfig,
}

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

impl Hub {
    pub fn open(config: HubConfig) -> Result<Self> {
        let disk = match &config.database {
            Some(path) => Some(Arc::new(Engine::open_disk(path)?)),
            None => None,
        };
        let store = match &config.store_directory {
            Some(dir) => Store::with_directory(dir)?,
            None => Store::new(),
        };

        info!(
            database = ?config.database,
            store_directory = ?config.store_directory,
            "Opened view hub"
        );

        Ok(Self {
            backends: Backends { disk },
            store,
            resident: Mutex::new(LruCache::new(capacity(config.resident_capacity))),
            pages: PageCache::new(capacity(config.page_cache_capacity)),
            config,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub(crate) fn disk_engine(&self) -> Result<Arc<Engine>> {
        self.backends.disk()
    }

    /// Tables of the durable database, for bootstrapping a listing.
    pub fn durable_tables(&self) -> Result<Vec<tablehub_duck::TableInfo>> {
        Ok(self.backends.disk()?.tables()?)
    }

    /// Bootstrap a view with no parent.
    pub fn create_root(
        &self,
        source: RootSource,
        backend: BackendKind,
        display_name: Option<&str>,
    ) -> Result<Arc<Node>> {
        let draft = match (source, backend) {
            (RootSource::Table(table), BackendKind::Disk) => {
                Draft::new(Select::from_table(&table), NodeKind::Table)
                    .backend(self.backends.disk()?)
                    .desc(table)
            }
            (RootSource::Table(table), BackendKind::Memory) => {
                return Err(SheetError::Config(format!(
                    "memory view over `{table}` needs literal rows"
                )))
            }
            (RootSource::Rows(data), BackendKind::Memory) => {
                let desc = data.table.clone();
                self.literal_draft(NodeKind::Memory(data))?.desc(desc)
            }
            (
                RootSource::Listing {
                    data,
                    child_table_names,
                    wrapped_columns,
                },
                BackendKind::Memory,
            ) => {
                if child_table_names.len() != data.rows.len() {
                    return Err(SheetError::Config(format!(
                        "listing `{}` has {} rows but {} table names",
                        data.table,
                        data.rows.len(),
                        child_table_names.len()
                    )));
                }
                let desc = data.table.clone();
                let mut draft = self
                    .literal_draft(NodeKind::Listing {
                        data,
                        child_table_names,
                    })?
                    .desc(desc);
                draft.wrapped_columns = wrapped_columns;
                draft
            }
            (_, BackendKind::Disk) => {
                return Err(SheetError::Config(
                    "literal rows cannot be written to the durable database".to_string(),
                ))
            }
        };

        self.build(draft.name(display_name.map(str::to_string)), None)
    }

    /// Load a literal kind into a fresh memory engine and select all of it.
    fn literal_draft(&self, kind: NodeKind) -> Result<Draft> {
        let (engine, table) = self.backends.memory(&kind)?;
        Ok(Draft::new(Select::from_table(&table), kind).backend(engine))
    }

    /// A one-cell memory view holding a block of text, e.g. an about page.
    pub fn create_text(&self, name: &str, text: &str) -> Result<Arc<Node>> {
        let data = MemoryRows {
            table: name.to_string(),
            columns: vec!["md".to_string()],
            rows: vec![vec![Some(text.to_string())]],
        };
        self.create_root(RootSource::Rows(data), BackendKind::Memory, Some(name))
    }

    /// Resolve a view by id or display name.
    pub fn load(&self, key: &str) -> Result<Arc<Node>> {
        if let Some(node) = self.store.get_live(key) {
            return Ok(node);
        }
        if let Some(node) = self.resident.lock().get(key).cloned() {
            return Ok(node);
        }
        self.load_record(key)
    }

    /// Rebuild a view from its durable record, ignoring any resident copy
    /// of the view itself. Ancestors are resolved through [`Hub::load`].
    pub fn load_record(&self, key: &str) -> Result<Arc<Node>> {
        let record = NodeRecord::decode(&self.store.get_record(key)?)?;
        let kind = record.node_kind()?;
        let parent = record
            .parent_id
            .as_deref()
            .map(|id| self.load(id))
            .transpose()?;

        let fields = record.fields;
        let backend = match fields.backend {
            None => None,
            Some(BackendKind::Disk) => Some(self.backends.disk()?),
            Some(BackendKind::Memory) => match kind.memory_rows() {
                Some(_) => Some(self.backends.memory(&kind)?.0),
                None => {
                    return Err(SheetError::Config(format!(
                        "in-memory backend of `{key}` is no longer live"
                    )))
                }
            },
        };

        debug!(key, kind = kind.tag(), "Rehydrating view from record");
        let draft = Draft {
            select: fields.select,
            params: fields.params,
            backend,
            name: fields.name,
            desc: fields.desc,
            wrapped_columns: fields.wrapped_columns,
            kind,
        };
        self.build(draft, parent.as_deref())
    }

    pub fn parent(&self, node: &Node) -> Result<Option<Arc<Node>>> {
        node.parent_id().map(|id| self.load(id)).transpose()
    }

    /// The chain from the root view down to `node`, root first.
    pub fn lineage(&self, node: &Arc<Node>) -> Result<Vec<Arc<Node>>> {
        let mut chain = vec![node.clone()];
        let mut next = node.parent_id.clone();
        while let Some(id) = next {
            let ancestor = self.load(&id)?;
            next = ancestor.parent_id.clone();
            chain.push(ancestor);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Parameters bound by `node`'s query: every ancestor's own parameters
    /// root to leaf, then the node's.
    pub fn bound_params(&self, node: &Node) -> Result<Vec<String>> {
        let mut ancestors = Vec::new();
        let mut next = node.parent_id.clone();
        while let Some(id) = next {
            let ancestor = self.load(&id)?;
            next = ancestor.parent_id.clone();
            ancestors.push(ancestor);
        }

        let mut params: Vec<String> = ancestors
            .iter()
            .rev()
            .flat_map(|a| a.params.iter().cloned())
            .collect();
        params.extend(node.params.iter().cloned());
        Ok(params)
    }

    /// Validate, identify and persist a view. Nothing is stored on failure.
    pub(crate) fn build(&self, draft: Draft, parent: Option<&Node>) -> Result<Arc<Node>> {
        let explicit_backend = draft.backend.as_ref().map(|e| e.kind());
        let engine = match (draft.backend, parent) {
            (Some(engine), _) => engine,
            (None, Some(parent)) => parent.engine().clone(),
            (None, None) => {
                return Err(SheetError::Config(format!(
                    "unable to infer backend for `{}`",
                    draft.desc.as_deref().unwrap_or("unk")
                )))
            }
        };

        let lowered = draft.select.lower();
        let parent_id = parent.map(|p| p.id().to_string());
        let id = content_id(parent_id.as_deref(), &draft.params, &lowered.sql);

        let mut bound = match parent {
            Some(parent) => self.bound_params(parent)?,
            None => Vec::new(),
        };
        bound.extend(draft.params.iter().cloned());
        if bound.len() != lowered.placeholders {
            return Err(SheetError::ParameterCount {
                view: id,
                placeholders: lowered.placeholders,
                bound: bound.len(),
            });
        }

        let columns = engine.describe(&lowered.sql, &bound)?;

        let mut wrapped_columns = draft.wrapped_columns;
        if let NodeKind::Frequency { key_columns } = &draft.kind {
            if let Some(missing) = key_columns.iter().find(|k| position_of(&columns, k).is_none()) {
                return Err(SheetError::KeyColumn {
                    key_columns: key_columns.clone(),
                    missing: missing.clone(),
                });
            }
            wrapped_columns = position_of(&columns, "percentage").into_iter().collect();
        }

        let node = Arc::new(Node {
            id,
            order_hints: draft.select.order_hints(),
            select: draft.select,
            sql: lowered.sql,
            parent_id,
            params: draft.params,
            explicit_backend,
            engine,
            name: draft.name,
            desc: draft.desc,
            columns,
            wrapped_columns,
            kind: draft.kind,
        });

        self.persist(&node)?;
        info!(
            id = %node.id,
            kind = node.kind.tag(),
            backend = %node.backend(),
            label = node.label(),
            "Built view"
        );
        Ok(node)
    }

    fn persist(&self, node: &Arc<Node>) -> Result<()> {
        let bytes = NodeRecord::from_node(node).encode()?;

        // Alias first, so the id is never committed without it
        let keys: Vec<&str> = node
            .name
            .as_deref()
            .into_iter()
            .chain(std::iter::once(node.id.as_str()))
            .collect();
        self.store.put_records(&keys, &bytes)?;

        let mut resident = self.resident.lock();
        for key in keys {
            if node.backend() == BackendKind::Memory {
                self.store.put_live(key, node.clone());
            }
            resident.put(key.to_string(), node.clone());
        }
        Ok(())
    }
}
