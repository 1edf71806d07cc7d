//! Content-addressed, lineage-tracked table views over DuckDB
//!
//! Every view is an immutable [`Node`]: a relational expression, the id of
//! the view it was derived from, and the schema DuckDB reports for it. The
//! [`Hub`] is the only way to make one. It validates the schema, derives
//! the content id and persists the view before returning it, so any id a
//! client holds can be loaded again.
//!
//! ```no_run
//! use tablehub_core::{BackendKind, Hub, HubConfig, Operation, RootSource};
//!
//! let hub = Hub::open(HubConfig {
//!     database: Some("data.duckdb".into()),
//!     ..HubConfig::default()
//! })?;
//! let votes = hub.create_root(RootSource::Table("votes".into()), BackendKind::Disk, None)?;
//! let by_party = hub.dispatch(&votes, &Operation::Frequency {
//!     columns: vec!["party".into()],
//! })?;
//! let page = hub.rows(&by_party, 0, 50)?;
//! # Ok::<(), tablehub_core::SheetError>(())
//! ```

mod error;
mod hub;
mod node;
mod ops;
mod pages;
mod record;

pub use error::{Result, SheetError};
pub use hub::{Hub, HubConfig, RootSource};
pub use node::{MemoryRows, Node, NodeKind};
pub use pages::Page;
pub use record::{NodeRecord, RecordFields};

pub use tablehub_duck::{BackendKind, TableInfo};
pub use tablehub_ir::{Column, ColumnType, FilterMode, FilterTerm, Operation};
