//! Paginated materialization of views

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tablehub_ir::{Expr, Select};
use tracing::debug;

use crate::error::{Result, SheetError};
use crate::hub::Hub;
use crate::node::Node;

/// One window of a view's rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PageKey {
    id: String,
    offset: u64,
    limit: u64,
}

/// Pages keyed by `(view id, offset, limit)`.
///
/// Views are immutable and the durable database is read-only, so entries
/// never need invalidating.
pub(crate) struct PageCache {
    entries: Mutex<LruCache<PageKey, Arc<Page>>>,
}

impl PageCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn get(&self, key: &PageKey) -> Option<Arc<Page>> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: PageKey, page: Arc<Page>) {
        self.entries.lock().put(key, page);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Hub {
    /// Rows `[offset, offset + limit)` of `node`, in the view's order.
    pub fn rows(&self, node: &Node, offset: u64, limit: u64) -> Result<Arc<Page>> {
        let key = PageKey {
            id: node.id().to_string(),
            offset,
            limit,
        };
        if let Some(page) = self.pages.get(&key) {
            debug!(id = node.id(), offset, limit, "Page cache hit");
            return Ok(page);
        }

        let sql = node.select().window(offset, limit).lower().sql;
        let params = self.bound_params(node)?;
        let result = node.engine().query(&sql, &params)?;

        let page = Arc::new(Page {
            columns: result.columns,
            rows: result.rows,
        });
        self.pages.put(key, page.clone());
        Ok(page)
    }

    pub fn row_count(&self, node: &Node) -> Result<u64> {
        let select = Select::wrap(node.select().clone())
            .project(vec![Expr::CountStar.alias("num_rows")]);
        let params = self.bound_params(node)?;
        let result = node.engine().query(&select.lower().sql, &params)?;

        result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|count| count.as_u64())
            .ok_or_else(|| SheetError::Schema(format!("no row count for `{}`", node.id())))
    }

    /// The whole view as CSV lines, header first, produced lazily.
    pub fn stream_csv(
        &self,
        node: &Node,
    ) -> Result<impl Iterator<Item = Result<String>> + Send + 'static> {
        let params = self.bound_params(node)?;
        let stream =
            node.engine()
                .stream_csv(node.sql(), &params, self.config.csv_channel_depth)?;
        Ok(stream.map(|line| line.map_err(SheetError::from)))
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.pages.len()
    }
}
