//! JSON-lines request driver
//!
//! One request object per input line, one response object per output line.

use serde::{Deserialize, Serialize};
use tablehub_core::{BackendKind, Column, Hub, Node, Operation, Page, SheetError};
use tracing::debug;

fn default_limit() -> u64 {
    50
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Load {
        id: String,
    },
    Dispatch {
        id: String,
        op: Operation,
    },
    Rows {
        id: String,
        #[serde(default)]
        offset: u64,
        #[serde(default = "default_limit")]
        limit: u64,
    },
    Count {
        id: String,
    },
    Lineage {
        id: String,
    },
    Csv {
        id: String,
    },
}

/// What a client needs to render a view and ask for the next one
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub id: String,
    pub label: String,
    pub kind: &'static str,
    pub backend: BackendKind,
    pub parent_id: Option<String>,
    pub columns: Vec<Column>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_column_indices: Vec<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub wrapped_columns: Vec<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_hints: Vec<(String, bool)>,
}

impl From<&Node> for NodeSummary {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id().to_string(),
            label: node.label().to_string(),
            kind: node.kind().tag(),
            backend: node.backend(),
            parent_id: node.parent_id().map(str::to_string),
            columns: node.columns().to_vec(),
            key_column_indices: node.key_column_indices(),
            wrapped_columns: node.wrapped_columns().to_vec(),
            order_hints: node.order_hints().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    Node { node: NodeSummary },
    Lineage { lineage: Vec<NodeSummary> },
    Page { page: Page },
    Count { row_count: u64 },
    Csv { csv: String },
    Error { error: ErrorBody },
}

impl From<SheetError> for Response {
    fn from(e: SheetError) -> Self {
        Response::Error {
            error: ErrorBody {
                code: e.code(),
                message: e.to_string(),
            },
        }
    }
}

pub fn handle(hub: &Hub, request: Request) -> Response {
    debug!(?request, "Handling request");
    match try_handle(hub, request) {
        Ok(response) => response,
        Err(e) => e.into(),
    }
}

fn try_handle(hub: &Hub, request: Request) -> Result<Response, SheetError> {
    let response = match request {
        Request::Load { id } => Response::Node {
            node: hub.load(&id)?.as_ref().into(),
        },
        Request::Dispatch { id, op } => {
            let node = hub.load(&id)?;
            Response::Node {
                node: hub.dispatch(&node, &op)?.as_ref().into(),
            }
        }
        Request::Rows { id, offset, limit } => Response::Page {
            page: hub.rows(&*hub.load(&id)?, offset, limit)?.as_ref().clone(),
        },
        Request::Count { id } => Response::Count {
            row_count: hub.row_count(&*hub.load(&id)?)?,
        },
        Request::Lineage { id } => Response::Lineage {
            lineage: hub
                .lineage(&hub.load(&id)?)?
                .iter()
                .map(|n| n.as_ref().into())
                .collect(),
        },
        Request::Csv { id } => Response::Csv {
            csv: hub
                .stream_csv(&*hub.load(&id)?)?
                .collect::<Result<String, _>>()?,
        },
    };
    Ok(response)
}

/// Parse and handle one input line.
pub fn handle_line(hub: &Hub, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => handle(hub, request),
        Err(e) => Response::Error {
            error: ErrorBody {
                code: "bad_request",
                message: e.to_string(),
            },
        },
    }
}
