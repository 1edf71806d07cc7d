//! Persisted form of a view: `{kind, fields, parent_id}`
//!
//! Derived state (id, columns, order hints) is not stored; it is recomputed
//! when the record is rebuilt, so a loaded view goes through the same
//! validation as a freshly built one.

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use tablehub_duck::BackendKind;
use tablehub_ir::Select;

use crate::error::Result;
use crate::node::{MemoryRows, Node, NodeKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub kind: String,
    pub fields: RecordFields,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFields {
    pub select: Select,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,

    /// Set only where the backend was chosen explicitly instead of inherited
    #[serde(default)]
    pub backend: Option<BackendKind>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub desc: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wrapped_columns: Vec<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_columns: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<MemoryRows>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_table_names: Option<Vec<String>>,
}

impl NodeRecord {
    pub fn from_node(node: &Node) -> Self {
        let mut fields = RecordFields {
            select: node.select.clone(),
            params: node.params.clone(),
            backend: node.explicit_backend,
            name: node.name.clone(),
            desc: node.desc.clone(),
            wrapped_columns: node.wrapped_columns.clone(),
            key_columns: None,
            rows: None,
            child_table_names: None,
        };

        match &node.kind {
            NodeKind::Table => {}
            NodeKind::Frequency { key_columns } => fields.key_columns = Some(key_columns.clone()),
            NodeKind::Memory(data) => fields.rows = Some(data.clone()),
            NodeKind::Listing {
                data,
                child_table_names,
            } => {
                fields.rows = Some(data.clone());
                fields.child_table_names = Some(child_table_names.clone());
            }
        }

        Self {
            kind: node.kind.tag().to_string(),
            fields,
            parent_id: node.parent_id.clone(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Rebuild the kind-specific state the tag calls for.
    pub fn node_kind(&self) -> Result<NodeKind> {
        let missing = |field: &str| {
            serde_json::Error::custom(format!("`{}` record without `{field}`", self.kind))
        };

        let kind = match self.kind.as_str() {
            "table" => NodeKind::Table,
            "frequency" => NodeKind::Frequency {
                key_columns: self
                    .fields
                    .key_columns
                    .clone()
                    .ok_or_else(|| missing("key_columns"))?,
            },
            "memory" => NodeKind::Memory(self.fields.rows.clone().ok_or_else(|| missing("rows"))?),
            "listing" => NodeKind::Listing {
                data: self.fields.rows.clone().ok_or_else(|| missing("rows"))?,
                child_table_names: self
                    .fields
                    .child_table_names
                    .clone()
                    .ok_or_else(|| missing("child_table_names"))?,
            },
            other => return Err(serde_json::Error::custom(format!("unknown kind `{other}`")).into()),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: &str) -> NodeRecord {
        NodeRecord {
            kind: kind.to_string(),
            fields: RecordFields {
                select: Select::from_table("votes"),
                params: vec![],
                backend: Some(BackendKind::Disk),
                name: None,
                desc: Some("freq".to_string()),
                wrapped_columns: vec![],
                key_columns: Some(vec!["party".to_string()]),
                rows: None,
                child_table_names: None,
            },
            parent_id: Some("0123456789abcde".to_string()),
        }
    }

    #[test]
    fn test_encode_decode() {
        let original = record("frequency");
        let decoded = NodeRecord::decode(&original.encode().unwrap()).unwrap();

        assert_eq!(decoded, original);
        assert_eq!(
            decoded.node_kind().unwrap(),
            NodeKind::Frequency {
                key_columns: vec!["party".to_string()]
            }
        );
    }

    #[test]
    fn test_encoding_is_stable() {
        assert_eq!(record("table").encode().unwrap(), record("table").encode().unwrap());
    }

    #[test]
    fn test_kind_without_its_fields_is_rejected() {
        assert!(record("listing").node_kind().is_err());
        assert!(record("bogus").node_kind().is_err());
    }
}
