//! Tablehub Intermediate Representation (IR)
//!
//! Relational expressions for derived table views, their lowering to DuckDB
//! SQL, and the operations clients apply to views. All types serialize
//! deterministically so that a view's identity can be derived from them.

use sha2::{Digest, Sha256};

mod expr;
mod lower;
mod operation;
mod types;

pub use expr::*;
pub use lower::{lower, quote_ident, quote_text, Lowered};
pub use operation::*;
pub use types::*;

/// Length of a view id in hex characters
pub const ID_LEN: usize = 15;

/// Content address of a view: SHA-256 over the parent id, the view's own
/// bound parameters and its lowered SQL.
pub fn content_id(parent_id: Option<&str>, params: &[String], sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parent_id.unwrap_or("").as_bytes());
    hasher.update(params.join(",").as_bytes());
    hasher.update(sql.as_bytes());
    let mut id = format!("{:x}", hasher.finalize());
    id.truncate(ID_LEN);
    id
}

/// Digest of literal rows, `ID_LEN` hex characters.
///
/// Every cell is length-prefixed and NULL has its own marker, so distinct
/// tables never share a byte stream. `links` are per-row extras such as the
/// tables a listing opens.
pub fn rows_digest(columns: &[String], rows: &[Vec<Option<String>>], links: &[String]) -> String {
    fn cell(hasher: &mut Sha256, value: Option<&str>) {
        match value {
            Some(v) => {
                hasher.update((v.len() as u64).to_le_bytes());
                hasher.update(v.as_bytes());
            }
            None => hasher.update(u64::MAX.to_le_bytes()),
        }
    }

    let mut hasher = Sha256::new();
    hasher.update((columns.len() as u64).to_le_bytes());
    for column in columns {
        cell(&mut hasher, Some(column));
    }
    hasher.update((rows.len() as u64).to_le_bytes());
    for row in rows {
        hasher.update((row.len() as u64).to_le_bytes());
        for value in row {
            cell(&mut hasher, value.as_deref());
        }
    }
    hasher.update((links.len() as u64).to_le_bytes());
    for link in links {
        cell(&mut hasher, Some(link));
    }

    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(ID_LEN);
    digest
}

impl Select {
    pub fn lower(&self) -> Lowered {
        lower(self)
    }

    /// Ordering of the outermost scope, as `(column, ascending)` pairs.
    pub fn order_hints(&self) -> Vec<(String, bool)> {
        self.order_by
            .iter()
            .map(|k| (k.column.clone(), k.ascending))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_deterministic() {
        let select = Select::from_table("users").order_by("age", true);
        let sql = select.lower().sql;

        let a = content_id(Some("abc"), &["x".to_string()], &sql);
        let b = content_id(Some("abc"), &["x".to_string()], &select.clone().lower().sql);

        assert_eq!(a, b);
        assert_eq!(a.len(), ID_LEN);
    }

    #[test]
    fn test_content_id_depends_on_lineage_and_params() {
        let sql = Select::from_table("users").lower().sql;

        let root = content_id(None, &[], &sql);
        assert_ne!(root, content_id(Some("abc"), &[], &sql));
        assert_ne!(root, content_id(None, &["x".to_string()], &sql));
    }

    #[test]
    fn test_rows_digest_tracks_content() {
        let columns = vec!["md".to_string()];
        let old = rows_digest(&columns, &[vec![Some("old".to_string())]], &[]);

        assert_eq!(old, rows_digest(&columns, &[vec![Some("old".to_string())]], &[]));
        assert_ne!(old, rows_digest(&columns, &[vec![Some("new".to_string())]], &[]));
        assert_ne!(old, rows_digest(&columns, &[vec![None]], &[]));
        assert_ne!(old, rows_digest(&columns, &[vec![Some("old".to_string())]], &["t".to_string()]));

        // Cell boundaries are part of the digest
        let two = vec!["a".to_string(), "b".to_string()];
        assert_ne!(
            rows_digest(&two, &[vec![Some("xy".to_string()), Some("z".to_string())]], &[]),
            rows_digest(&two, &[vec![Some("x".to_string()), Some("yz".to_string())]], &[])
        );
    }

    #[test]
    fn test_json_round_trip() {
        let select = Select::wrap(
            Select::from_table("sales")
                .filter(Expr::column("region").equals(Some("EU")))
                .group_by(&["region".to_string()])
                .project(vec![
                    SelectItem::column("region"),
                    Expr::CountStar.alias("num_rows"),
                ]),
        )
        .order_by("num_rows", false);

        let json = serde_json::to_string(&select).unwrap();
        let parsed: Select = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, select);
        assert_eq!(parsed.lower(), select.lower());
        assert_eq!(parsed.order_hints(), vec![("num_rows".to_string(), false)]);
    }
}
