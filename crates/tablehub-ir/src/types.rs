//! Column types reported by the backend

use serde::{Deserialize, Serialize};
use std::fmt;

/// DuckDB column type as reported by `DESCRIBE`.
///
/// Parameterised and nested types (`DECIMAL(18,3)`, `VARCHAR[]`, `STRUCT(..)`)
/// are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    BigInt,
    Boolean,
    Blob,
    Date,
    Double,
    Decimal,
    HugeInt,
    Integer,
    Real,
    SmallInt,
    Time,
    Timestamp,
    TinyInt,
    UBigInt,
    UInteger,
    USmallInt,
    UTinyInt,
    Uuid,
    Varchar,
    Other(String),
}

impl ColumnType {
    pub fn as_str(&self) -> &str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Blob => "BLOB",
            ColumnType::Date => "DATE",
            ColumnType::Double => "DOUBLE",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::HugeInt => "HUGEINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Time => "TIME",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::TinyInt => "TINYINT",
            ColumnType::UBigInt => "UBIGINT",
            ColumnType::UInteger => "UINTEGER",
            ColumnType::USmallInt => "USMALLINT",
            ColumnType::UTinyInt => "UTINYINT",
            ColumnType::Uuid => "UUID",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Other(name) => name,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::BigInt
                | ColumnType::Double
                | ColumnType::Decimal
                | ColumnType::HugeInt
                | ColumnType::Integer
                | ColumnType::Real
                | ColumnType::SmallInt
                | ColumnType::TinyInt
                | ColumnType::UBigInt
                | ColumnType::UInteger
                | ColumnType::USmallInt
                | ColumnType::UTinyInt
        )
    }
}

impl From<String> for ColumnType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "BIGINT" => ColumnType::BigInt,
            "BOOLEAN" => ColumnType::Boolean,
            "BLOB" => ColumnType::Blob,
            "DATE" => ColumnType::Date,
            "DOUBLE" => ColumnType::Double,
            "DECIMAL" => ColumnType::Decimal,
            "HUGEINT" => ColumnType::HugeInt,
            "INTEGER" => ColumnType::Integer,
            // DuckDB reports REAL as FLOAT
            "REAL" | "FLOAT" => ColumnType::Real,
            "SMALLINT" => ColumnType::SmallInt,
            "TIME" => ColumnType::Time,
            "TIMESTAMP" => ColumnType::Timestamp,
            "TINYINT" => ColumnType::TinyInt,
            "UBIGINT" => ColumnType::UBigInt,
            "UINTEGER" => ColumnType::UInteger,
            "USMALLINT" => ColumnType::USmallInt,
            "UTINYINT" => ColumnType::UTinyInt,
            "UUID" => ColumnType::Uuid,
            "VARCHAR" => ColumnType::Varchar,
            _ => ColumnType::Other(name),
        }
    }
}

impl From<&str> for ColumnType {
    fn from(name: &str) -> Self {
        ColumnType::from(name.to_string())
    }
}

impl From<ColumnType> for String {
    fn from(ty: ColumnType) -> Self {
        ty.as_str().to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed output column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: impl Into<ColumnType>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Find a column's position by name.
pub fn position_of(columns: &[Column], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_other() {
        assert_eq!(ColumnType::from("BIGINT"), ColumnType::BigInt);
        assert_eq!(ColumnType::from("FLOAT"), ColumnType::Real);
        assert_eq!(
            ColumnType::from("DECIMAL(18,3)"),
            ColumnType::Other("DECIMAL(18,3)".to_string())
        );
        assert!(ColumnType::from("INTEGER").is_numeric());
        assert!(!ColumnType::Varchar.is_numeric());
    }

    #[test]
    fn test_column_serializes_type_as_string() {
        let column = Column::new("votes", ColumnType::BigInt);
        let json = serde_json::to_string(&column).unwrap();
        assert_eq!(json, r#"{"name":"votes","type":"BIGINT"}"#);

        let parsed: Column = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, column);
    }
}
