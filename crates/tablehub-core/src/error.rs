use tablehub_duck::BackendError;
use tablehub_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetError {
    /// Unknown column or table, or the backend could not describe the view
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Cannot hide key columns {key_columns:?}: `{missing}` is not returned")]
    KeyColumn {
        key_columns: Vec<String>,
        missing: String,
    },

    #[error("The pivot column `{column}` needs to have at most {cap} unique values")]
    PivotCardinality { column: String, cap: usize },

    #[error("Unsupported operation `{operation}` on a {kind} view")]
    UnsupportedOperation {
        operation: String,
        kind: &'static str,
    },

    #[error("View not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("View `{view}` has {placeholders} placeholders but {bound} bound parameters")]
    ParameterCount {
        view: String,
        placeholders: usize,
        bound: usize,
    },

    #[error("Row {index} is out of range for a listing of {len} tables")]
    RowOutOfRange { index: usize, len: usize },

    #[error("Backend error: {0}")]
    Backend(BackendError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Malformed record: {0}")]
    Record(#[from] serde_json::Error),
}

impl From<BackendError> for SheetError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Schema { .. } => SheetError::Schema(e.to_string()),
            other => SheetError::Backend(other),
        }
    }
}

impl From<StoreError> for SheetError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => SheetError::NotFound(key),
            other => SheetError::Store(other),
        }
    }
}

impl SheetError {
    /// Stable machine-readable name of the error class
    pub fn code(&self) -> &'static str {
        match self {
            SheetError::Schema(_) => "schema",
            SheetError::KeyColumn { .. } => "key_column",
            SheetError::PivotCardinality { .. } => "pivot_cardinality",
            SheetError::UnsupportedOperation { .. } => "unsupported_operation",
            SheetError::NotFound(_) => "not_found",
            SheetError::Config(_) => "config",
            SheetError::ParameterCount { .. } => "parameter_count",
            SheetError::RowOutOfRange { .. } => "row_out_of_range",
            SheetError::Backend(_) => "backend",
            SheetError::Store(_) => "store",
            SheetError::Record(_) => "record",
        }
    }
}

pub type Result<T> = std::result::Result<T, SheetError>;
