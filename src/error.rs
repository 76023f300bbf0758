use thiserror::Error;

use crate::data::column::ColumnKind;

/// Every failure the collection core and its operations can raise.
///
/// Errors surface at the violation point and are never downgraded by the
/// core; only operations called with `fail_silently` turn their own failure
/// into metadata.
#[derive(Error, Debug)]
pub enum TascError {
    #[error("column '{column}' has {actual} values but the step index has {expected}")]
    ShapeMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("column '{0}' does not exist")]
    MissingColumn(String),

    #[error("domain '{0}' is not registered")]
    UnknownDomain(String),

    #[error("operation '{name}' is not available in domain '{domain}'")]
    UnknownOperation { domain: String, name: String },

    #[error("'{key}' refers to column '{column}', which is not present")]
    MissingRequiredColumn { key: String, column: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no non-missing values in '{0}'")]
    EmptyData(String),

    #[error("metadata path '{path}' could not be resolved at '{segment}'")]
    PathNotFound { path: String, segment: String },

    #[error("column '{column}' is declared {declared} but contains {found}")]
    TypeConflict {
        column: String,
        declared: ColumnKind,
        found: String,
    },

    #[error("operation '{operation}' returned {found}, expected {expected}")]
    UnexpectedOutput {
        operation: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("file format '{0}' is not registered")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

pub type Result<T> = std::result::Result<T, TascError>;

impl TascError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
