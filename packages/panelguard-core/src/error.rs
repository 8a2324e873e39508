use thiserror::Error;

/// Structural failures. Any of these aborts the whole call because the
/// shape/index guarantees of the output can no longer be honoured.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("panel has no fields")]
    NoFields,

    #[error("empty field name at position {0}")]
    EmptyFieldName(usize),

    #[error("duplicate field: {0}")]
    DuplicateField(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("row {row}: expected {expected} values, got {got}")]
    RowWidth {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("row {row}, field `{field}`: non-numeric value `{value}`")]
    NonNumeric {
        row: usize,
        field: String,
        value: String,
    },

    #[error("row {row}, field `{field}`: non-finite value")]
    NonFinite { row: usize, field: String },

    #[error("entity `{entity}`: timestamp {timestamp} is not after the previous one (row {row})")]
    UnorderedKey {
        entity: String,
        timestamp: String,
        row: usize,
    },

    #[error("row {row}: cannot parse timestamp `{value}`")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: empty entity identifier")]
    EmptyEntity { row: usize },

    #[error("panels differ in keys or fields")]
    ShapeMismatch,

    #[error("missing index column `{0}`")]
    MissingIndexColumn(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("unknown frequency: {0}")]
    UnknownFrequency(String),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PanelError>;

pub(crate) fn invalid(msg: impl Into<String>) -> PanelError {
    PanelError::InvalidParameter(msg.into())
}
