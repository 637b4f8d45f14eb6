use std::path::PathBuf;

/// Problems with the column layout of an input table.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{path:?} is missing required columns: {}", missing.join(", "))]
    MissingColumns {
        path: PathBuf,
        missing: Vec<String>,
    },
}

/// Problems with single values of an input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown filter reason: {0:?}")]
    UnknownFilterReason(String),
    #[error("unknown assay type: {0:?}")]
    UnknownAssayType(String),
}
