use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RankError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("malformed cutoff value for {key}: {value:?}")]
    MalformedCutoffValue { key: String, value: String },

    #[error("{0}")]
    ImportValidation(String),

    #[error("invalid username or password")]
    Unauthorized,

    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("template generation error: {0}")]
    Template(#[from] rust_xlsxwriter::XlsxError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Machine-readable error classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidInput,
    MalformedCutoffValue,
    ImportValidationError,
    Unauthorized,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::MalformedCutoffValue => "MalformedCutoffValue",
            ErrorKind::ImportValidationError => "ImportValidationError",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl RankError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RankError::InvalidInput(_) => ErrorKind::InvalidInput,
            RankError::MalformedCutoffValue { .. } => ErrorKind::MalformedCutoffValue,
            RankError::ImportValidation(_) | RankError::UnsupportedSource(_) => {
                ErrorKind::ImportValidationError
            }
            RankError::Unauthorized => ErrorKind::Unauthorized,
            _ => ErrorKind::InternalError,
        }
    }

    /// Message safe to hand back to a caller. Internal failures never leak detail.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::InternalError => "Internal server error. Please try again later".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RankError>;
