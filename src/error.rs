// Error taxonomy shared by the store, the services and the HTTP layer.
//
// Validation and not-found errors are the caller's fault and are safe to
// show verbatim. Everything else is a store/transport failure: the detail
// goes to the log, the caller gets a generic retryable message.

use serde::Serialize;
use std::fmt;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        LedgerError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(entity: &'static str, id: &str) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for errors caused by the request rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(self, LedgerError::Validation(_) | LedgerError::NotFound { .. })
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type LedgerResult<T> = Result<T, LedgerError>;
