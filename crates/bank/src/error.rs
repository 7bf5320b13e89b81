use tellerkit_web::{ModuleError, WebError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BankError {
    #[error("unknown account `{0}`")]
    UnknownAccount(String),

    #[error("invalid amount `{0}`")]
    InvalidAmount(String),

    #[error("missing form field `{0}`")]
    MissingField(&'static str),

    #[error("data file {path}: {reason}")]
    Data { path: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Web(#[from] WebError),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

impl From<BankError> for WebError {
    fn from(err: BankError) -> Self {
        match err {
            BankError::UnknownAccount(_)
            | BankError::InvalidAmount(_)
            | BankError::MissingField(_) => WebError::BadRequest(err.to_string()),
            BankError::Web(inner) => inner,
            BankError::Module(inner) => WebError::Module(inner),
            other => WebError::Internal(other.to_string()),
        }
    }
}
