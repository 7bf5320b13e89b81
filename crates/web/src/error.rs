use thiserror::Error;

use crate::module::ModuleError;
use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("cannot {method} {path}")]
    NotFound { method: String, path: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("failed to lookup view `{view}`: {reason}")]
    View { view: String, reason: String },

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("{path}: {reason}")]
    Fs { path: String, reason: String },

    #[error("unknown encoding: {0}")]
    Encoding(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("module error: {0}")]
    Module(#[from] ModuleError),

    #[error("{0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebError {
    /// HTTP status used when the error escapes a route handler.
    pub fn status(&self) -> u16 {
        match self {
            WebError::NotFound { .. } => 404,
            WebError::BadRequest(_) => 400,
            _ => 500,
        }
    }
}
