use tellerkit_web::ModuleError;
use thiserror::Error;

/// Misuse of the harness by a script author. Raised immediately, never
/// reported as a student failure.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("`{name}` is {kind}, not a function, and cannot be wrapped")]
    NotCallable { name: String, kind: &'static str },

    #[error("unknown module `{0}`")]
    UnknownModule(String),

    #[error("invalid pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// A requirement that is not met, with the message shown to the student.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    pub message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Failure {
            message: message.into(),
        }
    }
}

/// Why a script stopped.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Failed(#[from] Failure),

    #[error(transparent)]
    Harness(#[from] HarnessError),
}

impl From<ModuleError> for HarnessError {
    fn from(err: ModuleError) -> Self {
        match err {
            ModuleError::Unknown(name) => HarnessError::UnknownModule(name),
            other => HarnessError::Runtime(other.to_string()),
        }
    }
}

/// Fail the current script with a message unless `cond` holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)+) => {
        if !$cond {
            return Err($crate::error::Failure::new(format!($($msg)+)).into());
        }
    };
}

/// Fail the current script with a message.
#[macro_export]
macro_rules! fail {
    ($($msg:tt)+) => {
        return Err($crate::error::Failure::new(format!($($msg)+)).into())
    };
}
