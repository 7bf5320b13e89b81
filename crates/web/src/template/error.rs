use thiserror::Error;

/// Every compile error message carries this marker so callers can cut the
/// compiler's own suffix off and name the file instead.
pub const COMPILE_MARKER: &str = "compiling ejs";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("unexpected character `{found}` at line {line}, col {col} while compiling ejs")]
    Lexer {
        line: usize,
        col: usize,
        found: String,
    },

    #[error("{msg} at line {line} while compiling ejs")]
    Parse { line: usize, msg: String },

    #[error("could not find matching close tag for \"{open}\" at line {line} while compiling ejs")]
    Unclosed { line: usize, open: String },

    #[error("{msg} at line {line} while compiling ejs")]
    Unbalanced { line: usize, msg: String },

    #[error("render error: {0}")]
    Render(String),
}

impl TemplateError {
    pub fn line(&self) -> Option<usize> {
        match self {
            TemplateError::Lexer { line, .. }
            | TemplateError::Parse { line, .. }
            | TemplateError::Unclosed { line, .. }
            | TemplateError::Unbalanced { line, .. } => Some(*line),
            TemplateError::Render(_) => None,
        }
    }
}
