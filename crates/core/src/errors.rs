/// Errors produced by the parsing front end
///
/// Construction itself has no fatal error class: malformed but parseable
/// constructs degrade to a best-effort structural representation, so the
/// only hard failures surface before a graph is built.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse Python code: {0}")]
    TreeSitterError(String),

    #[error("Syntax error at line {line}, column {col}: {message}")]
    Syntax { message: String, line: usize, col: usize },

    #[error("Invalid UTF-8 in source code")]
    InvalidUtf8,

    #[error("Missing node: {0}")]
    MissingNode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WayfinderError {
    #[error(transparent)]
    ParseError(ParseError),
}

impl From<ParseError> for WayfinderError {
    fn from(value: ParseError) -> Self {
        Self::ParseError(value)
    }
}

pub type Result<T> = std::result::Result<T, WayfinderError>;
