use thiserror::Error;

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParserError>;

/// Errors that can occur while building a structural index
#[derive(Error, Debug)]
pub enum ParserError {
    /// The document is not valid Python
    #[error("Structural error at line {line}, column {column}: {message}")]
    StructuralError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Extracted regions do not cover the top-level source exactly
    #[error("Coverage error: {message}")]
    CoverageError { message: String, lines: Vec<usize> },

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),
}

impl ParserError {
    /// Create a structural error at a 1-based position
    pub fn structural(line: usize, column: usize, msg: impl Into<String>) -> Self {
        Self::StructuralError {
            line,
            column,
            message: msg.into(),
        }
    }

    /// Create a coverage error listing the offending lines
    pub fn coverage(msg: impl Into<String>, lines: Vec<usize>) -> Self {
        Self::CoverageError {
            message: msg.into(),
            lines,
        }
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }

    /// 1-based line of the failure, when it has one
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::StructuralError { line, .. } => Some(*line),
            Self::CoverageError { lines, .. } => lines.first().copied(),
            _ => None,
        }
    }
}
