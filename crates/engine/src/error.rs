use std::path::{Path, PathBuf};
use thiserror::Error;
use unitsplit_graph::GraphError;
use unitsplit_source_parser::ParserError;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that stop a decomposition or recomposition run
#[derive(Error, Debug)]
pub enum EngineError {
    /// Structural or coverage failure in the source document
    #[error(transparent)]
    Parse(#[from] ParserError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// IO error for a specific path
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata could not be encoded or decoded
    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Input not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("No unit files found under {}", .0.display())]
    EmptyTree(PathBuf),
}

impl EngineError {
    /// Create an IO error tied to a path
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
