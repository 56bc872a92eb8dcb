use std::path::PathBuf;
use thiserror::Error;

/// Raised when a parameter list cannot be laid over a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Invalid byte range defined: parameter {index} needs {size} byte(s) at offset {offset}, buffer has {available}")]
    InvalidByteRange {
        index: usize,
        offset: usize,
        size: usize,
        available: usize,
    },
    #[error("parameter {index} is {size} bytes wide, at most 32 are supported")]
    WidthTooLarge { index: usize, size: usize },
    #[error("parameter {index} has zero width")]
    ZeroWidth { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SemanticTestError {
    #[error("Cannot open test contract: \"{}\".", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse expectations: {0}")]
    Parse(#[from] ParseError),
    #[error("Failed to deploy contract.")]
    Deployment,
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Execution(#[from] anyhow::Error),
}
