use std::path::PathBuf;

use thiserror::Error;

/// Placeholder path used when a table is parsed from text rather than a file.
pub const TEXT_SOURCE: &str = "<input>";

/// Errors produced while estimating a rigid transform.
#[derive(Debug, Error)]
pub enum XfError {
    /// A table line could not be decoded.
    #[error("{}:{line}: {reason}: {content:?}", path.display())]
    Parse {
        path: PathBuf,
        /// 1-based line number
        line: usize,
        content: String,
        reason: String,
    },
    /// Not enough matched records survived filtering/pairing.
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl XfError {
    pub(crate) fn parse(line: usize, content: &str, reason: impl Into<String>) -> Self {
        XfError::Parse {
            path: PathBuf::from(TEXT_SOURCE),
            line,
            content: content.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach the real source path to a parse error produced from text.
    pub(crate) fn with_path(self, source_path: &std::path::Path) -> Self {
        match self {
            XfError::Parse {
                line,
                content,
                reason,
                ..
            } => XfError::Parse {
                path: source_path.to_path_buf(),
                line,
                content,
                reason,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, XfError>;
