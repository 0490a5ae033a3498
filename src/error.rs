//! Error types for pdfxi.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for index and search operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem access failure (missing directory, unreadable file,
    /// unwritable store path).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A document's text could not be obtained from the extractor.
    #[error("extraction failed for {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    /// The on-disk store failed its integrity check at open.
    #[error("index corrupt: {0}")]
    Corrupt(String),

    /// Malformed query string.
    #[error("query syntax error: {0}")]
    QuerySyntax(String),

    /// A batch could not be durably written; the store keeps its pre-batch
    /// contents.
    #[error("commit failed: {0}")]
    CommitFailure(String),

    /// Manifest / checkpoint serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration (bad include glob, re-pointed storage path).
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn extraction(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for pdfxi operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_display() {
        let err = Error::extraction("docs/a.pdf", "damaged xref table");
        assert_eq!(
            err.to_string(),
            "extraction failed for docs/a.pdf: damaged xref table"
        );
    }

    #[test]
    fn test_io_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_corrupt_display() {
        let err = Error::Corrupt("checksum mismatch in terms.postings".to_string());
        assert!(err.to_string().starts_with("index corrupt:"));
    }
}
