//! Error types for the outline and ranking pipeline.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for adobe1b operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The request could not be read, or a listed document is missing.
    #[error("Input error: {0}")]
    Input(String),

    /// A listed document does not exist on disk.
    #[error("Document not found: {}", .0.display())]
    MissingDocument(PathBuf),

    /// The layout backend could not produce spans for a document.
    #[error("Extraction failed for {document}: {reason}")]
    Extraction { document: String, reason: String },

    /// The grammatical analyzer or the embedding model failed.
    #[error("External model failure: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
}

impl Error {
    /// Whether the run can continue with the remaining documents.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MissingDocument(_) | Error::Extraction { .. } | Error::Pdf(_)
        )
    }
}
