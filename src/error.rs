//! Error types for the reader

use std::io;
use thiserror::Error;

/// Main error type for the reader
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("EPUB error: {0}")]
    Epub(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Bookmark error: {0}")]
    Bookmark(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for reader operations
pub type Result<T> = std::result::Result<T, ReaderError>;

impl From<String> for ReaderError {
    fn from(s: String) -> Self {
        ReaderError::Other(s)
    }
}

impl From<&str> for ReaderError {
    fn from(s: &str) -> Self {
        ReaderError::Other(s.to_string())
    }
}
