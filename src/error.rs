use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MementoError {
    #[error("invalid timestamp: {0}")]
    Timestamp(String),

    #[error("catalog row {index}: {reason}")]
    Row { index: usize, reason: String },

    #[error("failed to read catalog at {0}")]
    CatalogRead(PathBuf),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned status {status}")]
    HttpStatus { status: u16, url: String },

    #[error("TLS handshake failed {attempts} times in a row: {message}")]
    TlsExhausted { attempts: usize, message: String },

    #[error("tagging failed: {0}")]
    Tagging(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("missing config file params.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl MementoError {
    /// True when a failure only affects the current catalog item and the run
    /// should record it and move on. TLS-retry exhaustion is deliberately not
    /// in this set: repeated handshake failures point at the environment, not
    /// at one bad URL.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            MementoError::HttpStatus { .. } | MementoError::Transport { .. }
        )
    }
}
