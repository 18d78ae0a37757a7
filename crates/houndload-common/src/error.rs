//! Error types for houndload

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for houndload operations
pub type Result<T> = std::result::Result<T, HoundError>;

/// Main error type for houndload
#[derive(Error, Debug)]
pub enum HoundError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input file '{}': needs to be .zip or .json", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("No transformer registered for entity kind '{0}'")]
    UnknownEntityKind(String),

    #[error("Malformed document at byte {offset}: {reason}")]
    MalformedDocument { offset: u64, reason: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Could not connect to graph database: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HoundError {
    pub fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            offset,
            reason: reason.into(),
        }
    }

    /// Process exit code reported for this error
    ///
    /// - `2`: unsupported input or invalid configuration
    /// - `3`: no transformer for the sniffed entity kind
    /// - `4`: the graph database could not be reached
    /// - `1`: everything else
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnsupportedExtension(_) | Self::Config(_) => 2,
            Self::UnknownEntityKind(_) => 3,
            Self::Connection(_) => 4,
            _ => 1,
        }
    }
}
