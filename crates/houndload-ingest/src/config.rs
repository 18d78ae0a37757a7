//! Import configuration
//!
//! Values come from the command line, which also reads the `NEO4J_*` and
//! `HOUNDLOAD_*` environment variables (and a `.env` file, loaded in `main`).

use houndload_common::{HoundError, Result};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Defaults
// ============================================================================

/// Default Bolt port
pub const DEFAULT_BOLT_PORT: u16 = 7687;

/// Records per transformer invocation
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Rows per database transaction
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 10_000;

/// Scratch directory for archive extraction, relative to the working directory
pub const DEFAULT_SCRATCH_DIR: &str = "tmp";

/// Graph database connection settings
#[derive(Clone)]
pub struct GraphConfig {
    /// Hostname or IP of the database server
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl GraphConfig {
    pub fn new(address: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_BOLT_PORT,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn uri(&self) -> String {
        format!("bolt://{}:{}", self.address, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(HoundError::Config("database address cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(HoundError::Config("database port must be greater than 0".to_string()));
        }
        if self.username.is_empty() {
            return Err(HoundError::Config("database username cannot be empty".to_string()));
        }
        Ok(())
    }
}

// Keep the password out of logs
impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Batching and scratch storage settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub chunk_size: usize,
    pub scratch_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(HoundError::Config("batch size must be greater than 0".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(HoundError::Config("upload chunk size must be greater than 0".to_string()));
        }
        Ok(())
    }
}
