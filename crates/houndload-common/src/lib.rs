//! houndload common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging setup for the houndload workspace.
//!
//! - **Error Handling**: [`HoundError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber configuration, see [`logging`]
//!
//! # Example
//!
//! ```no_run
//! use houndload_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{HoundError, Result};
