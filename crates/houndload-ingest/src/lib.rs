//! Houndload Ingest Library
//!
//! Bulk loader for security-graph collector exports. A collector writes one
//! JSON document per entity kind (users, groups, computers, ...), usually
//! bundled into a zip. Each document carries a `meta` object naming the kind
//! and a `data` array of records; this crate streams those records into a
//! Neo4j graph without ever holding a whole document in memory.
//!
//! # Pipeline
//!
//! - [`sniff`]: read `meta` from the edges of the file
//! - [`transform`]: pick a transformer for the kind
//! - [`extract`]: stream `data` elements
//! - [`batch`]: group them into mini-batches
//! - [`upload`]: write each property group in chunked transactions
//!
//! [`pipeline::Importer`] wires these together; [`archive`] feeds it zip
//! entries one at a time.
//!
//! # Example
//!
//! ```no_run
//! use houndload_ingest::config::{GraphConfig, PipelineConfig};
//! use houndload_ingest::graph::Neo4jWriter;
//! use houndload_ingest::pipeline::Importer;
//! use houndload_ingest::transform::TransformerRegistry;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let writer = Neo4jWriter::connect(&GraphConfig::new("localhost", "neo4j", "neo4j")).await?;
//!     let importer = Importer::new(writer, TransformerRegistry::with_defaults(), PipelineConfig::default());
//!     let summary = importer.import(Path::new("20240101_BloodHound.zip")).await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod batch;
pub mod config;
pub mod extract;
pub mod graph;
pub mod pipeline;
pub mod sniff;
pub mod template;
pub mod transform;
pub mod upload;

pub use pipeline::{ImportSummary, Importer};
