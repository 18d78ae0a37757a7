//! Chunked uploads
//!
//! A property group can hold far more rows than one transaction should carry.
//! [`Uploader`] cuts the rows into chunks and runs the group's statement once
//! per chunk. A failed chunk is logged and skipped; the import keeps going.

use crate::batch::chunk_sequence;
use crate::graph::GraphWriter;
use serde_json::Value;
use std::ops::AddAssign;
use tracing::{error, info};

/// Outcome of one or more uploads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub chunks_written: usize,
    pub chunks_failed: usize,
    pub rows_written: usize,
}

impl AddAssign for UploadStats {
    fn add_assign(&mut self, other: Self) {
        self.chunks_written += other.chunks_written;
        self.chunks_failed += other.chunks_failed;
        self.rows_written += other.rows_written;
    }
}

pub struct Uploader<W> {
    writer: W,
    chunk_size: usize,
}

impl<W: GraphWriter> Uploader<W> {
    pub fn new(writer: W, chunk_size: usize) -> Self {
        Self { writer, chunk_size }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Write `props` with `statement`, one transaction per chunk
    ///
    /// Empty `props` is a no-op.
    pub async fn upload(&self, statement: &str, props: &[Value]) -> UploadStats {
        let mut stats = UploadStats::default();

        for chunk in chunk_sequence(props, self.chunk_size) {
            info!(rows = chunk.len(), "Uploading batch");
            match self.writer.write_chunk(statement, chunk).await {
                Ok(()) => {
                    stats.chunks_written += 1;
                    stats.rows_written += chunk.len();
                },
                Err(e) => {
                    error!(%statement, error = %e, "Error running statement");
                    stats.chunks_failed += 1;
                },
            }
        }

        stats
    }
}
