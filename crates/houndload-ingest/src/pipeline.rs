//! Import orchestration
//!
//! [`Importer`] drives one input through the whole chain: sniff the metadata,
//! pick a transformer, stream records, batch them, transform each batch and
//! upload every non-empty property group. Everything runs sequentially; the
//! only suspension points are database round trips.

use crate::archive::expand;
use crate::batch::MiniBatches;
use crate::config::PipelineConfig;
use crate::extract::RecordStream;
use crate::graph::GraphWriter;
use crate::sniff::sniff;
use crate::transform::{GroupMap, TransformResult, TransformerRegistry};
use crate::upload::{UploadStats, Uploader};
use houndload_common::{HoundError, Result};
use std::fmt;
use std::ops::AddAssign;
use std::path::Path;
use tracing::{debug, info, warn};

/// Totals for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files: usize,
    pub records: u64,
    pub batches: usize,
    pub upload: UploadStats,
}

impl AddAssign for ImportSummary {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.records += other.records;
        self.batches += other.batches;
        self.upload += other.upload;
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s), {} record(s) in {} batch(es), {} chunk(s) written, {} failed",
            self.files, self.records, self.batches, self.upload.chunks_written, self.upload.chunks_failed
        )
    }
}

/// Kind of input, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Json,
    Zip,
}

impl InputKind {
    /// Classify `path`; anything but `.json` or `.zip` (any case) is rejected
    pub fn of(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(InputKind::Json),
            Some("zip") => Ok(InputKind::Zip),
            _ => Err(HoundError::UnsupportedExtension(path.to_path_buf())),
        }
    }
}

pub struct Importer<W> {
    registry: TransformerRegistry,
    uploader: Uploader<W>,
    config: PipelineConfig,
}

impl<W: GraphWriter> Importer<W> {
    pub fn new(writer: W, registry: TransformerRegistry, config: PipelineConfig) -> Self {
        let uploader = Uploader::new(writer, config.chunk_size);
        Self {
            registry,
            uploader,
            config,
        }
    }

    pub fn writer(&self) -> &W {
        self.uploader.writer()
    }

    /// Import a `.json` document or every document in a `.zip` archive
    pub async fn import(&self, path: &Path) -> Result<ImportSummary> {
        match InputKind::of(path)? {
            InputKind::Json => self.import_file(path).await,
            InputKind::Zip => self.import_archive(path).await,
        }
    }

    /// Import every entry of an archive, one at a time
    ///
    /// The first entry that fails stops the archive; its scratch file is still
    /// removed.
    pub async fn import_archive(&self, path: &Path) -> Result<ImportSummary> {
        info!(path = %path.display(), "Expanding archive");
        let mut summary = ImportSummary::default();

        for entry in expand(path, &self.config.scratch_dir)? {
            let scratch = entry?;
            summary += self.import_file(scratch.path()).await?;
            scratch.remove()?;
        }

        info!(path = %path.display(), files = summary.files, "Archive done");
        Ok(summary)
    }

    /// Import a single collector document
    pub async fn import_file(&self, path: &Path) -> Result<ImportSummary> {
        let meta = sniff(path);
        info!(path = %path.display(), %meta, "Processing file");
        if !meta.is_usable() {
            warn!(path = %path.display(), "Could not read file metadata");
        }

        // Fails before any record is read
        let transformer = self.registry.resolve(&meta)?;

        let mut summary = ImportSummary {
            files: 1,
            ..ImportSummary::default()
        };
        let mut records = RecordStream::open(path)?;

        for batch in MiniBatches::new(records.by_ref(), self.config.batch_size) {
            let batch = batch?;
            summary.batches += 1;
            let result = transformer.transform(&batch);
            debug!(
                batch = summary.batches,
                records = batch.len(),
                rows = result.row_count(),
                "Transformed batch"
            );
            summary.upload += self.upload_result(&result).await;
        }
        summary.records = records.records_read();

        if let Some(expected) = meta.count {
            if expected != summary.records {
                warn!(
                    path = %path.display(),
                    expected,
                    actual = summary.records,
                    "Record count does not match metadata"
                );
            }
        }

        info!(
            path = %path.display(),
            records = summary.records,
            batches = summary.batches,
            "Finished file"
        );
        Ok(summary)
    }

    async fn upload_result(&self, result: &TransformResult) -> UploadStats {
        match result {
            TransformResult::Standard(groups) => self.upload_groups(groups).await,
            TransformResult::Azure {
                azure,
                on_prem,
                relationships,
            } => {
                let mut stats = self.upload_groups(azure).await;
                stats += self.upload_groups(on_prem).await;
                stats += self.upload_groups(relationships).await;
                stats
            },
        }
    }

    async fn upload_groups(&self, groups: &GroupMap) -> UploadStats {
        let mut stats = UploadStats::default();
        for (name, group) in groups {
            if group.is_empty() {
                continue;
            }
            debug!(group = %name, rows = group.props.len(), "Uploading group");
            stats += self.uploader.upload(&group.statement, &group.props).await;
        }
        stats
    }
}
