//! Shared helpers for houndload-ingest integration tests
//!
//! Nothing here talks to a real database: [`RecordingWriter`] stands in for
//! the Bolt connection and keeps every chunk it is handed.

#![allow(dead_code)]

use async_trait::async_trait;
use houndload_common::{HoundError, Result};
use houndload_ingest::config::PipelineConfig;
use houndload_ingest::graph::GraphWriter;
use houndload_ingest::transform::TransformerRegistry;
use houndload_ingest::Importer;
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use zip::write::SimpleFileOptions;

/// One call to `write_chunk`
#[derive(Debug, Clone)]
pub struct WrittenChunk {
    pub statement: String,
    pub props: Vec<Value>,
}

/// Keeps every chunk; optionally fails the call at `fail_at`
#[derive(Default)]
pub struct RecordingWriter {
    chunks: Mutex<Vec<WrittenChunk>>,
    fail_at: Option<usize>,
}

impl RecordingWriter {
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }

    pub fn chunks(&self) -> Vec<WrittenChunk> {
        self.chunks.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphWriter for RecordingWriter {
    async fn write_chunk(&self, statement: &str, props: &[Value]) -> Result<()> {
        let mut chunks = self.chunks.lock().unwrap();
        let index = chunks.len();
        chunks.push(WrittenChunk {
            statement: statement.to_string(),
            props: props.to_vec(),
        });
        if self.fail_at == Some(index) {
            return Err(HoundError::Database("Neo.ClientError.Statement.SyntaxError".to_string()));
        }
        Ok(())
    }
}

/// Importer over a recording writer, plus a handle to inspect it
pub fn importer(writer: RecordingWriter, config: PipelineConfig) -> (Importer<Arc<RecordingWriter>>, Arc<RecordingWriter>) {
    let writer = Arc::new(writer);
    let importer = Importer::new(writer.clone(), TransformerRegistry::with_defaults(), config);
    (importer, writer)
}

pub fn pipeline_config(scratch_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        scratch_dir: scratch_dir.to_path_buf(),
        ..PipelineConfig::default()
    }
}

/// Collector document text with `meta` after `data`, the way collectors write it
pub fn document(kind: &str, records: &[Value]) -> String {
    format!(
        r#"{{"data":{},"meta":{{"methods":0,"type":"{}","count":{},"version":5}}}}"#,
        Value::Array(records.to_vec()),
        kind,
        records.len()
    )
}

pub fn write_document(dir: &Path, name: &str, kind: &str, records: &[Value]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, document(kind, records)).unwrap();
    path
}

pub fn write_archive(dir: &Path, name: &str, entries: &[(&str, String)]) -> PathBuf {
    let path = dir.join(name);
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    for (entry_name, contents) in entries {
        zip.start_file(*entry_name, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

pub fn user(sid: &str, name: &str) -> Value {
    json!({
        "ObjectIdentifier": sid,
        "Properties": {"name": name, "enabled": true},
        "Aces": [],
    })
}

pub fn group(sid: &str, name: &str) -> Value {
    json!({
        "ObjectIdentifier": sid,
        "Properties": {"name": name},
        "Members": [],
    })
}

pub fn users(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| user(&format!("S-1-5-21-1-{}", 1000 + i), &format!("USER{}@CORP.LOCAL", i)))
        .collect()
}
