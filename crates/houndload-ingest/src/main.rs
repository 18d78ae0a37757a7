//! Houndload - load collector exports into a graph database

use anyhow::{Context, Result};
use clap::Parser;
use houndload_common::logging::{init_logging, LogConfig, LogLevel};
use houndload_common::HoundError;
use houndload_ingest::config::{
    GraphConfig, PipelineConfig, DEFAULT_BATCH_SIZE, DEFAULT_BOLT_PORT, DEFAULT_SCRATCH_DIR,
    DEFAULT_UPLOAD_CHUNK_SIZE,
};
use houndload_ingest::graph::Neo4jWriter;
use houndload_ingest::pipeline::InputKind;
use houndload_ingest::transform::TransformerRegistry;
use houndload_ingest::Importer;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "houndload")]
#[command(author, version, about = "Load collector JSON or zip exports into Neo4j")]
struct Cli {
    /// Collector output, `.json` or `.zip`
    file: PathBuf,

    /// Database host
    #[arg(short, long, env = "NEO4J_ADDRESS")]
    address: String,

    /// Bolt port
    #[arg(long, env = "NEO4J_PORT", default_value_t = DEFAULT_BOLT_PORT)]
    port: u16,

    /// Database user
    #[arg(short, long, env = "NEO4J_USERNAME")]
    username: String,

    /// Database password
    #[arg(short, long, env = "NEO4J_PASSWORD", hide_env_values = true)]
    password: String,

    /// Records per transformer batch
    #[arg(long, env = "HOUNDLOAD_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Rows per database transaction
    #[arg(long, env = "HOUNDLOAD_CHUNK_SIZE", default_value_t = DEFAULT_UPLOAD_CHUNK_SIZE)]
    chunk_size: usize,

    /// Where archive entries are extracted
    #[arg(long, env = "HOUNDLOAD_SCRATCH_DIR", default_value = DEFAULT_SCRATCH_DIR)]
    scratch_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            address: self.address.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            batch_size: self.batch_size,
            chunk_size: self.chunk_size,
            scratch_dir: self.scratch_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .filter_directives("neo4rs=warn")
        .include_location(cli.verbose)
        .build();

    // Environment variables take precedence over the flag
    let _guard = match log_config.merge_env().and_then(|config| init_logging(&config)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::from(HoundError::Config(e.to_string()).exit_code());
        },
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Import failed");
            ExitCode::from(exit_code(&e))
        },
    }
}

/// Exit code for a failed run; context layers are looked through
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<HoundError>().map_or(1, HoundError::exit_code)
}

/// Validate settings and the input path before touching the database
fn preflight(cli: &Cli) -> Result<(GraphConfig, PipelineConfig)> {
    let graph_config = cli.graph_config();
    let pipeline_config = cli.pipeline_config();
    graph_config.validate()?;
    pipeline_config.validate()?;
    InputKind::of(&cli.file)?;
    Ok((graph_config, pipeline_config))
}

async fn run(cli: Cli) -> Result<()> {
    let (graph_config, pipeline_config) = preflight(&cli)?;

    let writer = Neo4jWriter::connect(&graph_config).await?;
    let importer = Importer::new(writer, TransformerRegistry::with_defaults(), pipeline_config);

    let summary = importer
        .import(&cli.file)
        .await
        .with_context(|| format!("Failed to import {}", cli.file.display()))?;

    info!(
        files = summary.files,
        records = summary.records,
        chunks_written = summary.upload.chunks_written,
        chunks_failed = summary.upload.chunks_failed,
        "All done"
    );

    // Closes the connection pool
    drop(importer);
    Ok(())
}
