use crate::config::parse::load_config;
use crate::config::types::Config;
use crate::fetch::{FetchError, LogFetcher, SaasClient};
use crate::forward::{Destination, ForwardError, ForwardSummary, Forwarder};
use crate::output::sink::{output_path, OutputSink, SinkError};
use crate::retrieval::pipeline::{self, PipelineError, RetrievalSettings, RunPlan, RunSummary};
use crate::retrieval::window::format_epoch;
use crate::storage::checkpoint::{CheckpointError, CheckpointStore, FileCheckpointStore};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("client error: {0}")]
    Client(#[from] FetchError),

    #[error("retrieval failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("output error: {0}")]
    Sink(#[from] SinkError),

    #[error("forward error: {0}")]
    Forward(#[from] ForwardError),
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Forward the output file when the config enables it
    pub forward: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { forward: true }
    }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub output_path: Option<PathBuf>,
    pub summary: RunSummary,
    pub committed: Option<i64>,
    pub forward: Option<ForwardSummary>,
}

pub async fn run(
    config_path: Option<PathBuf>,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/logpuller/config.yml");
            eprintln!("  /etc/logpuller/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'logpuller config init' to generate one.");
            std::process::exit(1);
        }
    };

    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(&config_path)?;
    log_config(&config);

    let now = chrono::Utc::now().timestamp();
    let fetcher = SaasClient::new(&config.saas, &config.request, &config.proxy)?;
    let store = FileCheckpointStore::new(&config.checkpoint.path);

    match execute(&config, now, &fetcher, &store, options).await {
        Ok(_) => Ok(()),
        Err(e) => {
            error!(error = %e, "Run failed");
            Err(e.into())
        }
    }
}

/// One full run: retrieve, close the file, commit the checkpoint, then forward.
///
/// The checkpoint is written only after every window was fetched and the
/// output file was synced. Any earlier error returns without touching it.
pub async fn execute<F, C>(
    config: &Config,
    now: i64,
    fetcher: &F,
    store: &C,
    options: RunOptions,
) -> Result<RunReport, RunError>
where
    F: LogFetcher + ?Sized,
    C: CheckpointStore + ?Sized,
{
    let settings = RetrievalSettings::from_config(&config.request);
    let checkpoint = store.load()?;

    // Checked before the output file is created.
    let plan = RunPlan::new(checkpoint, now, &settings).map_err(PipelineError::from)?;
    if plan.is_empty() {
        info!(
            checkpoint = plan.interval.start,
            "Already up to date, nothing to retrieve"
        );
        return Ok(RunReport {
            output_path: None,
            summary: RunSummary::empty(plan.interval),
            committed: None,
            forward: None,
        });
    }

    let path = output_path(&config.request.output_dir, &config.request.output_prefix, now);
    let mut sink = OutputSink::open(&path)?;
    let summary = pipeline::run(plan, fetcher, &mut sink).await?;
    let path = sink.close()?;

    info!(
        file = %path.display(),
        from = %format_epoch(summary.covered_start),
        to = %format_epoch(summary.covered_end),
        total_lines = summary.total_lines,
        chunk_count = summary.chunk_count,
        "Success"
    );

    store.commit(now)?;

    let forward = if config.forward.enabled && options.forward {
        let forwarder = Forwarder::new(
            Destination::from_config(&config.forward),
            config.forward.keep_file,
        );
        Some(forwarder.forward(&path).await?)
    } else {
        None
    };

    Ok(RunReport {
        output_path: Some(path),
        summary,
        committed: Some(now),
        forward,
    })
}

fn log_config(config: &Config) {
    info!(
        customer_id = config.saas.customer_id,
        user_id = %config.saas.user_id,
        host = %config.saas.host,
        "saas"
    );
    info!(
        chunk_increment = ?config.request.chunk_increment,
        connection_timeout = ?config.request.connection_timeout,
        output_dir = %config.request.output_dir.display(),
        "request"
    );
    info!(
        enabled = config.forward.enabled,
        host = %config.forward.host,
        port = config.forward.port,
        protocol = %config.forward.protocol,
        keep_file = config.forward.keep_file,
        "forward"
    );
    info!(path = %config.checkpoint.path.display(), "checkpoint");
}
