use super::window::{format_epoch, plan, ChunkPlan, IntervalError, RetrievalInterval, TimeWindow};
use crate::config::types::RequestConfig;
use crate::fetch::{FetchError, HeaderCheck, LogFetcher};
use crate::output::sink::{RecordSink, SinkError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("requestChunk {chunk} ({window}) failed: {source}")]
    Fetch {
        chunk: usize,
        window: TimeWindow,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Chunking and first-run behaviour of a retrieval run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalSettings {
    pub chunk_size: i64,
    pub initial_lookback: i64,
    pub start_from: Option<i64>,
}

impl RetrievalSettings {
    pub fn from_config(request: &RequestConfig) -> Self {
        Self {
            chunk_size: request.chunk_increment.as_secs() as i64,
            initial_lookback: request.initial_lookback.as_secs() as i64,
            start_from: (request.start_from > 0).then_some(request.start_from),
        }
    }

    /// Where a run without a checkpoint begins.
    pub fn bootstrap_start(&self, now: i64) -> i64 {
        self.start_from.unwrap_or(now - self.initial_lookback)
    }
}

/// The interval a run covers and its windows, resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub interval: RetrievalInterval,
    pub windows: ChunkPlan,
}

impl RunPlan {
    pub fn new(
        checkpoint: Option<i64>,
        now: i64,
        settings: &RetrievalSettings,
    ) -> Result<Self, IntervalError> {
        let interval = RetrievalInterval::resolve(checkpoint, settings.bootstrap_start(now), now);
        let windows = plan(interval.start, interval.end, settings.chunk_size)?;
        Ok(Self { interval, windows })
    }

    /// Nothing happened since the checkpoint.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Record lines written to the sink
    pub total_lines: usize,
    pub chunk_count: usize,
    pub covered_start: i64,
    pub covered_end: i64,
    pub no_data_chunks: usize,
    pub schema_mismatches: usize,
}

impl RunSummary {
    pub fn empty(interval: RetrievalInterval) -> Self {
        Self {
            total_lines: 0,
            chunk_count: 0,
            covered_start: interval.start,
            covered_end: interval.end,
            no_data_chunks: 0,
            schema_mismatches: 0,
        }
    }
}

/// Fetches every window of `plan`, in order, into `sink`.
///
/// The first failing window ends the run with an error; records of earlier
/// windows stay in the sink, nothing of the failing one is written.
pub async fn run<F, S>(plan: RunPlan, fetcher: &F, sink: &mut S) -> Result<RunSummary, PipelineError>
where
    F: LogFetcher + ?Sized,
    S: RecordSink + ?Sized,
{
    let RunPlan { interval, windows } = plan;

    let mut summary = RunSummary::empty(interval);
    if windows.is_empty() {
        info!(
            checkpoint = interval.start,
            now = interval.end,
            "Nothing to retrieve since last checkpoint"
        );
        return Ok(summary);
    }

    info!(
        from = %format_epoch(interval.start),
        to = %format_epoch(interval.end),
        chunks = windows.len(),
        "Starting retrieval"
    );

    for (index, window) in windows.enumerate() {
        let chunk = index + 1;
        let batch = fetcher
            .fetch(window)
            .await
            .map_err(|source| PipelineError::Fetch {
                chunk,
                window,
                source,
            })?;

        if let HeaderCheck::Mismatch { found } = batch.header() {
            warn!(chunk, %window, first_line = %found, "Invalid first line in response");
            summary.schema_mismatches += 1;
        }

        if batch.is_no_data() {
            info!(chunk, %window, http_status = batch.status(), "requestChunk: no data");
            summary.no_data_chunks += 1;
        } else {
            let written = sink.append(&batch)?;
            summary.total_lines += written;
            info!(
                chunk,
                %window,
                http_status = batch.status(),
                response_lines = batch.response_lines(),
                records = written,
                total_lines = summary.total_lines,
                "requestChunk"
            );
        }

        summary.chunk_count = chunk;
        summary.covered_end = window.end;
    }

    Ok(summary)
}
