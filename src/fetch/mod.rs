pub mod client;
pub mod header;

use crate::retrieval::window::TimeWindow;
use async_trait::async_trait;
use thiserror::Error;

pub use client::{RetrievalRequest, SaasClient};
pub use header::{parse_response, HeaderCheck, RawRecordBatch, CANONICAL_HEADER};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("invalid response status: {status}")]
    Remote { status: u16, message: String },

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// One authenticated retrieval for a single time window.
#[async_trait]
pub trait LogFetcher: Send + Sync {
    async fn fetch(&self, window: TimeWindow) -> Result<RawRecordBatch, FetchError>;
}
