pub mod message;
pub mod transport;

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub use message::{ForwardMessage, MessageReader};
pub use transport::{Destination, Transport};

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("can't read {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed CSV row: {0}")]
    Row(#[from] csv::Error),

    #[error("can't resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("send failed: {0}")]
    Send(std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardSummary {
    pub sent: usize,
    pub failed: usize,
    pub file_removed: bool,
}

/// Best-effort re-emission of an output file as JSON messages.
#[derive(Debug, Clone)]
pub struct Forwarder {
    destination: Destination,
    keep_file: bool,
}

impl Forwarder {
    pub fn new(destination: Destination, keep_file: bool) -> Self {
        Self {
            destination,
            keep_file,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Sends every row of `path` and, unless the file is kept, deletes it.
    ///
    /// A failed message is logged and counted; it never stops the pass. When
    /// the transport can't be set up every row counts as failed. Only an
    /// unreadable file is an error.
    pub async fn forward(&self, path: &Path) -> Result<ForwardSummary, ForwardError> {
        info!(
            path = %path.display(),
            destination = %self.destination,
            "Parsing CSV to JSON stream and forwarding"
        );

        let mut reader = MessageReader::open(path).map_err(|source| ForwardError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let transport = match Transport::connect(&self.destination).await {
            Ok(transport) => Some(transport),
            Err(e) => {
                warn!(
                    destination = %self.destination,
                    error = %e,
                    "Can't reach destination, no message will be sent"
                );
                None
            }
        };

        let mut summary = ForwardSummary::default();
        let mut row = 0usize;
        while let Some(message) = reader.next_message() {
            row += 1;
            let Some(transport) = &transport else {
                summary.failed += 1;
                continue;
            };
            let result = match message {
                Ok(message) => transport.send(&message.to_payload()).await,
                Err(e) => Err(ForwardError::Row(e)),
            };
            match result {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    warn!(row, error = %e, "Failed to forward message");
                    summary.failed += 1;
                }
            }
        }

        if !self.keep_file {
            info!(path = %path.display(), "Clean up: deleting forwarded file");
            match std::fs::remove_file(path) {
                Ok(()) => summary.file_removed = true,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete forwarded file"),
            }
        }

        info!(
            sent = summary.sent,
            failed = summary.failed,
            "Forwarding finished"
        );
        Ok(summary)
    }
}
