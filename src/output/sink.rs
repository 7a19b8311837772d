use crate::fetch::header::{RawRecordBatch, CANONICAL_HEADER};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("can't create output file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't write output file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// Destination for validated record batches.
pub trait RecordSink {
    /// Writes every non-empty record of `batch`, returning how many were written.
    fn append(&mut self, batch: &RawRecordBatch) -> Result<usize>;
}

/// `<dir>/<prefix>.<run_epoch>.csv`
pub fn output_path(dir: &Path, prefix: &str, run_epoch: i64) -> PathBuf {
    dir.join(format!("{}.{}.csv", prefix, run_epoch))
}

/// Append-only CSV file whose first line is the canonical header.
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    writer: BufWriter<File>,
    records_written: usize,
}

impl OutputSink {
    /// Opens `path` for appending, creating it with the header if it is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let create = |source| SinkError::Create {
            path: path.clone(),
            source,
        };

        let file = if path.is_file() {
            OpenOptions::new().append(true).open(&path).map_err(create)?
        } else {
            tracing::info!(path = %path.display(), "Creating output file");
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(create)?;
            file.write_all(format!("{}{}", CANONICAL_HEADER, LINE_ENDING).as_bytes())
                .map_err(create)?;
            file
        };

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            records_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flushes and syncs the file to disk.
    pub fn close(mut self) -> Result<PathBuf> {
        self.writer.flush().map_err(|e| self.write_error(e))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| self.write_error(e))?;
        Ok(self.path)
    }

    fn write_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordSink for OutputSink {
    fn append(&mut self, batch: &RawRecordBatch) -> Result<usize> {
        let mut written = 0;
        for record in batch.records().iter().filter(|r| !r.is_empty()) {
            self.writer
                .write_all(record.as_bytes())
                .and_then(|_| self.writer.write_all(LINE_ENDING.as_bytes()))
                .map_err(|e| SinkError::Write {
                    path: self.path.clone(),
                    source: e,
                })?;
            written += 1;
        }
        // A batch reaches the file whole before the next window is fetched.
        self.writer.flush().map_err(|e| self.write_error(e))?;
        self.records_written += written;
        Ok(written)
    }
}
