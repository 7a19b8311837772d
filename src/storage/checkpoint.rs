use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const CURRENT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid checkpoint version: {0}")]
    InvalidVersion(u32),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Persisted high-water mark: logs up to `request_timestamp_from` have been retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub request_timestamp_from: i64,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(request_timestamp_from: i64) -> Self {
        Self {
            version: CURRENT_VERSION,
            request_timestamp_from,
            updated_at: Utc::now(),
        }
    }
}

/// Durable storage for the single retrieval checkpoint.
pub trait CheckpointStore {
    fn load(&self) -> Result<Option<i64>>;

    /// Replaces the stored value. Either the old or the new value survives a crash.
    fn commit(&self, timestamp: i64) -> Result<()>;
}

/// JSON checkpoint file replaced atomically on every commit.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Result<Option<i64>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No checkpoint found");
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let checkpoint: Checkpoint =
            serde_json::from_str(&content).map_err(|source| CheckpointError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if checkpoint.version != CURRENT_VERSION {
            return Err(CheckpointError::InvalidVersion(checkpoint.version));
        }

        tracing::info!(
            path = %self.path.display(),
            request_timestamp_from = checkpoint.request_timestamp_from,
            updated_at = %checkpoint.updated_at,
            "Loaded checkpoint"
        );
        Ok(Some(checkpoint.request_timestamp_from))
    }

    fn commit(&self, timestamp: i64) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_vec_pretty(&Checkpoint::new(timestamp)).map_err(|source| {
            CheckpointError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let temp_path = self.temp_path();
        {
            let mut file = File::create(&temp_path).map_err(|e| self.io_error(e))?;
            file.write_all(&json).map_err(|e| self.io_error(e))?;
            file.sync_all().map_err(|e| self.io_error(e))?;
        }
        fs::rename(&temp_path, &self.path).map_err(|e| self.io_error(e))?;

        tracing::info!(
            path = %self.path.display(),
            request_timestamp_from = timestamp,
            "Checkpoint committed"
        );
        Ok(())
    }
}

/// In-process store for driving a run without touching the filesystem.
///
/// Not used by the binary. It is public so integration tests and embedders can
/// observe how often a run commits.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    value: Mutex<Option<i64>>,
    commits: Mutex<usize>,
}

impl MemoryCheckpointStore {
    pub fn with_value(timestamp: i64) -> Self {
        Self {
            value: Mutex::new(Some(timestamp)),
            commits: Mutex::new(0),
        }
    }

    pub fn commit_count(&self) -> usize {
        *self.commits.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Option<i64>> {
        Ok(*self.value.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn commit(&self, timestamp: i64) -> Result<()> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(timestamp);
        *self.commits.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
