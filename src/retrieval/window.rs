use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("invalid interval: start {start} is after end {end} (clock skew or bad checkpoint?)")]
    InvalidInterval { start: i64, end: i64 },

    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
}

/// Closed time range `[start, end]` in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Number of whole seconds covered, both ends included.
    pub fn seconds(&self) -> i64 {
        self.end - self.start + 1
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) - {}({})",
            format_epoch(self.start),
            self.start,
            format_epoch(self.end),
            self.end
        )
    }
}

/// Renders epoch seconds as a UTC timestamp for log lines.
pub fn format_epoch(epoch: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

/// The span a single run has to cover: from the checkpoint up to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalInterval {
    pub start: i64,
    pub end: i64,
}

impl RetrievalInterval {
    /// Starts at the checkpoint, or at `bootstrap_start` on a first run.
    pub fn resolve(checkpoint: Option<i64>, bootstrap_start: i64, now: i64) -> Self {
        Self {
            start: checkpoint.unwrap_or(bootstrap_start),
            end: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Splits `[start, end]` into contiguous windows of at most `chunk_size` seconds.
///
/// An interval with `start == end` has nothing new to fetch and yields no
/// windows. Otherwise the windows are `[cursor, cursor + chunk_size - 1]`,
/// clamped so the last one ends exactly at `end`. Windows are produced lazily.
pub fn plan(start: i64, end: i64, chunk_size: i64) -> Result<ChunkPlan, IntervalError> {
    if chunk_size <= 0 {
        return Err(IntervalError::ZeroChunkSize);
    }
    if start > end {
        return Err(IntervalError::InvalidInterval { start, end });
    }

    Ok(ChunkPlan {
        cursor: (start < end).then_some(start),
        end,
        chunk_size,
    })
}

/// Lazy sequence of windows returned by [`plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Start of the next window, `None` once exhausted.
    cursor: Option<i64>,
    end: i64,
    chunk_size: i64,
}

impl ChunkPlan {
    pub fn is_empty(&self) -> bool {
        self.cursor.is_none()
    }
}

impl Iterator for ChunkPlan {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        let cursor = self.cursor?;
        let window_end = cursor.saturating_add(self.chunk_size - 1).min(self.end);
        self.cursor = cursor
            .checked_add(self.chunk_size)
            .filter(|next| *next <= self.end);
        Some(TimeWindow::new(cursor, window_end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.cursor {
            None => 0,
            Some(cursor) => {
                let span = (self.end as i128 - cursor as i128) / self.chunk_size as i128 + 1;
                usize::try_from(span).unwrap_or(usize::MAX)
            }
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkPlan {}
