use chrono::{DateTime, Utc};
use mb_core::Error;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::plan::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Scheduled,
    Manual,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    /// The feed, extractor, analyzer or publisher reported a failure.
    Collaborator,
    Timeout,
    Store,
    /// A message went out but the store could not record it.
    Inconsistency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub kind: StageErrorKind,
    pub url: Option<String>,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, url: Option<&str>, error: &Error) -> Self {
        let kind = match error {
            Error::Timeout { .. } => StageErrorKind::Timeout,
            Error::TransientIo(_) | Error::Database(_) | Error::NotFound(_) | Error::ConstraintViolation(_) => {
                StageErrorKind::Store
            }
            _ => StageErrorKind::Collaborator,
        };
        Self {
            stage,
            kind,
            url: url.map(str::to_string),
            message: error.to_string(),
        }
    }

    pub fn inconsistency(url: &str, message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Publish,
            kind: StageErrorKind::Inconsistency,
            url: Some(url.to_string()),
            message: message.into(),
        }
    }
}

/// Counters returned by every cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Unique articles returned by the feed.
    pub fetched: usize,
    /// Of those, articles not yet in the store.
    pub new: usize,
    pub extracted: usize,
    pub extract_failed: usize,
    pub analyzed: usize,
    pub analysis_failed: usize,
    /// Analysis candidates without enough text.
    pub skipped: usize,
    pub published: usize,
    pub publish_failed: usize,
    pub errors: Vec<StageError>,
}

impl CycleSummary {
    pub fn record(&mut self, error: StageError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub trigger: RunTrigger,
    pub stages: Vec<Stage>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub summary: CycleSummary,
    /// Set when the cycle aborted.
    pub fatal_error: Option<String>,
}

impl RunRecord {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Most recent runs, newest first.
#[derive(Debug, Clone)]
pub struct RunHistory {
    records: VecDeque<RunRecord>,
    capacity: usize,
}

impl RunHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, record: RunRecord) {
        self.records.push_front(record);
        self.records.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&RunRecord> {
        self.records.front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.records.iter().cloned().collect()
    }
}
