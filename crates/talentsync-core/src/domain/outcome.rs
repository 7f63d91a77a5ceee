use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::domain::{SourceId, UtcDateTime};
use crate::error::{ErrorKind, RequestError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
    /// Not attempted because the run deadline elapsed first.
    Cancelled,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Transport attempts spent before giving up, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl OutcomeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: None,
        }
    }
}

impl From<&RequestError> for OutcomeError {
    fn from(error: &RequestError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            attempts: error.attempts(),
        }
    }
}

/// Result of one sync attempt against one source. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub run_id: String,
    pub source_id: SourceId,
    pub status: SyncStatus,
    pub jobs_updated: u64,
    pub candidates_updated: u64,
    pub error: Option<OutcomeError>,
    pub duration_ms: u64,
    pub started_at: UtcDateTime,
}

impl SyncOutcome {
    pub fn succeeded(
        run_id: impl Into<String>,
        source_id: SourceId,
        jobs_updated: u64,
        candidates_updated: u64,
        duration_ms: u64,
        started_at: UtcDateTime,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            source_id,
            status: SyncStatus::Success,
            jobs_updated,
            candidates_updated,
            error: None,
            duration_ms,
            started_at,
        }
    }

    pub fn failed(
        run_id: impl Into<String>,
        source_id: SourceId,
        error: OutcomeError,
        duration_ms: u64,
        started_at: UtcDateTime,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            source_id,
            status: SyncStatus::Failed,
            jobs_updated: 0,
            candidates_updated: 0,
            error: Some(error),
            duration_ms,
            started_at,
        }
    }

    pub fn cancelled(run_id: impl Into<String>, source_id: SourceId) -> Self {
        Self {
            run_id: run_id.into(),
            source_id,
            status: SyncStatus::Cancelled,
            jobs_updated: 0,
            candidates_updated: 0,
            error: None,
            duration_ms: 0,
            started_at: UtcDateTime::now(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == SyncStatus::Success
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }
}

/// Aggregate of one fleet run, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: String,
    pub started_at: UtcDateTime,
    pub duration_ms: u64,
    pub deadline_elapsed: bool,
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    pub fn succeeded(&self) -> usize {
        self.count(SyncStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(SyncStatus::Failed)
    }

    pub fn cancelled(&self) -> usize {
        self.count(SyncStatus::Cancelled)
    }

    pub fn outcome(&self, source_id: &SourceId) -> Option<&SyncOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| &outcome.source_id == source_id)
    }

    fn count(&self, status: SyncStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }
}
