//! Persistence contract for synced records and the sync audit trail.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use talentsync_warehouse::{CandidateRow, JobRow, SyncOutcomeRow, Warehouse};

use crate::domain::{CandidateRecord, JobRecord, SourceId, SyncOutcome};
use crate::error::StoreError;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Upserts are idempotent on `(source_id, external_id)`; outcomes are append-only.
pub trait SyncStore: Send + Sync {
    fn upsert_jobs<'a>(&'a self, records: Vec<JobRecord>) -> StoreFuture<'a, usize>;

    fn upsert_candidates<'a>(&'a self, records: Vec<CandidateRecord>) -> StoreFuture<'a, usize>;

    fn append_sync_outcome<'a>(&'a self, outcome: SyncOutcome) -> StoreFuture<'a, ()>;
}

type RecordKey = (SourceId, String);

#[derive(Debug, Default)]
struct MemoryState {
    jobs: HashMap<RecordKey, JobRecord>,
    candidates: HashMap<RecordKey, CandidateRecord>,
    outcomes: Vec<SyncOutcome>,
}

/// Process-local store, the default when no warehouse is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_count(&self) -> usize {
        self.state().jobs.len()
    }

    pub fn candidate_count(&self) -> usize {
        self.state().candidates.len()
    }

    pub fn job(&self, source_id: &SourceId, external_id: &str) -> Option<JobRecord> {
        self.state()
            .jobs
            .get(&(source_id.clone(), external_id.to_owned()))
            .cloned()
    }

    pub fn outcomes(&self) -> Vec<SyncOutcome> {
        self.state().outcomes.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SyncStore for MemoryStore {
    fn upsert_jobs<'a>(&'a self, records: Vec<JobRecord>) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let mut state = self.state();
            let mut keys = HashSet::with_capacity(records.len());
            for record in records {
                let key = (record.source_id.clone(), record.external_id.clone());
                keys.insert(key.clone());
                state.jobs.insert(key, record);
            }
            Ok(keys.len())
        })
    }

    fn upsert_candidates<'a>(&'a self, records: Vec<CandidateRecord>) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let mut state = self.state();
            let mut keys = HashSet::with_capacity(records.len());
            for record in records {
                let key = (record.source_id.clone(), record.external_id.clone());
                keys.insert(key.clone());
                state.candidates.insert(key, record);
            }
            Ok(keys.len())
        })
    }

    fn append_sync_outcome<'a>(&'a self, outcome: SyncOutcome) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.state().outcomes.push(outcome);
            Ok(())
        })
    }
}

impl SyncStore for Warehouse {
    fn upsert_jobs<'a>(&'a self, records: Vec<JobRecord>) -> StoreFuture<'a, usize> {
        let warehouse = self.clone();
        Box::pin(async move {
            let rows = records.into_iter().map(job_row).collect::<Vec<_>>();
            run_blocking(move || warehouse.upsert_jobs(&rows)).await
        })
    }

    fn upsert_candidates<'a>(&'a self, records: Vec<CandidateRecord>) -> StoreFuture<'a, usize> {
        let warehouse = self.clone();
        Box::pin(async move {
            let rows = records.into_iter().map(candidate_row).collect::<Vec<_>>();
            run_blocking(move || warehouse.upsert_candidates(&rows)).await
        })
    }

    fn append_sync_outcome<'a>(&'a self, outcome: SyncOutcome) -> StoreFuture<'a, ()> {
        let warehouse = self.clone();
        Box::pin(async move {
            let row = outcome_row(outcome);
            run_blocking(move || warehouse.append_sync_outcome(&row)).await
        })
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, talentsync_warehouse::WarehouseError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|error| StoreError::Task(error.to_string()))?
        .map_err(StoreError::from)
}

fn job_row(record: JobRecord) -> JobRow {
    JobRow {
        source_id: record.source_id.to_string(),
        external_id: record.external_id,
        title: record.title,
        description: record.description,
        requirements: record.requirements,
        location: record.location,
        salary_range: record.salary_range,
        posted_at: record.posted_at.map(|value| value.format_rfc3339()),
        status: record.status.as_str().to_owned(),
        applicant_count: record.applicant_count,
    }
}

fn candidate_row(record: CandidateRecord) -> CandidateRow {
    CandidateRow {
        source_id: record.source_id.to_string(),
        external_id: record.external_id,
        name: record.name,
        email: record.email,
        phone: record.phone,
        skills: record.skills.into_iter().collect(),
        experience_years: record.experience_years,
        location: record.location,
        status: record.status.as_str().to_owned(),
        created_at: record.created_at.map(|value| value.format_rfc3339()),
        resume_url: record.resume_url,
        match_score: record.match_score,
    }
}

fn outcome_row(outcome: SyncOutcome) -> SyncOutcomeRow {
    let (error_kind, error_message) = match outcome.error {
        Some(error) => (Some(error.kind.as_str().to_owned()), Some(error.message)),
        None => (None, None),
    };

    SyncOutcomeRow {
        run_id: outcome.run_id,
        source_id: outcome.source_id.to_string(),
        status: outcome.status.as_str().to_owned(),
        jobs_updated: outcome.jobs_updated,
        candidates_updated: outcome.candidates_updated,
        error_kind,
        error_message,
        duration_ms: outcome.duration_ms,
        started_at: outcome.started_at.format_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobStatus, OutcomeError, UtcDateTime};
    use crate::error::ErrorKind;

    fn job(external_id: &str, title: &str) -> JobRecord {
        JobRecord {
            source_id: SourceId::parse("qiwa").expect("valid id"),
            external_id: external_id.to_owned(),
            title: title.to_owned(),
            description: String::new(),
            requirements: String::new(),
            location: String::from("Riyadh"),
            salary_range: None,
            posted_at: None,
            status: JobStatus::Active,
            applicant_count: 0,
        }
    }

    #[tokio::test]
    async fn memory_store_upserts_by_external_id() {
        let store = MemoryStore::new();

        store
            .upsert_jobs(vec![job("1", "Nurse"), job("2", "Driver")])
            .await
            .expect("upsert");
        store
            .upsert_jobs(vec![job("1", "Senior Nurse")])
            .await
            .expect("upsert");

        assert_eq!(store.job_count(), 2);
        let qiwa = SourceId::parse("qiwa").expect("valid id");
        assert_eq!(store.job(&qiwa, "1").map(|job| job.title), Some(String::from("Senior Nurse")));
    }

    #[tokio::test]
    async fn repeated_keys_in_one_batch_are_counted_once() {
        let store = MemoryStore::new();

        let updated = store
            .upsert_jobs(vec![job("1", "Nurse"), job("1", "Senior Nurse"), job("2", "Driver")])
            .await
            .expect("upsert");

        assert_eq!(updated, 2);
        assert_eq!(store.job_count(), 2);
    }

    #[test]
    fn outcome_row_flattens_error() {
        let outcome = SyncOutcome::failed(
            "run-1",
            SourceId::parse("bayt").expect("valid id"),
            OutcomeError::new(ErrorKind::InvalidPayload, "bad json"),
            12,
            UtcDateTime::now(),
        );

        let row = outcome_row(outcome);

        assert_eq!(row.status, "failed");
        assert_eq!(row.error_kind.as_deref(), Some("invalid_payload"));
        assert_eq!(row.error_message.as_deref(), Some("bad json"));
    }
}
