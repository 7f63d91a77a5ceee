//! Batched multi-source synchronization.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::domain::{
    parse_candidates, parse_jobs, CandidateRecord, JobRecord, JobStatus, OutcomeError, SourceId,
    SyncOutcome, SyncReport, UtcDateTime,
};
use crate::error::{ErrorKind, RequestError, SyncError};
use crate::events::{EventSink, SyncEvent};
use crate::executor::{ApiRequest, RequestExecutor};
use crate::registry::SourceRegistry;
use crate::source::Source;
use crate::store::SyncStore;

/// Per-source failure inside one sync. Never escapes [`SyncOrchestrator::sync_source`].
enum SourceFailure {
    Request(RequestError),
    Payload(String),
}

impl SourceFailure {
    fn into_outcome_error(self) -> OutcomeError {
        match self {
            Self::Request(error) => OutcomeError::from(&error),
            Self::Payload(message) => OutcomeError::new(ErrorKind::InvalidPayload, message),
        }
    }
}

/// Clears the running flag when a fleet run ends, however it ends.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Result<Self, SyncError> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyRunning)?;
        Ok(Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct SyncOrchestrator {
    registry: Arc<SourceRegistry>,
    executor: Arc<RequestExecutor>,
    store: Arc<dyn SyncStore>,
    events: Arc<dyn EventSink>,
    max_concurrent: usize,
    batch_pause: Duration,
    fetch_limit: u32,
    job_location: Option<String>,
    running: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(
        config: &SyncConfig,
        registry: Arc<SourceRegistry>,
        executor: Arc<RequestExecutor>,
        store: Arc<dyn SyncStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            executor,
            store,
            events,
            max_concurrent: config.max_concurrent.max(1),
            batch_pause: config.batch_pause,
            fetch_limit: config.fetch_limit,
            job_location: config.job_location.clone(),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Sync one source. Per-source problems become a failed outcome; only store
    /// failures are returned as errors.
    pub async fn sync_source(&self, source_id: &SourceId) -> Result<SyncOutcome, SyncError> {
        let run_id = Uuid::new_v4().to_string();
        self.sync_source_in_run(&run_id, source_id).await
    }

    pub async fn sync_all_sources(&self) -> Result<SyncReport, SyncError> {
        self.sync_all_sources_with_deadline(None).await
    }

    /// Sync every active source in batches of `max_concurrent`.
    ///
    /// Once `deadline` has elapsed no further batch starts; the sources left over
    /// receive `cancelled` outcomes.
    pub async fn sync_all_sources_with_deadline(
        &self,
        deadline: Option<Duration>,
    ) -> Result<SyncReport, SyncError> {
        let _guard = RunGuard::acquire(&self.running)?;

        let run_id = Uuid::new_v4().to_string();
        let started_at = UtcDateTime::now();
        let clock = Instant::now();
        let deadline_at = deadline.map(|limit| clock + limit);
        let sources = self.registry.active();
        let mut outcomes = Vec::with_capacity(sources.len());
        let mut deadline_elapsed = false;

        tracing::info!(
            run_id = %run_id,
            sources = sources.len(),
            batch_size = self.max_concurrent,
            "starting fleet sync"
        );

        for (index, batch) in sources.chunks(self.max_concurrent).enumerate() {
            if index > 0 && !self.batch_pause.is_zero() {
                match deadline_at {
                    Some(at) => {
                        tokio::time::sleep_until((Instant::now() + self.batch_pause).min(at))
                            .await;
                    }
                    None => tokio::time::sleep(self.batch_pause).await,
                }
            }

            if deadline_at.is_some_and(|at| Instant::now() >= at) {
                deadline_elapsed = true;
                let remaining = &sources[index * self.max_concurrent..];
                tracing::warn!(
                    run_id = %run_id,
                    cancelled = remaining.len(),
                    "deadline elapsed, cancelling remaining sources"
                );
                for source in remaining {
                    let outcome = SyncOutcome::cancelled(run_id.clone(), source.id.clone());
                    self.store.append_sync_outcome(outcome.clone()).await?;
                    self.events.emit(SyncEvent::SyncCompleted(outcome.clone()));
                    outcomes.push(outcome);
                }
                break;
            }

            let results = join_all(
                batch
                    .iter()
                    .map(|source| self.sync_source_in_run(&run_id, &source.id)),
            )
            .await;
            for result in results {
                outcomes.push(result?);
            }
        }

        let report = SyncReport {
            run_id,
            started_at,
            duration_ms: elapsed_ms(clock),
            deadline_elapsed,
            outcomes,
        };
        tracing::info!(
            run_id = %report.run_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            duration_ms = report.duration_ms,
            "fleet sync finished"
        );
        Ok(report)
    }

    async fn sync_source_in_run(
        &self,
        run_id: &str,
        source_id: &SourceId,
    ) -> Result<SyncOutcome, SyncError> {
        let started_at = UtcDateTime::now();
        let clock = Instant::now();
        self.events.emit(SyncEvent::SyncStarted {
            source_id: source_id.clone(),
        });

        let outcome = match self.registry.by_id(source_id) {
            None => SyncOutcome::failed(
                run_id,
                source_id.clone(),
                OutcomeError::new(
                    ErrorKind::SourceNotFound,
                    format!("source '{source_id}' is not registered"),
                ),
                elapsed_ms(clock),
                started_at,
            ),
            Some(source) if !source.is_active() => SyncOutcome::failed(
                run_id,
                source_id.clone(),
                OutcomeError::new(
                    ErrorKind::SourceInactive,
                    format!("source '{source_id}' is {}", source.status),
                ),
                elapsed_ms(clock),
                started_at,
            ),
            Some(source) => match self.fetch(&source).await {
                Ok((jobs, candidates)) => {
                    let active_jobs = jobs
                        .iter()
                        .filter(|job| job.status == JobStatus::Active)
                        .count() as u64;
                    let jobs_updated = self.store.upsert_jobs(jobs).await? as u64;
                    let candidates_updated = self.store.upsert_candidates(candidates).await? as u64;
                    self.registry.record_sync_success(
                        source_id,
                        active_jobs,
                        candidates_updated,
                        UtcDateTime::now(),
                    );
                    SyncOutcome::succeeded(
                        run_id,
                        source_id.clone(),
                        jobs_updated,
                        candidates_updated,
                        elapsed_ms(clock),
                        started_at,
                    )
                }
                Err(failure) => SyncOutcome::failed(
                    run_id,
                    source_id.clone(),
                    failure.into_outcome_error(),
                    elapsed_ms(clock),
                    started_at,
                ),
            },
        };

        // Skipped and unknown sources are not failures of the source itself.
        let failure = outcome
            .error
            .as_ref()
            .filter(|error| error.kind.counts_toward_demotion());
        if let Some(error) = failure {
            self.events.emit(SyncEvent::Error {
                context: format!("sync {source_id}"),
                cause: error.message.clone(),
            });
            self.registry.record_sync_failure(source_id);
        }

        self.store.append_sync_outcome(outcome.clone()).await?;
        self.events.emit(SyncEvent::SyncCompleted(outcome.clone()));
        Ok(outcome)
    }

    async fn fetch(
        &self,
        source: &Source,
    ) -> Result<(Vec<JobRecord>, Vec<CandidateRecord>), SourceFailure> {
        let Some(api) = source.api_endpoint.as_deref() else {
            tracing::debug!(source_id = %source.id, "source has no api endpoint, nothing to fetch");
            return Ok((Vec::new(), Vec::new()));
        };
        let api = api.trim_end_matches('/');
        let limit = self.fetch_limit.to_string();

        let mut jobs_request = ApiRequest::get(format!("{api}/jobs"))
            .with_param("status", "active")
            .with_param("limit", limit.as_str());
        if let Some(location) = &self.job_location {
            jobs_request = jobs_request.with_param("location", location.as_str());
        }
        let candidates_request = ApiRequest::get(format!("{api}/candidates"))
            .with_param("status", "active")
            .with_param("limit", limit.as_str());

        let (jobs, candidates) = tokio::try_join!(
            self.executor.execute(source, &jobs_request),
            self.executor.execute(source, &candidates_request),
        )
        .map_err(SourceFailure::Request)?;

        let jobs = parse_jobs(&source.id, &jobs.body)
            .map_err(|error| SourceFailure::Payload(error.to_string()))?;
        let candidates = parse_candidates(&source.id, &candidates.body)
            .map_err(|error| SourceFailure::Payload(error.to_string()))?;
        Ok((jobs, candidates))
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
