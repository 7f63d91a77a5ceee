//! Shared, concurrently mutable view of the source catalog.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{SourceId, UtcDateTime};
use crate::source::{Source, SourceStatus};

/// A status transition made by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub source_id: SourceId,
    pub from: SourceStatus,
    pub to: SourceStatus,
}

#[derive(Debug)]
struct EntryState {
    source: Source,
    consecutive_failures: u32,
    last_check: Option<(bool, UtcDateTime)>,
}

/// Registry of sources in catalog order.
///
/// The id → entry map never changes after construction; each entry carries its own
/// lock so updates to one source never block another.
#[derive(Debug)]
pub struct SourceRegistry {
    order: Vec<SourceId>,
    entries: HashMap<SourceId, Mutex<EntryState>>,
    failure_threshold: u32,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>, failure_threshold: u32) -> Self {
        let mut order = Vec::with_capacity(sources.len());
        let mut entries = HashMap::with_capacity(sources.len());

        for source in sources {
            if entries.contains_key(&source.id) {
                tracing::warn!(source_id = %source.id, "ignoring duplicate source entry");
                continue;
            }
            order.push(source.id.clone());
            entries.insert(
                source.id.clone(),
                Mutex::new(EntryState {
                    source,
                    consecutive_failures: 0,
                    last_check: None,
                }),
            );
        }

        Self {
            order,
            entries,
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ids(&self) -> &[SourceId] {
        &self.order
    }

    /// Snapshot of every source in catalog order.
    pub fn all(&self) -> Vec<Source> {
        self.order
            .iter()
            .filter_map(|id| self.lock(id).map(|state| state.source.clone()))
            .collect()
    }

    pub fn active(&self) -> Vec<Source> {
        self.order
            .iter()
            .filter_map(|id| {
                self.lock(id)
                    .filter(|state| state.source.is_active())
                    .map(|state| state.source.clone())
            })
            .collect()
    }

    pub fn by_id(&self, id: &SourceId) -> Option<Source> {
        self.lock(id).map(|state| state.source.clone())
    }

    /// Set the status unconditionally. Returns the previous status.
    pub fn set_status(&self, id: &SourceId, status: SourceStatus) -> Option<SourceStatus> {
        let mut state = self.lock(id)?;
        let previous = state.source.status;
        state.source.status = status;
        if status == SourceStatus::Active {
            state.consecutive_failures = 0;
        }
        Some(previous)
    }

    /// Set the status only if it currently equals `expected`.
    pub fn compare_and_set_status(
        &self,
        id: &SourceId,
        expected: SourceStatus,
        new: SourceStatus,
    ) -> bool {
        match self.lock(id) {
            Some(mut state) if state.source.status == expected => {
                state.source.status = new;
                true
            }
            _ => false,
        }
    }

    pub fn consecutive_failures(&self, id: &SourceId) -> u32 {
        self.lock(id)
            .map(|state| state.consecutive_failures)
            .unwrap_or(0)
    }

    pub fn last_check(&self, id: &SourceId) -> Option<(bool, UtcDateTime)> {
        self.lock(id).and_then(|state| state.last_check)
    }

    /// Record a successful sync: reset the failure streak and refresh counters.
    pub fn record_sync_success(
        &self,
        id: &SourceId,
        active_jobs: u64,
        candidates: u64,
        synced_at: UtcDateTime,
    ) {
        if let Some(mut state) = self.lock(id) {
            state.consecutive_failures = 0;
            state.source.active_jobs = active_jobs;
            state.source.candidates = candidates;
            state.source.last_sync = Some(synced_at);
        }
    }

    /// Record a failed sync. Demotes `active` to `error` once the streak reaches
    /// the threshold.
    pub fn record_sync_failure(&self, id: &SourceId) -> Option<StatusChange> {
        let mut state = self.lock(id)?;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if state.consecutive_failures < self.failure_threshold
            || state.source.status != SourceStatus::Active
        {
            return None;
        }

        state.source.status = SourceStatus::Error;
        tracing::warn!(
            source_id = %id,
            failures = state.consecutive_failures,
            "source demoted after consecutive sync failures"
        );
        Some(StatusChange {
            source_id: id.clone(),
            from: SourceStatus::Active,
            to: SourceStatus::Error,
        })
    }

    /// Apply one round of health checks. `maintenance` sources keep their status.
    pub fn apply_health(&self, results: &BTreeMap<SourceId, bool>) -> Vec<StatusChange> {
        let checked_at = UtcDateTime::now();
        let mut changes = Vec::new();

        for id in &self.order {
            let Some(&healthy) = results.get(id) else {
                continue;
            };
            let Some(mut state) = self.lock(id) else {
                continue;
            };
            state.last_check = Some((healthy, checked_at));

            let from = state.source.status;
            let to = match (from, healthy) {
                (SourceStatus::Error, true) => SourceStatus::Active,
                (SourceStatus::Active, false) => SourceStatus::Error,
                _ => continue,
            };
            state.source.status = to;
            if to == SourceStatus::Active {
                state.consecutive_failures = 0;
            }
            changes.push(StatusChange {
                source_id: id.clone(),
                from,
                to,
            });
        }

        changes
    }

    fn lock(&self, id: &SourceId) -> Option<MutexGuard<'_, EntryState>> {
        self.entries
            .get(id)
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
