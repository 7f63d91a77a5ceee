//! Periodic reachability checks for every known source.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::cache::CacheStore;
use crate::domain::SourceId;
use crate::events::{EventSink, SyncEvent};
use crate::http_client::{HttpClient, HttpRequest, USER_AGENT};
use crate::registry::SourceRegistry;
use crate::source::Source;

pub struct HealthMonitor {
    registry: Arc<SourceRegistry>,
    http: Arc<dyn HttpClient>,
    cache: CacheStore,
    events: Arc<dyn EventSink>,
    timeout: Duration,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<SourceRegistry>,
        http: Arc<dyn HttpClient>,
        cache: CacheStore,
        events: Arc<dyn EventSink>,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            http,
            cache,
            events,
            timeout,
            interval,
        }
    }

    /// Check every registered source once, apply the results and emit them.
    pub async fn perform_health_checks(&self) -> BTreeMap<SourceId, bool> {
        let sources = self.registry.all();
        let checks = join_all(sources.iter().map(|source| self.check_source(source))).await;
        let results = sources
            .into_iter()
            .map(|source| source.id)
            .zip(checks)
            .collect::<BTreeMap<_, _>>();

        for change in self.registry.apply_health(&results) {
            tracing::info!(
                source_id = %change.source_id,
                from = %change.from,
                to = %change.to,
                "source status changed by health check"
            );
        }
        self.events.emit(SyncEvent::HealthChecked(results.clone()));
        results
    }

    /// Run checks every `interval` until the returned handle is shut down.
    /// The first check happens one interval after spawning.
    pub fn spawn(self: Arc<Self>) -> HealthMonitorHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let period = self.interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        self.perform_health_checks().await;
                        let evicted = self.cache.clear_expired().await;
                        if evicted > 0 {
                            tracing::debug!(evicted, "swept expired cache entries");
                        }
                    }
                }
            }
            tracing::debug!("health monitor stopped");
        });

        HealthMonitorHandle { shutdown, task }
    }

    async fn check_source(&self, source: &Source) -> bool {
        let request = HttpRequest::get(source.base_url.clone())
            .with_header("user-agent", USER_AGENT)
            .with_timeout(self.timeout);

        match tokio::time::timeout(self.timeout, self.http.execute(request)).await {
            Ok(Ok(response)) => {
                let healthy = response.status < 400;
                if !healthy {
                    tracing::debug!(
                        source_id = %source.id,
                        status = response.status,
                        "health check returned error status"
                    );
                }
                healthy
            }
            Ok(Err(error)) => {
                tracing::debug!(source_id = %source.id, %error, "health check failed");
                false
            }
            Err(_) => {
                tracing::debug!(source_id = %source.id, "health check timed out");
                false
            }
        }
    }
}

/// Owner of the background monitor task.
pub struct HealthMonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HealthMonitorHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            tracing::warn!(%error, "health monitor task ended abnormally");
        }
    }
}
