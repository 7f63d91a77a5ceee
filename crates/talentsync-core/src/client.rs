use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::cache::CacheStore;
use crate::config::SyncConfig;
use crate::credentials::{CredentialResolver, EnvCredentialResolver};
use crate::domain::{SourceId, SyncOutcome, SyncReport};
use crate::error::SyncError;
use crate::events::{EventSink, SyncEvent, TracingSink};
use crate::executor::RequestExecutor;
use crate::health::{HealthMonitor, HealthMonitorHandle};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::orchestrator::SyncOrchestrator;
use crate::registry::SourceRegistry;
use crate::source::Source;
use crate::statistics::SyncStatistics;
use crate::store::{MemoryStore, SyncStore};
use crate::throttling::RateLimiter;

/// Builder for [`SyncClient`].
///
/// Every collaborator has a production default: reqwest transport, environment
/// credentials, an in-memory store and a tracing event sink.
///
/// # Example
///
/// ```rust,ignore
/// use talentsync_core::{SourceCatalog, SyncClientBuilder, SyncConfig};
///
/// let catalog = SourceCatalog::load(&path)?;
/// let client = SyncClientBuilder::new(catalog.into_sources())
///     .with_config(SyncConfig::from_env()?)
///     .build();
/// client.initialize().await;
/// let report = client.sync_all_sources().await?;
/// ```
pub struct SyncClientBuilder {
    sources: Vec<Source>,
    config: SyncConfig,
    http: Option<Arc<dyn HttpClient>>,
    credentials: Option<Arc<dyn CredentialResolver>>,
    store: Option<Arc<dyn SyncStore>>,
    events: Option<Arc<dyn EventSink>>,
}

impl SyncClientBuilder {
    pub fn new(sources: Vec<Source>) -> Self {
        Self {
            sources,
            config: SyncConfig::default(),
            http: None,
            credentials: None,
            store: None,
            events: None,
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialResolver>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SyncStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> SyncClient {
        let config = self.config;
        let http = self
            .http
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(EnvCredentialResolver));
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let events = self.events.unwrap_or_else(|| Arc::new(TracingSink));

        let registry = Arc::new(SourceRegistry::new(self.sources, config.failure_threshold));
        let cache = CacheStore::new(config.cache_ttl);
        let limiter = RateLimiter::new(config.rate_limit_per_minute);
        let executor = Arc::new(RequestExecutor::new(
            Arc::clone(&http),
            limiter.clone(),
            cache.clone(),
            credentials,
            config.retry.clone(),
            config.request_timeout,
        ));
        let orchestrator = SyncOrchestrator::new(
            &config,
            Arc::clone(&registry),
            executor,
            store,
            Arc::clone(&events),
        );
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            http,
            cache.clone(),
            Arc::clone(&events),
            config.health_timeout,
            config.health_check_interval,
        ));

        SyncClient {
            config,
            registry,
            cache,
            limiter,
            orchestrator,
            monitor,
            events,
            monitor_task: Mutex::new(None),
        }
    }
}

/// Explicit context owning every sync component.
pub struct SyncClient {
    config: SyncConfig,
    registry: Arc<SourceRegistry>,
    cache: CacheStore,
    limiter: RateLimiter,
    orchestrator: SyncOrchestrator,
    monitor: Arc<HealthMonitor>,
    events: Arc<dyn EventSink>,
    monitor_task: Mutex<Option<HealthMonitorHandle>>,
}

impl SyncClient {
    pub fn builder(sources: Vec<Source>) -> SyncClientBuilder {
        SyncClientBuilder::new(sources)
    }

    /// Start the health monitor. Calling again while it runs is a no-op.
    pub async fn initialize(&self) {
        let mut task = self.monitor_task.lock().await;
        if task.is_some() {
            return;
        }

        *task = Some(Arc::clone(&self.monitor).spawn());
        tracing::info!(
            sources = self.registry.len(),
            health_interval_ms = self.config.health_check_interval.as_millis() as u64,
            "sync client started"
        );
        self.events.emit(SyncEvent::Initialized);
    }

    pub async fn is_initialized(&self) -> bool {
        self.monitor_task.lock().await.is_some()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn sources(&self) -> Vec<Source> {
        self.registry.all()
    }

    pub async fn sync_source(&self, source_id: &SourceId) -> Result<SyncOutcome, SyncError> {
        self.orchestrator.sync_source(source_id).await
    }

    pub async fn sync_all_sources(&self) -> Result<SyncReport, SyncError> {
        self.orchestrator.sync_all_sources().await
    }

    pub async fn sync_all_sources_with_deadline(
        &self,
        deadline: Duration,
    ) -> Result<SyncReport, SyncError> {
        self.orchestrator
            .sync_all_sources_with_deadline(Some(deadline))
            .await
    }

    pub async fn perform_health_checks(&self) -> BTreeMap<SourceId, bool> {
        self.monitor.perform_health_checks().await
    }

    pub fn statistics(&self) -> SyncStatistics {
        SyncStatistics::from_sources(&self.registry.all())
    }

    /// Stop the monitor and drop cached responses and rate windows.
    pub async fn cleanup(&self) {
        let task = self.monitor_task.lock().await.take();
        if let Some(task) = task {
            task.shutdown().await;
        }
        self.cache.clear().await;
        self.limiter.clear();
        tracing::debug!("sync client cleaned up");
    }
}
