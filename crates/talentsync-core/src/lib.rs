//! Core contracts for talentsync.
//!
//! This crate contains:
//! - Canonical source, job and candidate models and validation
//! - The resilient request pipeline (credentials, rate limiting, caching, retry)
//! - Batched multi-source sync orchestration and health monitoring
//! - Typed lifecycle events, statistics and the persistence contract

pub mod cache;
pub mod client;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod events;
pub mod executor;
pub mod health;
pub mod http_client;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod source;
pub mod statistics;
pub mod store;
pub mod throttling;

pub use cache::{request_signature, CacheMode, CacheStats, CacheStore};
pub use client::{SyncClient, SyncClientBuilder};
pub use config::SyncConfig;
pub use credentials::{CredentialResolver, EnvCredentialResolver, StaticCredentials};
pub use domain::{
    parse_candidates, parse_jobs, CandidateRecord, CandidateStatus, JobRecord, JobStatus,
    OutcomeError, PayloadError, SourceId, SyncOutcome, SyncReport, SyncStatus, UtcDateTime,
};
pub use error::{ConfigError, ErrorKind, RequestError, StoreError, SyncError, ValidationError};
pub use events::{spawn_event_logger, ChannelSink, EventSink, NoopSink, SyncEvent, TracingSink};
pub use executor::{ApiRequest, ApiResponse, RequestExecutor};
pub use health::{HealthMonitor, HealthMonitorHandle};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    NoopHttpClient, ReqwestHttpClient,
};
pub use orchestrator::SyncOrchestrator;
pub use registry::{SourceRegistry, StatusChange};
pub use retry::{Backoff, RetryConfig};
pub use source::{Source, SourceCatalog, SourceCategory, SourceStatus};
pub use statistics::SyncStatistics;
pub use store::{MemoryStore, StoreFuture, SyncStore};
pub use talentsync_warehouse::{Warehouse, WarehouseConfig, WarehouseError, WarehouseSummary};
pub use throttling::{RateLimiter, RATE_WINDOW};
