//! Typed lifecycle events and the sinks that observe them.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{SourceId, SyncOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Initialized,
    SyncStarted { source_id: SourceId },
    SyncCompleted(SyncOutcome),
    Error { context: String, cause: String },
    HealthChecked(BTreeMap<SourceId, bool>),
}

impl SyncEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::SyncStarted { .. } => "sync_started",
            Self::SyncCompleted(_) => "sync_completed",
            Self::Error { .. } => "error",
            Self::HealthChecked(_) => "health_checked",
        }
    }
}

/// Observer for [`SyncEvent`]s. Emitting must never block the sync path.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Writes every event to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SyncEvent) {
        log_event(&event);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: SyncEvent) {}
}

/// Fire-and-forget sink over a bounded channel. Events are dropped when full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<SyncEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SyncEvent) {
        if let Err(error) = self.sender.try_send(event) {
            tracing::debug!(%error, "dropping sync event");
        }
    }
}

/// Drain a [`ChannelSink`] receiver into the log until every sender is gone.
pub fn spawn_event_logger(mut receiver: mpsc::Receiver<SyncEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            log_event(&event);
        }
    })
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::Initialized => tracing::info!("sync client initialized"),
        SyncEvent::SyncStarted { source_id } => {
            tracing::info!(source_id = %source_id, "sync started");
        }
        SyncEvent::SyncCompleted(outcome) => tracing::info!(
            source_id = %outcome.source_id,
            run_id = %outcome.run_id,
            status = %outcome.status,
            jobs = outcome.jobs_updated,
            candidates = outcome.candidates_updated,
            duration_ms = outcome.duration_ms,
            "sync completed"
        ),
        SyncEvent::Error { context, cause } => {
            tracing::error!(context = %context, cause = %cause, "sync error");
        }
        SyncEvent::HealthChecked(results) => {
            let healthy = results.values().filter(|healthy| **healthy).count();
            tracing::info!(healthy, total = results.len(), "health check completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_drops_when_full() {
        let (sink, mut receiver) = ChannelSink::new(1);

        sink.emit(SyncEvent::Initialized);
        sink.emit(SyncEvent::Error {
            context: String::from("dropped"),
            cause: String::from("full"),
        });

        assert_eq!(receiver.recv().await, Some(SyncEvent::Initialized));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = SyncEvent::SyncStarted {
            source_id: SourceId::parse("qiwa").expect("valid id"),
        };

        let json = serde_json::to_value(&event).expect("serializable");
        assert_eq!(json["event"], "sync_started");
        assert_eq!(json["source_id"], "qiwa");
        assert_eq!(event.name(), "sync_started");
    }
}
