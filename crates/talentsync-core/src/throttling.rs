use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::SourceId;

/// Length of the trailing window every ceiling applies to.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

type Window = Arc<tokio::sync::Mutex<VecDeque<Instant>>>;

/// Per-source sliding-window limiter.
///
/// Each source keeps the timestamps of requests admitted during the last
/// [`RATE_WINDOW`]. A caller that finds the window full waits until the oldest
/// timestamp ages out. The per-source lock is held while waiting, so callers
/// for the same source are admitted in arrival order.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    default_limit: u32,
    windows: Arc<Mutex<HashMap<SourceId, Window>>>,
}

impl RateLimiter {
    pub fn new(default_limit: u32) -> Self {
        Self {
            default_limit: default_limit.max(1),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    /// Wait until `source_id` may issue one more request, then record it.
    ///
    /// `limit` overrides the default ceiling for this source.
    pub async fn acquire(&self, source_id: &SourceId, limit: Option<u32>) {
        let ceiling = usize::try_from(limit.unwrap_or(self.default_limit).max(1))
            .unwrap_or(usize::MAX);
        let window = self.window(source_id);
        let mut admitted = window.lock().await;

        loop {
            let now = Instant::now();
            prune(&mut admitted, now);
            if admitted.len() < ceiling {
                admitted.push_back(now);
                return;
            }

            let Some(oldest) = admitted.front().copied() else {
                continue;
            };
            let wait = RATE_WINDOW.saturating_sub(now.saturating_duration_since(oldest));
            tracing::debug!(
                source = %source_id,
                wait_ms = wait.as_millis() as u64,
                ceiling,
                "rate ceiling reached, waiting for window to slide"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests recorded for `source_id` in the current window.
    pub async fn window_len(&self, source_id: &SourceId) -> usize {
        let window = self.window(source_id);
        let mut admitted = window.lock().await;
        prune(&mut admitted, Instant::now());
        admitted.len()
    }

    /// Forget the history of one source.
    pub async fn reset(&self, source_id: &SourceId) {
        let existing = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source_id)
            .cloned();
        if let Some(window) = existing {
            window.lock().await.clear();
        }
    }

    pub fn clear(&self) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn window(&self, source_id: &SourceId) -> Window {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(windows.entry(source_id.clone()).or_default())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(100)
    }
}

fn prune(admitted: &mut VecDeque<Instant>, now: Instant) {
    while admitted
        .front()
        .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= RATE_WINDOW)
    {
        admitted.pop_front();
    }
}
