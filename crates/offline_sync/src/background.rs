//! Background sync trigger.
//!
//! A fallback path for delivering records when no foreground pass runs.
//! The coordinator registers a named task with a `BackgroundHost`; the host
//! runs it once connectivity is available, and again with backoff when the
//! run is rejected.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{PassOutcome, SyncEvent};
use crate::transport::SyncTransport;
use connectivity::ConnectivityState;
use offline_store::RecordStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Tag of the background sync task
pub const SYNC_TAG: &str = "sync-training-data";

/// Deferred-execution facility of the host
#[trait_variant::make(Send)]
pub trait BackgroundHost: Send + Sync {
    /// Ask the host to run the task with this tag when it sees fit
    async fn register(&self, tag: &str) -> SyncResult<()>;
}

/// Work run by a background host
///
/// `Ok` resolves the task; `Err` asks the host to retry it later.
#[trait_variant::make(Send)]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, tag: &str) -> SyncResult<()>;
}

/// Retry policy of a deferred task
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts including the first run
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

struct HostShared<H> {
    handler: H,
    connectivity: watch::Receiver<ConnectivityState>,
    policy: RetryPolicy,
    pending: Mutex<HashSet<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

/// In-process background host on the tokio runtime
///
/// Registrations of a tag that is already waiting are merged. A task fires
/// once the connectivity watch reports online.
pub struct DeferredTaskHost<H> {
    shared: Arc<HostShared<H>>,
}

impl<H> Clone for DeferredTaskHost<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: TaskHandler + 'static> DeferredTaskHost<H> {
    pub fn new(handler: H, connectivity: watch::Receiver<ConnectivityState>) -> Self {
        Self::with_policy(handler, connectivity, RetryPolicy::default())
    }

    pub fn with_policy(
        handler: H,
        connectivity: watch::Receiver<ConnectivityState>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            shared: Arc::new(HostShared {
                handler,
                connectivity,
                policy,
                pending: Mutex::new(HashSet::new()),
                tasks: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Whether a task with this tag is waiting to fire
    pub fn is_pending(&self, tag: &str) -> bool {
        self.shared
            .pending
            .lock()
            .map(|p| p.contains(tag))
            .unwrap_or(false)
    }

    /// Refuse new registrations and cancel waiting tasks
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Ok(mut tasks) = self.shared.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        if let Ok(mut pending) = self.shared.pending.lock() {
            pending.clear();
        }
    }
}

impl<H> HostShared<H> {
    /// Wait for connectivity; false when the watch is gone
    async fn wait_online(&self) -> bool {
        let mut connectivity = self.connectivity.clone();
        let online = connectivity.wait_for(|state| state.is_online()).await.is_ok();
        online
    }

    fn take_pending(&self, tag: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(tag);
        }
    }
}

impl<H: TaskHandler> HostShared<H> {
    async fn fire(&self, tag: String) {
        for attempt in 1..=self.policy.max_attempts.max(1) {
            if !self.wait_online().await {
                tracing::debug!("[Background] Connectivity gone, dropping '{}'", tag);
                self.take_pending(&tag);
                return;
            }
            // Once fired, a new registration schedules another run
            self.take_pending(&tag);

            match self.handler.run(&tag).await {
                Ok(()) => return,
                Err(e) if attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        "[Background] '{}' failed (attempt {}), retrying in {:?}: {}",
                        tag,
                        attempt,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!("[Background] '{}' gave up after {} attempts: {}", tag, attempt, e);
                }
            }
        }
    }
}

impl<H: TaskHandler + 'static> BackgroundHost for DeferredTaskHost<H> {
    async fn register(&self, tag: &str) -> SyncResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SyncError::Registration("background host is closed".to_string()));
        }

        {
            let mut pending = self
                .shared
                .pending
                .lock()
                .map_err(|_| SyncError::Registration("host state poisoned".to_string()))?;
            if !pending.insert(tag.to_string()) {
                tracing::debug!("[Background] '{}' already registered", tag);
                return Ok(());
            }
        }

        tracing::debug!("[Background] Registered '{}'", tag);
        let shared = Arc::clone(&self.shared);
        let tag = tag.to_string();
        let task = tokio::spawn(async move { shared.fire(tag).await });

        if let Ok(mut tasks) = self.shared.tasks.lock() {
            tasks.retain(|t| !t.is_finished());
            tasks.push(task);
        }
        Ok(())
    }
}

/// Runs sync passes on behalf of a background host
pub struct BackgroundSync<S, T> {
    engine: Arc<SyncEngine<S, T>>,
    events: broadcast::Sender<SyncEvent>,
    tag: String,
}

impl<S, T> BackgroundSync<S, T> {
    pub fn new(engine: Arc<SyncEngine<S, T>>, events: broadcast::Sender<SyncEvent>) -> Self {
        Self {
            engine,
            events,
            tag: SYNC_TAG.to_string(),
        }
    }

    /// Answer to runs registered under a different tag
    ///
    /// Must match the tag the coordinator registers with.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

impl<S: RecordStore, T: SyncTransport> TaskHandler for BackgroundSync<S, T> {
    async fn run(&self, tag: &str) -> SyncResult<()> {
        if tag != self.tag {
            tracing::warn!("[Background] Unknown task '{}'", tag);
            return Ok(());
        }

        tracing::info!("[Background] Syncing training data");
        match self.engine.run_pass().await {
            Ok(PassOutcome::Completed(report)) => {
                if report.synced > 0 {
                    // Nobody listening is fine
                    let _ = self.events.send(SyncEvent::SyncComplete {
                        synced_count: report.synced,
                    });
                }
                Ok(())
            }
            Ok(PassOutcome::Coalesced) => Ok(()),
            Err(e) if e.is_retryable() => Err(e),
            Err(e) => {
                tracing::error!("[Background] Sync failed: {}", e);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Handler failing a fixed number of times before succeeding
    #[derive(Clone)]
    struct Flaky {
        failures: Arc<AtomicUsize>,
        runs: Arc<AtomicUsize>,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Self {
                failures: Arc::new(AtomicUsize::new(failures)),
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    impl TaskHandler for Flaky {
        async fn run(&self, _tag: &str) -> SyncResult<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                Err(SyncError::Transport("offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(2), Duration::from_secs(10));
        assert_eq!(policy.delay_after(3), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_connectivity() {
        let (state_tx, state_rx) = watch::channel(ConnectivityState::Offline);
        let handler = Flaky::new(0);
        let host = DeferredTaskHost::new(handler.clone(), state_rx);

        host.register(SYNC_TAG).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handler.runs(), 0);
        assert!(host.is_pending(SYNC_TAG));

        state_tx.send_replace(ConnectivityState::Online);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handler.runs(), 1);
        assert!(!host.is_pending(SYNC_TAG));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_registrations_merge() {
        let (_state_tx, state_rx) = watch::channel(ConnectivityState::Offline);
        let handler = Flaky::new(0);
        let host = DeferredTaskHost::new(handler.clone(), state_rx);

        host.register(SYNC_TAG).await.unwrap();
        host.register(SYNC_TAG).await.unwrap();
        assert_eq!(host.shared.tasks.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_backoff_then_gives_up() {
        let (_state_tx, state_rx) = watch::channel(ConnectivityState::Online);
        let handler = Flaky::new(10);
        let host = DeferredTaskHost::new(handler.clone(), state_rx);

        host.register(SYNC_TAG).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handler.runs(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handler.runs(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handler.runs(), 3);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(handler.runs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_host_refuses_registration() {
        let (_state_tx, state_rx) = watch::channel(ConnectivityState::Offline);
        let host = DeferredTaskHost::new(Flaky::new(0), state_rx);

        host.register(SYNC_TAG).await.unwrap();
        host.close();
        assert!(!host.is_pending(SYNC_TAG));
        assert!(matches!(
            host.register(SYNC_TAG).await,
            Err(SyncError::Registration(_))
        ));
    }
}
