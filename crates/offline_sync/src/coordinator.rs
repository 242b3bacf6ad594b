//! Offline sync coordinator.
//!
//! Ties the connectivity monitor, the sync engine and the background host
//! together and exposes the operations the application calls.
//!
//! # Features
//!
//! - Immediate sync pass on every confirmed reconnect
//! - Background registration as a fallback path
//! - Connection notices and relay of background completions
//! - Pending-set reminder on startup
//! - UI status information

use crate::background::{BackgroundHost, SYNC_TAG};
use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::notifier::{pending_notice, NoticeLevel, LONG_NOTICE, SHORT_NOTICE};
use crate::protocol::{PassOutcome, SyncEvent, SyncReport};
use crate::transport::SyncTransport;
use chrono::Utc;
use connectivity::{ConnectivityState, Reachability, Transition};
use offline_store::{Collection, Payload, RecordId, RecordStore, StoredRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Coordinates offline storage and synchronization
pub struct Coordinator<S, T, H> {
    engine: Arc<SyncEngine<S, T>>,
    host: H,
    connectivity: watch::Receiver<ConnectivityState>,
    tag: String,
}

impl<S, T, H> Coordinator<S, T, H>
where
    S: RecordStore + 'static,
    T: SyncTransport + 'static,
    H: BackgroundHost,
{
    pub fn new(
        engine: Arc<SyncEngine<S, T>>,
        host: H,
        connectivity: watch::Receiver<ConnectivityState>,
    ) -> Self {
        Self {
            engine,
            host,
            connectivity,
            tag: SYNC_TAG.to_string(),
        }
    }

    /// Register background runs under a different tag
    ///
    /// The host's `BackgroundSync` needs the same tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn engine(&self) -> &Arc<SyncEngine<S, T>> {
        &self.engine
    }

    fn store(&self) -> &Arc<S> {
        self.engine.store()
    }

    /// Current connectivity state
    pub fn connectivity(&self) -> ConnectivityState {
        *self.connectivity.borrow()
    }

    // ========== Application operations ==========

    /// Store a logged set and push it right away when online
    pub async fn log_set(&self, payload: Payload) -> SyncResult<RecordId> {
        let id = self.store().insert(Collection::TrainingData, payload).await?;
        tracing::info!("[Offline] Saved set {} locally", id);

        if self.connectivity().is_online() {
            let engine = Arc::clone(&self.engine);
            tokio::spawn(async move {
                engine.sync_now().await;
            });
        }
        Ok(id)
    }

    /// Number of sets not yet acknowledged by the server
    pub async fn pending_count(&self) -> SyncResult<usize> {
        Ok(self
            .store()
            .filter_by_synced(Collection::TrainingData, false)
            .await?
            .len())
    }

    /// Delete sets the server already acknowledged
    pub async fn clear_synced(&self) -> SyncResult<usize> {
        let removed = self
            .store()
            .clear_where_synced(Collection::TrainingData)
            .await?;
        tracing::info!("[Offline] Cleared {} synced sets", removed);
        Ok(removed)
    }

    /// Run a foreground pass now
    pub async fn sync_now(&self) -> Option<PassOutcome> {
        self.engine.sync_now().await
    }

    /// Replace cached definitions of a lookup collection
    pub async fn cache_definitions(
        &self,
        collection: Collection,
        definitions: Vec<Payload>,
    ) -> SyncResult<usize> {
        let count = definitions.len();
        for definition in definitions {
            self.store().put(collection, definition).await?;
        }
        tracing::debug!("[Offline] Cached {} {}", count, collection);
        Ok(count)
    }

    /// Cached definitions of a lookup collection
    pub async fn cached_definitions(&self, collection: Collection) -> SyncResult<Vec<StoredRecord>> {
        Ok(self.store().get_all(collection).await?)
    }

    /// Remind the user of sets left from an earlier session
    pub async fn announce_pending(&self) -> SyncResult<usize> {
        let pending = self.pending_count().await?;
        if pending > 0 {
            tracing::info!("[Offline] {} sets waiting for sync", pending);
            self.engine
                .ui()
                .notify(&pending_notice(pending), NoticeLevel::Info, LONG_NOTICE);
        }
        Ok(pending)
    }

    /// Status for an offline indicator
    pub async fn status_info(&self) -> SyncResult<OfflineStatusInfo> {
        let state = self.connectivity();
        let pending = self.pending_count().await?;
        let syncing = self.engine.is_syncing();
        let time_since_sync = self
            .engine
            .last_success()
            .map(|at| (Utc::now() - at).num_seconds().max(0) as u64);

        let status_message = if syncing {
            "Syncing changes...".to_string()
        } else {
            match state {
                ConnectivityState::Online if pending > 0 => {
                    format!("Connected - {} pending changes", pending)
                }
                ConnectivityState::Online => "Connected".to_string(),
                ConnectivityState::Offline if pending > 0 => {
                    format!("Offline - {} pending changes", pending)
                }
                ConnectivityState::Offline => "Offline".to_string(),
                ConnectivityState::Probing => "Checking connection...".to_string(),
                ConnectivityState::Unknown => "Connecting...".to_string(),
            }
        };

        Ok(OfflineStatusInfo {
            state,
            syncing,
            pending_changes: pending,
            time_since_sync,
            status_message,
        })
    }

    // ========== Reactions ==========

    /// React to a confirmed connectivity change
    pub async fn handle_transition(&self, transition: Transition) {
        match transition.to {
            Reachability::Online => {
                if transition.from == Some(Reachability::Offline) {
                    self.engine
                        .ui()
                        .notify("✓ Connection restored", NoticeLevel::Success, SHORT_NOTICE);
                }
                self.engine.sync_now().await;

                if let Err(e) = self.host.register(&self.tag).await {
                    tracing::warn!("[Offline] Background sync registration failed: {}", e);
                }
            }
            Reachability::Offline => {
                if transition.from == Some(Reachability::Online) {
                    self.engine
                        .ui()
                        .notify("⚠ Offline mode active", NoticeLevel::Warning, SHORT_NOTICE);
                }
            }
        }
    }

    /// React to a message from a background pass
    pub fn handle_event(&self, event: SyncEvent) {
        match event {
            SyncEvent::SyncComplete { synced_count } => {
                tracing::info!("[Offline] Background sync completed: {} sets", synced_count);
                self.engine.ui().report(&SyncReport {
                    synced: synced_count,
                    ..SyncReport::default()
                });
            }
        }
    }
}

impl<S, T, H> Coordinator<S, T, H>
where
    S: RecordStore + 'static,
    T: SyncTransport + 'static,
    H: BackgroundHost + 'static,
{
    /// Run the reaction loop on the tokio runtime
    pub fn spawn(
        self: Arc<Self>,
        mut transitions: broadcast::Receiver<Transition>,
        mut events: broadcast::Receiver<SyncEvent>,
    ) -> CoordinatorHandle {
        let (shutdown_tx, mut shutdown) = watch::channel(false);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    transition = transitions.recv() => match transition {
                        Ok(transition) => self.handle_transition(transition).await,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("[Offline] Missed {} connectivity transitions", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    event = events.recv() => match event {
                        Ok(event) => self.handle_event(event),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("[Offline] Missed {} background events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!("[Offline] Coordinator stopped");
        });

        CoordinatorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running coordinator loop
pub struct CoordinatorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Stop the loop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("[Offline] Coordinator task failed: {}", e);
        }
    }
}

/// UI display information for offline status
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OfflineStatusInfo {
    pub state: ConnectivityState,
    pub syncing: bool,
    pub pending_changes: usize,
    pub time_since_sync: Option<u64>,
    pub status_message: String,
}

impl OfflineStatusInfo {
    /// Check if the indicator should be shown
    ///
    /// Returns true if not online or has pending changes
    pub fn should_show(&self) -> bool {
        !self.state.is_online() || self.pending_changes > 0
    }

    /// Get a short status string
    pub fn short_status(&self) -> &'static str {
        if self.syncing {
            "Syncing"
        } else {
            self.state.label()
        }
    }

    /// Format time since sync for display
    pub fn formatted_time_since_sync(&self) -> Option<String> {
        self.time_since_sync.map(|seconds| {
            if seconds < 60 {
                format!("{}s ago", seconds)
            } else if seconds < 3600 {
                format!("{}m ago", seconds / 60)
            } else if seconds < 86400 {
                format!("{}h ago", seconds / 3600)
            } else {
                format!("{}d ago", seconds / 86400)
            }
        })
    }
}
