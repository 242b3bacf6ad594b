//! Sync engine.
//!
//! One pass reads the unsynced training records, purges records without a
//! usable exercise reference, submits the rest as one batch and marks every
//! acknowledged record as synced. Records the server rejected stay unsynced
//! and are sent again by a later pass.
//!
//! At most one pass runs per engine. A trigger arriving while a pass is
//! running is coalesced into it: the running pass does one more round
//! before it finishes, so records logged in the meantime are not left
//! behind.

use crate::error::{SyncError, SyncResult};
use crate::notifier::{NoticeLevel, SyncUi, LONG_NOTICE};
use crate::protocol::{PassOutcome, SyncReport};
use crate::token::TokenSource;
use crate::transport::SyncTransport;
use crate::validation;
use chrono::{DateTime, TimeZone, Utc};
use offline_store::{Collection, RecordId, RecordStore, StorageError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Clears the in-flight flag when a pass ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Delivers unsynced training records to the server
pub struct SyncEngine<S, T> {
    store: Arc<S>,
    transport: T,
    token: Arc<dyn TokenSource>,
    ui: SyncUi,
    in_flight: AtomicBool,
    rerun_requested: AtomicBool,
    /// Millis of the last pass that synced something, 0 if none
    last_success: AtomicI64,
    /// A fatal storage error was already shown to the user
    fatal_reported: AtomicBool,
}

impl<S: RecordStore, T: SyncTransport> SyncEngine<S, T> {
    /// Create an engine without UI collaborators
    pub fn new(store: Arc<S>, transport: T, token: Arc<dyn TokenSource>) -> Self {
        Self {
            store,
            transport,
            token,
            ui: SyncUi::default(),
            in_flight: AtomicBool::new(false),
            rerun_requested: AtomicBool::new(false),
            last_success: AtomicI64::new(0),
            fatal_reported: AtomicBool::new(false),
        }
    }

    /// Route notices and refreshes through the given UI
    pub fn with_ui(mut self, ui: SyncUi) -> Self {
        self.ui = ui;
        self
    }

    /// The store this engine reads from
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The UI this engine reports to
    pub fn ui(&self) -> &SyncUi {
        &self.ui
    }

    /// Whether a pass is running
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Time of the last pass that synchronized at least one record
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        match self.last_success.load(Ordering::SeqCst) {
            0 => None,
            millis => Utc.timestamp_millis_opt(millis).single(),
        }
    }

    /// Run a pass and report it to the user
    ///
    /// Never fails: errors are logged and turned into notices. Transport
    /// failures stay silent since the next trigger retries them. Returns
    /// `None` when the pass failed.
    pub async fn sync_now(&self) -> Option<PassOutcome> {
        match self.run_pass().await {
            Ok(outcome) => {
                self.fatal_reported.store(false, Ordering::SeqCst);
                if let PassOutcome::Completed(report) = outcome {
                    self.ui.report(&report);
                }
                Some(outcome)
            }
            Err(SyncError::Transport(e)) => {
                tracing::warn!("[Sync] Server unreachable, will retry: {}", e);
                None
            }
            Err(SyncError::ServerRejection { status, body }) => {
                tracing::error!("[Sync] Server rejected sync ({}): {}", status, body);
                self.ui.notify(
                    &format!("Sync failed: {}", status),
                    NoticeLevel::Error,
                    LONG_NOTICE,
                );
                None
            }
            Err(e) if e.is_fatal() && self.fatal_reported.swap(true, Ordering::SeqCst) => {
                tracing::debug!("[Sync] Storage still unavailable: {}", e);
                None
            }
            Err(e) => {
                tracing::error!("[Sync] Sync error: {}", e);
                self.ui
                    .notify(&format!("Sync error: {}", e), NoticeLevel::Error, LONG_NOTICE);
                None
            }
        }
    }

    /// Run a pass, or join the one already running
    ///
    /// Fails only when the first round fails. A failing follow-up round
    /// is logged and the pass completes with what earlier rounds synced;
    /// its records stay unsynced for the next trigger.
    pub async fn run_pass(&self) -> SyncResult<PassOutcome> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.rerun_requested.store(true, Ordering::SeqCst);
            tracing::debug!("[Sync] Pass already running, request coalesced");
            return Ok(PassOutcome::Coalesced);
        }
        let mut guard = InFlight(&self.in_flight);

        let mut total = SyncReport::default();
        let mut rounds = 0u32;
        loop {
            self.rerun_requested.store(false, Ordering::SeqCst);
            match self.run_round().await {
                Ok(report) => total += report,
                Err(e) if rounds > 0 => {
                    tracing::error!(
                        "[Sync] Follow-up round failed, keeping earlier results: {}",
                        e
                    );
                    return Ok(PassOutcome::Completed(total));
                }
                Err(e) => return Err(e),
            }
            rounds += 1;

            if self.rerun_requested.load(Ordering::SeqCst) {
                continue;
            }
            drop(guard);

            // A request may have been coalesced after the check above
            if self.rerun_requested.load(Ordering::SeqCst)
                && !self.in_flight.swap(true, Ordering::SeqCst)
            {
                guard = InFlight(&self.in_flight);
                continue;
            }
            return Ok(PassOutcome::Completed(total));
        }
    }

    async fn run_round(&self) -> SyncResult<SyncReport> {
        let pass_id = Uuid::new_v4();
        let span = tracing::info_span!("sync_pass", %pass_id);
        async {
            let report = self.sync_round().await?;
            if report.synced > 0 {
                self.last_success
                    .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
            }
            Ok::<_, SyncError>(report)
        }
        .instrument(span)
        .await
    }

    async fn sync_round(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();

        let unsynced = self
            .store
            .filter_by_synced(Collection::TrainingData, false)
            .await?;
        if unsynced.is_empty() {
            tracing::debug!("[Sync] No data to sync");
            return Ok(report);
        }

        let (valid, invalid) = validation::partition(unsynced);
        for record in &invalid {
            tracing::warn!(
                "[Sync] Skipping invalid item (no exercise reference): {}",
                record.id
            );
            self.tolerate_missing(
                record.id,
                self.store.delete_by_id(Collection::TrainingData, record.id).await,
            )?;
            report.skipped += 1;
        }

        if valid.is_empty() {
            tracing::info!("[Sync] No valid data to sync, purged {}", report.skipped);
            return Ok(report);
        }

        let token = self.token.token().unwrap_or_default();
        tracing::info!("[Sync] Syncing {} records", valid.len());
        let response = self.transport.submit(&valid, &token).await?;

        let submitted: HashSet<RecordId> = valid.iter().map(|r| r.id).collect();
        let mut answered = HashSet::new();
        for outcome in response.results {
            if !submitted.contains(&outcome.id) {
                tracing::warn!("[Sync] Ignoring outcome for unknown record {}", outcome.id);
                continue;
            }
            answered.insert(outcome.id);

            if outcome.success {
                let marked = self
                    .store
                    .mark_synced(Collection::TrainingData, outcome.id)
                    .await;
                if self.tolerate_missing(outcome.id, marked)? {
                    report.synced += 1;
                }
            } else {
                tracing::warn!(
                    "[Sync] Failed to sync item {}: {}",
                    outcome.id,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
                report.failed += 1;
            }
        }

        for id in submitted.difference(&answered) {
            tracing::warn!("[Sync] No outcome for record {}, left unsynced", id);
        }

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            "[Sync] Pass finished"
        );
        Ok(report)
    }

    /// A record vanishing under a pass only affects that record
    ///
    /// Returns whether the operation took effect.
    fn tolerate_missing(&self, id: RecordId, result: Result<(), StorageError>) -> SyncResult<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(StorageError::RecordNotFound { .. }) => {
                tracing::warn!("[Sync] Record {} disappeared during sync", id);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::CollectingNotifier;
    use crate::protocol::{RecordOutcome, SyncResponse};
    use crate::token::StaticToken;
    use offline_store::{MemoryRecordStore, Payload};
    use serde_json::json;
    use std::sync::Mutex;

    /// Transport accepting every record and remembering the batches
    #[derive(Default)]
    struct AcceptAll {
        batches: Mutex<Vec<Vec<RecordId>>>,
        tokens: Mutex<Vec<String>>,
    }

    impl SyncTransport for AcceptAll {
        async fn submit(
            &self,
            batch: &[offline_store::StoredRecord],
            token: &str,
        ) -> SyncResult<SyncResponse> {
            self.batches
                .lock()
                .unwrap()
                .push(batch.iter().map(|r| r.id).collect());
            self.tokens.lock().unwrap().push(token.to_string());
            Ok(SyncResponse::from_outcomes(
                batch.iter().map(|r| RecordOutcome::accepted(r.id)).collect(),
            ))
        }
    }

    /// Transport that always fails the same way
    struct Failing(fn() -> SyncError);

    impl SyncTransport for Failing {
        async fn submit(
            &self,
            _batch: &[offline_store::StoredRecord],
            _token: &str,
        ) -> SyncResult<SyncResponse> {
            Err((self.0)())
        }
    }

    fn set(exercise: serde_json::Value) -> Payload {
        let mut payload = Payload::new();
        payload.insert("uebung_id".to_string(), exercise);
        payload.insert("wiederholungen".to_string(), json!(10));
        payload
    }

    #[tokio::test]
    async fn test_pass_marks_acknowledged_records() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(Collection::TrainingData, set(json!(1))).await.unwrap();
        store.insert(Collection::TrainingData, set(json!("2"))).await.unwrap();

        let engine = SyncEngine::new(store.clone(), AcceptAll::default(), Arc::new(StaticToken::new("t")));
        let outcome = engine.run_pass().await.unwrap();

        assert_eq!(
            outcome,
            PassOutcome::Completed(SyncReport { synced: 2, failed: 0, skipped: 0 })
        );
        assert!(store
            .filter_by_synced(Collection::TrainingData, false)
            .await
            .unwrap()
            .is_empty());
        assert!(engine.last_success().is_some());
        assert_eq!(engine.transport.tokens.lock().unwrap()[0], "t");
    }

    #[tokio::test]
    async fn test_missing_token_sends_empty_string() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(Collection::TrainingData, set(json!(1))).await.unwrap();

        let engine = SyncEngine::new(store, AcceptAll::default(), Arc::new(StaticToken::none()));
        engine.run_pass().await.unwrap();
        assert_eq!(engine.transport.tokens.lock().unwrap()[0], "");
    }

    #[tokio::test]
    async fn test_rejection_notifies_and_leaves_records() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(Collection::TrainingData, set(json!(1))).await.unwrap();

        let notifier = Arc::new(CollectingNotifier::new());
        let engine = SyncEngine::new(
            store.clone(),
            Failing(|| SyncError::ServerRejection { status: 500, body: String::new() }),
            Arc::new(StaticToken::none()),
        )
        .with_ui(SyncUi::new().with_notifier(notifier.clone()));

        assert_eq!(engine.sync_now().await, None);
        assert_eq!(notifier.messages(), vec!["Sync failed: 500".to_string()]);
        assert_eq!(notifier.notices()[0].level, NoticeLevel::Error);
        assert_eq!(
            store.filter_by_synced(Collection::TrainingData, false).await.unwrap().len(),
            1
        );
        assert!(!engine.is_syncing());
    }

    #[tokio::test]
    async fn test_transport_failure_is_silent() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(Collection::TrainingData, set(json!(1))).await.unwrap();

        let notifier = Arc::new(CollectingNotifier::new());
        let engine = SyncEngine::new(
            store,
            Failing(|| SyncError::Transport("connection reset".into())),
            Arc::new(StaticToken::none()),
        )
        .with_ui(SyncUi::new().with_notifier(notifier.clone()));

        assert_eq!(engine.sync_now().await, None);
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_becomes_notice() {
        let store = Arc::new(MemoryRecordStore::unavailable());
        let notifier = Arc::new(CollectingNotifier::new());
        let engine = SyncEngine::new(store, AcceptAll::default(), Arc::new(StaticToken::none()))
            .with_ui(SyncUi::new().with_notifier(notifier.clone()));

        assert_eq!(engine.sync_now().await, None);
        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Sync error: "));
    }

    #[tokio::test]
    async fn test_storage_failure_is_shown_once() {
        let store = Arc::new(MemoryRecordStore::unavailable());
        let notifier = Arc::new(CollectingNotifier::new());
        let engine = SyncEngine::new(store, AcceptAll::default(), Arc::new(StaticToken::none()))
            .with_ui(SyncUi::new().with_notifier(notifier.clone()));

        for _ in 0..3 {
            assert_eq!(engine.sync_now().await, None);
        }
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_success_notice() {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(Collection::TrainingData, set(json!(1))).await.unwrap();

        let notifier = Arc::new(CollectingNotifier::new());
        let engine = SyncEngine::new(store, AcceptAll::default(), Arc::new(StaticToken::none()))
            .with_ui(SyncUi::new().with_notifier(notifier.clone()));

        engine.sync_now().await;
        assert_eq!(notifier.messages(), vec!["✓ 1 set synchronized".to_string()]);
    }
}
