//! User-facing notices and view refreshes.
//!
//! Both collaborators are optional. Without a notifier, notices become
//! `tracing` events; without a refresher, nothing is refreshed.

use crate::protocol::SyncReport;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Display time of success and info notices
pub const SHORT_NOTICE: Duration = Duration::from_millis(3000);
/// Display time of warnings and errors
pub const LONG_NOTICE: Duration = Duration::from_millis(4000);

/// Severity of a notice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient message shown to the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    pub duration: Duration,
}

/// Shows transient messages
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, level: NoticeLevel, duration: Duration);
}

/// Fallback notifier writing notices to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, level: NoticeLevel, duration: Duration) {
        let millis = duration.as_millis() as u64;
        match level {
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(kind = ?level, duration_ms = millis, "[Notice] {}", message)
            }
            NoticeLevel::Warning => {
                tracing::warn!(duration_ms = millis, "[Notice] {}", message)
            }
            NoticeLevel::Error => {
                tracing::error!(duration_ms = millis, "[Notice] {}", message)
            }
        }
    }
}

/// Notifier that records every notice
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Messages received so far
    pub fn messages(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.message).collect()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, message: &str, level: NoticeLevel, duration: Duration) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(Notice {
                message: message.to_string(),
                level,
                duration,
            });
        }
    }
}

/// The view currently shown to the user
pub trait ViewRefresher: Send + Sync {
    /// Whether the view shows training session state
    fn depends_on_training_session(&self) -> bool;

    /// Reload the view
    fn refresh(&self);
}

/// Routes notices and refreshes to the optional collaborators
#[derive(Clone)]
pub struct SyncUi {
    notifier: Option<Arc<dyn Notifier>>,
    refresher: Option<Arc<dyn ViewRefresher>>,
    refresh_delay: Duration,
}

impl Default for SyncUi {
    fn default() -> Self {
        Self {
            notifier: None,
            refresher: None,
            refresh_delay: Duration::from_millis(1500),
        }
    }
}

impl SyncUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn ViewRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Show a notice, falling back to the log
    pub fn notify(&self, message: &str, level: NoticeLevel, duration: Duration) {
        match &self.notifier {
            Some(notifier) => notifier.notify(message, level, duration),
            None => TracingNotifier.notify(message, level, duration),
        }
    }

    /// Show the consolidated notice of a pass and schedule a refresh
    pub fn report(&self, report: &SyncReport) {
        if let Some((message, level)) = report_notice(report) {
            let duration = match level {
                NoticeLevel::Success | NoticeLevel::Info => SHORT_NOTICE,
                NoticeLevel::Warning | NoticeLevel::Error => LONG_NOTICE,
            };
            self.notify(&message, level, duration);
        }
        if report.synced > 0 {
            self.schedule_refresh();
        }
    }

    /// Refresh the view after the configured delay if it shows training state
    ///
    /// The check runs again when the delay elapses, so navigating away in
    /// the meantime cancels the refresh.
    pub fn schedule_refresh(&self) {
        let Some(refresher) = self.refresher.clone() else {
            return;
        };
        if !refresher.depends_on_training_session() {
            return;
        }
        let delay = self.refresh_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if refresher.depends_on_training_session() {
                tracing::debug!("[Sync] Refreshing training view");
                refresher.refresh();
            }
        });
    }
}

/// Text and level of the consolidated notice for a pass
pub fn report_notice(report: &SyncReport) -> Option<(String, NoticeLevel)> {
    match (report.synced, report.failed) {
        (0, 0) => None,
        (synced, 0) => Some((format!("✓ {}", sets_synchronized(synced)), NoticeLevel::Success)),
        (0, failed) => Some((
            format!("⚠ {} could not be synchronized", sets(failed)),
            NoticeLevel::Warning,
        )),
        (synced, failed) => Some((
            format!(
                "✓ {}, {} could not be synchronized",
                sets_synchronized(synced),
                failed
            ),
            NoticeLevel::Warning,
        )),
    }
}

fn sets(count: usize) -> String {
    if count == 1 {
        "1 set".to_string()
    } else {
        format!("{} sets", count)
    }
}

fn sets_synchronized(count: usize) -> String {
    format!("{} synchronized", sets(count))
}

/// Reminder shown when unsynchronized sets are found on startup
pub fn pending_notice(pending: usize) -> String {
    format!("{} waiting for synchronization", sets(pending))
}
