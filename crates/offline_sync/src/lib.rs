//! Offline synchronization of training data.
//!
//! Sets logged on the device are kept in the local store until the server
//! acknowledges them. This crate delivers them once connectivity is
//! confirmed, either through an immediate foreground pass or through a
//! deferred background task.
//!
//! # Modules
//!
//! - `engine`: The sync pass and its overlap exclusion
//! - `background`: Background host, task handler and the in-process host
//! - `coordinator`: Reactions to connectivity changes and application operations
//! - `transport`: The `SyncTransport` trait and the HTTP transport
//! - `protocol`: Wire types and pass reports
//! - `validation`: Exercise reference checks
//! - `token`: Anti-forgery token sources
//! - `notifier`: Notices and view refreshes
//! - `settings`: Persistent settings
//! - `error`: Error types for syncing
//!
//! # Example
//!
//! ```ignore
//! use offline_sync::{Coordinator, CookieToken, HttpSyncTransport, SyncEngine};
//!
//! let transport = HttpSyncTransport::new(settings.server.sync_url(), timeout)?;
//! let engine = Arc::new(SyncEngine::new(store, transport, Arc::new(CookieToken::new(cookies))));
//! let coordinator = Arc::new(Coordinator::new(engine, host, monitor.watch_state()));
//! coordinator.announce_pending().await?;
//! let handle = coordinator.spawn(monitor.subscribe(), events.subscribe());
//! ```

pub mod background;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod protocol;
pub mod settings;
pub mod token;
pub mod transport;
pub mod validation;

pub use background::{
    BackgroundHost, BackgroundSync, DeferredTaskHost, RetryPolicy, TaskHandler, SYNC_TAG,
};
pub use coordinator::{Coordinator, CoordinatorHandle, OfflineStatusInfo};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use notifier::{
    CollectingNotifier, Notice, NoticeLevel, Notifier, SyncUi, TracingNotifier, ViewRefresher,
};
pub use protocol::{PassOutcome, RecordOutcome, SyncEvent, SyncReport, SyncResponse};
pub use settings::{
    ConnectivitySettings, ServerSettings, SettingsManager, StorageSettings, SyncBehaviorSettings,
    SyncSettings,
};
pub use token::{CookieToken, StaticToken, TokenSource};
pub use transport::{HttpSyncTransport, SyncTransport, CSRF_HEADER};
pub use validation::{has_exercise_ref, EXERCISE_REF_FIELD};
