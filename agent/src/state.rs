//! Wiring of the sync components

use anyhow::{Context, Result};
use connectivity::{ConnectivityMonitor, HttpProbe, MonitorConfig, MonitorHandle};
use offline_store::{FileRecordStore, RecordStore};
use offline_sync::{
    BackgroundSync, CookieToken, Coordinator, CoordinatorHandle, DeferredTaskHost,
    HttpSyncTransport, RetryPolicy, SyncEngine, SyncEvent, SyncSettings, SyncUi,
};
use std::sync::Arc;
use tokio::sync::broadcast;

pub type Engine = SyncEngine<FileRecordStore, HttpSyncTransport>;
pub type Host = DeferredTaskHost<BackgroundSync<FileRecordStore, HttpSyncTransport>>;
pub type AppCoordinator = Coordinator<FileRecordStore, HttpSyncTransport, Host>;

/// Running sync components
pub struct AppState {
    pub store: Arc<FileRecordStore>,
    pub token: Arc<CookieToken>,
    pub coordinator: Arc<AppCoordinator>,
    pub monitor: MonitorHandle,
    host: Host,
    coordinator_task: CoordinatorHandle,
}

impl AppState {
    /// Build and start every component
    pub async fn start(settings: &SyncSettings, cookies: String) -> Result<Self> {
        let store = Arc::new(FileRecordStore::with_name(
            &settings.storage.data_dir,
            settings.storage.database_name.clone(),
        ));
        store
            .open()
            .await
            .with_context(|| format!("opening local store in {:?}", settings.storage.data_dir))?;
        tracing::info!("Local store: {:?}", store.database_path());

        let token = Arc::new(CookieToken::with_name(cookies, settings.server.csrf_cookie.clone()));

        let transport = HttpSyncTransport::new(settings.server.sync_url(), settings.sync.request_timeout())
            .context("building sync transport")?;
        let ui = SyncUi::new().with_refresh_delay(settings.sync.refresh_delay());
        let engine: Arc<Engine> =
            Arc::new(SyncEngine::new(store.clone(), transport, token.clone()).with_ui(ui));

        let probe = HttpProbe::with_timeout(settings.server.probe_url(), settings.connectivity.probe_timeout())
            .context("building connectivity probe")?;
        let monitor = ConnectivityMonitor::new(
            probe,
            MonitorConfig::default().with_probe_interval(settings.connectivity.probe_interval()),
        );

        let (events_tx, events) = broadcast::channel::<SyncEvent>(16);
        let policy = RetryPolicy {
            max_attempts: settings.sync.retry_attempts,
            base_delay: settings.sync.retry_base_delay(),
        };
        let host = DeferredTaskHost::with_policy(
            BackgroundSync::new(engine.clone(), events_tx)
                .with_tag(settings.sync.background_tag.clone()),
            monitor.watch_state(),
            policy,
        );

        let coordinator = Arc::new(
            Coordinator::new(engine, host.clone(), monitor.watch_state())
                .with_tag(settings.sync.background_tag.clone()),
        );

        coordinator
            .announce_pending()
            .await
            .context("reading pending sets")?;

        // Subscribe before spawning so the startup probe is seen
        let transitions = monitor.subscribe();
        let coordinator_task = coordinator.clone().spawn(transitions, events);
        let monitor = monitor.spawn();

        Ok(Self {
            store,
            token,
            coordinator,
            monitor,
            host,
            coordinator_task,
        })
    }

    /// Stop every component and flush the store
    pub async fn shutdown(self) -> Result<()> {
        self.host.close();
        self.coordinator_task.shutdown().await;
        self.monitor.shutdown().await;
        self.store.close().await.context("closing local store")?;
        tracing::info!("Sync agent stopped");
        Ok(())
    }
}
