//! Sync settings management
//!
//! Settings are kept in one JSON file. Every section has defaults, so a
//! missing or partially written file still yields a usable configuration.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main settings container
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SyncSettings {
    /// Server endpoints
    pub server: ServerSettings,
    /// Connectivity probing
    pub connectivity: ConnectivitySettings,
    /// Sync passes and background retries
    pub sync: SyncBehaviorSettings,
    /// Local storage
    pub storage: StorageSettings,
}

/// Server endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Origin of the application, e.g. "https://homegym.example"
    pub base_url: String,
    /// Path of the sync endpoint
    pub sync_path: String,
    /// Path of the cheap resource used for connectivity probes
    pub probe_path: String,
    /// Name of the cookie carrying the anti-forgery token
    pub csrf_cookie: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            sync_path: "/api/sync-offline/".to_string(),
            probe_path: "/static/core/manifest.json".to_string(),
            csrf_cookie: "csrftoken".to_string(),
        }
    }
}

impl ServerSettings {
    /// Full URL of the sync endpoint
    pub fn sync_url(&self) -> String {
        join_url(&self.base_url, &self.sync_path)
    }

    /// Full URL of the probe target
    pub fn probe_url(&self) -> String {
        join_url(&self.base_url, &self.probe_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Connectivity probe settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectivitySettings {
    /// Bound on a single probe in milliseconds
    pub probe_timeout_ms: u64,
    /// Interval between periodic probes in seconds
    pub probe_interval_seconds: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5_000,
            probe_interval_seconds: 30,
        }
    }
}

impl ConnectivitySettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_seconds.max(1))
    }
}

/// Sync pass settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncBehaviorSettings {
    /// Bound on the sync request in milliseconds
    pub request_timeout_ms: u64,
    /// Delay before refreshing a training view after a successful pass
    pub refresh_delay_ms: u64,
    /// Tag under which the background trigger is registered
    pub background_tag: String,
    /// Maximum attempts of one background run
    pub retry_attempts: u32,
    /// Delay before the first background retry; doubles per attempt
    pub retry_base_delay_ms: u64,
}

impl Default for SyncBehaviorSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            refresh_delay_ms: 1_500,
            background_tag: crate::background::SYNC_TAG.to_string(),
            retry_attempts: 3,
            retry_base_delay_ms: 5_000,
        }
    }
}

impl SyncBehaviorSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Local storage settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding the database file
    pub data_dir: PathBuf,
    /// Database name, also the file stem
    pub database_name: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("homegym-data"),
            database_name: offline_store::DATABASE_NAME.to_string(),
        }
    }
}

/// Settings manager for loading, saving, and updating sync settings
pub struct SettingsManager {
    /// Path to the settings file
    settings_path: PathBuf,
    /// Current settings (cached)
    current: SyncSettings,
}

impl SettingsManager {
    /// Create a settings manager for the given file
    pub fn new(settings_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
            current: SyncSettings::default(),
        }
    }

    /// Get the path to the settings file
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, or fall back to defaults
    pub async fn load(&mut self) -> SyncResult<&SyncSettings> {
        if tokio::fs::try_exists(&self.settings_path).await? {
            let content = tokio::fs::read_to_string(&self.settings_path).await?;
            self.current = Self::parse(&content);
        } else {
            self.current = SyncSettings::default();
        }
        Ok(&self.current)
    }

    /// Load settings synchronously (for use during startup)
    pub fn load_sync(&mut self) -> SyncResult<&SyncSettings> {
        if self.settings_path.exists() {
            let content = std::fs::read_to_string(&self.settings_path)?;
            self.current = Self::parse(&content);
        } else {
            self.current = SyncSettings::default();
        }
        Ok(&self.current)
    }

    fn parse(content: &str) -> SyncSettings {
        match serde_json::from_str::<SyncSettings>(content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to parse settings file, using defaults: {}", e);
                SyncSettings::default()
            }
        }
    }

    fn render(&self) -> SyncResult<String> {
        serde_json::to_string_pretty(&self.current).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Save current settings to disk
    pub async fn save(&self) -> SyncResult<()> {
        if let Some(parent) = self.settings_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.settings_path, self.render()?).await?;
        Ok(())
    }

    /// Save settings synchronously
    pub fn save_sync(&self) -> SyncResult<()> {
        if let Some(parent) = self.settings_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.settings_path, self.render()?)?;
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &SyncSettings {
        &self.current
    }

    /// Update settings and save to disk
    pub async fn update(&mut self, settings: SyncSettings) -> SyncResult<()> {
        self.current = settings;
        self.save().await
    }

    /// Update settings synchronously
    pub fn update_sync(&mut self, settings: SyncSettings) -> SyncResult<()> {
        self.current = settings;
        self.save_sync()
    }

    /// Reset settings to defaults and save
    pub async fn reset(&mut self) -> SyncResult<&SyncSettings> {
        self.current = SyncSettings::default();
        self.save().await?;
        Ok(&self.current)
    }

    /// Reset settings to defaults synchronously
    pub fn reset_sync(&mut self) -> SyncResult<&SyncSettings> {
        self.current = SyncSettings::default();
        self.save_sync()?;
        Ok(&self.current)
    }
}
