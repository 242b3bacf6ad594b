//! Console commands
//!
//! One command per line:
//!
//! ```text
//! log {"uebung_id": 3, "gewicht": 80, "wiederholungen": 8}
//! online | offline        forward a host network event
//! sync                    run a pass now
//! status | pending        show sync state
//! clear-synced            drop acknowledged sets
//! cookie <header>         replace the cookie string
//! quit
//! ```

use crate::state::AppState;
use anyhow::{anyhow, bail, Result};
use connectivity::HostSignal;
use offline_store::Payload;
use offline_sync::{OfflineStatusInfo, PassOutcome};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Log(Payload),
    Online,
    Offline,
    Sync,
    Status,
    Pending,
    ClearSynced,
    Cookie(String),
    Quit,
}

impl Command {
    /// Parse one console line; `None` for blank lines
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((line, ""));

        let command = match name {
            "log" => {
                let value: serde_json::Value = serde_json::from_str(rest)
                    .map_err(|e| anyhow!("log expects a JSON object: {}", e))?;
                match value {
                    serde_json::Value::Object(payload) => Command::Log(payload),
                    _ => bail!("log expects a JSON object"),
                }
            }
            "online" => Command::Online,
            "offline" => Command::Offline,
            "sync" => Command::Sync,
            "status" => Command::Status,
            "pending" => Command::Pending,
            "clear-synced" => Command::ClearSynced,
            "cookie" => Command::Cookie(rest.to_string()),
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command '{}'", other),
        };
        Ok(Some(command))
    }
}

/// Run a command; returns false when the console should stop
pub async fn execute(state: &AppState, command: Command) -> Result<bool> {
    match command {
        Command::Log(payload) => {
            let id = state.coordinator.log_set(payload).await?;
            println!("saved set {}", id);
        }
        Command::Online => state.monitor.signal(HostSignal::BecameOnline).await,
        Command::Offline => state.monitor.signal(HostSignal::BecameOffline).await,
        Command::Sync => match state.coordinator.sync_now().await {
            Some(PassOutcome::Completed(report)) => println!(
                "synced {}, failed {}, skipped {}",
                report.synced, report.failed, report.skipped
            ),
            Some(PassOutcome::Coalesced) => println!("a pass is already running"),
            None => println!("sync did not complete, see log"),
        },
        Command::Status => {
            let info = state.coordinator.status_info().await?;
            println!("{}", describe(&info));
        }
        Command::Pending => {
            println!("{}", state.coordinator.pending_count().await?);
        }
        Command::ClearSynced => {
            let removed = state.coordinator.clear_synced().await?;
            println!("removed {} synced sets", removed);
        }
        Command::Cookie(cookies) => {
            state.token.set_cookies(cookies);
            println!("cookie updated");
        }
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

fn describe(info: &OfflineStatusInfo) -> String {
    match info.formatted_time_since_sync() {
        Some(age) => format!("[{}] {} (last sync {})", info.short_status(), info.status_message, age),
        None => format!("[{}] {}", info.short_status(), info.status_message),
    }
}
