//! HomeGym sync agent
//!
//! Keeps logged training sets in a local store and delivers them to the
//! HomeGym server whenever it is reachable. Commands are read from stdin.

mod commands;
mod state;

use anyhow::{Context, Result};
use commands::Command;
use offline_sync::SettingsManager;
use state::AppState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SETTINGS_ENV: &str = "HOMEGYM_SYNC_SETTINGS";
const COOKIE_ENV: &str = "HOMEGYM_COOKIE";
const DEFAULT_SETTINGS_PATH: &str = "./homegym-sync.json";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting HomeGym sync agent");

    let settings_path =
        std::env::var(SETTINGS_ENV).unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_string());
    let mut manager = SettingsManager::new(&settings_path);
    let settings = manager
        .load()
        .await
        .with_context(|| format!("loading settings from {}", settings_path))?
        .clone();
    tracing::info!("Server: {}", settings.server.base_url);

    let cookies = std::env::var(COOKIE_ENV).unwrap_or_default();
    let state = AppState::start(&settings, cookies).await?;

    run_console(&state).await?;

    state.shutdown().await
}

async fn run_console(state: &AppState) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Some(command)) => match commands::execute(state, command).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => eprintln!("error: {:#}", e),
                    },
                    Ok(None) => {}
                    Err(e) => eprintln!("error: {}", e),
                }
            }
        }
    }
    Ok(())
}
