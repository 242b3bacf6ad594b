//! Connectivity detection for offline-capable clients.
//!
//! The host's passive online/offline flag is unreliable: machines with flaky
//! network adapters report "online" while the server is unreachable. This
//! crate replaces it with an active probe and an explicit state machine.
//!
//! # Modules
//!
//! - `state`: Connectivity states and transitions
//! - `probe`: The `ConnectivityProbe` trait and an HTTP `HEAD` probe
//! - `monitor`: The monitor loop driven by startup, host hints and a timer
//! - `error`: Error types for probing
//!
//! # Example
//!
//! ```ignore
//! use connectivity::{ConnectivityMonitor, HttpProbe, MonitorConfig};
//!
//! let probe = HttpProbe::new("https://example.com/static/core/manifest.json")?;
//! let monitor = ConnectivityMonitor::new(probe, MonitorConfig::default());
//! let mut transitions = monitor.subscribe();
//! let handle = monitor.spawn();
//!
//! while let Ok(transition) = transitions.recv().await {
//!     if transition.is_restored() {
//!         // start a sync pass
//!     }
//! }
//! ```

pub mod error;
pub mod monitor;
pub mod probe;
pub mod state;

pub use error::{ConnectivityError, ConnectivityResult};
pub use monitor::{ConnectivityMonitor, HostSignal, MonitorConfig, MonitorHandle, DEFAULT_PROBE_INTERVAL};
pub use probe::{ConnectivityProbe, HttpProbe, DEFAULT_PROBE_TIMEOUT};
pub use state::{ConnectivityState, Reachability, StateMachine, Transition};
