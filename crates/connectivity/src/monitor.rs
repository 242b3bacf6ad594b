//! Connectivity monitor.
//!
//! The monitor owns a probe and the state machine. It probes on startup, on
//! every host "online" hint and on a fixed interval, and trusts host
//! "offline" events immediately. The current state is published on a
//! `watch` channel; confirmed changes are published as `Transition`s on a
//! `broadcast` channel.

use crate::probe::ConnectivityProbe;
use crate::state::{ConnectivityState, Reachability, StateMachine, Transition};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default interval between periodic probes
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Passive network events reported by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostSignal {
    /// The host believes the network came back; only a hint
    BecameOnline,
    /// The host lost the network; authoritative
    BecameOffline,
}

/// Configuration for the monitor loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between periodic probes
    pub probe_interval: Duration,
    /// Capacity of the transition broadcast channel
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: DEFAULT_PROBE_INTERVAL,
            channel_capacity: 16,
        }
    }
}

impl MonitorConfig {
    /// Set the probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }
}

/// Produces a trustworthy online/offline signal
pub struct ConnectivityMonitor<P> {
    probe: P,
    machine: StateMachine,
    config: MonitorConfig,
    state_tx: watch::Sender<ConnectivityState>,
    transitions: broadcast::Sender<Transition>,
}

impl<P: ConnectivityProbe> ConnectivityMonitor<P> {
    /// Create a monitor in the `Unknown` state
    pub fn new(probe: P, config: MonitorConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectivityState::Unknown);
        let (transitions, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            probe,
            machine: StateMachine::new(),
            config,
            state_tx,
            transitions,
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectivityState {
        self.machine.state()
    }

    /// Watch the current state
    pub fn watch_state(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    /// Receive confirmed transitions
    ///
    /// Subscribe before `spawn` to observe the startup probe.
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Probe now and publish the outcome
    pub async fn check_now(&mut self) -> Option<Transition> {
        self.machine.begin_probe();
        self.publish_state();

        let outcome = self.probe.probe().await;
        let transition = self.machine.complete_probe(outcome);
        self.publish(transition);
        transition
    }

    /// React to a passive host event
    pub async fn handle_signal(&mut self, signal: HostSignal) -> Option<Transition> {
        match signal {
            HostSignal::BecameOnline => {
                tracing::debug!("[Connection] Host reports online, confirming with probe");
                self.check_now().await
            }
            HostSignal::BecameOffline => {
                let transition = self.machine.host_offline();
                self.publish(transition);
                transition
            }
        }
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.machine.state());
    }

    fn publish(&self, transition: Option<Transition>) {
        self.publish_state();
        if let Some(transition) = transition {
            match transition.to {
                Reachability::Online => tracing::info!("[Connection] Back online"),
                Reachability::Offline => tracing::info!("[Connection] Gone offline"),
            }
            // No receivers is fine
            let _ = self.transitions.send(transition);
        }
    }
}

impl<P: ConnectivityProbe + 'static> ConnectivityMonitor<P> {
    /// Run the monitor on the tokio runtime
    pub fn spawn(self) -> MonitorHandle {
        let (signal_tx, signal_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = self.watch_state();
        let transitions = self.transitions.clone();

        let task = tokio::spawn(self.run(signal_rx, shutdown_rx));

        MonitorHandle {
            signals: signal_tx,
            state,
            transitions,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(
        mut self,
        mut signals: mpsc::Receiver<HostSignal>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.check_now().await;

        let interval = self.config.probe_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(signal) = signals.recv() => {
                    self.handle_signal(signal).await;
                }
                _ = ticker.tick() => {
                    self.check_now().await;
                }
            }
        }

        tracing::debug!("[Connection] Monitor stopped");
    }
}

/// Handle to a running monitor
pub struct MonitorHandle {
    signals: mpsc::Sender<HostSignal>,
    state: watch::Receiver<ConnectivityState>,
    transitions: broadcast::Sender<Transition>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Forward a passive host event to the monitor
    pub async fn signal(&self, signal: HostSignal) {
        if self.signals.send(signal).await.is_err() {
            tracing::warn!("[Connection] Monitor is not running, dropped {:?}", signal);
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    /// Watch the current state
    pub fn watch_state(&self) -> watch::Receiver<ConnectivityState> {
        self.state.clone()
    }

    /// Receive future transitions
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Stop the monitor and wait for its task to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("[Connection] Monitor task failed: {}", e);
        }
    }
}
