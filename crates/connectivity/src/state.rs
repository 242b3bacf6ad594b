//! Connectivity state machine.
//!
//! ```text
//! Unknown ──probe──▶ Probing ──ok──▶ Online
//!                       │
//!                       └──fail──▶ Offline
//! ```
//!
//! Only a completed probe moves the machine into `Online`. A host "offline"
//! event is trusted immediately; a host "online" event merely starts a probe.

use serde::{Deserialize, Serialize};

/// Confirmed reachability of the server
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reachability {
    Online,
    Offline,
}

/// Current connectivity state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectivityState {
    /// No probe has completed yet
    Unknown,
    /// A probe is in flight
    Probing,
    /// Last probe reached the server
    Online,
    /// Last probe failed, or the host reported going offline
    Offline,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        ConnectivityState::Unknown
    }
}

impl ConnectivityState {
    /// Check if currently online
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }

    /// Short label for status indicators
    pub fn label(&self) -> &'static str {
        match self {
            ConnectivityState::Unknown => "Unknown",
            ConnectivityState::Probing => "Checking",
            ConnectivityState::Online => "Online",
            ConnectivityState::Offline => "Offline",
        }
    }
}

impl From<Reachability> for ConnectivityState {
    fn from(reachability: Reachability) -> Self {
        match reachability {
            Reachability::Online => ConnectivityState::Online,
            Reachability::Offline => ConnectivityState::Offline,
        }
    }
}

/// A change of confirmed reachability
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Previously confirmed reachability, `None` before the first probe
    pub from: Option<Reachability>,
    /// Newly confirmed reachability
    pub to: Reachability,
}

impl Transition {
    /// Whether connectivity was just (re)gained
    pub fn is_restored(&self) -> bool {
        self.to == Reachability::Online
    }
}

/// Tracks the current state and the last confirmed reachability
#[derive(Clone, Debug, Default)]
pub struct StateMachine {
    state: ConnectivityState,
    confirmed: Option<Reachability>,
}

impl StateMachine {
    /// Create a machine in the `Unknown` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Last confirmed reachability
    pub fn confirmed(&self) -> Option<Reachability> {
        self.confirmed
    }

    /// A probe started
    pub fn begin_probe(&mut self) {
        self.state = ConnectivityState::Probing;
    }

    /// A probe finished; returns a transition when reachability changed
    pub fn complete_probe(&mut self, outcome: Reachability) -> Option<Transition> {
        self.confirm(outcome)
    }

    /// The host reported going offline; trusted without a probe
    pub fn host_offline(&mut self) -> Option<Transition> {
        self.confirm(Reachability::Offline)
    }

    fn confirm(&mut self, to: Reachability) -> Option<Transition> {
        self.state = to.into();
        let from = self.confirmed.replace(to);
        if from == Some(to) {
            None
        } else {
            Some(Transition { from, to })
        }
    }
}
