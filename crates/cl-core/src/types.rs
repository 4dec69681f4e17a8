//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the remote program session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Nothing running; a new run may start
    #[default]
    Idle,
    /// A run is waiting for the transport to come up
    Connecting,
    /// A program is running on the executor
    Running,
    /// A kill was sent; waiting out the stop grace delay
    Stopping,
}

impl SessionState {
    /// Whether a program is (or may still be) executing remotely
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Running | SessionState::Stopping)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Control posture pushed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    /// Run/stop action is usable
    pub run_enabled: bool,
    /// Input submission is usable
    pub input_enabled: bool,
    /// Manual reconnect affordance is shown
    pub reconnect_visible: bool,
}

impl Controls {
    /// Everything usable, no reconnect prompt
    pub const CONNECTED: Controls = Controls {
        run_enabled: true,
        input_enabled: true,
        reconnect_visible: false,
    };

    /// Connection lost, automatic recovery still in progress
    pub const DISCONNECTED: Controls = Controls {
        run_enabled: false,
        input_enabled: false,
        reconnect_visible: false,
    };

    /// Automatic recovery gave up; user must reconnect
    pub const RECONNECT_REQUIRED: Controls = Controls {
        run_enabled: false,
        input_enabled: false,
        reconnect_visible: true,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn test_active_states() {
        assert!(SessionState::Running.is_active());
        assert!(SessionState::Stopping.is_active());
        assert!(!SessionState::Idle.is_active());
        assert!(!SessionState::Connecting.is_active());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Stopping.to_string(), "stopping");
    }
}
