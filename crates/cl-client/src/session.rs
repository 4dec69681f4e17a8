//! Session state owned by the controller

use tokio::time::Instant;

use cl_core::SessionState;
use cl_protocol::ConnectionId;

/// State of one logical remote program session
///
/// Only [`crate::RemoteSessionController`] mutates a session; everything else
/// sees it through the read-only accessors.
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) state: SessionState,
    pub(crate) connection_id: Option<ConnectionId>,
    pub(crate) retry_count: u32,
    pub(crate) failsafe_deadline: Option<Instant>,
    pub(crate) epoch: u64,
    pub(crate) completion_pending: bool,
}

impl Session {
    /// Create an idle, disconnected session
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identifier of the live connection, if any
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }

    /// Whether a usable connection is live
    pub fn is_connected(&self) -> bool {
        self.connection_id.is_some()
    }

    /// Consecutive connection failures since the last successful connect
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// When the failsafe warning for the current run is due
    pub fn failsafe_deadline(&self) -> Option<Instant> {
        self.failsafe_deadline
    }

    /// Generation of the current run
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start a new generation, invalidating every timer armed before
    pub(crate) fn advance_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.failsafe_deadline = None;
        self.completion_pending = false;
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle_and_disconnected() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_connected());
        assert_eq!(session.retry_count(), 0);
        assert_eq!(session.epoch(), 0);
    }

    #[test]
    fn test_advance_epoch_clears_run_bookkeeping() {
        let mut session = Session::new();
        session.completion_pending = true;
        session.failsafe_deadline = Some(Instant::now());

        assert_eq!(session.advance_epoch(), 1);
        assert!(!session.completion_pending);
        assert!(session.failsafe_deadline().is_none());
    }
}
