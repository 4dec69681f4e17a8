//! Epoch-tagged session timers
//!
//! Every delayed action carries the session epoch it was armed under. The
//! controller ignores a timer whose epoch no longer matches, so timers from a
//! superseded run never need to be cancelled explicitly.

use std::future::poll_fn;
use std::time::Duration;

use tokio_util::time::DelayQueue;

/// What a timer does when it fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    /// Retry a run that was submitted while disconnected
    RunRetry {
        /// Trimmed source captured when the run was requested
        source: String,
    },
    /// Warn that the run is taking too long
    Failsafe,
    /// Return to idle after completion was detected
    CompletionReset,
    /// Return to idle after a kill, acknowledged or not
    StopGrace,
}

/// A due timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    /// Action to take
    pub kind: TimerKind,
    /// Session epoch the timer was armed under
    pub epoch: u64,
}

/// Pending timers for one controller
#[derive(Debug, Default)]
pub(crate) struct SessionTimers {
    queue: DelayQueue<Timer>,
}

impl SessionTimers {
    pub(crate) fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
        }
    }

    /// Arm a timer that fires `delay` from now
    pub(crate) fn schedule(&mut self, kind: TimerKind, epoch: u64, delay: Duration) {
        tracing::trace!(?kind, epoch, ?delay, "Arming timer");
        self.queue.insert(Timer { kind, epoch }, delay);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Wait for the next timer to come due
    ///
    /// Resolves to `None` immediately when nothing is armed.
    pub(crate) async fn next_due(&mut self) -> Option<Timer> {
        poll_fn(|cx| self.queue.poll_expired(cx))
            .await
            .map(|expired| expired.into_inner())
    }
}
