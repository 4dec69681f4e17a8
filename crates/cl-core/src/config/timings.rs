//! Session timing contract

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;

/// Fixed delays that drive the session state machine
///
/// Each delay is a one-way contract: once armed, the corresponding action
/// fires after exactly this long unless a newer run has superseded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimings {
    /// Wait before retrying a run that found the transport disconnected
    #[serde(with = "duration_millis")]
    pub run_retry_delay: Duration,

    /// Warn the user when a run has not finished after this long
    #[serde(with = "duration_millis")]
    pub failsafe: Duration,

    /// Let trailing output flush before returning to idle on completion
    #[serde(with = "duration_millis")]
    pub completion_debounce: Duration,

    /// After sending a kill, force the session idle after this long
    #[serde(with = "duration_millis")]
    pub stop_grace: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            run_retry_delay: Duration::from_millis(3000),
            failsafe: Duration::from_millis(35000),
            completion_debounce: Duration::from_millis(500),
            stop_grace: Duration::from_millis(1000),
        }
    }
}
