//! Presentation traits

use std::time::Duration;

use crate::types::{Controls, SessionState};

/// Sink for everything the session controller wants to show the user
///
/// The controller never reads state back from the presentation except the
/// editable source text; every other method is a one-way notification.
pub trait Presentation: Send {
    /// Current contents of the source editor
    fn source_text(&self) -> String;

    /// Append text to the output surface
    fn output_append(&mut self, text: &str);

    /// Clear the output surface
    fn output_clear(&mut self);

    /// Session state changed
    fn state_changed(&mut self, state: SessionState);

    /// Short-lived informational notice
    fn transient_notice(&mut self, text: &str);

    /// Something failed but the session can carry on
    fn recoverable_error(&mut self, text: &str);

    /// Connection is gone until the user reconnects manually
    fn fatal_connection_error(&mut self, text: &str);

    /// Output looks like the program is waiting for input
    fn input_requested(&mut self);

    /// Which controls should currently be usable
    fn controls_changed(&mut self, controls: Controls);

    /// The current run has been going for longer than expected
    fn long_running(&mut self, elapsed: Duration);
}
