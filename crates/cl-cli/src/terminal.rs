//! Terminal presentation for remote runs
//!
//! Program output goes to stdout verbatim; notices and errors go through
//! the colored printers on stderr.

use std::io::Write;
use std::time::Duration;

use cl_core::traits::Presentation;
use cl_core::{Controls, SessionState};

use crate::output::{print_error, print_info, print_warning};

/// Renders controller callbacks to the terminal
pub struct TerminalPresentation {
    source: String,
    controls: Controls,
    failed: bool,
    quiet: bool,
}

impl TerminalPresentation {
    /// Create a presentation holding `source` as the editor contents
    pub fn new(source: String, quiet: bool) -> Self {
        Self {
            source,
            controls: Controls::DISCONNECTED,
            failed: false,
            quiet,
        }
    }

    /// Most recent control availability
    pub fn controls(&self) -> Controls {
        self.controls
    }

    /// Whether a fatal connection error was reported
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl Presentation for TerminalPresentation {
    fn source_text(&self) -> String {
        self.source.clone()
    }

    fn output_append(&mut self, text: &str) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn output_clear(&mut self) {
        // Terminal scrollback is left alone; a blank line marks the new run
        println!();
    }

    fn state_changed(&mut self, state: SessionState) {
        tracing::debug!(%state, "Session state changed");
    }

    fn transient_notice(&mut self, text: &str) {
        if !self.quiet {
            print_info(text);
        }
    }

    fn recoverable_error(&mut self, text: &str) {
        print_warning(text);
    }

    fn fatal_connection_error(&mut self, text: &str) {
        self.failed = true;
        print_error(text);
    }

    fn input_requested(&mut self) {
        if !self.quiet {
            print_info("Program is waiting for input; type a line and press Enter");
        }
    }

    fn controls_changed(&mut self, controls: Controls) {
        self.controls = controls;
    }

    fn long_running(&mut self, elapsed: Duration) {
        print_warning(&format!(
            "Program has been running for over {}s. Press Ctrl+C to stop it.",
            elapsed.as_secs()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_controls_and_failure() {
        let mut presentation = TerminalPresentation::new("int main(){}".to_string(), true);
        assert_eq!(presentation.source_text(), "int main(){}");
        assert!(!presentation.controls().run_enabled);

        presentation.controls_changed(Controls::CONNECTED);
        assert!(presentation.controls().run_enabled);

        presentation.fatal_connection_error("gone");
        assert!(presentation.failed());
    }
}
