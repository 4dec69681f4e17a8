//! Message types for the codelab session protocol
//!
//! Messages are Socket.IO events in the session namespace. Their structured
//! form is `{"event": <name>, "data": <payload>}`; the codec turns that into
//! the event argument list `[<name>, <payload>]`.
//!
//! # Message Flow
//!
//! Typical sequence for one run:
//!
//! 1. Client connects; the executor greets with a few `pty-output` lines
//! 2. Client sends `run` with the program source
//! 3. Executor streams compiler and program output as `pty-output`
//! 4. Client forwards user keystrokes as `input` while the program runs
//! 5. Client may send `kill` to terminate the program
//! 6. Executor optionally sends `program-exit` once the process is gone
//!
//! Executors that predate `program-exit` only signal the end of a run through
//! the text of `pty-output`, so clients must not rely on it being sent.

use serde::{Deserialize, Serialize};

/// Event name for [`ClientMessage::Run`]
pub const RUN_EVENT: &str = "run";
/// Event name for [`ClientMessage::Kill`]
pub const KILL_EVENT: &str = "kill";
/// Event name for [`ClientMessage::Input`]
pub const INPUT_EVENT: &str = "input";
/// Event name for [`ServerMessage::Output`]
pub const OUTPUT_EVENT: &str = "pty-output";
/// Event name for [`ServerMessage::Exit`]
pub const EXIT_EVENT: &str = "program-exit";

/// Messages sent by the client to the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Compile and run the given source
    Run {
        /// Program source text
        code: String,
    },

    /// Terminate the running program
    Kill {},

    /// Bytes for the program's standard input
    Input {
        /// Input text, including its line terminator
        data: String,
    },
}

impl ClientMessage {
    /// Get the wire event name for this message
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Run { .. } => RUN_EVENT,
            ClientMessage::Kill {} => KILL_EVENT,
            ClientMessage::Input { .. } => INPUT_EVENT,
        }
    }
}

/// Messages sent by the executor to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// A fragment of compiler or program output
    #[serde(rename = "pty-output")]
    Output(String),

    /// The program process is gone
    #[serde(rename = "program-exit")]
    Exit {
        /// Exit status, absent when the process was killed by a signal
        #[serde(default)]
        code: Option<i32>,
    },
}

impl ServerMessage {
    /// Get the wire event name for this message
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::Output(_) => OUTPUT_EVENT,
            ServerMessage::Exit { .. } => EXIT_EVENT,
        }
    }

    /// Whether `name` is an event this client understands
    pub fn is_known_event(name: &str) -> bool {
        matches!(name, OUTPUT_EVENT | EXIT_EVENT)
    }
}
