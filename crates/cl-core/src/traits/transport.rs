//! Transport traits

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use cl_protocol::{ClientMessage, ConnectionId};

/// Events delivered by a transport for one logical connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established
    Connected {
        /// Identifier assigned to this connection
        id: ConnectionId,
    },

    /// Live connection dropped
    Disconnected {
        /// Human-readable cause
        reason: String,
    },

    /// A connection attempt failed
    ConnectError {
        /// Human-readable cause
        error: String,
    },

    /// Automatic reconnection succeeded
    Reconnected {
        /// Number of attempts it took
        attempt: u32,
    },

    /// Output fragment from the executor
    Output(String),

    /// Executor reported the program process is gone
    Exited {
        /// Exit status if the process exited normally
        code: Option<i32>,
    },
}

/// Receiving half of a connection's event stream
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Bidirectional event channel to the remote executor
///
/// A transport owns at most one logical connection. Each call to
/// [`Transport::connect`] hands out a new event stream and retires the
/// previous one, so events from a superseded stream are never observed.
#[async_trait]
pub trait Transport: Send {
    /// Start a connection and return its event stream
    ///
    /// Returns immediately; the outcome arrives on the returned stream as
    /// `Connected` or `ConnectError`. The transport applies its own bounded
    /// automatic reconnection policy for the lifetime of the stream.
    /// Whether a live connection is torn down or carried over to the new
    /// stream is up to the transport's policy.
    fn connect(&mut self) -> TransportEvents;

    /// Close the live connection, if any
    fn close(&mut self);

    /// Send a message over the live connection
    async fn send(&mut self, message: ClientMessage) -> Result<(), TransportError>;
}
