//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding events
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Event name not understood by this client
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Packet does not follow the Engine.IO or Socket.IO framing
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// Packet addressed to a namespace this codec does not serve
    #[error("Packet for foreign namespace: {0}")]
    ForeignNamespace(String),

    /// Frame exceeds maximum size
    #[error("Frame too large: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
