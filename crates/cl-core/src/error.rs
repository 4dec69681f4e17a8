//! Core error types for codelab

use cl_protocol::ProtocolError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Transport-related errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// No live connection to send on
    #[error("Not connected to server")]
    NotConnected,

    /// Handshake did not finish in time
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Connection attempt failed
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Server refused to admit the client to the namespace
    #[error("Server refused connection: {0}")]
    Refused(String),

    /// Live link failed after the session was open
    #[error("Transport error: {0}")]
    Link(String),

    /// Connection closed while sending
    #[error("Connection closed")]
    Closed,

    /// Frame could not be encoded or decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Display identity errors
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Nickname is empty after trimming
    #[error("Nickname must not be empty")]
    EmptyNickname,

    /// Identity file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Identity file is not valid TOML
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Identity could not be serialized
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
