//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;
use super::timings::SessionTimings;
use super::transport::{TransportConfig, TransportKind};
use crate::error::ConfigError;
use cl_protocol::ENGINE_PROTOCOL;

/// Configuration for a codelab client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the codelab server (`http://` or `https://`)
    pub server_url: String,

    /// Socket.IO namespace of the program sessions
    pub namespace: String,

    /// HTTP path the Socket.IO server is mounted at
    pub socketio_path: String,

    /// Transport connection policy
    pub transport: TransportConfig,

    /// Session state machine delays
    pub timings: SessionTimings,

    /// Consecutive connection failures before a manual reconnect is required
    pub max_connect_failures: u32,

    /// How often the game status is polled
    #[serde(with = "duration_millis")]
    pub game_poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            namespace: "/pty".to_string(),
            socketio_path: "/socket.io".to_string(),
            transport: TransportConfig::default(),
            timings: SessionTimings::default(),
            max_connect_failures: 3,
            game_poll_interval: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Base HTTP URL without a trailing slash
    pub fn http_base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Engine.IO endpoint for opening a session over `kind`
    ///
    /// Polling uses the HTTP scheme of `server_url`, WebSocket the matching
    /// `ws`/`wss` scheme. The session id is appended by the transport.
    pub fn engine_url(&self, kind: TransportKind) -> Result<String, ConfigError> {
        let base = self.http_base();
        let (secure, host) = if let Some(rest) = base.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            (false, rest)
        } else {
            return Err(ConfigError::Invalid(format!(
                "Invalid server URL scheme: {}",
                base
            )));
        };
        if host.is_empty() {
            return Err(ConfigError::Invalid("server_url has no host".to_string()));
        }

        let scheme = match (kind, secure) {
            (TransportKind::Polling, false) => "http",
            (TransportKind::Polling, true) => "https",
            (TransportKind::WebSocket, false) => "ws",
            (TransportKind::WebSocket, true) => "wss",
        };
        let path = self.socketio_path.trim_matches('/');

        Ok(format!(
            "{}://{}/{}/?EIO={}&transport={}",
            scheme, host, path, ENGINE_PROTOCOL, kind
        ))
    }

    /// Check the whole configuration for unusable values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine_url(TransportKind::Polling)?;
        if self.socketio_path.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid(
                "socketio_path must not be empty".to_string(),
            ));
        }
        if self.max_connect_failures == 0 {
            return Err(ConfigError::Invalid(
                "max_connect_failures must be at least 1".to_string(),
            ));
        }
        self.transport.validate()
    }
}
