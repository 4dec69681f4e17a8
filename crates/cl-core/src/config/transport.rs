//! Transport configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;
use crate::error::ConfigError;

/// Wire mechanism a transport may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// HTTP long-polling
    Polling,
    /// Persistent WebSocket stream
    WebSocket,
}

impl TransportKind {
    /// Name used in the `transport` query parameter and upgrade lists
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Polling => "polling",
            TransportKind::WebSocket => "websocket",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection and reconnection policy for the session transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Mechanisms in order of preference; the first opens the session
    pub transports: Vec<TransportKind>,

    /// Whether a polling session moves to WebSocket when the server offers it
    pub upgrade: bool,

    /// How long a single connection handshake may take
    #[serde(with = "duration_millis")]
    pub handshake_timeout: Duration,

    /// Whether the transport reconnects on its own after a failure
    pub reconnection: bool,

    /// Maximum automatic connection attempts before giving up
    pub reconnection_attempts: u32,

    /// Delay between automatic attempts
    pub backoff: BackoffConfig,

    /// Every explicit connect opens a brand new connection; when off, a
    /// connect while a connection is live reuses it
    pub force_new: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transports: vec![TransportKind::Polling, TransportKind::WebSocket],
            upgrade: true,
            handshake_timeout: Duration::from_millis(20000),
            reconnection: true,
            reconnection_attempts: 5,
            backoff: BackoffConfig::default(),
            force_new: true,
        }
    }
}

impl TransportConfig {
    /// Mechanism the session is opened with
    pub fn initial(&self) -> TransportKind {
        self.transports
            .first()
            .copied()
            .unwrap_or(TransportKind::WebSocket)
    }

    /// Mechanism an opened session may upgrade to
    ///
    /// Only a polling session upgrades, and only to a WebSocket that is also
    /// listed.
    pub fn upgrade_target(&self) -> Option<TransportKind> {
        let allowed = self.upgrade
            && self.initial() == TransportKind::Polling
            && self.transports.contains(&TransportKind::WebSocket);
        allowed.then_some(TransportKind::WebSocket)
    }

    /// Check the policy for values no transport can honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transports.is_empty() {
            return Err(ConfigError::Invalid(
                "transport.transports must list at least one mechanism".to_string(),
            ));
        }
        for (i, kind) in self.transports.iter().enumerate() {
            if self.transports[..i].contains(kind) {
                return Err(ConfigError::Invalid(format!(
                    "transport.transports lists {} twice",
                    kind
                )));
            }
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "transport.handshake_timeout must be non-zero".to_string(),
            ));
        }
        if self.reconnection && self.reconnection_attempts == 0 {
            return Err(ConfigError::Invalid(
                "transport.reconnection_attempts must be at least 1".to_string(),
            ));
        }
        self.backoff.validate()
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            max: Duration::from_millis(5000),
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl BackoffConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.initial > self.max {
            return Err(ConfigError::Invalid(format!(
                "backoff.initial ({:?}) exceeds backoff.max ({:?})",
                self.initial, self.max
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "backoff.multiplier must be a finite number >= 1.0".to_string(),
            ));
        }
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(
                "backoff.jitter must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reconnect_policy() {
        let config = TransportConfig::default();
        assert_eq!(config.reconnection_attempts, 5);
        assert_eq!(config.backoff.initial, Duration::from_millis(1000));
        assert_eq!(config.backoff.max, Duration::from_millis(5000));
        assert_eq!(config.handshake_timeout, Duration::from_millis(20000));
        assert!(config.force_new);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_polling_first_upgrades_to_websocket() {
        let mut config = TransportConfig::default();
        assert_eq!(config.initial(), TransportKind::Polling);
        assert_eq!(config.upgrade_target(), Some(TransportKind::WebSocket));

        config.upgrade = false;
        assert_eq!(config.upgrade_target(), None);

        config.upgrade = true;
        config.transports = vec![TransportKind::Polling];
        assert_eq!(config.upgrade_target(), None);

        config.transports = vec![TransportKind::WebSocket, TransportKind::Polling];
        assert_eq!(config.initial(), TransportKind::WebSocket);
        assert_eq!(config.upgrade_target(), None);
    }

    #[test]
    fn test_transport_names_parse() {
        let config: TransportConfig =
            toml::from_str("transports = [\"websocket\"]\nupgrade = false\n").unwrap();
        assert_eq!(config.transports, vec![TransportKind::WebSocket]);
        assert_eq!(TransportKind::WebSocket.as_str(), "websocket");

        let config = TransportConfig {
            transports: vec![TransportKind::Polling, TransportKind::Polling],
            ..TransportConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_backoff() {
        let mut config = TransportConfig::default();
        config.backoff.initial = Duration::from_secs(10);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = TransportConfig::default();
        config.backoff.jitter = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_multiplier() {
        let config: TransportConfig = toml::from_str("[backoff]\nmultiplier = inf\n").unwrap();
        assert!(config.backoff.multiplier.is_infinite());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config: TransportConfig = toml::from_str("[backoff]\nmultiplier = nan\n").unwrap();
        assert!(config.validate().is_err());

        let config: TransportConfig = toml::from_str("[backoff]\njitter = nan\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_transports() {
        let config = TransportConfig {
            transports: vec![],
            ..TransportConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
