//! Connection identifier type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Socket id the server assigns to one live connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a connection ID from an existing value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new("abc");
        assert_eq!(format!("{}", id), "conn-abc");
    }

    #[test]
    fn test_connection_id_from_str() {
        let id = ConnectionId::from("oSO0OpakMV_3jnilAAAA");
        assert_eq!(id.as_str(), "oSO0OpakMV_3jnilAAAA");
    }
}
