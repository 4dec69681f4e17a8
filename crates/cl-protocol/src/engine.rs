//! Engine.IO packets
//!
//! Engine.IO (protocol revision 4) is the layer under Socket.IO. It opens a
//! session over HTTP long-polling or a WebSocket, keeps it alive with
//! server-initiated pings, and can move a polling session onto a WebSocket.
//!
//! Every packet is a single character type followed by an optional payload:
//!
//! | Type | Name    | Payload                       |
//! |------|---------|-------------------------------|
//! | `0`  | open    | handshake JSON                |
//! | `1`  | close   | -                             |
//! | `2`  | ping    | optional probe text           |
//! | `3`  | pong    | echo of the ping payload      |
//! | `4`  | message | Socket.IO packet              |
//! | `5`  | upgrade | -                             |
//! | `6`  | noop    | -                             |
//!
//! A WebSocket frame carries exactly one packet. A polling body carries
//! several, separated by the ASCII record separator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Engine.IO protocol revision sent as the `EIO` query parameter
pub const ENGINE_PROTOCOL: u8 = 4;

/// Separator between packets in a polling body
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Payload of a ping sent while probing a WebSocket upgrade
pub const PROBE: &str = "probe";

/// Session parameters the server sends in its open packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine session id
    pub sid: String,

    /// Transports this session may upgrade to
    #[serde(default)]
    pub upgrades: Vec<String>,

    /// Milliseconds between server pings
    pub ping_interval: u64,

    /// Milliseconds the server waits for a pong
    pub ping_timeout: u64,

    /// Largest polling body the server accepts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// Whether the server offers an upgrade to `transport`
    pub fn offers_upgrade(&self, transport: &str) -> bool {
        self.upgrades.iter().any(|name| name == transport)
    }

    /// Longest silence to tolerate before treating the server as gone
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// A single Engine.IO packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    /// Session opened
    Open(Handshake),
    /// Session closed by the sender
    Close,
    /// Heartbeat request
    Ping(String),
    /// Heartbeat reply
    Pong(String),
    /// Socket.IO payload
    Message(String),
    /// Switch the session to the probed transport
    Upgrade,
    /// Filler that carries nothing
    Noop,
}

impl EnginePacket {
    /// Parse one packet from its text form
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ProtocolError::MalformedPacket("empty engine packet".to_string()))?;
        let payload = chars.as_str();

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(payload)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(payload.to_string())),
            '3' => Ok(EnginePacket::Pong(payload.to_string())),
            '4' => Ok(EnginePacket::Message(payload.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            'b' => Err(ProtocolError::MalformedPacket(
                "binary engine packets are not supported".to_string(),
            )),
            other => Err(ProtocolError::MalformedPacket(format!(
                "unknown engine packet type {:?}",
                other
            ))),
        }
    }

    /// Text form of the packet
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(match self {
            EnginePacket::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(payload) => format!("2{}", payload),
            EnginePacket::Pong(payload) => format!("3{}", payload),
            EnginePacket::Message(payload) => format!("4{}", payload),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        })
    }
}

/// Split a polling body into packet texts
pub fn split_payload(body: &str) -> impl Iterator<Item = &str> {
    body.split(RECORD_SEPARATOR).filter(|packet| !packet.is_empty())
}

/// Join packet texts into a polling body
pub fn join_payload<S: AsRef<str>>(packets: &[S]) -> String {
    let mut body = String::new();
    for (i, packet) in packets.iter().enumerate() {
        if i > 0 {
            body.push(RECORD_SEPARATOR);
        }
        body.push_str(packet.as_ref());
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: &str = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    #[test]
    fn test_parse_open() {
        let EnginePacket::Open(handshake) = EnginePacket::parse(OPEN).unwrap() else {
            panic!("expected open packet");
        };
        assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
        assert!(handshake.offers_upgrade("websocket"));
        assert!(!handshake.offers_upgrade("polling"));
        assert_eq!(handshake.liveness_window(), Duration::from_millis(45000));
    }

    #[test]
    fn test_parse_heartbeat_and_probe() {
        assert_eq!(
            EnginePacket::parse("2").unwrap(),
            EnginePacket::Ping(String::new())
        );
        assert_eq!(
            EnginePacket::parse("3probe").unwrap(),
            EnginePacket::Pong(PROBE.to_string())
        );
        assert_eq!(EnginePacket::Pong(String::new()).encode().unwrap(), "3");
    }

    #[test]
    fn test_message_keeps_payload() {
        let packet = EnginePacket::parse(r#"42/pty,["pty-output","hi"]"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(r#"2/pty,["pty-output","hi"]"#.to_string())
        );
    }

    #[test]
    fn test_parse_rejects_binary_and_garbage() {
        assert!(EnginePacket::parse("").is_err());
        assert!(EnginePacket::parse("bAQID").is_err());
        assert!(EnginePacket::parse("9").is_err());
        assert!(EnginePacket::parse("0{not json").is_err());
    }

    #[test]
    fn test_polling_payload() {
        let body = join_payload(&["6", "42/pty,[\"pty-output\",\"a\"]"]);
        assert_eq!(body, "6\u{1e}42/pty,[\"pty-output\",\"a\"]");
        let packets: Vec<&str> = split_payload(&body).collect();
        assert_eq!(packets, vec!["6", "42/pty,[\"pty-output\",\"a\"]"]);
        assert_eq!(split_payload("").count(), 0);
    }
}
