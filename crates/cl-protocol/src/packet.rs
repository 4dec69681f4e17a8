//! Socket.IO packets
//!
//! Socket.IO (protocol revision 5) multiplexes namespaces over one Engine.IO
//! session. Each packet rides in an Engine.IO message and has the text form
//!
//! ```text
//! <type>[<namespace>,][<ack id>][<JSON data>]
//! ```
//!
//! The namespace is omitted when it is the root namespace `/`.

use serde_json::Value;

use crate::error::ProtocolError;

/// Root namespace
pub const ROOT_NAMESPACE: &str = "/";

/// Socket.IO packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl PacketType {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '0' => PacketType::Connect,
            '1' => PacketType::Disconnect,
            '2' => PacketType::Event,
            '3' => PacketType::Ack,
            '4' => PacketType::ConnectError,
            '5' => PacketType::BinaryEvent,
            '6' => PacketType::BinaryAck,
            _ => return None,
        })
    }

    fn as_char(self) -> char {
        match self {
            PacketType::Connect => '0',
            PacketType::Disconnect => '1',
            PacketType::Event => '2',
            PacketType::Ack => '3',
            PacketType::ConnectError => '4',
            PacketType::BinaryEvent => '5',
            PacketType::BinaryAck => '6',
        }
    }
}

/// A decoded Socket.IO packet
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub kind: PacketType,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl Packet {
    /// Request to join `namespace`
    pub fn connect(namespace: &str) -> Self {
        Self::new(PacketType::Connect, namespace, None)
    }

    /// Leave `namespace`
    pub fn disconnect(namespace: &str) -> Self {
        Self::new(PacketType::Disconnect, namespace, None)
    }

    /// Event named by the first element of `args`
    pub fn event(namespace: &str, args: Vec<Value>) -> Self {
        Self::new(PacketType::Event, namespace, Some(Value::Array(args)))
    }

    fn new(kind: PacketType, namespace: &str, data: Option<Value>) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            ack_id: None,
            data,
        }
    }

    /// Text form, ready to wrap in an Engine.IO message
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut text = String::new();
        text.push(self.kind.as_char());
        if self.namespace != ROOT_NAMESPACE {
            text.push_str(&self.namespace);
            text.push(',');
        }
        if let Some(id) = self.ack_id {
            text.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            text.push_str(&serde_json::to_string(data)?);
        }
        Ok(text)
    }

    /// Parse a packet from its text form
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .and_then(PacketType::from_char)
            .ok_or_else(|| ProtocolError::MalformedPacket(format!("bad packet type in {:?}", text)))?;
        if matches!(kind, PacketType::BinaryEvent | PacketType::BinaryAck) {
            return Err(ProtocolError::MalformedPacket(
                "binary packets are not supported".to_string(),
            ));
        }
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let namespace = &rest[..end];
            rest = rest.get(end + 1..).unwrap_or("");
            namespace.to_string()
        } else {
            ROOT_NAMESPACE.to_string()
        };

        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse()
                .map_err(|_| ProtocolError::MalformedPacket(format!("bad ack id in {:?}", text)))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace,
            ack_id,
            data,
        })
    }
}
