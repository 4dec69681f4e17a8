//! Codec between session messages and Socket.IO frames
//!
//! Output of [`EventCodec`] is the text of an Engine.IO message packet,
//! ready to send as one WebSocket frame or one record of a polling body.

use serde_json::{json, Map, Value};

use crate::engine::EnginePacket;
use crate::error::ProtocolError;
use crate::message::{ClientMessage, ServerMessage};
use crate::packet::{Packet, PacketType, ROOT_NAMESPACE};

/// Maximum accepted size of a single frame (1 MiB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// What a Socket.IO packet meant for the session namespace
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Namespace joined; carries the socket id
    Connected { sid: Option<String> },
    /// Server refused the namespace
    ConnectRefused(String),
    /// Server removed the client from the namespace
    Disconnected,
    /// Executor event
    Message(ServerMessage),
}

/// Encodes client events and decodes executor events for one namespace
#[derive(Debug, Clone)]
pub struct EventCodec {
    namespace: String,
    max_frame_size: usize,
}

impl EventCodec {
    /// Create a codec for `namespace` with the default frame limit
    pub fn new(namespace: &str) -> Self {
        let trimmed = namespace.trim_matches('/');
        Self {
            namespace: format!("/{}", trimmed),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Use a custom frame limit
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Namespace this codec speaks for, with a leading slash
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Frame asking the server to join the namespace
    pub fn connect_frame(&self) -> Result<String, ProtocolError> {
        wrap(&Packet::connect(&self.namespace))
    }

    /// Frame leaving the namespace
    pub fn disconnect_frame(&self) -> Result<String, ProtocolError> {
        wrap(&Packet::disconnect(&self.namespace))
    }

    /// Encode a client message as an event frame
    ///
    /// An empty payload object is sent as no argument at all, which is how
    /// argument-less events such as `kill` appear on the wire.
    pub fn encode(&self, message: &ClientMessage) -> Result<String, ProtocolError> {
        let structured = serde_json::to_value(message)?;
        let mut args = vec![Value::String(message.event_name().to_string())];
        match structured.get("data") {
            None | Some(Value::Null) => {}
            Some(Value::Object(fields)) if fields.is_empty() => {}
            Some(payload) => args.push(payload.clone()),
        }

        let text = wrap(&Packet::event(&self.namespace, args))?;
        self.check_size(text.len())?;
        Ok(text)
    }

    /// Decode the payload of an Engine.IO message packet
    pub fn decode(&self, payload: &str) -> Result<Inbound, ProtocolError> {
        self.check_size(payload.len())?;

        let packet = Packet::parse(payload)?;
        if packet.namespace != self.namespace {
            return Err(ProtocolError::ForeignNamespace(packet.namespace));
        }

        match packet.kind {
            PacketType::Connect => Ok(Inbound::Connected {
                sid: packet
                    .data
                    .as_ref()
                    .and_then(|data| data.get("sid"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            PacketType::ConnectError => {
                let reason = match &packet.data {
                    Some(Value::String(message)) => message.clone(),
                    Some(data) => data
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| data.to_string()),
                    None => "connection refused".to_string(),
                };
                Ok(Inbound::ConnectRefused(reason))
            }
            PacketType::Disconnect => Ok(Inbound::Disconnected),
            PacketType::Event => decode_event(packet.data).map(Inbound::Message),
            other => Err(ProtocolError::MalformedPacket(format!(
                "unexpected {:?} packet",
                other
            ))),
        }
    }

    fn check_size(&self, size: usize) -> Result<(), ProtocolError> {
        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl Default for EventCodec {
    fn default() -> Self {
        Self::new(ROOT_NAMESPACE)
    }
}

fn wrap(packet: &Packet) -> Result<String, ProtocolError> {
    EnginePacket::Message(packet.encode()?).encode()
}

/// Turn an event argument list back into its structured form
fn decode_event(data: Option<Value>) -> Result<ServerMessage, ProtocolError> {
    let Some(Value::Array(mut args)) = data else {
        return Err(ProtocolError::MalformedPacket(
            "event data is not an argument list".to_string(),
        ));
    };
    if args.is_empty() {
        return Err(ProtocolError::MalformedPacket("event has no name".to_string()));
    }

    let name = match args.remove(0) {
        Value::String(name) => name,
        other => {
            return Err(ProtocolError::MalformedPacket(format!(
                "event name is not a string: {}",
                other
            )))
        }
    };
    if !ServerMessage::is_known_event(&name) {
        return Err(ProtocolError::UnknownEvent(name));
    }

    let payload = if args.is_empty() {
        Value::Object(Map::new())
    } else {
        args.swap_remove(0)
    };
    Ok(serde_json::from_value(json!({ "event": name, "data": payload }))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pty() -> EventCodec {
        EventCodec::new("/pty")
    }

    /// Strip the Engine.IO message prefix the way a transport does
    fn inner(frame: &str) -> &str {
        frame.strip_prefix('4').unwrap()
    }

    #[test]
    fn test_encode_run() {
        let frame = pty()
            .encode(&ClientMessage::Run {
                code: "int main(){}".to_string(),
            })
            .unwrap();
        assert_eq!(frame, r#"42/pty,["run",{"code":"int main(){}"}]"#);
    }

    #[test]
    fn test_encode_kill_without_argument() {
        let frame = pty().encode(&ClientMessage::Kill {}).unwrap();
        assert_eq!(frame, r#"42/pty,["kill"]"#);
    }

    #[test]
    fn test_namespace_frames() {
        let codec = EventCodec::new("pty/");
        assert_eq!(codec.namespace(), "/pty");
        assert_eq!(codec.connect_frame().unwrap(), "40/pty,");
        assert_eq!(codec.disconnect_frame().unwrap(), "41/pty,");
        assert_eq!(EventCodec::default().connect_frame().unwrap(), "40");
    }

    #[test]
    fn test_decode_output() {
        let msg = pty()
            .decode(inner(r#"42/pty,["pty-output","Compiling your code...\n"]"#))
            .unwrap();
        assert_eq!(
            msg,
            Inbound::Message(ServerMessage::Output("Compiling your code...\n".to_string()))
        );
    }

    #[test]
    fn test_decode_exit() {
        let codec = pty();
        assert_eq!(
            codec
                .decode(r#"2/pty,["program-exit",{"code":3}]"#)
                .unwrap(),
            Inbound::Message(ServerMessage::Exit { code: Some(3) })
        );
        assert_eq!(
            codec.decode(r#"2/pty,["program-exit"]"#).unwrap(),
            Inbound::Message(ServerMessage::Exit { code: None })
        );
    }

    #[test]
    fn test_decode_connect_reply_and_refusal() {
        let codec = pty();
        assert_eq!(
            codec.decode(r#"0/pty,{"sid":"abc"}"#).unwrap(),
            Inbound::Connected {
                sid: Some("abc".to_string())
            }
        );
        assert_eq!(
            codec
                .decode(r#"4/pty,{"message":"Server at capacity"}"#)
                .unwrap(),
            Inbound::ConnectRefused("Server at capacity".to_string())
        );
        assert_eq!(codec.decode("1/pty,").unwrap(), Inbound::Disconnected);
    }

    #[test]
    fn test_decode_unknown_event() {
        let err = pty()
            .decode(r#"2/pty,["session_created",{}]"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEvent(name) if name == "session_created"));
    }

    #[test]
    fn test_decode_other_namespace() {
        let err = pty().decode(r#"2["game_started",{}]"#).unwrap_err();
        assert!(matches!(err, ProtocolError::ForeignNamespace(ns) if ns == "/"));
    }

    #[test]
    fn test_decode_garbage() {
        let codec = pty();
        assert!(matches!(
            codec.decode("2/pty,not json"),
            Err(ProtocolError::Serialization(_))
        ));
        assert!(matches!(
            codec.decode(r#"2/pty,{"event":"pty-output"}"#),
            Err(ProtocolError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_frame_limit() {
        let codec = pty().with_max_frame_size(32);
        let msg = ClientMessage::Run {
            code: "x".repeat(64),
        };
        let err = codec.encode(&msg).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { max: 32, .. }));
    }
}
