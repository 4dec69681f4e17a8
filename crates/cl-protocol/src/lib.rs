//! cl-protocol: Wire protocol for codelab remote program sessions
//!
//! The executor is a Socket.IO server. This crate holds the Engine.IO and
//! Socket.IO packet formats, the session messages exchanged in the program
//! namespace, and the codec between the two.

pub mod codec;
pub mod engine;
pub mod error;
pub mod message;
pub mod packet;
pub mod session;

pub use codec::{EventCodec, Inbound, MAX_FRAME_SIZE};
pub use engine::{EnginePacket, Handshake, ENGINE_PROTOCOL};
pub use error::ProtocolError;
pub use message::{ClientMessage, ServerMessage};
pub use session::ConnectionId;
