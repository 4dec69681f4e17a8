//! Opening an Engine.IO session over the configured mechanisms

use std::collections::VecDeque;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use cl_core::config::{ClientConfig, TransportConfig, TransportKind};
use cl_core::error::{ConfigError, TransportError};
use cl_protocol::engine::PROBE;
use cl_protocol::{EnginePacket, Handshake};

use super::polling::{self, PollingLink};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Session URLs for each mechanism
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    pub polling: String,
    pub websocket: String,
}

impl Endpoints {
    pub(crate) fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            polling: config.engine_url(TransportKind::Polling)?,
            websocket: config.engine_url(TransportKind::WebSocket)?,
        })
    }

    pub(crate) fn get(&self, kind: TransportKind) -> &str {
        match kind {
            TransportKind::Polling => &self.polling,
            TransportKind::WebSocket => &self.websocket,
        }
    }
}

enum Link {
    WebSocket(WsStream),
    Polling(PollingLink),
}

/// An open Engine.IO session on one mechanism
pub(crate) struct EngineSession {
    pub handshake: Handshake,
    link: Link,
    /// Packets that arrived before the link took over
    pending: VecDeque<String>,
}

impl EngineSession {
    /// Open a session the way `policy` prescribes
    ///
    /// A polling session is moved onto a WebSocket when the policy allows it
    /// and the server offers it. A failed upgrade keeps the polling session.
    pub(crate) async fn open(
        endpoints: &Endpoints,
        policy: &TransportConfig,
        http: &reqwest::Client,
    ) -> Result<Self, TransportError> {
        match policy.initial() {
            TransportKind::WebSocket => open_websocket(&endpoints.websocket).await,
            TransportKind::Polling => {
                let (handshake, pending) = polling::handshake(http, &endpoints.polling).await?;

                if let Some(target) = policy.upgrade_target() {
                    if handshake.offers_upgrade(target.as_str()) {
                        match probe_upgrade(endpoints.get(target), &handshake.sid).await {
                            Ok(stream) => {
                                tracing::debug!(sid = %handshake.sid, "Upgraded session to websocket");
                                return Ok(Self {
                                    handshake,
                                    link: Link::WebSocket(stream),
                                    pending,
                                });
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Upgrade failed, staying on polling");
                            }
                        }
                    }
                }

                let link = PollingLink::start(http.clone(), &endpoints.polling, &handshake.sid);
                Ok(Self {
                    handshake,
                    link: Link::Polling(link),
                    pending,
                })
            }
        }
    }

    /// Mechanism carrying the session
    pub(crate) fn kind(&self) -> TransportKind {
        match self.link {
            Link::WebSocket(_) => TransportKind::WebSocket,
            Link::Polling(_) => TransportKind::Polling,
        }
    }

    /// Next packet text; `None` once the link has ended
    ///
    /// Cancel safe: a packet is never lost to a dropped call.
    pub(crate) async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        if let Some(packet) = self.pending.pop_front() {
            return Some(Ok(packet));
        }

        match &mut self.link {
            Link::WebSocket(stream) => loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                    Some(Ok(Message::Close(_))) | None => return None,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Some(Err(TransportError::Link(e.to_string()))),
                }
            },
            Link::Polling(link) => link.recv().await,
        }
    }

    /// Send one packet text
    pub(crate) async fn send(&mut self, text: String) -> Result<(), TransportError> {
        match &mut self.link {
            Link::WebSocket(stream) => stream
                .send(Message::Text(text))
                .await
                .map_err(|e| TransportError::Link(e.to_string())),
            Link::Polling(link) => link.send(&[text]).await,
        }
    }

    /// Encode and send an Engine.IO packet
    pub(crate) async fn send_packet(&mut self, packet: EnginePacket) -> Result<(), TransportError> {
        let text = packet.encode()?;
        self.send(text).await
    }

    /// Close the session from our side
    pub(crate) async fn close(mut self) {
        let _ = self.send_packet(EnginePacket::Close).await;
        if let Link::WebSocket(mut stream) = self.link {
            let _ = stream.close(None).await;
        }
    }
}

async fn open_websocket(endpoint: &str) -> Result<EngineSession, TransportError> {
    let (mut stream, _response) = connect_async(endpoint)
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    let text = next_text(&mut stream).await?;
    match EnginePacket::parse(&text)? {
        EnginePacket::Open(handshake) => Ok(EngineSession {
            handshake,
            link: Link::WebSocket(stream),
            pending: VecDeque::new(),
        }),
        other => Err(TransportError::Connect(format!(
            "expected open packet, got {:?}",
            other
        ))),
    }
}

/// Probe a WebSocket for session `sid` and commit the upgrade on success
async fn probe_upgrade(endpoint: &str, sid: &str) -> Result<WsStream, TransportError> {
    let url = format!("{}&sid={}", endpoint, sid);
    let (mut stream, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    let probe = EnginePacket::Ping(PROBE.to_string()).encode()?;
    stream
        .send(Message::Text(probe))
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    let reply = next_text(&mut stream).await?;
    if EnginePacket::parse(&reply)? != EnginePacket::Pong(PROBE.to_string()) {
        return Err(TransportError::Connect(format!(
            "unexpected probe reply {:?}",
            reply
        )));
    }

    stream
        .send(Message::Text(EnginePacket::Upgrade.encode()?))
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;
    Ok(stream)
}

async fn next_text(stream: &mut WsStream) -> Result<String, TransportError> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text),
            Some(Ok(Message::Close(_))) | None => {
                return Err(TransportError::Connect(
                    "socket closed during handshake".to_string(),
                ))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::Connect(e.to_string())),
        }
    }
}
