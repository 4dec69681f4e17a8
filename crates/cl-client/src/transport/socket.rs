//! Socket.IO transport
//!
//! Each fresh connection is owned by a background task with its own event
//! channel. The task opens an Engine.IO session (polling or WebSocket,
//! upgrading when allowed), joins the session namespace, relays decoded
//! executor events, answers heartbeats, writes queued client frames, and
//! reconnects with exponential backoff until the attempt budget runs out.
//!
//! With `force_new` off, [`Transport::connect`] on a live connection hands
//! the running task a new event channel instead of replacing it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use cl_core::config::{ClientConfig, TransportConfig};
use cl_core::error::{ConfigError, TransportError};
use cl_core::traits::{Transport, TransportEvent, TransportEvents};
use cl_protocol::{
    ClientMessage, ConnectionId, EnginePacket, EventCodec, Inbound, ProtocolError, ServerMessage,
};

use super::link::{EngineSession, Endpoints};
use super::reconnect::ExponentialBackoff;

/// Upper bound on the goodbye exchange when a connection is closed locally
const LEAVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Disconnect reasons, named the way Socket.IO clients report them
const REASON_SERVER_DISCONNECT: &str = "io server disconnect";
const REASON_TRANSPORT_CLOSE: &str = "transport close";
const REASON_TRANSPORT_ERROR: &str = "transport error";
const REASON_PING_TIMEOUT: &str = "ping timeout";

/// Where a connection's events go and whether it is live
struct Shared {
    /// `None` once the connection task has finished
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    live: Option<ConnectionId>,
}

impl Shared {
    fn send(&self, event: TransportEvent) -> bool {
        self.events
            .as_ref()
            .map_or(false, |events| events.send(event).is_ok())
    }
}

#[derive(Clone)]
struct SharedState(Arc<Mutex<Shared>>);

impl SharedState {
    fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self(Arc::new(Mutex::new(Shared {
            events: Some(events),
            live: None,
        })))
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self) -> bool {
        self.lock().live.is_some()
    }

    /// Deliver an event; false once the receiver is gone
    fn emit(&self, event: TransportEvent) -> bool {
        self.lock().send(event)
    }

    fn go_live(&self, id: ConnectionId) -> bool {
        let mut shared = self.lock();
        shared.live = Some(id.clone());
        shared.send(TransportEvent::Connected { id })
    }

    fn go_down(&self, reason: String) -> bool {
        let mut shared = self.lock();
        shared.live = None;
        shared.send(TransportEvent::Disconnected { reason })
    }

    /// Move a live connection's events to `events`
    ///
    /// The new stream starts with `Connected`. Returns false, leaving the
    /// old stream in place, when the connection is not live.
    fn adopt(&self, events: mpsc::UnboundedSender<TransportEvent>) -> bool {
        let mut shared = self.lock();
        let Some(id) = shared.live.clone() else {
            return false;
        };
        if events.send(TransportEvent::Connected { id }).is_err() {
            return false;
        }
        shared.events = Some(events);
        true
    }

    /// End the event stream for good
    fn retire(&self) {
        let mut shared = self.lock();
        shared.live = None;
        shared.events = None;
    }
}

/// Handle on a running connection task
struct Connection {
    outbound: mpsc::UnboundedSender<String>,
    shared: SharedState,
    cancel: CancellationToken,
}

/// Transport speaking Socket.IO to the executor namespace
pub struct SocketIoTransport {
    endpoints: Endpoints,
    config: TransportConfig,
    codec: EventCodec,
    http: reqwest::Client,
    connection: Option<Connection>,
}

impl SocketIoTransport {
    /// Build a transport for the configured server
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.transport.validate()?;

        Ok(Self {
            endpoints: Endpoints::from_config(config)?,
            config: config.transport.clone(),
            codec: EventCodec::new(&config.namespace),
            http: reqwest::Client::new(),
            connection: None,
        })
    }

    /// Endpoint the session is opened at
    pub fn url(&self) -> &str {
        self.endpoints.get(self.config.initial())
    }

    /// Namespace the transport joins
    pub fn namespace(&self) -> &str {
        self.codec.namespace()
    }

    /// Whether the namespace is currently joined
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map_or(false, |connection| connection.shared.is_live())
    }
}

#[async_trait]
impl Transport for SocketIoTransport {
    fn connect(&mut self) -> TransportEvents {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        if !self.config.force_new {
            if let Some(connection) = &self.connection {
                if connection.shared.adopt(event_tx.clone()) {
                    tracing::debug!(url = %self.url(), "Reusing live connection");
                    return event_rx;
                }
            }
        }

        self.close();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let shared = SharedState::new(event_tx);

        let task = ConnectionTask {
            endpoints: self.endpoints.clone(),
            config: self.config.clone(),
            codec: self.codec.clone(),
            http: self.http.clone(),
            shared: shared.clone(),
            outbound: outbound_rx,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run());

        self.connection = Some(Connection {
            outbound: outbound_tx,
            shared,
            cancel,
        });

        event_rx
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::debug!(url = %self.url(), "Closing transport connection");
            connection.cancel.cancel();
        }
    }

    async fn send(&mut self, message: ClientMessage) -> Result<(), TransportError> {
        let connection = self.connection.as_ref().ok_or(TransportError::NotConnected)?;
        if !connection.shared.is_live() {
            return Err(TransportError::NotConnected);
        }

        let frame = self.codec.encode(&message)?;
        tracing::trace!(event = message.event_name(), "Queueing frame");
        connection.outbound.send(frame).map_err(|_| TransportError::Closed)
    }
}

impl Drop for SocketIoTransport {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel.cancel();
        }
    }
}

/// Why a joined session stopped
enum PumpEnd {
    /// Transport closed or replaced locally
    Cancelled,
    /// Nobody is listening for events any more
    ReceiverGone,
    /// The connection dropped
    Dropped {
        reason: &'static str,
        /// Whether automatic reconnection may follow
        reconnect: bool,
    },
}

impl PumpEnd {
    fn dropped(reason: &'static str) -> Self {
        PumpEnd::Dropped {
            reason,
            reconnect: true,
        }
    }
}

/// Background task owning one logical connection and its reconnects
struct ConnectionTask {
    endpoints: Endpoints,
    config: TransportConfig,
    codec: EventCodec,
    http: reqwest::Client,
    shared: SharedState,
    outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

impl ConnectionTask {
    async fn run(mut self) {
        let mut backoff = ExponentialBackoff::from_config(&self.config.backoff);
        let mut failures: u32 = 0;
        // Attempts since the last drop or failure; zero while the link is fresh
        let mut reconnect_attempt: u32 = 0;

        loop {
            tracing::debug!(url = %self.endpoints.get(self.config.initial()), "Connecting");
            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = tokio::time::timeout(self.config.handshake_timeout, self.join()) => result,
            };

            let error = match attempt {
                Ok(Ok((mut session, id, early))) => {
                    tracing::info!(
                        connection = %id,
                        transport = %session.kind(),
                        namespace = self.codec.namespace(),
                        "Connected"
                    );
                    if !self.shared.go_live(id) {
                        self.leave(session).await;
                        return;
                    }
                    if reconnect_attempt > 0
                        && !self.shared.emit(TransportEvent::Reconnected {
                            attempt: reconnect_attempt,
                        })
                    {
                        self.leave(session).await;
                        return;
                    }
                    failures = 0;
                    reconnect_attempt = 0;
                    backoff.reset();

                    let end = if early.into_iter().all(|message| self.shared.emit(to_event(message))) {
                        self.pump(&mut session).await
                    } else {
                        PumpEnd::ReceiverGone
                    };

                    match end {
                        PumpEnd::Cancelled | PumpEnd::ReceiverGone => {
                            self.leave(session).await;
                            return;
                        }
                        PumpEnd::Dropped { reason, reconnect } => {
                            tracing::warn!(reason, "Connection lost");
                            if !self.shared.go_down(reason.to_string()) {
                                return;
                            }
                            if !reconnect || !self.config.reconnection {
                                return;
                            }
                        }
                    }
                    None
                }
                Ok(Err(e)) => Some(e),
                Err(_) => Some(TransportError::HandshakeTimeout(
                    self.config.handshake_timeout,
                )),
            };

            if let Some(error) = error {
                failures += 1;
                tracing::warn!(%error, failures, "Connection attempt failed");
                if !self.shared.emit(TransportEvent::ConnectError {
                    error: error.to_string(),
                }) {
                    return;
                }
                if !self.config.reconnection || failures >= self.config.reconnection_attempts {
                    tracing::warn!(failures, "Giving up on automatic reconnection");
                    return;
                }
            }

            reconnect_attempt += 1;
            let delay = backoff.next_delay();
            tracing::debug!(?delay, attempt = reconnect_attempt, "Waiting before reconnecting");
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Open an engine session and join the namespace
    ///
    /// Executor events that arrive before the join is acknowledged are
    /// returned so they can be delivered after `Connected`.
    async fn join(
        &self,
    ) -> Result<(EngineSession, ConnectionId, Vec<ServerMessage>), TransportError> {
        let mut session = EngineSession::open(&self.endpoints, &self.config, &self.http).await?;
        session.send(self.codec.connect_frame()?).await?;

        let mut early = Vec::new();
        loop {
            let text = session.recv().await.ok_or_else(|| {
                TransportError::Connect("session closed before namespace was joined".to_string())
            })??;

            match EnginePacket::parse(&text)? {
                EnginePacket::Ping(payload) => {
                    session.send_packet(EnginePacket::Pong(payload)).await?;
                }
                EnginePacket::Message(payload) => match self.codec.decode(&payload) {
                    Ok(Inbound::Connected { sid }) => {
                        let sid = sid.unwrap_or_else(|| session.handshake.sid.clone());
                        return Ok((session, ConnectionId::new(sid), early));
                    }
                    Ok(Inbound::ConnectRefused(reason)) => {
                        return Err(TransportError::Refused(reason));
                    }
                    Ok(Inbound::Disconnected) => {
                        return Err(TransportError::Refused(
                            "server disconnected during join".to_string(),
                        ));
                    }
                    Ok(Inbound::Message(message)) => early.push(message),
                    Err(e) => tracing::debug!(error = %e, "Ignoring packet before join"),
                },
                EnginePacket::Close => {
                    return Err(TransportError::Connect(
                        "server closed the session".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }

    /// Relay packets in both directions until the session ends
    async fn pump(&mut self, session: &mut EngineSession) -> PumpEnd {
        // The server pings every interval; silence past the window means it is gone
        let window = session.handshake.liveness_window();
        let silence = tokio::time::sleep(window);
        tokio::pin!(silence);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return PumpEnd::Cancelled,

                _ = &mut silence => return PumpEnd::dropped(REASON_PING_TIMEOUT),

                packet = session.recv() => {
                    silence.as_mut().reset(Instant::now() + window);
                    match packet {
                        Some(Ok(text)) => {
                            if let Some(end) = self.handle_packet(session, &text).await {
                                return end;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "Link failed");
                            return PumpEnd::dropped(REASON_TRANSPORT_ERROR);
                        }
                        None => return PumpEnd::dropped(REASON_TRANSPORT_CLOSE),
                    }
                }

                frame = self.outbound.recv() => match frame {
                    Some(text) => {
                        if let Err(e) = session.send(text).await {
                            tracing::debug!(error = %e, "Send failed");
                            return PumpEnd::dropped(REASON_TRANSPORT_ERROR);
                        }
                    }
                    None => return PumpEnd::Cancelled,
                },
            }
        }
    }

    async fn handle_packet(&self, session: &mut EngineSession, text: &str) -> Option<PumpEnd> {
        let packet = match EnginePacket::parse(text) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable packet");
                return None;
            }
        };

        match packet {
            EnginePacket::Ping(payload) => {
                if session.send_packet(EnginePacket::Pong(payload)).await.is_err() {
                    return Some(PumpEnd::dropped(REASON_TRANSPORT_ERROR));
                }
            }
            EnginePacket::Message(payload) => match self.codec.decode(&payload) {
                Ok(Inbound::Message(message)) => {
                    if !self.shared.emit(to_event(message)) {
                        return Some(PumpEnd::ReceiverGone);
                    }
                }
                Ok(Inbound::Disconnected) => {
                    return Some(PumpEnd::Dropped {
                        reason: REASON_SERVER_DISCONNECT,
                        reconnect: false,
                    });
                }
                Ok(other) => tracing::debug!(?other, "Ignoring namespace packet"),
                Err(ProtocolError::UnknownEvent(event)) => {
                    tracing::debug!(%event, "Ignoring unhandled server event");
                }
                Err(ProtocolError::ForeignNamespace(namespace)) => {
                    tracing::trace!(%namespace, "Ignoring packet for another namespace");
                }
                Err(e) => tracing::warn!(error = %e, "Dropping undecodable frame"),
            },
            EnginePacket::Close => return Some(PumpEnd::dropped(REASON_TRANSPORT_CLOSE)),
            EnginePacket::Open(_)
            | EnginePacket::Pong(_)
            | EnginePacket::Upgrade
            | EnginePacket::Noop => {}
        }
        None
    }

    /// Leave the namespace and close the session
    async fn leave(&self, mut session: EngineSession) {
        let goodbye = async move {
            if let Ok(frame) = self.codec.disconnect_frame() {
                let _ = session.send(frame).await;
            }
            session.close().await;
        };
        if tokio::time::timeout(LEAVE_TIMEOUT, goodbye).await.is_err() {
            tracing::debug!("Server did not take the goodbye in time");
        }
    }
}

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.shared.retire();
    }
}

fn to_event(message: ServerMessage) -> TransportEvent {
    match message {
        ServerMessage::Output(chunk) => TransportEvent::Output(chunk),
        ServerMessage::Exit { code } => TransportEvent::Exited { code },
    }
}
