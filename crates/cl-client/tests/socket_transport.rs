//! Socket.IO transport integration tests
//!
//! WebSocket sessions run against a local tungstenite server that speaks
//! just enough Engine.IO and Socket.IO. Polling sessions and upgrades run
//! against an axum router serving the same endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response as WsResponse,
};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use cl_client::SocketIoTransport;
use cl_core::config::{BackoffConfig, ClientConfig, TransportKind};
use cl_core::error::TransportError;
use cl_core::traits::{Transport, TransportEvent, TransportEvents};
use cl_protocol::{ClientMessage, ConnectionId};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

fn open_packet(sid: &str, upgrades: &[&str], ping_interval: u64, ping_timeout: u64) -> String {
    format!(
        "0{}",
        json!({
            "sid": sid,
            "upgrades": upgrades,
            "pingInterval": ping_interval,
            "pingTimeout": ping_timeout,
            "maxPayload": 1000000
        })
    )
}

/// Client config pointing at `addr` with fast, deterministic backoff
fn test_config(addr: &str, transports: Vec<TransportKind>) -> ClientConfig {
    let mut config = ClientConfig {
        server_url: format!("http://{}", addr),
        ..ClientConfig::default()
    };
    config.transport.transports = transports;
    config.transport.backoff = BackoffConfig {
        initial: Duration::from_millis(10),
        max: Duration::from_millis(20),
        multiplier: 2.0,
        jitter: 0.0,
    };
    config.transport.handshake_timeout = Duration::from_secs(2);
    config
}

fn ws_config(addr: &str) -> ClientConfig {
    test_config(addr, vec![TransportKind::WebSocket])
}

async fn next_event(events: &mut TransportEvents) -> TransportEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event stream ended")
}

// WebSocket server

type ServerSocket = WebSocketStream<TcpStream>;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

/// Accept a WebSocket; returns it with the request URI
async fn accept_ws(listener: &TcpListener) -> (ServerSocket, String) {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let mut uri = String::new();
    let socket = accept_hdr_async(
        stream,
        |request: &Request, response: WsResponse| -> Result<WsResponse, ErrorResponse> {
            uri = request.uri().to_string();
            Ok(response)
        },
    )
    .await
    .unwrap();
    (socket, uri)
}

/// Accept a WebSocket and walk it through the open packet and namespace join
async fn accept_joined_with(listener: &TcpListener, open: String, sid: &str) -> ServerSocket {
    let (mut socket, uri) = accept_ws(listener).await;
    assert!(
        uri.starts_with("/socket.io/?EIO=4&transport=websocket"),
        "unexpected endpoint {}",
        uri
    );
    send_text(&mut socket, &open).await;
    assert_eq!(next_text(&mut socket).await, "40/pty,");
    send_text(&mut socket, &format!(r#"40/pty,{{"sid":"{}"}}"#, sid)).await;
    socket
}

async fn accept_joined(listener: &TcpListener, sid: &str) -> ServerSocket {
    accept_joined_with(listener, open_packet("eng", &[], 25000, 20000), sid).await
}

async fn send_text(socket: &mut ServerSocket, text: &str) {
    socket.send(Message::Text(text.to_string())).await.unwrap();
}

async fn next_text(socket: &mut ServerSocket) -> String {
    loop {
        match timeout(WAIT, socket.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) => return text,
            Some(Ok(_)) => continue,
            other => panic!("expected text frame, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_websocket_session_joins_namespace_and_relays_events() {
    let (listener, addr) = bind().await;
    let mut transport = SocketIoTransport::new(&ws_config(&addr)).unwrap();
    assert_eq!(transport.namespace(), "/pty");

    let mut events = transport.connect();
    let mut server = accept_joined(&listener, "sock-1").await;

    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Connected {
            id: ConnectionId::new("sock-1")
        }
    );
    assert!(transport.is_connected());

    send_text(&mut server, r#"42/pty,["pty-output","hello\n"]"#).await;
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Output("hello\n".to_string())
    );

    // Root-namespace broadcasts and unknown events are skipped
    send_text(&mut server, r#"42["game_started",{}]"#).await;
    send_text(&mut server, r#"42/pty,["session_created",{}]"#).await;
    send_text(&mut server, r#"42/pty,["program-exit",{"code":3}]"#).await;
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Exited { code: Some(3) }
    );

    transport
        .send(ClientMessage::Run {
            code: "int main(){}".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(
        next_text(&mut server).await,
        r#"42/pty,["run",{"code":"int main(){}"}]"#
    );

    transport
        .send(ClientMessage::Input {
            data: "5\n".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(
        next_text(&mut server).await,
        r#"42/pty,["input",{"data":"5\n"}]"#
    );

    transport.send(ClientMessage::Kill {}).await.unwrap();
    assert_eq!(next_text(&mut server).await, r#"42/pty,["kill"]"#);
}

#[tokio::test]
async fn test_greeting_before_join_ack_is_delivered_after_connect() {
    let (listener, addr) = bind().await;
    let mut transport = SocketIoTransport::new(&ws_config(&addr)).unwrap();

    let mut events = transport.connect();
    let (mut server, _) = accept_ws(&listener).await;
    send_text(&mut server, &open_packet("eng", &[], 25000, 20000)).await;
    assert_eq!(next_text(&mut server).await, "40/pty,");
    send_text(&mut server, r#"42/pty,["pty-output","Connected to C Programming Environment!\n"]"#).await;
    send_text(&mut server, r#"40/pty,{"sid":"sock-1"}"#).await;

    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::Connected { .. }
    ));
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Output("Connected to C Programming Environment!\n".to_string())
    );
}

#[tokio::test]
async fn test_server_ping_is_answered() {
    let (listener, addr) = bind().await;
    let mut transport = SocketIoTransport::new(&ws_config(&addr)).unwrap();

    let mut events = transport.connect();
    let mut server = accept_joined(&listener, "sock-1").await;
    next_event(&mut events).await;

    send_text(&mut server, "2").await;
    assert_eq!(next_text(&mut server).await, "3");
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let (listener, addr) = bind().await;
    let mut transport = SocketIoTransport::new(&ws_config(&addr)).unwrap();

    let mut events = transport.connect();
    let _server =
        accept_joined_with(&listener, open_packet("eng", &[], 100, 100), "sock-1").await;
    next_event(&mut events).await;

    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Disconnected {
            reason: "ping timeout".to_string()
        }
    );
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn test_refused_join_is_a_connect_error() {
    let (listener, addr) = bind().await;
    let mut config = ws_config(&addr);
    config.transport.reconnection = false;
    let mut transport = SocketIoTransport::new(&config).unwrap();

    let mut events = transport.connect();
    let (mut server, _) = accept_ws(&listener).await;
    send_text(&mut server, &open_packet("eng", &[], 25000, 20000)).await;
    assert_eq!(next_text(&mut server).await, "40/pty,");
    send_text(&mut server, r#"44/pty,{"message":"Server at capacity"}"#).await;

    match next_event(&mut events).await {
        TransportEvent::ConnectError { error } => assert!(error.contains("Server at capacity")),
        other => panic!("expected connect error, got {:?}", other),
    }
    let end = timeout(WAIT, events.recv()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_server_disconnect_is_not_retried() {
    let (listener, addr) = bind().await;
    let mut transport = SocketIoTransport::new(&ws_config(&addr)).unwrap();

    let mut events = transport.connect();
    let mut server = accept_joined(&listener, "sock-1").await;
    next_event(&mut events).await;

    send_text(&mut server, "41/pty,").await;
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Disconnected {
            reason: "io server disconnect".to_string()
        }
    );

    assert!(timeout(QUIET, listener.accept()).await.is_err());
    let end = timeout(WAIT, events.recv()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_send_before_connect_fails() {
    let (_listener, addr) = bind().await;
    let mut transport = SocketIoTransport::new(&ws_config(&addr)).unwrap();

    let result = transport.send(ClientMessage::Kill {}).await;
    assert!(matches!(result, Err(TransportError::NotConnected)));
}

#[tokio::test]
async fn test_server_close_triggers_reconnect() {
    let (listener, addr) = bind().await;
    let mut transport = SocketIoTransport::new(&ws_config(&addr)).unwrap();

    let mut events = transport.connect();
    let mut server = accept_joined(&listener, "sock-1").await;
    next_event(&mut events).await;

    server.close(None).await.unwrap();
    drop(server);

    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Disconnected {
            reason: "transport close".to_string()
        }
    );

    let _server = accept_joined(&listener, "sock-2").await;
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Connected {
            id: ConnectionId::new("sock-2")
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Reconnected { attempt: 1 }
    );
}

#[tokio::test]
async fn test_refused_connection_gives_up_after_attempts() {
    // Reserve a port, then free it so nothing is listening
    let (listener, addr) = bind().await;
    drop(listener);

    let mut config = ws_config(&addr);
    config.transport.reconnection_attempts = 2;
    let mut transport = SocketIoTransport::new(&config).unwrap();

    let mut events = transport.connect();
    for _ in 0..2 {
        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::ConnectError { .. }
        ));
    }

    let end = timeout(WAIT, events.recv()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_connect_again_replaces_connection() {
    let (listener, addr) = bind().await;
    let mut transport = SocketIoTransport::new(&ws_config(&addr)).unwrap();

    let mut first = transport.connect();
    let mut first_server = accept_joined(&listener, "sock-1").await;
    next_event(&mut first).await;

    let mut second = transport.connect();
    let _second_server = accept_joined(&listener, "sock-2").await;

    // Old stream ends without further events
    let end = timeout(WAIT, first.recv()).await.unwrap();
    assert!(end.is_none());

    // Old session left the namespace and closed
    let mut goodbye = Vec::new();
    while let Ok(Some(Ok(Message::Text(text)))) = timeout(WAIT, first_server.next()).await {
        goodbye.push(text);
    }
    assert_eq!(goodbye, vec!["41/pty,".to_string(), "1".to_string()]);

    assert_eq!(
        next_event(&mut second).await,
        TransportEvent::Connected {
            id: ConnectionId::new("sock-2")
        }
    );
}

#[tokio::test]
async fn test_live_connection_is_reused_without_force_new() {
    let (listener, addr) = bind().await;
    let mut config = ws_config(&addr);
    config.transport.force_new = false;
    let mut transport = SocketIoTransport::new(&config).unwrap();

    let mut first = transport.connect();
    let mut server = accept_joined(&listener, "sock-1").await;
    next_event(&mut first).await;

    let mut second = transport.connect();
    assert_eq!(
        next_event(&mut second).await,
        TransportEvent::Connected {
            id: ConnectionId::new("sock-1")
        }
    );
    let end = timeout(WAIT, first.recv()).await.unwrap();
    assert!(end.is_none());

    // No second socket was opened
    assert!(timeout(QUIET, listener.accept()).await.is_err());

    send_text(&mut server, r#"42/pty,["pty-output","still here\n"]"#).await;
    assert_eq!(
        next_event(&mut second).await,
        TransportEvent::Output("still here\n".to_string())
    );
    transport.send(ClientMessage::Kill {}).await.unwrap();
    assert_eq!(next_text(&mut server).await, r#"42/pty,["kill"]"#);
}

// Polling server

/// Engine.IO endpoint served by axum
#[derive(Clone)]
struct EngineServer {
    upgrades: Vec<&'static str>,
    allow_websocket: bool,
    to_client: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    queue: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedSender<String>,
}

/// Test side of an [`EngineServer`]
struct EngineHandle {
    addr: String,
    push: mpsc::UnboundedSender<String>,
    received: mpsc::UnboundedReceiver<String>,
}

impl EngineHandle {
    async fn next_received(&mut self) -> String {
        timeout(WAIT, self.received.recv())
            .await
            .expect("timed out waiting for client packet")
            .expect("server stopped")
    }

    fn push(&self, packet: &str) {
        self.push.send(packet.to_string()).unwrap();
    }
}

impl EngineServer {
    /// Record a client packet and answer namespace joins
    fn receive(&self, packet: &str) {
        if packet == "40/pty," {
            let _ = self.queue.send(r#"40/pty,{"sid":"sock-poll"}"#.to_string());
        }
        let _ = self.from_client.send(packet.to_string());
    }

    /// Long-poll: hand out queued packets, or a noop after a short wait
    async fn poll(&self) -> String {
        let mut to_client = self.to_client.lock().await;
        let Ok(first) = timeout(Duration::from_millis(200), to_client.recv()).await else {
            return "6".to_string();
        };
        let Some(first) = first else {
            return "1".to_string();
        };

        let mut packets = vec![first];
        while let Ok(packet) = to_client.try_recv() {
            packets.push(packet);
        }
        packets.join("\u{1e}")
    }

    async fn upgraded(self, mut socket: WebSocket) {
        let Some(Ok(AxumMessage::Text(probe))) = socket.recv().await else {
            return;
        };
        self.receive(&probe);
        if probe != "2probe" || socket.send(AxumMessage::Text("3probe".into())).await.is_err() {
            return;
        }

        let mut to_client = self.to_client.lock().await;
        loop {
            tokio::select! {
                frame = socket.recv() => match frame {
                    Some(Ok(AxumMessage::Text(text))) => self.receive(&text),
                    Some(Ok(_)) => {}
                    _ => return,
                },
                packet = to_client.recv() => match packet {
                    Some(packet) => {
                        if socket.send(AxumMessage::Text(packet)).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                },
            }
        }
    }
}

async fn engine_endpoint(
    State(server): State<EngineServer>,
    Query(query): Query<HashMap<String, String>>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    match query.get("transport").map(String::as_str) {
        Some("websocket") => match ws {
            Some(ws) if server.allow_websocket => ws
                .on_upgrade(move |socket| server.upgraded(socket))
                .into_response(),
            _ => StatusCode::BAD_REQUEST.into_response(),
        },
        Some("polling") if !query.contains_key("sid") => {
            open_packet("eng-poll", &server.upgrades, 25000, 20000).into_response()
        }
        Some("polling") => server.poll().await.into_response(),
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn engine_post(State(server): State<EngineServer>, body: String) -> &'static str {
    for packet in body.split('\u{1e}') {
        server.receive(packet);
    }
    "ok"
}

async fn serve_engine(upgrades: Vec<&'static str>, allow_websocket: bool) -> EngineHandle {
    let (queue, to_client) = mpsc::unbounded_channel();
    let (from_client, received) = mpsc::unbounded_channel();
    let server = EngineServer {
        upgrades,
        allow_websocket,
        to_client: Arc::new(Mutex::new(to_client)),
        queue: queue.clone(),
        from_client,
    };

    let app = Router::new()
        .route("/socket.io/", get(engine_endpoint).post(engine_post))
        .with_state(server);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    EngineHandle {
        addr,
        push: queue,
        received,
    }
}

#[tokio::test]
async fn test_polling_session_joins_and_relays_events() {
    let mut server = serve_engine(vec!["websocket"], true).await;
    let config = test_config(&server.addr, vec![TransportKind::Polling]);
    let mut transport = SocketIoTransport::new(&config).unwrap();
    assert!(transport.url().ends_with("/socket.io/?EIO=4&transport=polling"));

    let mut events = transport.connect();
    assert_eq!(server.next_received().await, "40/pty,");
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Connected {
            id: ConnectionId::new("sock-poll")
        }
    );

    server.push(r#"42/pty,["pty-output","hi\n"]"#);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Output("hi\n".to_string())
    );

    server.push("2");
    assert_eq!(server.next_received().await, "3");

    transport.send(ClientMessage::Kill {}).await.unwrap();
    assert_eq!(server.next_received().await, r#"42/pty,["kill"]"#);
}

#[tokio::test]
async fn test_polling_session_upgrades_to_websocket() {
    let mut server = serve_engine(vec!["websocket"], true).await;
    let config = test_config(
        &server.addr,
        vec![TransportKind::Polling, TransportKind::WebSocket],
    );
    let mut transport = SocketIoTransport::new(&config).unwrap();

    let mut events = transport.connect();
    assert_eq!(server.next_received().await, "2probe");
    assert_eq!(server.next_received().await, "5");
    assert_eq!(server.next_received().await, "40/pty,");
    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::Connected { .. }
    ));

    server.push(r#"42/pty,["pty-output","over the socket\n"]"#);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Output("over the socket\n".to_string())
    );
}

#[tokio::test]
async fn test_failed_upgrade_stays_on_polling() {
    let mut server = serve_engine(vec!["websocket"], false).await;
    let config = test_config(
        &server.addr,
        vec![TransportKind::Polling, TransportKind::WebSocket],
    );
    let mut transport = SocketIoTransport::new(&config).unwrap();

    let mut events = transport.connect();
    assert_eq!(server.next_received().await, "40/pty,");
    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::Connected { .. }
    ));

    transport
        .send(ClientMessage::Input {
            data: "1\n".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(
        server.next_received().await,
        r#"42/pty,["input",{"data":"1\n"}]"#
    );
}

#[tokio::test]
async fn test_upgrade_disabled_keeps_polling() {
    let mut server = serve_engine(vec!["websocket"], true).await;
    let mut config = test_config(
        &server.addr,
        vec![TransportKind::Polling, TransportKind::WebSocket],
    );
    config.transport.upgrade = false;
    let mut transport = SocketIoTransport::new(&config).unwrap();

    let mut events = transport.connect();
    // The first packet the server sees is the join, not a probe
    assert_eq!(server.next_received().await, "40/pty,");
    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::Connected { .. }
    ));
}
