//! Engine.IO HTTP long-polling
//!
//! A background task keeps one GET outstanding against the session URL and
//! forwards every packet of each response body. Sends are separate POSTs.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cl_core::error::TransportError;
use cl_protocol::engine::{join_payload, split_payload};
use cl_protocol::{EnginePacket, Handshake};

fn connect_error(e: reqwest::Error) -> TransportError {
    TransportError::Connect(e.to_string())
}

fn link_error(e: reqwest::Error) -> TransportError {
    TransportError::Link(e.to_string())
}

/// Open a polling session
///
/// Returns the server handshake and any packets that arrived with it.
pub(crate) async fn handshake(
    http: &reqwest::Client,
    endpoint: &str,
) -> Result<(Handshake, VecDeque<String>), TransportError> {
    let body = http
        .get(endpoint)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(connect_error)?
        .text()
        .await
        .map_err(connect_error)?;

    let mut packets = split_payload(&body);
    let first = packets
        .next()
        .ok_or_else(|| TransportError::Connect("empty handshake response".to_string()))?;
    let EnginePacket::Open(handshake) = EnginePacket::parse(first)? else {
        return Err(TransportError::Connect(format!(
            "expected open packet, got {:?}",
            first
        )));
    };

    Ok((handshake, packets.map(str::to_string).collect()))
}

/// A polling session after its handshake
pub(crate) struct PollingLink {
    http: reqwest::Client,
    url: String,
    incoming: mpsc::UnboundedReceiver<Result<String, TransportError>>,
    cancel: CancellationToken,
}

impl PollingLink {
    /// Start long-polling session `sid` at `endpoint`
    pub(crate) fn start(http: reqwest::Client, endpoint: &str, sid: &str) -> Self {
        let url = format!("{}&sid={}", endpoint, sid);
        let (tx, incoming) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(poll_loop(http.clone(), url.clone(), tx, cancel.clone()));

        Self {
            http,
            url,
            incoming,
            cancel,
        }
    }

    /// Next packet text; `None` once polling has stopped
    pub(crate) async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.incoming.recv().await
    }

    /// POST packets in one body
    pub(crate) async fn send<S: AsRef<str>>(&self, packets: &[S]) -> Result<(), TransportError> {
        self.http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(join_payload(packets))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(link_error)?;
        Ok(())
    }
}

impl Drop for PollingLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop(
    http: reqwest::Client,
    url: String,
    packets: mpsc::UnboundedSender<Result<String, TransportError>>,
    cancel: CancellationToken,
) {
    loop {
        let response = tokio::select! {
            _ = cancel.cancelled() => return,
            response = fetch(&http, &url) => response,
        };

        match response {
            Ok(body) => {
                for packet in split_payload(&body) {
                    let closing = matches!(EnginePacket::parse(packet), Ok(EnginePacket::Close));
                    if packets.send(Ok(packet.to_string())).is_err() || closing {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Poll request failed");
                let _ = packets.send(Err(e));
                return;
            }
        }
    }
}

async fn fetch(http: &reqwest::Client, url: &str) -> Result<String, TransportError> {
    http.get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(link_error)?
        .text()
        .await
        .map_err(link_error)
}
