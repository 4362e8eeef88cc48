//! Per-connection WebSocket sessions.
//!
//! Every accepted TCP connection gets one session task:
//!
//! 1. The upgrade handshake, during which the request path is checked and the
//!    role is read from the query string exactly once.
//! 2. A writer task draining the connection's outbound queue into the socket.
//! 3. The role's read loop on the session task itself:
//!    - **source**: binary messages become frames submitted to the relay;
//!    - **listener**: inbound messages are read only to notice disconnection.
//! 4. Teardown in one place: leave the relay's collections, flip the close
//!    signal, and let the writer send its farewell.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use minicast_core::{AudioFrame, Role};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, info, warn};

use crate::application::{ConnectionHandle, ConnectionIo, Outbound, Relay, RelayError};
use crate::domain::RelayConfig;

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// A client that opens a TCP connection but never finishes the upgrade is
/// dropped after this long.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ── Session entry point ───────────────────────────────────────────────────────

/// Top-level handler for one accepted TCP connection.
///
/// Wraps [`run_session`] and logs the outcome.  Only handshake failures are
/// reported as errors; everything after the upgrade is ordinary teardown.
pub(crate) async fn handle_session(
    stream: TcpStream,
    peer: SocketAddr,
    relay: Arc<Relay>,
    config: Arc<RelayConfig>,
) {
    match run_session(stream, peer, relay, config).await {
        Ok(()) => debug!(%peer, "session ended"),
        Err(e) => warn!(%peer, "session failed: {e:#}"),
    }
}

async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    relay: Arc<Relay>,
    config: Arc<RelayConfig>,
) -> anyhow::Result<()> {
    let (ws, role) = timeout(HANDSHAKE_TIMEOUT, accept_classified(stream, &config.path))
        .await
        .with_context(|| format!("WebSocket handshake with {peer} timed out"))?
        .with_context(|| format!("WebSocket handshake failed with {peer}"))?;

    let (conn, io) = relay.open_connection(role, peer);
    info!(conn = %conn.id(), %peer, role = %role, "connection accepted");

    let (sink, stream) = ws.split();
    let writer = tokio::spawn(write_outbound(sink, io, conn.clone(), config.close_grace));

    match role {
        Role::Source => run_source(&relay, &conn, stream).await,
        Role::Listener => run_listener(&relay, &conn, stream).await,
    }

    // The read loop has torn the connection down; wait for the close frame.
    if let Err(e) = writer.await {
        warn!(conn = %conn.id(), "writer task failed: {e}");
    }
    Ok(())
}

// ── Handshake ─────────────────────────────────────────────────────────────────

/// Completes the upgrade and returns the socket with the role it asked for.
async fn accept_classified(
    stream: TcpStream,
    expected_path: &str,
) -> Result<(WebSocketStream<TcpStream>, Role), WsError> {
    let mut role = Role::Listener;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        role = classify_request(req, expected_path)?;
        Ok(resp)
    };
    let ws = accept_hdr_async(stream, callback).await?;
    Ok((ws, role))
}

/// Decides the role of an upgrade request, or refuses it with 404 when it
/// targets any path other than `expected_path`.
fn classify_request(req: &Request, expected_path: &str) -> Result<Role, ErrorResponse> {
    let path = req.uri().path();
    if path != expected_path {
        let mut refusal = ErrorResponse::new(Some(format!("no relay endpoint at {path}")));
        *refusal.status_mut() = StatusCode::NOT_FOUND;
        return Err(refusal);
    }
    Ok(Role::from_query(req.uri().query()))
}

// ── Read loops ────────────────────────────────────────────────────────────────

async fn run_source(relay: &Relay, conn: &ConnectionHandle, mut stream: WsSource) {
    match relay.admit_source(conn).await {
        Ok(()) => info!(conn = %conn.id(), peer = %conn.peer(), "source is live"),
        Err(RelayError::SourceBusy { active }) => {
            info!(conn = %conn.id(), %active, "rejected second source");
            return;
        }
        Err(e) => {
            debug!(conn = %conn.id(), "source refused: {e}");
            return;
        }
    }

    let mut frames = 0u64;
    while let Some(data) = next_binary(conn, &mut stream).await {
        if relay.submit(AudioFrame::from(data)).await.is_err() {
            break;
        }
        frames += 1;
    }

    let released = relay.release_source(conn).await;
    info!(conn = %conn.id(), frames, released, "source disconnected");
}

async fn run_listener(relay: &Relay, conn: &ConnectionHandle, mut stream: WsSource) {
    match relay.attach_listener(conn.clone()).await {
        Ok(seeded) => debug!(conn = %conn.id(), seeded, "listener attached"),
        Err(e) => {
            debug!(conn = %conn.id(), "listener refused: {e}");
            return;
        }
    }

    // Listeners have nothing to say; reading only detects that they left.
    while next_binary(conn, &mut stream).await.is_some() {}

    relay.detach_listener(conn).await;
    info!(conn = %conn.id(), "listener disconnected");
}

/// Waits for the next binary payload from the peer, skipping text and
/// control messages.  `None` means the read loop is over: the peer closed,
/// the transport failed, or the connection was closed locally.
async fn next_binary(conn: &ConnectionHandle, stream: &mut WsSource) -> Option<Vec<u8>> {
    loop {
        let item = tokio::select! {
            biased;
            _ = conn.closed() => return None,
            item = stream.next() => item,
        };

        match item {
            Some(Ok(WsMessage::Binary(data))) => return Some(data),
            Some(Ok(WsMessage::Close(_))) => {
                debug!(conn = %conn.id(), "close frame received");
                return None;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                log_transport_error(conn, "read", &e);
                return None;
            }
            None => {
                debug!(conn = %conn.id(), "stream ended");
                return None;
            }
        }
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Drains the outbound queue into the socket until the connection closes.
///
/// On close, any control text still queued is flushed ahead of the close
/// frame (this is how a rejected source learns why), all within `grace`.
/// Queued audio is discarded.
async fn write_outbound(
    mut sink: WsSink,
    mut io: ConnectionIo,
    conn: ConnectionHandle,
    grace: Duration,
) {
    loop {
        let item = tokio::select! {
            biased;
            _ = conn.closed() => break,
            item = io.outbound.recv() => item,
        };
        let Some(item) = item else { break };

        let sent = tokio::select! {
            biased;
            _ = conn.closed() => break,
            sent = sink.send(outbound_message(item)) => sent,
        };
        if let Err(e) = sent {
            log_transport_error(&conn, "write", &e);
            // Wake the read loop so it tears the connection down.
            conn.close();
            return;
        }
    }

    let farewell = async {
        while let Ok(item) = io.outbound.try_recv() {
            if let Outbound::Text(text) = item {
                sink.send(WsMessage::Text(text)).await?;
            }
        }
        sink.close().await
    };

    match timeout(grace, farewell).await {
        Ok(Ok(())) => debug!(conn = %conn.id(), "close frame sent"),
        Ok(Err(e)) => log_transport_error(&conn, "close", &e),
        Err(_) => debug!(conn = %conn.id(), "peer did not take the close frame in time"),
    }
}

fn outbound_message(item: Outbound) -> WsMessage {
    match item {
        Outbound::Frame(frame) => WsMessage::Binary(Vec::from(frame.into_bytes())),
        Outbound::Text(text) => WsMessage::Text(text),
    }
}

/// Peers vanishing is routine; anything else is worth a warning.
fn log_transport_error(conn: &ConnectionHandle, op: &str, e: &WsError) {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Protocol(_) => {
            debug!(conn = %conn.id(), "{op}: connection closed: {e}");
        }
        WsError::Io(io) if is_disconnect(io.kind()) => {
            debug!(conn = %conn.id(), "{op}: peer went away: {e}");
        }
        _ => warn!(conn = %conn.id(), peer = %conn.peer(), "{op} failed: {e}"),
    }
}

fn is_disconnect(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind::*;
    matches!(kind, ConnectionReset | ConnectionAborted | BrokenPipe | UnexpectedEof)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request {
        Request::builder().uri(uri).body(()).unwrap()
    }

    #[test]
    fn test_source_query_classifies_as_source() {
        let role = classify_request(&request("/ws?source=true"), "/ws").unwrap();
        assert_eq!(role, Role::Source);
    }

    #[test]
    fn test_missing_query_classifies_as_listener() {
        let role = classify_request(&request("/ws"), "/ws").unwrap();
        assert_eq!(role, Role::Listener);
    }

    #[test]
    fn test_non_true_value_classifies_as_listener() {
        let role = classify_request(&request("/ws?source=yes"), "/ws").unwrap();
        assert_eq!(role, Role::Listener);
    }

    #[test]
    fn test_wrong_path_is_refused_with_404() {
        // Act
        let refusal = classify_request(&request("/other?source=true"), "/ws").unwrap_err();

        // Assert
        assert_eq!(refusal.status(), StatusCode::NOT_FOUND);
        assert!(refusal.body().as_deref().unwrap_or("").contains("/other"));
    }

    #[test]
    fn test_configured_path_is_honoured() {
        assert!(classify_request(&request("/radio"), "/radio").is_ok());
        assert!(classify_request(&request("/ws"), "/radio").is_err());
    }

    #[test]
    fn test_frames_are_sent_as_binary() {
        let msg = outbound_message(Outbound::Frame(AudioFrame::from(vec![0xAA, 0xBB])));
        assert_eq!(msg, WsMessage::Binary(vec![0xAA, 0xBB]));
    }

    #[test]
    fn test_control_text_is_sent_as_text() {
        let msg = outbound_message(Outbound::Text("busy".to_string()));
        assert_eq!(msg, WsMessage::Text("busy".to_string()));
    }

    #[test]
    fn test_resets_count_as_disconnects() {
        assert!(is_disconnect(std::io::ErrorKind::ConnectionReset));
        assert!(is_disconnect(std::io::ErrorKind::BrokenPipe));
        assert!(!is_disconnect(std::io::ErrorKind::PermissionDenied));
    }
}
