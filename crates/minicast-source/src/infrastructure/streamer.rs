//! Streams bytes from any reader to the relay as the source.
//!
//! The connection is split in two:
//!
//! - the **send side** reads `chunk_size` bytes at a time from the input and
//!   sends each chunk as one binary message, paced if a rate is set;
//! - the **watch side** reads what the relay sends back.  The relay only ever
//!   speaks to a source to turn it away, so any text message is treated as a
//!   rejection, and a close while we are still streaming ends the run.
//!
//! At end of input the client sends a close frame and waits (bounded) for the
//! relay's reply, so a rejection that raced a short input is still reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::domain::{Pacer, SourceConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How often an idle send loop looks at the `running` flag.
const FLAG_POLL: Duration = Duration::from_millis(200);

/// Errors ending a streaming run.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The relay could not be reached or refused the upgrade.
    #[error("failed to connect to relay at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: WsError,
    },

    /// Another source is already live.  The payload is the relay's message.
    #[error("relay rejected this source: {0}")]
    Rejected(String),

    /// The relay closed the connection while we were still streaming.
    #[error("relay closed the connection")]
    RelayClosed,

    /// Sending a frame failed.
    #[error("failed to send to relay: {0}")]
    Send(#[source] WsError),

    /// Reading the input failed.
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
}

/// Totals for a completed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames: u64,
    pub bytes: u64,
}

/// How the relay's side of the conversation ended.
#[derive(Debug)]
enum RelayEnd {
    Rejected(String),
    Closed,
    Failed(WsError),
}

impl RelayEnd {
    fn into_error(self) -> SourceError {
        match self {
            RelayEnd::Rejected(text) => SourceError::Rejected(text),
            RelayEnd::Closed => SourceError::RelayClosed,
            RelayEnd::Failed(e) => SourceError::Send(e),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Connects to the relay and streams `input` until end of input, until
/// `running` is cleared, or until the relay ends the session.
///
/// # Errors
///
/// See [`SourceError`].  Reaching end of input or being stopped through
/// `running` is a normal return.
pub async fn stream_to_relay<R>(
    config: &SourceConfig,
    mut input: R,
    running: Arc<AtomicBool>,
) -> Result<StreamSummary, SourceError>
where
    R: AsyncRead + Unpin,
{
    let (ws, _) = connect_async(config.url.as_str())
        .await
        .map_err(|source| SourceError::Connect {
            url: config.url.to_string(),
            source,
        })?;
    info!(url = %config.url, "connected to relay");

    let (mut sink, stream) = ws.split();
    let watcher = watch_relay(stream);
    tokio::pin!(watcher);

    let pacer = Pacer::new(config.rate);
    let started = Instant::now();
    let mut summary = StreamSummary::default();
    let mut buf = vec![0u8; config.chunk_size.max(1)];

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("stop requested");
            break;
        }

        let read = tokio::select! {
            end = &mut watcher => return Err(end.into_error()),
            read = timeout(FLAG_POLL, input.read(&mut buf)) => read,
        };
        let n = match read {
            Ok(result) => result?,
            // Nothing to read yet; go back and look at the flag.
            Err(_) => continue,
        };
        if n == 0 {
            debug!("end of input");
            break;
        }

        let sent = tokio::select! {
            end = &mut watcher => return Err(end.into_error()),
            sent = sink.send(WsMessage::Binary(buf[..n].to_vec())) => sent,
        };
        if let Err(e) = sent {
            // A rejection closes the socket; prefer reporting why.
            return Err(match timeout(config.close_timeout, &mut watcher).await {
                Ok(RelayEnd::Rejected(text)) => SourceError::Rejected(text),
                _ => SourceError::Send(e),
            });
        }

        summary.frames += 1;
        summary.bytes += n as u64;

        if let Some(wait) = pacer.delay(summary.bytes, started.elapsed()) {
            tokio::select! {
                end = &mut watcher => return Err(end.into_error()),
                _ = sleep(wait) => {}
            }
        }
    }

    if let Err(e) = sink.close().await {
        debug!("close frame not sent: {e}");
    }
    match timeout(config.close_timeout, &mut watcher).await {
        Ok(RelayEnd::Rejected(text)) => return Err(SourceError::Rejected(text)),
        Ok(_) => {}
        Err(_) => warn!("relay did not answer the close frame in time"),
    }

    info!(frames = summary.frames, bytes = summary.bytes, "stream finished");
    Ok(summary)
}

// ── Watch side ────────────────────────────────────────────────────────────────

async fn watch_relay(mut stream: SplitStream<WsStream>) -> RelayEnd {
    loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => return RelayEnd::Rejected(text),
            Some(Ok(WsMessage::Close(_))) | None => return RelayEnd::Closed,
            Some(Ok(_)) => continue,
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                return RelayEnd::Closed
            }
            Some(Err(e)) => return RelayEnd::Failed(e),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
