//! End-to-end tests: a real relay on an ephemeral port, driven by
//! tokio-tungstenite clients.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use minicast_core::SOURCE_BUSY_MESSAGE;
use minicast_relay::application::Relay;
use minicast_relay::domain::RelayConfig;
use minicast_relay::infrastructure::RelayServer;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(2);

// ── Harness ───────────────────────────────────────────────────────────────────

struct TestRelay {
    addr: SocketAddr,
    relay: Arc<Relay>,
    running: Arc<AtomicBool>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestRelay {
    async fn start(history_limit: usize) -> Self {
        let config = RelayConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            history_limit,
            close_grace: Duration::from_millis(500),
            ..RelayConfig::default()
        };
        let server = RelayServer::bind(config).await.expect("bind relay");
        let addr = server.local_addr().expect("local addr");
        let relay = server.relay();
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(server.run(Arc::clone(&running)));
        Self {
            addr,
            relay,
            running,
            task,
        }
    }

    async fn connect(&self, query: &str) -> Client {
        let url = format!("ws://{}/ws{query}", self.addr);
        let (ws, _) = connect_async(url).await.expect("connect to relay");
        ws
    }

    async fn source(&self) -> Client {
        self.connect("?source=true").await
    }

    async fn listener(&self) -> Client {
        self.connect("").await
    }

    async fn wait_for_listeners(&self, n: usize) {
        let relay = Arc::clone(&self.relay);
        eventually(move || {
            let relay = Arc::clone(&relay);
            async move { relay.listener_count().await == n }
        })
        .await;
    }

    async fn wait_for_source(&self, present: bool) {
        let relay = Arc::clone(&self.relay);
        eventually(move || {
            let relay = Arc::clone(&relay);
            async move { relay.active_source().await.is_some() == present }
        })
        .await;
    }

    async fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server stops")
            .expect("server task")
            .expect("server result");
    }
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + WAIT;
    while !check().await {
        assert!(Instant::now() < deadline, "condition not met within {WAIT:?}");
        sleep(Duration::from_millis(10)).await;
    }
}

/// Next data or close message, skipping pings and pongs.  `None` when the
/// stream ended or failed.
async fn next_message(ws: &mut Client) -> Option<Message> {
    loop {
        let item = timeout(WAIT, ws.next()).await.expect("message in time");
        match item {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(msg)) => return Some(msg),
            Some(Err(_)) | None => return None,
        }
    }
}

async fn next_binary(ws: &mut Client) -> Vec<u8> {
    match next_message(ws).await {
        Some(Message::Binary(data)) => data,
        other => panic!("expected binary frame, got {other:?}"),
    }
}

/// True when nothing but pings arrives within `window`.
async fn stays_quiet(ws: &mut Client, window: Duration) -> bool {
    timeout(window, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                _ => return,
            }
        }
    })
    .await
    .is_err()
}

fn is_closing(msg: Option<Message>) -> bool {
    matches!(msg, None | Some(Message::Close(_)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_relay_scenario_fanout_exclusivity_and_departure() {
    let relay = TestRelay::start(0).await;

    // Source S, listeners L1 and L2.
    let mut source = relay.source().await;
    relay.wait_for_source(true).await;
    let active = relay.relay.active_source().await;
    let mut l1 = relay.listener().await;
    let mut l2 = relay.listener().await;
    relay.wait_for_listeners(2).await;

    // S sends 0xAA 0xBB; both listeners get it bit-for-bit.
    source
        .send(Message::Binary(vec![0xAA, 0xBB]))
        .await
        .unwrap();
    assert_eq!(next_binary(&mut l1).await, vec![0xAA, 0xBB]);
    assert_eq!(next_binary(&mut l2).await, vec![0xAA, 0xBB]);

    // S2 is rejected with the busy text and closed; S stays active.
    let mut s2 = relay.source().await;
    assert_eq!(
        next_message(&mut s2).await,
        Some(Message::Text(SOURCE_BUSY_MESSAGE.to_string()))
    );
    assert!(is_closing(next_message(&mut s2).await));
    assert_eq!(relay.relay.active_source().await, active);

    // L1 leaves; only L2 receives 0xCC.
    l1.close(None).await.unwrap();
    relay.wait_for_listeners(1).await;
    source.send(Message::Binary(vec![0xCC])).await.unwrap();
    assert_eq!(next_binary(&mut l2).await, vec![0xCC]);
    assert_eq!(relay.relay.listener_count().await, 1);

    relay.stop().await;
}

#[tokio::test]
async fn test_concurrent_sources_admit_exactly_one() {
    let relay = TestRelay::start(0).await;

    let mut attempts = Vec::new();
    for _ in 0..5 {
        let url = format!("ws://{}/ws?source=true", relay.addr);
        attempts.push(tokio::spawn(async move {
            let (mut ws, _) = connect_async(url).await.expect("connect");
            // Rejected sources hear back immediately; the winner hears nothing.
            let rejected = !stays_quiet(&mut ws, Duration::from_millis(500)).await;
            (rejected, ws)
        }));
    }

    let mut rejected = 0;
    let mut clients = Vec::new();
    for attempt in attempts {
        let (was_rejected, ws) = attempt.await.unwrap();
        if was_rejected {
            rejected += 1;
        }
        clients.push(ws);
    }

    assert_eq!(rejected, 4);
    assert!(relay.relay.active_source().await.is_some());

    relay.stop().await;
}

#[tokio::test]
async fn test_source_departure_frees_the_slot() {
    let relay = TestRelay::start(0).await;

    let mut first = relay.source().await;
    relay.wait_for_source(true).await;
    first.close(None).await.unwrap();
    relay.wait_for_source(false).await;

    let mut second = relay.source().await;
    relay.wait_for_source(true).await;
    assert!(stays_quiet(&mut second, Duration::from_millis(200)).await);

    relay.stop().await;
}

#[tokio::test]
async fn test_late_listener_is_seeded_from_history() {
    let relay = TestRelay::start(1024).await;

    let mut source = relay.source().await;
    relay.wait_for_source(true).await;
    source.send(Message::Binary(vec![1, 2])).await.unwrap();
    source.send(Message::Binary(vec![3])).await.unwrap();
    {
        let relay = Arc::clone(&relay.relay);
        eventually(move || {
            let relay = Arc::clone(&relay);
            async move { relay.stats().await.fanout.frames == 2 }
        })
        .await;
    }

    let mut late = relay.listener().await;
    assert_eq!(next_binary(&mut late).await, vec![1, 2]);
    assert_eq!(next_binary(&mut late).await, vec![3]);

    source.send(Message::Binary(vec![4])).await.unwrap();
    assert_eq!(next_binary(&mut late).await, vec![4]);

    relay.stop().await;
}

#[tokio::test]
async fn test_source_text_messages_are_not_relayed() {
    let relay = TestRelay::start(0).await;
    let mut source = relay.source().await;
    relay.wait_for_source(true).await;
    let mut listener = relay.listener().await;
    relay.wait_for_listeners(1).await;

    source.send(Message::Text("hello".to_string())).await.unwrap();
    source.send(Message::Binary(vec![9])).await.unwrap();

    assert_eq!(next_binary(&mut listener).await, vec![9]);

    relay.stop().await;
}

#[tokio::test]
async fn test_wrong_path_is_refused_with_404() {
    let relay = TestRelay::start(0).await;

    let result = connect_async(format!("ws://{}/elsewhere?source=true", relay.addr)).await;

    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
        Err(other) => panic!("expected HTTP 404, got {other}"),
        Ok(_) => panic!("upgrade on the wrong path must fail"),
    }
    assert!(relay.relay.active_source().await.is_none());
    assert_eq!(relay.relay.listener_count().await, 0);

    relay.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_source_and_listeners() {
    let relay = TestRelay::start(0).await;
    let mut source = relay.source().await;
    relay.wait_for_source(true).await;
    let mut listener = relay.listener().await;
    relay.wait_for_listeners(1).await;
    let handle = Arc::clone(&relay.relay);

    relay.stop().await;

    assert!(is_closing(next_message(&mut source).await));
    assert!(is_closing(next_message(&mut listener).await));
    assert!(handle.is_shut_down());
    assert_eq!(handle.listener_count().await, 0);
    assert!(handle.active_source().await.is_none());
}
