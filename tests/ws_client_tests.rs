use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use digit_scope::deriv::types::{MSG_CONNECTION_LOG, MSG_TICK, MSG_WILDCARD};
use digit_scope::deriv::{ConnectionState, DerivWsClient, ReconnectPolicy, Subscription, LOG_CAPACITY};
use digit_scope::event::{LogLevel, WsConnectionStatus};

const WAIT: Duration = Duration::from_secs(5);

type ServerSide = WebSocketStream<TcpStream>;

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(200),
        max_attempts: 10,
        cooldown: Duration::from_millis(100),
    }
}

/// Local WebSocket server; every accepted connection is handed to the test.
async fn spawn_server() -> (String, mpsc::UnboundedReceiver<ServerSide>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = accept_async(stream).await {
                if tx.send(ws).is_err() {
                    break;
                }
            }
        }
    });
    (format!("ws://{}", addr), rx)
}

async fn next_conn(conns: &mut mpsc::UnboundedReceiver<ServerSide>) -> ServerSide {
    timeout(WAIT, conns.recv())
        .await
        .expect("timed out waiting for client connection")
        .expect("server task ended")
}

async fn next_text(server: &mut ServerSide) -> String {
    loop {
        let frame = timeout(WAIT, server.next())
            .await
            .expect("timed out waiting for frame")
            .expect("client closed the stream")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

async fn wait_for_log(client: &DerivWsClient, message: &str) {
    let found = timeout(WAIT, async {
        loop {
            if client.connection_logs().iter().any(|l| l.message == message) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(found.is_ok(), "log entry '{}' never appeared", message);
}

#[test]
fn operations_while_disconnected_only_log() {
    let client = DerivWsClient::new("ws://127.0.0.1:9", ReconnectPolicy::default());
    assert_eq!(
        client.state(),
        ConnectionState::Disconnected { intentional: true }
    );
    assert!(!client.is_connected());

    assert!(!client.send(&json!({"ping": 1})));
    client.subscribe_ticks("R_100");
    client.unsubscribe_ticks();
    client.get_active_symbols();

    let logs = client.connection_logs();
    let summary: Vec<(LogLevel, &str)> = logs
        .iter()
        .map(|l| (l.level, l.message.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (LogLevel::Error, "Cannot send message: WebSocket not connected"),
            (LogLevel::Error, "Cannot subscribe to ticks: not connected"),
            (LogLevel::Warning, "Cannot unsubscribe: not connected"),
            (LogLevel::Error, "Cannot send message: WebSocket not connected"),
        ]
    );

    // Nothing was connected, so this is a no-op.
    client.disconnect();
    assert_eq!(client.connection_logs().len(), 4);
}

#[test]
fn connection_log_is_capped_and_published() {
    let client = DerivWsClient::new("ws://127.0.0.1:9", ReconnectPolicy::default());
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_handler = Arc::clone(&seen);
    let sub = client.subscribe(MSG_CONNECTION_LOG, move |entry| {
        assert_eq!(entry["type"], "error");
        assert!(entry["timestamp"].is_string());
        seen_in_handler.fetch_add(1, Ordering::SeqCst);
    });

    for _ in 0..LOG_CAPACITY + 25 {
        client.send(&json!({"ping": 1}));
    }

    let logs = client.connection_logs();
    assert_eq!(logs.len(), LOG_CAPACITY);
    assert!(logs.first().unwrap().timestamp <= logs.last().unwrap().timestamp);
    assert_eq!(seen.load(Ordering::SeqCst), LOG_CAPACITY + 25);

    assert!(sub.unsubscribe());
    client.send(&json!({"ping": 1}));
    assert_eq!(seen.load(Ordering::SeqCst), LOG_CAPACITY + 25);
    assert_eq!(client.connection_logs().len(), LOG_CAPACITY);
}

#[tokio::test]
async fn requests_go_out_in_wire_format_and_frames_are_dispatched() {
    let (url, mut conns) = spawn_server().await;
    let client = DerivWsClient::new(url, fast_policy());
    tokio_test::assert_ok!(client.connect().await);
    assert!(client.is_connected());
    let mut server = next_conn(&mut conns).await;

    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel::<Value>();
    let _tick_sub = client.subscribe(MSG_TICK, move |msg| {
        let _ = tick_tx.send(msg.clone());
    });
    let (any_tx, mut any_rx) = mpsc::unbounded_channel::<Value>();
    let _any_sub = client.subscribe(MSG_WILDCARD, move |msg| {
        let _ = any_tx.send(msg.clone());
    });

    client.subscribe_ticks("R_100");
    assert_eq!(next_text(&mut server).await, r#"{"ticks":"R_100","subscribe":1}"#);
    client.unsubscribe_ticks();
    assert_eq!(next_text(&mut server).await, r#"{"forget_all":"ticks"}"#);
    client.get_active_symbols();
    assert_eq!(
        next_text(&mut server).await,
        r#"{"active_symbols":"brief","product_type":"basic"}"#
    );

    let tick = json!({
        "msg_type": "tick",
        "tick": {"epoch": 1, "quote": 1234.56, "symbol": "R_100", "pip_size": 2}
    });
    server.send(Message::Text("not json".into())).await.unwrap();
    server.send(Message::Text(tick.to_string())).await.unwrap();
    server
        .send(Message::Text(json!({"msg_type": "ping", "ping": "pong"}).to_string()))
        .await
        .unwrap();

    assert_eq!(recv(&mut tick_rx).await, tick);
    assert_eq!(recv(&mut any_rx).await, tick);
    assert_eq!(recv(&mut any_rx).await["msg_type"], "ping");
    assert!(tick_rx.try_recv().is_err());

    let logs = client.connection_logs();
    assert!(logs
        .iter()
        .any(|l| l.level == LogLevel::Error && l.message.starts_with("Failed to parse message")));
    assert!(logs.iter().any(|l| l.message == "Sent: Subscribe to R_100"));
    assert!(logs.iter().any(|l| l.message == "Subscribed to ticks for R_100"));
    assert!(logs.iter().any(|l| l.message == "Requested active symbols"));

    client.disconnect();
}

#[tokio::test]
async fn disconnect_is_terminal() {
    let (url, mut conns) = spawn_server().await;
    let client = DerivWsClient::new(url, fast_policy());
    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    let _status_sub = client.on_connection_status(move |status| {
        let _ = status_tx.send(status);
    });

    tokio_test::assert_ok!(client.connect().await);
    let mut server = next_conn(&mut conns).await;
    assert_eq!(recv(&mut status_rx).await, WsConnectionStatus::Connected);

    client.disconnect();
    assert_eq!(
        client.state(),
        ConnectionState::Disconnected { intentional: true }
    );
    assert!(!client.is_connected());
    assert_eq!(recv(&mut status_rx).await, WsConnectionStatus::Disconnected);
    assert!(!client.send(&json!({"ping": 1})));

    // The server sees the close and the client never dials again.
    let closed = timeout(WAIT, async {
        loop {
            match server.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
    assert!(timeout(Duration::from_millis(300), conns.recv()).await.is_err());
    assert!(status_rx.try_recv().is_err());
    assert!(client
        .connection_logs()
        .iter()
        .any(|l| l.message == "Disconnected from WebSocket"));
}

#[tokio::test]
async fn reconnects_after_server_closes() {
    let (url, mut conns) = spawn_server().await;
    let client = DerivWsClient::new(url, fast_policy());
    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    let _status_sub = client.on_connection_status(move |status| {
        let _ = status_tx.send(status);
    });

    tokio_test::assert_ok!(client.connect().await);
    assert_eq!(recv(&mut status_rx).await, WsConnectionStatus::Connected);

    let mut server = next_conn(&mut conns).await;
    server.close(None).await.unwrap();

    assert_eq!(recv(&mut status_rx).await, WsConnectionStatus::Disconnected);
    assert_eq!(
        recv(&mut status_rx).await,
        WsConnectionStatus::Reconnecting {
            attempt: 1,
            delay_ms: 20
        }
    );
    let mut server = next_conn(&mut conns).await;
    assert_eq!(recv(&mut status_rx).await, WsConnectionStatus::Connected);
    assert!(client.is_connected());
    assert!(client
        .connection_logs()
        .iter()
        .any(|l| l.message == "Reconnecting in 20ms (attempt 1/10)"));

    // The new connection carries traffic.
    client.subscribe_ticks("R_50");
    assert_eq!(next_text(&mut server).await, r#"{"ticks":"R_50","subscribe":1}"#);

    client.disconnect();
}

#[tokio::test]
async fn failed_first_connect_returns_error_and_keeps_retrying() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let policy = ReconnectPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        max_attempts: 2,
        cooldown: Duration::from_millis(50),
    };
    let client = DerivWsClient::new(format!("ws://127.0.0.1:{}", port), policy);

    tokio_test::assert_err!(client.connect().await);
    assert!(!client.is_connected());

    wait_for_log(&client, "Max reconnection attempts reached").await;
    wait_for_log(&client, "Resetting reconnection attempts, will try again").await;
    assert!(client
        .connection_logs()
        .iter()
        .any(|l| l.level == LogLevel::Error && l.message.starts_with("WebSocket error occurred")));

    client.disconnect();
    assert_eq!(
        client.state(),
        ConnectionState::Disconnected { intentional: true }
    );
}

#[tokio::test]
async fn unsubscribe_inside_handler_applies_to_later_frames() {
    let (url, mut conns) = spawn_server().await;
    let client = DerivWsClient::new(url, fast_policy());
    tokio_test::assert_ok!(client.connect().await);
    let mut server = next_conn(&mut conns).await;

    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let first_hits = Arc::new(AtomicUsize::new(0));
    let slot_in_handler = Arc::clone(&slot);
    let hits_in_handler = Arc::clone(&first_hits);
    let first = client.subscribe(MSG_TICK, move |_| {
        hits_in_handler.fetch_add(1, Ordering::SeqCst);
        if let Some(sub) = slot_in_handler.lock().unwrap().take() {
            sub.unsubscribe();
        }
    });
    *slot.lock().unwrap() = Some(first);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _second = client.subscribe(MSG_TICK, move |msg| {
        let _ = tx.send(msg["tick"]["epoch"].as_u64());
    });

    for epoch in 1..=2u64 {
        let frame = json!({
            "msg_type": "tick",
            "tick": {"epoch": epoch, "quote": 1.0, "symbol": "R_100"}
        });
        server.send(Message::Text(frame.to_string())).await.unwrap();
    }

    assert_eq!(recv(&mut rx).await, Some(1));
    assert_eq!(recv(&mut rx).await, Some(2));
    assert_eq!(first_hits.load(Ordering::SeqCst), 1);

    client.disconnect();
}

#[tokio::test]
async fn connect_while_connected_is_a_no_op() {
    let (url, mut conns) = spawn_server().await;
    let client = DerivWsClient::new(url, fast_policy());
    tokio_test::assert_ok!(client.connect().await);
    let _server = next_conn(&mut conns).await;

    tokio_test::assert_ok!(client.connect().await);
    assert!(timeout(Duration::from_millis(200), conns.recv()).await.is_err());
    assert_eq!(client.state(), ConnectionState::Connected);

    client.disconnect();
}

#[tokio::test]
async fn disconnect_always_sends_close_frame() {
    let (url, mut conns) = spawn_server().await;
    let client = DerivWsClient::new(url, fast_policy());

    for _ in 0..5 {
        tokio_test::assert_ok!(client.connect().await);
        let mut server = next_conn(&mut conns).await;

        client.disconnect();

        let frame = timeout(WAIT, server.next())
            .await
            .expect("timed out waiting for close frame");
        assert!(
            matches!(frame, Some(Ok(Message::Close(_)))),
            "expected a close frame, got {:?}",
            frame
        );
    }
}

#[tokio::test]
async fn overlapping_connect_calls_all_resolve() {
    let (url, mut conns) = spawn_server().await;
    let client = DerivWsClient::new(url, fast_policy());
    let other = client.clone();

    let (first, second) = tokio::join!(client.connect(), other.connect());
    tokio_test::assert_ok!(first);
    tokio_test::assert_ok!(second);
    assert!(client.is_connected());
    let _server = next_conn(&mut conns).await;

    client.disconnect();
}

#[tokio::test]
async fn pending_connect_is_cancelled_by_disconnect() {
    // Accepts TCP through the backlog but never answers the upgrade.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let client = DerivWsClient::new(url, fast_policy());

    let (first, second) = (client.clone(), client.clone());
    let pending = tokio::spawn(async move {
        tokio::join!(first.connect(), second.connect())
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.state(), ConnectionState::Connecting);
    client.disconnect();

    let (a, b) = timeout(WAIT, pending)
        .await
        .expect("connect never resolved")
        .unwrap();
    tokio_test::assert_err!(a);
    tokio_test::assert_err!(b);
    drop(listener);
}
