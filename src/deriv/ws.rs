use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::backoff::{BackoffStep, ExponentialBackoff, ReconnectPolicy};
use super::registry::{lock, HandlerRegistry, Subscription, SubscriptionKey};
use super::types::{
    msg_type, ActiveSymbolsRequest, ForgetAllRequest, TicksRequest, MSG_CONNECTION_LOG,
    MSG_WILDCARD, TICKS_FEED_KEY,
};
use crate::error::AppError;
use crate::event::{ConnectionLog, LogLevel, WsConnectionStatus};

/// Connection log entries kept in memory.
pub const LOG_CAPACITY: usize = 100;

/// Lifecycle of the client's single logical connection.
///
/// `Disconnected { intentional: true }` is terminal until the next
/// `connect()`; it is also the state of a client that never connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Disconnected { intentional: bool },
}

struct Session {
    state: ConnectionState,
    /// Bumped by every `connect()`; supervisors of older generations are inert.
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    shutdown: Option<watch::Sender<bool>>,
    /// `connect()` callers waiting for the next open or failed attempt.
    waiters: Vec<oneshot::Sender<Result<(), AppError>>>,
}

struct Shared {
    url: String,
    policy: ReconnectPolicy,
    session: Mutex<Session>,
    handlers: Arc<Mutex<HandlerRegistry>>,
    logs: Mutex<VecDeque<ConnectionLog>>,
}

/// Deriv WebSocket client with automatic reconnection, message-type
/// subscriptions and a capped connection log.
#[derive(Clone)]
pub struct DerivWsClient {
    shared: Arc<Shared>,
}

impl DerivWsClient {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                policy,
                session: Mutex::new(Session {
                    state: ConnectionState::Disconnected { intentional: true },
                    generation: 0,
                    outbound: None,
                    shutdown: None,
                    waiters: Vec::new(),
                }),
                handlers: Arc::new(Mutex::new(HandlerRegistry::default())),
                logs: Mutex::new(VecDeque::with_capacity(LOG_CAPACITY)),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Open the connection and keep it alive until [`disconnect`](Self::disconnect).
    ///
    /// Resolves once the next transport open succeeds. If that attempt fails
    /// the error is returned, but reconnection keeps running in the
    /// background. Calls made while an earlier `connect()` is still pending
    /// restart the attempt and all callers resolve with its outcome.
    pub async fn connect(&self) -> Result<(), AppError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (generation, shutdown_rx) = {
            let mut session = lock(&self.shared.session);
            if session.state == ConnectionState::Connected {
                return Ok(());
            }
            if let Some(previous) = session.shutdown.take() {
                let _ = previous.send(true);
            }
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            session.generation += 1;
            session.state = ConnectionState::Connecting;
            session.outbound = None;
            session.shutdown = Some(shutdown_tx);
            session.waiters.push(ready_tx);
            (session.generation, shutdown_rx)
        };

        tokio::spawn(run_supervisor(
            Arc::clone(&self.shared),
            generation,
            shutdown_rx,
        ));

        ready_rx
            .await
            .unwrap_or_else(|_| Err(AppError::WebSocket("connection attempt cancelled".into())))
    }

    /// Close the connection and stop reconnecting.
    pub fn disconnect(&self) {
        let (was_active, was_connected) = {
            let mut session = lock(&self.shared.session);
            let was_connected = session.state == ConnectionState::Connected;
            session.state = ConnectionState::Disconnected { intentional: true };
            session.outbound = None;
            // Pending connect() calls resolve as cancelled.
            session.waiters.clear();
            let was_active = match session.shutdown.take() {
                Some(shutdown) => {
                    let _ = shutdown.send(true);
                    true
                }
                None => false,
            };
            (was_active, was_connected)
        };

        if was_active {
            self.shared.log(LogLevel::Info, "Disconnected from WebSocket");
            if was_connected {
                self.shared.notify_status(WsConnectionStatus::Disconnected);
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.shared.session).state
    }

    pub fn is_connected(&self) -> bool {
        let session = lock(&self.shared.session);
        session.state == ConnectionState::Connected && session.outbound.is_some()
    }

    /// Serialize and queue `message`. Returns `false` (and logs an error)
    /// when the client is not connected; nothing is buffered in that case.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        // Serialize the message itself so field order on the wire is preserved.
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                self.shared
                    .log(LogLevel::Error, format!("Cannot send message: {}", e));
                return false;
            }
        };

        let outbound = {
            let session = lock(&self.shared.session);
            match session.state {
                ConnectionState::Connected => session.outbound.clone(),
                _ => None,
            }
        };
        let queued = outbound
            .map(|tx| tx.send(Message::Text(text.clone())).is_ok())
            .unwrap_or(false);
        if !queued {
            self.shared.log(
                LogLevel::Error,
                "Cannot send message: WebSocket not connected",
            );
            return false;
        }

        let feed_symbol = serde_json::from_str::<Value>(&text).ok().and_then(|v| {
            v.get(TICKS_FEED_KEY)
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        let summary = match feed_symbol {
            Some(symbol) => format!("Subscribe to {}", symbol),
            None => text.chars().take(50).collect(),
        };
        self.shared
            .log(LogLevel::Info, format!("Sent: {}", summary));
        true
    }

    pub fn subscribe_ticks(&self, symbol: &str) {
        if !self.is_connected() {
            self.shared
                .log(LogLevel::Error, "Cannot subscribe to ticks: not connected");
            return;
        }
        if self.send(&TicksRequest::subscribe(symbol)) {
            self.shared
                .log(LogLevel::Info, format!("Subscribed to ticks for {}", symbol));
        }
    }

    pub fn unsubscribe_ticks(&self) {
        if !self.is_connected() {
            self.shared
                .log(LogLevel::Warning, "Cannot unsubscribe: not connected");
            return;
        }
        if self.send(&ForgetAllRequest::default()) {
            self.shared
                .log(LogLevel::Info, "Unsubscribed from all ticks");
        }
    }

    pub fn get_active_symbols(&self) {
        if self.send(&ActiveSymbolsRequest::default()) {
            self.shared
                .log(LogLevel::Info, "Requested active symbols");
        }
    }

    /// Register `handler` for frames whose `msg_type` equals `msg_type`
    /// (`"*"` receives every frame, `"connection_log"` receives log entries).
    pub fn subscribe<F>(&self, msg_type: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = lock(&self.shared.handlers).add_message(msg_type, Arc::new(handler));
        Subscription::new(
            &self.shared.handlers,
            SubscriptionKey::Message(msg_type.to_string()),
            id,
        )
    }

    pub fn on_connection_status<F>(&self, handler: F) -> Subscription
    where
        F: Fn(WsConnectionStatus) + Send + Sync + 'static,
    {
        let id = lock(&self.shared.handlers).add_status(Arc::new(handler));
        Subscription::new(&self.shared.handlers, SubscriptionKey::Status, id)
    }

    /// Copy of the connection log, oldest first.
    pub fn connection_logs(&self) -> Vec<ConnectionLog> {
        lock(&self.shared.logs).iter().cloned().collect()
    }
}

impl Shared {
    /// Move to `next` unless this generation was superseded or the client was
    /// closed on purpose.
    fn transition(&self, generation: u64, next: ConnectionState) -> bool {
        let mut session = lock(&self.session);
        if !session_is_live(&session, generation) {
            return false;
        }
        session.state = next;
        if next != ConnectionState::Connected {
            session.outbound = None;
        }
        true
    }

    fn open(&self, generation: u64, outbound: mpsc::UnboundedSender<Message>) -> bool {
        let mut session = lock(&self.session);
        if !session_is_live(&session, generation) {
            return false;
        }
        session.state = ConnectionState::Connected;
        session.outbound = Some(outbound);
        true
    }

    /// Resolve every pending `connect()` unless this generation was superseded.
    fn settle_waiters(&self, generation: u64, outcome: impl Fn() -> Result<(), AppError>) {
        let waiters = {
            let mut session = lock(&self.session);
            if session.generation != generation {
                return;
            }
            std::mem::take(&mut session.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(outcome());
        }
    }

    fn is_live(&self, generation: u64) -> bool {
        session_is_live(&lock(&self.session), generation)
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = ConnectionLog::new(level, message);
        match level {
            LogLevel::Info => tracing::info!(url = %self.url, "{}", entry.message),
            LogLevel::Warning => tracing::warn!(url = %self.url, "{}", entry.message),
            LogLevel::Error => tracing::error!(url = %self.url, "{}", entry.message),
        }

        {
            let mut logs = lock(&self.logs);
            logs.push_back(entry.clone());
            while logs.len() > LOG_CAPACITY {
                logs.pop_front();
            }
        }

        let handlers = lock(&self.handlers).message_handlers(MSG_CONNECTION_LOG);
        if handlers.is_empty() {
            return;
        }
        match serde_json::to_value(&entry) {
            Ok(value) => {
                for handler in handlers {
                    handler(&value);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode connection log"),
        }
    }

    fn notify_status(&self, status: WsConnectionStatus) {
        let handlers = lock(&self.handlers).status_handlers();
        for handler in handlers {
            handler(status);
        }
    }

    fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(message) => self.dispatch(&message),
            Err(e) => self.log(LogLevel::Error, format!("Failed to parse message: {}", e)),
        }
    }

    /// Run handlers for the frame's `msg_type` and wildcard handlers against a
    /// snapshot of the registry.
    fn dispatch(&self, message: &Value) {
        let handlers = {
            let registry = lock(&self.handlers);
            let mut handlers = msg_type(message)
                .map(|t| registry.message_handlers(t))
                .unwrap_or_default();
            handlers.extend(registry.message_handlers(MSG_WILDCARD));
            handlers
        };
        for handler in handlers {
            handler(message);
        }
    }

    /// Shuttle frames until the connection drops (`Err`) or shutdown (`Ok`).
    async fn pump(
        &self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        mut outbound: mpsc::UnboundedReceiver<Message>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), String> {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| format!("closed by server ({})", f.code))
                                .unwrap_or_else(|| "closed by server".to_string());
                            return Err(reason);
                        }
                        Some(Ok(_)) => {
                            // tokio-tungstenite answers pings itself
                        }
                        Some(Err(e)) => return Err(format!("read error: {}", e)),
                        None => return Err("stream ended".to_string()),
                    }
                }
                out = outbound.recv() => {
                    match out {
                        Some(message) => {
                            if let Err(e) = write.send(message).await {
                                return Err(format!("write error: {}", e));
                            }
                        }
                        None => {
                            // disconnect() dropped the sender
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                }
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
            }
        }
    }
}

fn session_is_live(session: &Session, generation: u64) -> bool {
    session.generation == generation
        && session.state != (ConnectionState::Disconnected { intentional: true })
}

/// Sleep for `delay`; `false` if shutdown was requested meanwhile.
async fn sleep_unless_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => !*shutdown.borrow(),
        _ = shutdown.changed() => false,
    }
}

async fn run_supervisor(
    shared: Arc<Shared>,
    generation: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = ExponentialBackoff::new(shared.policy);

    'session: loop {
        if !shared.transition(generation, ConnectionState::Connecting) {
            break;
        }
        shared.log(LogLevel::Info, "Connecting to Deriv WebSocket API");

        let attempt = tokio::select! {
            res = tokio_tungstenite::connect_async(shared.url.as_str()) => res,
            _ = shutdown.changed() => break,
        };

        match attempt {
            Ok((stream, _resp)) => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                if !shared.open(generation, outbound_tx) {
                    break;
                }
                backoff.reset();
                shared.log(LogLevel::Info, "WebSocket connection established");
                shared.notify_status(WsConnectionStatus::Connected);
                shared.settle_waiters(generation, || Ok(()));

                match shared.pump(stream, outbound_rx, &mut shutdown).await {
                    Ok(()) => break,
                    Err(reason) => shared.log(
                        LogLevel::Info,
                        format!("WebSocket connection closed: {}", reason),
                    ),
                }
            }
            Err(e) => {
                shared.log(LogLevel::Error, format!("WebSocket error occurred: {}", e));
                let reason = e.to_string();
                shared.settle_waiters(generation, || Err(AppError::WebSocket(reason.clone())));
            }
        }

        if !shared.transition(generation, ConnectionState::Disconnected { intentional: false }) {
            break;
        }
        shared.notify_status(WsConnectionStatus::Disconnected);

        let delay = loop {
            match backoff.next_step() {
                BackoffStep::Retry { attempt, delay } => {
                    if !shared.transition(generation, ConnectionState::Reconnecting { attempt }) {
                        break 'session;
                    }
                    let delay_ms = delay.as_millis() as u64;
                    shared.notify_status(WsConnectionStatus::Reconnecting { attempt, delay_ms });
                    shared.log(
                        LogLevel::Info,
                        format!(
                            "Reconnecting in {}ms (attempt {}/{})",
                            delay_ms,
                            attempt,
                            backoff.policy().max_attempts
                        ),
                    );
                    break delay;
                }
                BackoffStep::Exhausted { cooldown } => {
                    shared.log(LogLevel::Error, "Max reconnection attempts reached");
                    if !sleep_unless_shutdown(cooldown, &mut shutdown).await
                        || !shared.is_live(generation)
                    {
                        break 'session;
                    }
                    backoff.reset();
                    shared.log(
                        LogLevel::Info,
                        "Resetting reconnection attempts, will try again",
                    );
                }
            }
        };

        if !sleep_unless_shutdown(delay, &mut shutdown).await {
            break;
        }
    }

    tracing::debug!(generation, url = %shared.url, "WS supervisor exiting");
}
