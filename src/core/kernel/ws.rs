use crate::core::errors::ClearNodeError;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, instrument, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Close code reported when the client closes the session itself
pub const CLIENT_CLOSE_CODE: u16 = 1000;

/// Lifecycle of a single WebSocket session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

/// Receiver of inbound transport events
///
/// `on_close` fires exactly once per established connection, whatever ended it.
/// `on_error` is informational and is always followed by `on_close`.
pub trait WsEventHandler: Send + Sync + 'static {
    fn on_message(&self, payload: &[u8]);

    fn on_close(&self, code: Option<u16>, reason: &str);

    fn on_error(&self, error: &ClearNodeError);
}

#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Handshake timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
        }
    }
}

/// WebSocket session trait - pure transport layer
#[async_trait]
pub trait WsSession: Send + Sync {
    /// Connect if not already open, delivering inbound events to `handler`.
    ///
    /// Concurrent callers do not open duplicate connections: they wait for the
    /// in-flight handshake and then observe its outcome.
    async fn connect(&self, handler: Arc<dyn WsEventHandler>) -> Result<(), ClearNodeError>;

    /// Send a text frame; requires an open session
    async fn send_text(&self, text: String) -> Result<(), ClearNodeError>;

    /// Close the connection
    async fn close(&self) -> Result<(), ClearNodeError>;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}

struct SessionShared {
    state: ConnectionState,
    // Bumped for every connection so a stale reader can't close a newer one
    generation: u64,
    handler: Option<Arc<dyn WsEventHandler>>,
    reader: Option<JoinHandle<()>>,
}

fn lock(shared: &Mutex<SessionShared>) -> MutexGuard<'_, SessionShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mark the connection of `generation` closed and notify its handler, at most once
fn finish(shared: &Mutex<SessionShared>, generation: u64, code: Option<u16>, reason: &str) {
    let handler = {
        let mut shared = lock(shared);
        if shared.generation != generation || shared.state != ConnectionState::Open {
            return;
        }
        shared.state = ConnectionState::Closed;
        shared.reader = None;
        shared.handler.take()
    };

    info!(code = ?code, reason = %reason, "WebSocket closed");
    if let Some(handler) = handler {
        handler.on_close(code, reason);
    }
}

/// Tungstenite-based WebSocket session
pub struct TungsteniteWs {
    url: String,
    config: WsConfig,
    shared: Arc<Mutex<SessionShared>>,
    write: Arc<tokio::sync::Mutex<Option<WsWriter>>>,
    connect_guard: tokio::sync::Mutex<()>,
}

impl TungsteniteWs {
    /// Create a new, disconnected session for `url`
    pub fn new(url: String) -> Self {
        Self {
            url,
            config: WsConfig::default(),
            shared: Arc::new(Mutex::new(SessionShared {
                state: ConnectionState::Disconnected,
                generation: 0,
                handler: None,
                reader: None,
            })),
            write: Arc::new(tokio::sync::Mutex::new(None)),
            connect_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Set custom WebSocket configuration
    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return to `Disconnected` after a failed handshake, unless close() got there first
    fn abandon(&self, generation: u64) {
        let mut shared = lock(&self.shared);
        if shared.generation == generation && shared.state == ConnectionState::Connecting {
            shared.state = ConnectionState::Disconnected;
        }
    }
}

#[async_trait]
impl WsSession for TungsteniteWs {
    #[instrument(skip(self, handler), fields(url = %self.url))]
    async fn connect(&self, handler: Arc<dyn WsEventHandler>) -> Result<(), ClearNodeError> {
        // Single-flight: later callers queue here and re-check once the first finishes
        let _guard = self.connect_guard.lock().await;

        let generation = {
            let mut shared = lock(&self.shared);
            if shared.state == ConnectionState::Open {
                return Ok(());
            }
            shared.state = ConnectionState::Connecting;
            shared.generation += 1;
            shared.generation
        };

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let ws_stream = match tokio::time::timeout(connect_timeout, connect_async(&self.url)).await
        {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => {
                self.abandon(generation);
                return Err(ClearNodeError::NetworkError(format!(
                    "WebSocket connection failed: {}",
                    e
                )));
            }
            Err(_) => {
                self.abandon(generation);
                return Err(ClearNodeError::ConnectionTimeout(format!(
                    "WebSocket handshake exceeded {}ms",
                    self.config.connect_timeout_ms
                )));
            }
        };

        let (mut write, read) = ws_stream.split();

        // Hold the writer slot while publishing Open so a concurrent close() either
        // wins before this point or finds the writer installed
        let mut write_slot = self.write.lock().await;
        let superseded = {
            let mut shared = lock(&self.shared);
            if shared.generation == generation && shared.state == ConnectionState::Connecting {
                shared.state = ConnectionState::Open;
                shared.handler = Some(Arc::clone(&handler));
                false
            } else {
                true
            }
        };

        if superseded {
            drop(write_slot);
            if let Err(e) = write.send(Message::Close(None)).await {
                debug!("Close frame not delivered: {}", e);
            }
            info!("WebSocket closed while the handshake was in flight");
            return Err(ClearNodeError::ConnectionClosed(
                "closed during connect".to_string(),
            ));
        }

        *write_slot = Some(write);
        drop(write_slot);

        let reader = tokio::spawn(read_loop(
            read,
            Arc::clone(&self.shared),
            Arc::clone(&self.write),
            generation,
            handler,
        ));

        {
            let mut shared = lock(&self.shared);
            if shared.generation == generation && shared.state == ConnectionState::Open {
                shared.reader = Some(reader);
            } else {
                reader.abort();
            }
        }

        info!("WebSocket connected");
        Ok(())
    }

    #[instrument(skip(self, text), fields(url = %self.url, len = text.len()))]
    async fn send_text(&self, text: String) -> Result<(), ClearNodeError> {
        let generation = {
            let shared = lock(&self.shared);
            if shared.state != ConnectionState::Open {
                return Err(ClearNodeError::NotConnected);
            }
            shared.generation
        };

        let mut write = self.write.lock().await;
        let writer = write.as_mut().ok_or(ClearNodeError::NotConnected)?;

        if let Err(e) = writer.send(Message::Text(text)).await {
            let reason = format!("Failed to send WebSocket message: {}", e);
            write.take();
            drop(write);
            finish(&self.shared, generation, None, &reason);
            return Err(ClearNodeError::NetworkError(reason));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn close(&self) -> Result<(), ClearNodeError> {
        let (handler, reader) = {
            let mut shared = lock(&self.shared);
            let was_open = shared.state == ConnectionState::Open;
            shared.state = ConnectionState::Closed;
            shared.generation += 1;
            let handler = if was_open { shared.handler.take() } else { None };
            (handler, shared.reader.take())
        };

        if let Some(mut write) = self.write.lock().await.take() {
            if let Err(e) = write.send(Message::Close(None)).await {
                debug!("Close frame not delivered: {}", e);
            }
        }

        if let Some(reader) = reader {
            reader.abort();
        }

        if let Some(handler) = handler {
            info!("WebSocket closed by client");
            handler.on_close(Some(CLIENT_CLOSE_CODE), "closed by client");
        }

        Ok(())
    }

    fn state(&self) -> ConnectionState {
        lock(&self.shared).state
    }
}

async fn read_loop(
    mut read: WsReader,
    shared: Arc<Mutex<SessionShared>>,
    write: Arc<tokio::sync::Mutex<Option<WsWriter>>>,
    generation: u64,
    handler: Arc<dyn WsEventHandler>,
) {
    let (code, reason) = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => handler.on_message(text.as_bytes()),
            Some(Ok(Message::Binary(data))) => handler.on_message(&data),
            Some(Ok(Message::Ping(data))) => {
                // Auto-respond to pings at transport level
                if let Some(writer) = write.lock().await.as_mut() {
                    if let Err(e) = writer.send(Message::Pong(data)).await {
                        warn!("Failed to send pong response: {}", e);
                    }
                }
            }
            Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                break frame.map_or((None, "closed by remote".to_string()), |frame| {
                    (Some(u16::from(frame.code)), frame.reason.to_string())
                });
            }
            Some(Err(e)) => {
                let error = ClearNodeError::NetworkError(format!("WebSocket error: {}", e));
                warn!("{}", error);
                handler.on_error(&error);
                break (None, error.to_string());
            }
            None => break (None, "stream ended".to_string()),
        }
    };

    finish(&shared, generation, code, &reason);
}
