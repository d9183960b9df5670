//! Event stream client with silent reconnect.
//!
//! State machine: `Disconnected → Connecting → Connected`, then
//! `Connected → Reconnecting → Connecting → Connected` on remote close or
//! transport error, and any state `→ Disconnected` on explicit
//! `disconnect()`. A single background task owns the socket and sequences
//! reconnect attempts, so exactly one reconnect timer is ever armed and at
//! most one attempt is in flight.

use crate::error::{StreamError, StreamResult};
use crate::heartbeat::HeartbeatMonitor;
use crate::message::{decode_frame, Frame, PingRequest, StreamEvent, SubscribeRequest};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Stream client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket URL of the opportunity stream.
    pub url: String,
    /// Channels named in the subscription announcement.
    pub channels: Vec<String>,
    /// Fixed delay before a reconnect attempt.
    pub reconnect_delay_ms: u64,
    /// Handshake + subscription-ack deadline for one connection attempt.
    pub handshake_timeout_ms: u64,
    /// Idle interval before an application-level ping.
    pub heartbeat_interval_ms: u64,
    /// Pong deadline after a ping.
    pub heartbeat_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            channels: vec!["opportunities".to_string()],
            reconnect_delay_ms: 3000,
            handshake_timeout_ms: 5000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 10_000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

enum LoopExit {
    Cancelled,
    Failed(StreamError),
}

/// Persistent subscription to the opportunity stream.
pub struct EventStreamClient {
    config: StreamConfig,
    state: RwLock<StreamState>,
    event_tx: mpsc::Sender<StreamEvent>,
    /// Replaced on re-arm; cancelled by `disconnect()`.
    token: Mutex<CancellationToken>,
    heartbeat: HeartbeatMonitor,
    reconnects: AtomicU64,
}

impl EventStreamClient {
    /// Create a client that forwards decoded events to `event_tx`.
    pub fn new(config: StreamConfig, event_tx: mpsc::Sender<StreamEvent>) -> Self {
        let heartbeat =
            HeartbeatMonitor::new(config.heartbeat_interval_ms, config.heartbeat_timeout_ms);
        Self {
            config,
            state: RwLock::new(StreamState::Disconnected),
            event_tx,
            token: Mutex::new(CancellationToken::new()),
            heartbeat,
            reconnects: AtomicU64::new(0),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> StreamState {
        *self.state.read()
    }

    /// Number of successful reconnects since construction.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: StreamState) {
        *self.state.write() = state;
    }

    /// Re-arm auto-reconnect after a previous `disconnect()`.
    fn rearm(&self) -> CancellationToken {
        let mut guard = self.token.lock();
        if guard.is_cancelled() {
            *guard = CancellationToken::new();
        }
        guard.clone()
    }

    /// Connect and start the background read loop.
    ///
    /// Resolves once the handshake and subscription announcement succeed;
    /// rejects if this first attempt fails. Later failures are handled
    /// internally by the reconnect path and never surface here.
    pub async fn connect(self: &Arc<Self>) -> StreamResult<()> {
        {
            let mut state = self.state.write();
            if *state != StreamState::Disconnected {
                return Err(StreamError::ConnectionFailed(
                    "client is already active".to_string(),
                ));
            }
            *state = StreamState::Connecting;
        }
        let token = self.rearm();

        let socket = match self.dial_and_subscribe().await {
            Ok(socket) => socket,
            Err(e) => {
                self.set_state(StreamState::Disconnected);
                return Err(e);
            }
        };

        self.set_state(StreamState::Connected);
        info!(url = %self.config.url, "Opportunity stream connected");

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(socket, token).await });
        Ok(())
    }

    /// Stop the client and suppress auto-reconnect until the next `connect()`.
    ///
    /// Idempotent; cancels a pending reconnect timer if one is armed.
    pub fn disconnect(&self) {
        self.token.lock().cancel();
        self.set_state(StreamState::Disconnected);
    }

    async fn dial_and_subscribe(&self) -> StreamResult<WsStream> {
        debug!(url = %self.config.url, "Dialing opportunity stream");
        let (mut socket, _response) = connect_async(&self.config.url).await?;

        let announce = serde_json::to_string(&SubscribeRequest::new(&self.config.channels))?;
        socket.send(Message::Text(announce)).await?;

        let deadline = Duration::from_millis(self.config.handshake_timeout_ms);
        tokio::time::timeout(deadline, self.await_subscription_ack(&mut socket))
            .await
            .map_err(|_| StreamError::HandshakeTimeout(self.config.handshake_timeout_ms))??;

        self.heartbeat.reset();
        Ok(socket)
    }

    /// Wait for the subscription ack, forwarding any events that arrive
    /// ahead of it.
    ///
    /// An ack that names channels must cover every requested one; an ack
    /// without a channel list is accepted as-is.
    async fn await_subscription_ack(&self, socket: &mut WsStream) -> StreamResult<()> {
        while let Some(msg) = socket.next().await {
            match msg? {
                Message::Text(text) => match decode_frame(&text) {
                    Frame::SubscriptionAck(acked) => {
                        if !acked.is_empty() {
                            if let Some(missing) =
                                self.config.channels.iter().find(|c| !acked.contains(c))
                            {
                                return Err(StreamError::SubscriptionRejected(format!(
                                    "ack does not cover channel {missing}"
                                )));
                            }
                        }
                        return Ok(());
                    }
                    Frame::Event(event) => {
                        let _ = self.event_tx.send(event).await;
                    }
                    Frame::Pong | Frame::Ignored => {}
                },
                Message::Ping(data) => socket.send(Message::Pong(data)).await?,
                Message::Close(frame) => {
                    let (code, reason) = close_details(frame);
                    return Err(StreamError::ConnectionClosed { code, reason });
                }
                _ => {}
            }
        }
        Err(StreamError::ConnectionClosed {
            code: 1006,
            reason: "stream ended during handshake".to_string(),
        })
    }

    async fn run(self: Arc<Self>, mut socket: WsStream, token: CancellationToken) {
        loop {
            match self.read_loop(&mut socket, &token).await {
                LoopExit::Cancelled => {
                    self.set_state(StreamState::Disconnected);
                    info!("Opportunity stream disconnected");
                    return;
                }
                LoopExit::Failed(e) => {
                    warn!(error = %e, "Stream connection lost, will reconnect");
                }
            }

            // Reconnect path. Failures here degrade the agent to poll-only
            // operation; they are logged and retried, never raised.
            loop {
                self.set_state(StreamState::Reconnecting);
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_millis(self.config.reconnect_delay_ms)) => {}
                    () = token.cancelled() => {
                        self.set_state(StreamState::Disconnected);
                        info!("Disconnect requested during reconnect delay");
                        return;
                    }
                }

                self.set_state(StreamState::Connecting);
                tokio::select! {
                    result = self.dial_and_subscribe() => match result {
                        Ok(new_socket) => {
                            socket = new_socket;
                            self.set_state(StreamState::Connected);
                            let n = self.reconnects.fetch_add(1, Ordering::Relaxed) + 1;
                            info!(reconnects = n, "Opportunity stream reconnected");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "Reconnect attempt failed");
                        }
                    },
                    () = token.cancelled() => {
                        self.set_state(StreamState::Disconnected);
                        return;
                    }
                }
            }
        }
    }

    async fn read_loop(&self, socket: &mut WsStream, token: &CancellationToken) -> LoopExit {
        loop {
            tokio::select! {
                () = token.cancelled() => {
                    // Graceful close; best effort.
                    let _ = socket.send(Message::Close(None)).await;
                    return LoopExit::Cancelled;
                }

                msg = socket.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.heartbeat.record_activity();
                            match decode_frame(&text) {
                                Frame::Event(event) => {
                                    if self.event_tx.send(event).await.is_err() {
                                        warn!("Stream event receiver dropped");
                                    }
                                }
                                Frame::Pong => self.heartbeat.record_pong(),
                                Frame::SubscriptionAck(_) | Frame::Ignored => {}
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                return LoopExit::Failed(e.into());
                            }
                        }
                        Some(Ok(Message::Pong(_))) => self.heartbeat.record_pong(),
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = close_details(frame);
                            return LoopExit::Failed(StreamError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return LoopExit::Failed(e.into()),
                        None => {
                            return LoopExit::Failed(StreamError::ConnectionClosed {
                                code: 1006,
                                reason: "stream ended".to_string(),
                            });
                        }
                    }
                }

                () = self.heartbeat.tick() => {
                    if self.heartbeat.is_timed_out() {
                        return LoopExit::Failed(StreamError::HeartbeatTimeout);
                    }
                    if self.heartbeat.should_ping() {
                        let ping = match serde_json::to_string(&PingRequest::new()) {
                            Ok(p) => p,
                            Err(e) => return LoopExit::Failed(e.into()),
                        };
                        if let Err(e) = socket.send(Message::Text(ping)).await {
                            return LoopExit::Failed(e.into());
                        }
                        self.heartbeat.record_ping();
                        debug!("Sent stream heartbeat ping");
                    }
                }
            }
        }
    }
}

fn close_details(
    frame: Option<tokio_tungstenite::tungstenite::protocol::CloseFrame<'_>>,
) -> (u16, String) {
    frame
        .map(|f| (f.code.into(), f.reason.to_string()))
        .unwrap_or((1000, "normal close".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.reconnect_delay_ms, 3000);
        assert_eq!(config.channels, vec!["opportunities".to_string()]);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (tx, _rx) = mpsc::channel(8);
        let client = EventStreamClient::new(StreamConfig::default(), tx);
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), StreamState::Disconnected);
    }
}
