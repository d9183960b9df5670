//! Mock opportunity-stream server for integration tests.
//!
//! Accepts connections, acks subscription announcements, records received
//! messages, and can push events or abruptly drop live connections.

use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Clone)]
enum ServerCmd {
    Send(String),
    Close,
}

pub struct MockStreamServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    conn_cmds: Arc<Mutex<Vec<mpsc::UnboundedSender<ServerCmd>>>>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        Self::start_inner(None).await
    }

    /// Start a server that acks subscriptions with a fixed channel list
    /// instead of echoing the request's.
    pub async fn start_acking_channels(channels: &[&str]) -> Self {
        let channels = channels.iter().map(|c| c.to_string()).collect();
        Self::start_inner(Some(channels)).await
    }

    async fn start_inner(ack_channels: Option<Vec<String>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let conn_cmds: Arc<Mutex<Vec<mpsc::UnboundedSender<ServerCmd>>>> =
            Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let conn_cmds_clone = conn_cmds.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let messages = messages_clone.clone();
                        let connections = connections_clone.clone();
                        let ack_channels = ack_channels.clone();
                        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
                        conn_cmds_clone.lock().await.push(cmd_tx);
                        tokio::spawn(handle_connection(
                            stream,
                            messages,
                            connections,
                            ack_channels,
                            cmd_rx,
                        ));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            messages,
            connections,
            conn_cmds,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// Push a text frame to every live connection.
    pub async fn push(&self, text: impl Into<String>) {
        let text = text.into();
        for tx in self.conn_cmds.lock().await.iter() {
            let _ = tx.send(ServerCmd::Send(text.clone()));
        }
    }

    /// Abruptly drop every live connection.
    pub async fn kill_connections(&self) {
        let mut cmds = self.conn_cmds.lock().await;
        for tx in cmds.iter() {
            let _ = tx.send(ServerCmd::Close);
        }
        cmds.clear();
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    ack_channels: Option<Vec<String>>,
    mut cmd_rx: mpsc::UnboundedReceiver<ServerCmd>,
) {
    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {e}");
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(ServerCmd::Send(text)) => {
                    let _ = write.send(Message::Text(text)).await;
                }
                // Drop without a close frame to simulate an abrupt failure.
                Some(ServerCmd::Close) | None => return,
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    messages.lock().await.push_back(text.clone());

                    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) {
                        match parsed.get("method").and_then(|m| m.as_str()) {
                            Some("subscribe") => {
                                let channels = match &ack_channels {
                                    Some(fixed) => serde_json::json!(fixed),
                                    None => parsed.get("channels").cloned().unwrap_or_default(),
                                };
                                let ack = serde_json::json!({
                                    "type": "subscribed",
                                    "channels": channels,
                                });
                                let _ = write.send(Message::Text(ack.to_string())).await;
                            }
                            Some("ping") => {
                                let pong = serde_json::json!({"type": "pong"});
                                let _ = write.send(Message::Text(pong.to_string())).await;
                            }
                            _ => {}
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                _ => {}
            },
        }
    }
}
