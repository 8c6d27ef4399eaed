//! WebSocket test client for terminal sessions
//!
//! Note: Some methods may appear unused because they're only used in specific
//! test files and clippy checks each test independently.

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the server sent next
#[derive(Debug, PartialEq)]
pub enum Received {
    /// Terminal output bytes
    Output(Vec<u8>),
    /// The `error` field of an error frame
    Error(String),
    /// Connection closed
    Closed,
}

/// Terminal session client
pub struct TerminalClient {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

#[allow(dead_code)]
impl TerminalClient {
    /// Connect to a path such as `/execute/shell`
    pub async fn connect(addr: SocketAddr, path: &str) -> Self {
        let url = format!("ws://{}{}", addr, path);
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("Failed to connect");
        let (sink, stream) = ws.split();
        Self { sink, stream }
    }

    /// Send raw text message
    pub async fn send_raw(&mut self, msg: &str) {
        self.sink
            .send(Message::Text(msg.to_string().into()))
            .await
            .unwrap();
    }

    /// Send the exec handshake
    pub async fn handshake(&mut self, namespace: &str, pod: &str, container: &str, command: &str) {
        let frame = json!({
            "namespace": namespace,
            "podName": pod,
            "containerName": container,
            "command": command,
        });
        self.send_raw(&frame.to_string()).await;
    }

    pub async fn send_input(&mut self, data: &str) {
        let frame = json!({ "msg_type": "input", "data": data });
        self.send_raw(&frame.to_string()).await;
    }

    pub async fn send_resize(&mut self, rows: u16, cols: u16) {
        let frame = json!({ "msg_type": "resize", "rows": rows, "cols": cols });
        self.send_raw(&frame.to_string()).await;
    }

    /// Receive the next output chunk, error frame, or close
    pub async fn recv(&mut self) -> Received {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Received::Output(data.to_vec()),
                Some(Ok(Message::Text(text))) => {
                    let value: serde_json::Value =
                        serde_json::from_str(text.as_str()).expect("Failed to parse JSON");
                    let error = value["error"]
                        .as_str()
                        .expect("text frames carry an error")
                        .to_string();
                    return Received::Error(error);
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return Received::Closed,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Receive with timeout, returns None if timeout
    pub async fn recv_timeout(&mut self, duration: Duration) -> Option<Received> {
        tokio::time::timeout(duration, self.recv()).await.ok()
    }

    /// Collect output until it contains `needle`; panics on close or timeout
    pub async fn read_until(&mut self, needle: &str, duration: Duration) -> String {
        let mut output = Vec::new();
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.recv_timeout(remaining).await {
                Some(Received::Output(data)) => {
                    output.extend_from_slice(&data);
                    let text = String::from_utf8_lossy(&output);
                    if text.contains(needle) {
                        return text.into_owned();
                    }
                }
                Some(other) => panic!(
                    "expected output containing {:?}, got {:?} after {:?}",
                    needle,
                    other,
                    String::from_utf8_lossy(&output)
                ),
                None => panic!(
                    "timed out waiting for {:?}, got {:?}",
                    needle,
                    String::from_utf8_lossy(&output)
                ),
            }
        }
    }

    /// Wait for the server to close the connection, skipping output
    pub async fn wait_closed(&mut self, duration: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.recv_timeout(remaining).await {
                Some(Received::Closed) => return true,
                Some(_) => continue,
                None => return false,
            }
        }
    }

    /// Close from the client side
    pub async fn close(mut self) {
        let _ = self.sink.close().await;
    }
}
