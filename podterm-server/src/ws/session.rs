//! One WebSocket connection bridged to one backend
//!
//! A session runs up to four tasks:
//!
//! - outbound: backend output to the client as binary messages
//! - inbound: client frames to the input writer and the resize queue, or a
//!   keep-alive reader for output-only backends
//! - input writer: writes queued input to the backend
//! - resize driver: applies queued sizes to the backend
//!
//! The inbound reader never waits on the backend, so a disconnect is seen
//! even while a backend has stopped accepting input.
//!
//! Whichever task finishes first calls [`Session::close`], which cancels the
//! others, releases the backend and closes the connection exactly once.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use podterm_core::{
    Backend, BackendError, BackendKind, BackendParts, ClientFrame, InputSink, OutputStream,
    ResizeSender, ServerFrame, Teardown, TerminalSize, drive_resizes, resize_queue,
};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{SessionConfig, SessionError};

struct CloseGuard {
    done: bool,
    teardown: Option<Box<dyn Teardown>>,
}

/// A terminal session over a WebSocket sink
pub struct Session<S> {
    id: Uuid,
    sink: Mutex<S>,
    closed: CancellationToken,
    close_guard: Mutex<CloseGuard>,
    config: SessionConfig,
}

impl<S> Session<S>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
{
    pub fn new(sink: S, config: SessionConfig) -> Arc<Self> {
        let id = Uuid::new_v4();
        debug!(session_id = %id, "Session created");
        Arc::new(Self {
            id,
            sink: Mutex::new(sink),
            closed: CancellationToken::new(),
            close_guard: Mutex::new(CloseGuard {
                done: false,
                teardown: None,
            }),
            config,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token cancelled when the session starts closing
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Send one message to the client
    pub async fn send(&self, message: Message) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(self.config.write_timeout, sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::ConnectionWrite(e.to_string())),
            Err(_) => Err(SessionError::WriteTimeout),
        }
    }

    /// Send an `{"error": ...}` frame
    pub async fn send_error(&self, message: &str) -> Result<(), SessionError> {
        self.send(Message::Text(ServerFrame::error(message).encode()))
            .await
    }

    /// Report a fatal error to the client, then close
    pub async fn fail(&self, message: &str) {
        warn!(session_id = %self.id, error = %message, "Session failed");
        if let Err(e) = self.send_error(message).await {
            debug!(session_id = %self.id, error = %e, "Could not deliver error frame");
        }
        self.close().await;
    }

    /// Close the session: cancel, release the backend, close the connection.
    ///
    /// Only the first call does any work.
    pub async fn close(&self) {
        let mut guard = self.close_guard.lock().await;
        if guard.done {
            return;
        }
        guard.done = true;

        self.closed.cancel();
        if let Some(mut teardown) = guard.teardown.take() {
            teardown.release().await;
        }

        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(self.config.write_timeout, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(session_id = %self.id, error = %e, "Connection close failed"),
            Err(_) => debug!(session_id = %self.id, "Connection close timed out"),
        }

        info!(session_id = %self.id, "Session closed");
    }

    /// Bridge `inbound` and `backend` until either side ends
    pub async fn run<R, E>(self: Arc<Self>, backend: Backend, inbound: R)
    where
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let kind = backend.kind();
        let BackendParts {
            output,
            input,
            resize,
            mut teardown,
        } = backend.into_parts();

        {
            let mut guard = self.close_guard.lock().await;
            if guard.done {
                drop(guard);
                teardown.release().await;
                return;
            }
            guard.teardown = Some(teardown);
        }

        info!(session_id = %self.id, backend = %kind, "Session started");

        let resizes = resize.map(|sink| {
            let (tx, rx) = resize_queue(self.config.resize_queue_capacity, self.close_token());
            tokio::spawn(drive_resizes(sink, rx));
            tx
        });

        let outbound = tokio::spawn(
            Arc::clone(&self).pump_outbound(output, kind == BackendKind::Log),
        );
        let inbound = match input {
            Some(input) => tokio::spawn(Arc::clone(&self).pump_inbound(inbound, input, resizes)),
            None => tokio::spawn(Arc::clone(&self).keep_alive(inbound)),
        };

        let (outbound, inbound) = tokio::join!(outbound, inbound);
        if let Err(e) = outbound.and(inbound) {
            warn!(session_id = %self.id, error = %e, "Session task panicked");
            self.close().await;
        }
    }

    async fn pump_outbound(
        self: Arc<Self>,
        mut output: Box<dyn OutputStream>,
        report_errors: bool,
    ) {
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];
        loop {
            let read = tokio::select! {
                _ = self.closed.cancelled() => break,
                read = output.read(&mut buf) => read,
            };
            match read {
                Ok(0) => {
                    debug!(session_id = %self.id, "Backend output ended");
                    break;
                }
                Ok(n) => {
                    if let Err(e) = self.send(Message::Binary(buf[..n].to_vec())).await {
                        debug!(session_id = %self.id, error = %e, "Failed to forward output");
                        break;
                    }
                }
                Err(e) => {
                    debug!(session_id = %self.id, error = %e, "Backend read failed");
                    if report_errors || matches!(e, BackendError::StartFailed(_)) {
                        let _ = self.send_error(&e.to_string()).await;
                    }
                    break;
                }
            }
        }

        drop(output);
        self.close().await;
    }

    async fn pump_inbound<R, E>(
        self: Arc<Self>,
        mut inbound: R,
        input: Box<dyn InputSink>,
        resizes: Option<ResizeSender>,
    ) where
        R: Stream<Item = Result<Message, E>> + Unpin + Send,
        E: Display,
    {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(Arc::clone(&self).write_input(input, input_rx));

        while let Some(bytes) = self.next_inbound(&mut inbound).await {
            match ClientFrame::decode(&bytes) {
                Ok(ClientFrame::Input(data)) => {
                    if input_tx.send(data).is_err() {
                        break;
                    }
                }
                Ok(ClientFrame::Resize(size)) => self.queue_resize(size, resizes.as_ref()),
                Ok(ClientFrame::Unknown { msg_type }) => {
                    debug!(session_id = %self.id, msg_type = %msg_type, "Ignoring unknown frame");
                }
                Err(e) => {
                    warn!(session_id = %self.id, error = %e, "Dropping malformed frame");
                }
            }
        }

        self.close().await;
        drop(input_tx);
        if let Err(e) = writer.await {
            warn!(session_id = %self.id, error = %e, "Input writer panicked");
        }
    }

    /// Writes queued input to the backend in arrival order
    async fn write_input(
        self: Arc<Self>,
        mut input: Box<dyn InputSink>,
        mut queued: mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        loop {
            let data = tokio::select! {
                _ = self.closed.cancelled() => break,
                data = queued.recv() => match data {
                    Some(data) => data,
                    None => break,
                },
            };
            let written = tokio::select! {
                _ = self.closed.cancelled() => break,
                written = input.write_all(&data) => written,
            };
            if let Err(e) = written {
                debug!(session_id = %self.id, error = %e, "Failed to forward input");
                self.close().await;
                break;
            }
        }
    }

    /// Reads and discards client messages so disconnects are noticed
    async fn keep_alive<R, E>(self: Arc<Self>, mut inbound: R)
    where
        R: Stream<Item = Result<Message, E>> + Unpin + Send,
        E: Display,
    {
        while self.next_inbound(&mut inbound).await.is_some() {}
        self.close().await;
    }

    /// Payload of the next data message, or `None` once the connection is done
    async fn next_inbound<R, E>(&self, inbound: &mut R) -> Option<Vec<u8>>
    where
        R: Stream<Item = Result<Message, E>> + Unpin + Send,
        E: Display,
    {
        loop {
            let next = tokio::select! {
                _ = self.closed.cancelled() => return None,
                next = tokio::time::timeout(self.config.idle_timeout, inbound.next()) => next,
            };
            match next {
                Err(_) => {
                    info!(session_id = %self.id, "Connection idle, closing session");
                    return None;
                }
                Ok(None) => {
                    debug!(session_id = %self.id, "Client disconnected");
                    return None;
                }
                Ok(Some(Err(e))) => {
                    let e = SessionError::ConnectionRead(e.to_string());
                    debug!(session_id = %self.id, error = %e, "Connection ended");
                    return None;
                }
                Ok(Some(Ok(message))) => match message {
                    Message::Text(text) => return Some(text.into_bytes()),
                    Message::Binary(data) => return Some(data),
                    Message::Close(_) => {
                        debug!(session_id = %self.id, "Client sent close frame");
                        return None;
                    }
                    Message::Ping(_) | Message::Pong(_) => continue,
                },
            }
        }
    }

    fn queue_resize(&self, size: TerminalSize, resizes: Option<&ResizeSender>) {
        if size.is_empty() {
            debug!(
                session_id = %self.id,
                rows = size.rows,
                cols = size.cols,
                "Ignoring empty resize"
            );
            return;
        }
        match resizes {
            Some(tx) => {
                tx.offer(size);
            }
            None => debug!(session_id = %self.id, "Backend does not support resize"),
        }
    }
}

/// Read the first data message of a connection, e.g. a handshake
pub async fn read_first<R, E>(inbound: &mut R, timeout: std::time::Duration) -> Option<Vec<u8>>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    loop {
        match tokio::time::timeout(timeout, inbound.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(text.into_bytes()),
            Ok(Some(Ok(Message::Binary(data)))) => return Some(data),
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}
