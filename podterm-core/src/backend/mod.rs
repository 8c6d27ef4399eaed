//! Terminal backends
//!
//! A backend is whatever a session's bytes are ultimately read from and
//! written to. Three variants exist:
//!
//! - [`LocalPtyBackend`] - a shell on a local pseudo-terminal
//! - [`RemoteExecBackend`] - an exec stream into a container
//! - [`LogBackend`] - a read-only, follow-mode container log stream
//!
//! Every backend is split into capability objects so that a session can hand
//! each one to the single task that owns it. Callers check
//! [`Backend::capabilities`] before wiring input or resize handling.

mod exec;
mod log;
mod pty;
pub mod resize;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::BackendError;
use crate::frame::TerminalSize;

pub use exec::RemoteExecBackend;
pub use log::LogBackend;
pub use pty::LocalPtyBackend;
pub use resize::{DEFAULT_RESIZE_CAPACITY, ResizeReceiver, ResizeSender, resize_queue};

/// Readable side of a backend
#[async_trait]
pub trait OutputStream: Send {
    /// Read output into `buf`. `Ok(0)` means end of stream.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, BackendError>;
}

/// Writable side of an interactive backend
#[async_trait]
pub trait InputSink: Send {
    /// Write some of `data`, returning how many bytes were accepted
    async fn write(&mut self, data: &[u8]) -> Result<usize, BackendError>;

    /// Write all of `data`
    async fn write_all(&mut self, mut data: &[u8]) -> Result<(), BackendError> {
        while !data.is_empty() {
            let n = self.write(data).await?;
            if n == 0 {
                return Err(BackendError::Write(std::io::ErrorKind::WriteZero.into()));
            }
            data = &data[n..];
        }
        Ok(())
    }
}

/// Applies terminal size changes to an interactive backend
#[async_trait]
pub trait ResizeSink: Send {
    async fn resize(&mut self, size: TerminalSize) -> Result<(), BackendError>;
}

/// Releases the process or stream behind a backend.
///
/// Implementations must tolerate being called more than once.
#[async_trait]
pub trait Teardown: Send {
    async fn release(&mut self);
}

/// Which variant a backend is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    LocalPty,
    RemoteExec,
    Log,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::LocalPty => write!(f, "local-pty"),
            BackendKind::RemoteExec => write!(f, "remote-exec"),
            BackendKind::Log => write!(f, "log"),
        }
    }
}

/// Operations a backend supports beyond reading output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub input: bool,
    pub resize: bool,
}

/// A started backend, ready to be handed to a session
pub struct Backend {
    kind: BackendKind,
    process_id: Option<u32>,
    output: Box<dyn OutputStream>,
    input: Option<Box<dyn InputSink>>,
    resize: Option<Box<dyn ResizeSink>>,
    teardown: Box<dyn Teardown>,
}

/// The capability objects of a backend, each owned by one task
pub struct BackendParts {
    pub output: Box<dyn OutputStream>,
    pub input: Option<Box<dyn InputSink>>,
    pub resize: Option<Box<dyn ResizeSink>>,
    pub teardown: Box<dyn Teardown>,
}

impl Backend {
    /// Full-duplex backend with resize support
    pub fn interactive(
        kind: BackendKind,
        output: Box<dyn OutputStream>,
        input: Box<dyn InputSink>,
        resize: Box<dyn ResizeSink>,
        teardown: Box<dyn Teardown>,
    ) -> Self {
        Self {
            kind,
            process_id: None,
            output,
            input: Some(input),
            resize: Some(resize),
            teardown,
        }
    }

    /// Output-only backend
    pub fn read_only(
        kind: BackendKind,
        output: Box<dyn OutputStream>,
        teardown: Box<dyn Teardown>,
    ) -> Self {
        Self {
            kind,
            process_id: None,
            output,
            input: None,
            resize: None,
            teardown,
        }
    }

    pub(crate) fn with_process_id(mut self, pid: Option<u32>) -> Self {
        self.process_id = pid;
        self
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            input: self.input.is_some(),
            resize: self.resize.is_some(),
        }
    }

    /// Local process id, for backends that spawn one
    pub fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    pub fn into_parts(self) -> BackendParts {
        BackendParts {
            output: self.output,
            input: self.input,
            resize: self.resize,
            teardown: self.teardown,
        }
    }
}

/// Apply queued sizes to a backend until the session closes
pub async fn drive_resizes(mut sink: Box<dyn ResizeSink>, mut sizes: ResizeReceiver) {
    while let Some(size) = sizes.next_size().await {
        if let Err(e) = sink.resize(size).await {
            tracing::warn!(
                rows = size.rows,
                cols = size.cols,
                error = %e,
                "Failed to resize terminal"
            );
        }
    }
    tracing::debug!("Resize driver stopped");
}

/// [`OutputStream`] over any tokio reader
pub struct ReaderOutput<R> {
    reader: R,
}

impl<R> ReaderOutput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R: AsyncRead + Send + Unpin> OutputStream for ReaderOutput<R> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, BackendError> {
        self.reader.read(buf).await.map_err(BackendError::Read)
    }
}

/// [`InputSink`] over any tokio writer; every write is flushed
pub struct WriterInput<W> {
    writer: W,
}

impl<W> WriterInput<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin> InputSink for WriterInput<W> {
    async fn write(&mut self, data: &[u8]) -> Result<usize, BackendError> {
        self.writer
            .write_all(data)
            .await
            .map_err(BackendError::Write)?;
        self.writer.flush().await.map_err(BackendError::Write)?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    struct NoTeardown;

    #[async_trait]
    impl Teardown for NoTeardown {
        async fn release(&mut self) {}
    }

    struct RecordingResize(Arc<std::sync::Mutex<Vec<TerminalSize>>>);

    #[async_trait]
    impl ResizeSink for RecordingResize {
        async fn resize(&mut self, size: TerminalSize) -> Result<(), BackendError> {
            self.0.lock().unwrap().push(size);
            Ok(())
        }
    }

    /// Accepts at most `chunk` bytes per write
    struct ChunkedInput {
        chunk: usize,
        received: Vec<u8>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl InputSink for ChunkedInput {
        async fn write(&mut self, data: &[u8]) -> Result<usize, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = data.len().min(self.chunk);
            self.received.extend_from_slice(&data[..n]);
            Ok(n)
        }
    }

    #[tokio::test]
    async fn write_all_loops_over_partial_writes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut input = ChunkedInput {
            chunk: 3,
            received: Vec::new(),
            calls: Arc::clone(&calls),
        };

        input.write_all(b"abcdefgh").await.unwrap();
        assert_eq!(input.received, b"abcdefgh");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn read_only_backend_has_no_input_or_resize() {
        let (reader, _writer) = tokio::io::duplex(64);
        let backend = Backend::read_only(
            BackendKind::Log,
            Box::new(ReaderOutput::new(reader)),
            Box::new(NoTeardown),
        );

        assert_eq!(
            backend.capabilities(),
            Capabilities {
                input: false,
                resize: false
            }
        );
        assert_eq!(backend.kind(), BackendKind::Log);
    }

    #[tokio::test]
    async fn reader_output_and_writer_input_round_trip_bytes() {
        let (local, remote) = tokio::io::duplex(64);
        let (remote_read, remote_write) = tokio::io::split(remote);
        let (local_read, local_write) = tokio::io::split(local);

        let mut input = WriterInput::new(local_write);
        let mut output = ReaderOutput::new(local_read);
        let mut echo_in = remote_read;
        let mut echo_out = remote_write;
        tokio::spawn(async move {
            let _ = tokio::io::copy(&mut echo_in, &mut echo_out).await;
        });

        input.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 16];
        let mut got = Vec::new();
        while got.len() < 4 {
            let n = output.read(&mut buf).await.unwrap();
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, b"ping");
    }

    #[tokio::test]
    async fn drive_resizes_applies_sizes_until_closed() {
        let closed = CancellationToken::new();
        let (tx, rx) = resize_queue(4, closed.clone());
        let applied = Arc::new(std::sync::Mutex::new(Vec::new()));
        let driver = tokio::spawn(drive_resizes(
            Box::new(RecordingResize(Arc::clone(&applied))),
            rx,
        ));

        tx.offer(TerminalSize::new(40, 120));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        closed.cancel();
        driver.await.unwrap();

        assert_eq!(*applied.lock().unwrap(), vec![TerminalSize::new(40, 120)]);
    }
}
