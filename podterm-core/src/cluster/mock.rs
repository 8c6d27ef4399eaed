//! In-process [`ClusterClient`] for tests
//!
//! Exec streams echo their input back as output. Log streams replay a fixed
//! set of lines, honoring the requested tail length, and can be held open to
//! behave like a follow-mode stream.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use super::{ClusterClient, RemoteProcess, StatusCheckedOutput};
use crate::backend::{OutputStream, ReaderOutput, ResizeSink, WriterInput};
use crate::error::BackendError;
use crate::frame::TerminalSize;
use crate::target::{ContainerRef, LogTarget};

#[derive(Default)]
struct MockState {
    shells: Vec<String>,
    probe_delay: Option<Duration>,
    log_lines: Vec<String>,
    hold_logs_open: bool,
    log_stream_error: Option<String>,
    log_error: Option<String>,
    exec_error: Option<String>,
    exec_command_error: Option<String>,

    probes: Vec<Vec<String>>,
    execs: Vec<(ContainerRef, Vec<String>)>,
    resizes: Vec<TerminalSize>,
    log_requests: Vec<LogTarget>,
    cancelled_execs: usize,
    dropped_log_streams: usize,
}

/// Scriptable fake cluster. Clones share state.
#[derive(Clone, Default)]
pub struct MockClusterClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Shell paths that answer `which` successfully
    pub fn with_shells(self, shells: &[&str]) -> Self {
        self.state().shells = shells.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Delay every probe, to exercise probe timeouts
    pub fn with_probe_delay(self, delay: Duration) -> Self {
        self.state().probe_delay = Some(delay);
        self
    }

    pub fn with_log_lines<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().log_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Keep log streams open after the replayed lines, like `follow`
    pub fn hold_logs_open(self) -> Self {
        self.state().hold_logs_open = true;
        self
    }

    /// Fail log streams with a read error after the replayed lines
    pub fn fail_log_stream(self, message: impl Into<String>) -> Self {
        self.state().log_stream_error = Some(message.into());
        self
    }

    /// Reject log requests
    pub fn fail_logs(self, message: impl Into<String>) -> Self {
        self.state().log_error = Some(message.into());
        self
    }

    /// Reject exec requests
    pub fn fail_exec(self, message: impl Into<String>) -> Self {
        self.state().exec_error = Some(message.into());
        self
    }

    /// Accept exec requests, then fail to run the command, like a shell
    /// missing from the image: output ends at once and the exit status
    /// carries `message`
    pub fn fail_exec_command(self, message: impl Into<String>) -> Self {
        self.state().exec_command_error = Some(message.into());
        self
    }

    /// Commands received by [`ClusterClient::probe`], in order
    pub fn probes(&self) -> Vec<Vec<String>> {
        self.state().probes.clone()
    }

    /// Targets and command lines received by [`ClusterClient::exec`]
    pub fn execs(&self) -> Vec<(ContainerRef, Vec<String>)> {
        self.state().execs.clone()
    }

    /// Sizes applied to exec streams
    pub fn resizes(&self) -> Vec<TerminalSize> {
        self.state().resizes.clone()
    }

    pub fn log_requests(&self) -> Vec<LogTarget> {
        self.state().log_requests.clone()
    }

    /// Exec streams whose cancellation token fired
    pub fn cancelled_execs(&self) -> usize {
        self.state().cancelled_execs
    }

    /// Held-open log streams whose reader went away
    pub fn dropped_log_streams(&self) -> usize {
        self.state().dropped_log_streams
    }

    /// Poll `check` until it holds or `timeout` elapses
    pub async fn wait_until<F>(&self, timeout: Duration, check: F) -> bool
    where
        F: Fn(&MockClusterClient) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if check(self) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn probe(
        &self,
        _target: &ContainerRef,
        command: Vec<String>,
    ) -> Result<bool, BackendError> {
        let delay = {
            let mut state = self.state();
            state.probes.push(command.clone());
            state.probe_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let found = match command.as_slice() {
            [which, path] if which == "which" => self.state().shells.contains(path),
            _ => false,
        };
        Ok(found)
    }

    async fn exec(
        &self,
        target: &ContainerRef,
        command: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<RemoteProcess, BackendError> {
        let command_error = {
            let mut state = self.state();
            state.execs.push((target.clone(), command));
            if let Some(message) = &state.exec_error {
                return Err(BackendError::StartFailed(message.clone()));
            }
            state.exec_command_error.clone()
        };

        let (local, remote) = tokio::io::duplex(4096);
        let (local_read, local_write) = tokio::io::split(local);

        if let Some(message) = command_error {
            drop(remote);
            let mock = self.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                mock.state().cancelled_execs += 1;
            });
            let status = async move { Err(message) }.boxed();
            return Ok(RemoteProcess {
                stdin: Box::new(WriterInput::new(local_write)),
                stdout: Box::new(StatusCheckedOutput::new(
                    Box::new(ReaderOutput::new(local_read)),
                    status,
                )),
                resize: Box::new(MockResize { mock: self.clone() }),
            });
        }

        let mock = self.clone();
        tokio::spawn(async move {
            let (mut remote_read, mut remote_write) = tokio::io::split(remote);
            let echoed = tokio::select! {
                _ = cancel.cancelled() => false,
                _ = tokio::io::copy(&mut remote_read, &mut remote_write) => true,
            };
            drop(remote_read);
            drop(remote_write);
            if echoed {
                cancel.cancelled().await;
            }
            mock.state().cancelled_execs += 1;
        });

        Ok(RemoteProcess {
            stdin: Box::new(WriterInput::new(local_write)),
            stdout: Box::new(ReaderOutput::new(local_read)),
            resize: Box::new(MockResize { mock: self.clone() }),
        })
    }

    async fn logs(&self, target: &LogTarget) -> Result<Box<dyn OutputStream>, BackendError> {
        let (lines, hold_open, stream_error) = {
            let mut state = self.state();
            state.log_requests.push(target.clone());
            if let Some(message) = &state.log_error {
                return Err(BackendError::StartFailed(message.clone()));
            }
            let tail = usize::try_from(target.tail_lines).unwrap_or(usize::MAX);
            let skip = state.log_lines.len().saturating_sub(tail);
            (
                state.log_lines[skip..].to_vec(),
                state.hold_logs_open,
                state.log_stream_error.clone(),
            )
        };

        let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(64);
        let mock = self.clone();
        tokio::spawn(async move {
            for line in lines {
                if tx.send(Ok(Bytes::from(format!("{line}\n")))).await.is_err() {
                    return;
                }
            }
            if let Some(message) = stream_error {
                let _ = tx.send(Err(std::io::Error::other(message))).await;
                return;
            }
            if hold_open {
                tx.closed().await;
                mock.state().dropped_log_streams += 1;
            }
        });

        Ok(Box::new(ReaderOutput::new(StreamReader::new(
            ReceiverStream::new(rx),
        ))))
    }
}

struct MockResize {
    mock: MockClusterClient,
}

#[async_trait]
impl ResizeSink for MockResize {
    async fn resize(&mut self, size: TerminalSize) -> Result<(), BackendError> {
        self.mock.state().resizes.push(size);
        Ok(())
    }
}
