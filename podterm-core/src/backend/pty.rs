//! Local shell on a pseudo-terminal

use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Backend, BackendKind, InputSink, ReaderOutput, ResizeSink, Teardown};
use crate::config::PtyConfig;
use crate::error::BackendError;
use crate::frame::TerminalSize;

/// Size of a single read from the PTY master
const READ_CHUNK: usize = 8192;

/// Output chunks buffered between the reader thread and the session
const OUTPUT_CHANNEL_DEPTH: usize = 64;

type SharedMaster = Arc<Mutex<Option<Box<dyn MasterPty + Send>>>>;
type SharedWriter = Arc<Mutex<Option<Box<dyn Write + Send>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Spawns the configured shell on a fresh pseudo-terminal
pub struct LocalPtyBackend;

impl LocalPtyBackend {
    pub fn spawn(config: &PtyConfig) -> Result<Backend, BackendError> {
        info!(
            shell = %config.shell.display(),
            cols = config.initial_cols,
            rows = config.initial_rows,
            "Spawning local PTY shell"
        );

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: config.initial_rows,
                cols: config.initial_cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| BackendError::StartFailed(format!("failed to open pty: {}", e)))?;

        let mut cmd = CommandBuilder::new(&config.shell);
        for arg in &config.shell_args {
            cmd.arg(arg);
        }
        cmd.env("TERM", &config.term);
        if let Some(dir) = &config.cwd {
            cmd.cwd(dir);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| BackendError::StartFailed(format!("failed to spawn shell: {}", e)))?;
        // The child holds its own slave handles; ours must go so the master
        // sees EOF when the shell exits.
        drop(pair.slave);

        let pid = child.process_id();

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| BackendError::StartFailed(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| BackendError::StartFailed(e.to_string()))?;

        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_DEPTH);
        std::thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || pump_pty_output(reader, tx))
            .map_err(|e| BackendError::StartFailed(format!("failed to start reader: {}", e)))?;

        let closed = CancellationToken::new();
        let master: SharedMaster = Arc::new(Mutex::new(Some(pair.master)));
        let writer: SharedWriter = Arc::new(Mutex::new(Some(writer)));

        let output = ReaderOutput::new(StreamReader::new(ReceiverStream::new(rx)));
        let input = PtyInput {
            writer: Arc::clone(&writer),
            closed: closed.clone(),
        };
        let resize = PtyResize {
            master: Arc::clone(&master),
        };
        let teardown = PtyTeardown {
            child: Some(child),
            master,
            writer,
            closed,
        };

        debug!(pid = ?pid, "Local PTY shell started");

        Ok(Backend::interactive(
            BackendKind::LocalPty,
            Box::new(output),
            Box::new(input),
            Box::new(resize),
            Box::new(teardown),
        )
        .with_process_id(pid))
    }
}

/// Blocking reader loop; runs on its own thread until EOF or the receiver is gone
fn pump_pty_output(
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::Sender<std::io::Result<Bytes>>,
) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if is_slave_closed(&e) => break,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
    debug!("PTY reader finished");
}

/// Linux reports EIO on the master once every slave handle is closed
#[cfg(unix)]
fn is_slave_closed(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}

#[cfg(not(unix))]
fn is_slave_closed(_err: &std::io::Error) -> bool {
    false
}

struct PtyInput {
    writer: SharedWriter,
    closed: CancellationToken,
}

#[async_trait]
impl InputSink for PtyInput {
    async fn write(&mut self, data: &[u8]) -> Result<usize, BackendError> {
        if self.closed.is_cancelled() {
            return Err(BackendError::SessionClosed);
        }

        let writer = Arc::clone(&self.writer);
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&writer);
            let writer = guard.as_mut().ok_or(BackendError::SessionClosed)?;
            writer.write_all(&data).map_err(BackendError::Write)?;
            writer.flush().map_err(BackendError::Write)?;
            Ok(data.len())
        })
        .await
        .map_err(|e| BackendError::Write(std::io::Error::other(e)))?
    }
}

struct PtyResize {
    master: SharedMaster,
}

#[async_trait]
impl ResizeSink for PtyResize {
    async fn resize(&mut self, size: TerminalSize) -> Result<(), BackendError> {
        let guard = lock(&self.master);
        let master = guard.as_ref().ok_or(BackendError::SessionClosed)?;
        master
            .resize(PtySize {
                rows: size.rows,
                cols: size.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| BackendError::Resize(e.to_string()))?;
        debug!(rows = size.rows, cols = size.cols, "Resized PTY");
        Ok(())
    }
}

struct PtyTeardown {
    child: Option<Box<dyn Child + Send + Sync>>,
    master: SharedMaster,
    writer: SharedWriter,
    closed: CancellationToken,
}

#[async_trait]
impl Teardown for PtyTeardown {
    async fn release(&mut self) {
        self.closed.cancel();

        if let Some(mut child) = self.child.take() {
            let pid = child.process_id();
            if let Err(e) = child.kill() {
                // Usually means the shell already exited
                debug!(pid = ?pid, error = %e, "Failed to kill shell");
            }
            match tokio::task::spawn_blocking(move || child.wait()).await {
                Ok(Ok(status)) => {
                    info!(pid = ?pid, exit_code = status.exit_code(), "Shell terminated")
                }
                Ok(Err(e)) => warn!(pid = ?pid, error = %e, "Failed to reap shell"),
                Err(e) => warn!(pid = ?pid, error = %e, "Reaper task failed"),
            }
        }

        lock(&self.writer).take();
        if lock(&self.master).take().is_some() {
            debug!("PTY master closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OutputStream;
    use std::path::PathBuf;
    use std::time::Duration;

    fn shell_config(shell: &str) -> PtyConfig {
        PtyConfig {
            shell: PathBuf::from(shell),
            shell_args: Vec::new(),
            ..Default::default()
        }
    }

    async fn read_until(output: &mut Box<dyn OutputStream>, needle: &str) -> String {
        let mut collected = Vec::new();
        let mut buf = [0u8; 1024];
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !String::from_utf8_lossy(&collected).contains(needle) {
            let n = tokio::time::timeout_at(deadline, output.read(&mut buf))
                .await
                .expect("timed out waiting for pty output")
                .expect("pty read failed");
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
        }
        String::from_utf8_lossy(&collected).into_owned()
    }

    #[test]
    fn spawn_invalid_shell_fails() {
        let result = LocalPtyBackend::spawn(&shell_config("/nonexistent/shell"));
        assert!(matches!(result, Err(BackendError::StartFailed(_))));
    }

    #[tokio::test]
    async fn spawned_shell_is_interactive() {
        let backend = LocalPtyBackend::spawn(&shell_config("/bin/sh")).unwrap();
        assert_eq!(backend.kind(), BackendKind::LocalPty);
        assert!(backend.capabilities().input);
        assert!(backend.capabilities().resize);
        assert!(backend.process_id().is_some());

        let mut parts = backend.into_parts();
        parts.teardown.release().await;
    }

    #[tokio::test]
    async fn input_reaches_shell_and_output_comes_back() {
        let backend = LocalPtyBackend::spawn(&shell_config("/bin/sh")).unwrap();
        let mut parts = backend.into_parts();
        let input = parts.input.as_mut().unwrap();

        input.write_all(b"echo $((40 + 2))\n").await.unwrap();
        let output = read_until(&mut parts.output, "42").await;
        assert!(output.contains("42"), "got: {:?}", output);

        parts.teardown.release().await;
    }

    #[tokio::test]
    async fn exports_fixed_term() {
        let backend = LocalPtyBackend::spawn(&shell_config("/bin/sh")).unwrap();
        let mut parts = backend.into_parts();

        parts
            .input
            .as_mut()
            .unwrap()
            .write_all(b"echo term=$TERM.\n")
            .await
            .unwrap();
        let output = read_until(&mut parts.output, "term=xterm-256color.").await;
        assert!(output.contains("term=xterm-256color."), "got: {:?}", output);

        parts.teardown.release().await;
    }

    #[tokio::test]
    async fn resize_is_visible_to_the_shell() {
        let backend = LocalPtyBackend::spawn(&shell_config("/bin/sh")).unwrap();
        let mut parts = backend.into_parts();

        parts
            .resize
            .as_mut()
            .unwrap()
            .resize(TerminalSize::new(33, 101))
            .await
            .unwrap();
        parts
            .input
            .as_mut()
            .unwrap()
            .write_all(b"stty size\n")
            .await
            .unwrap();
        let output = read_until(&mut parts.output, "33 101").await;
        assert!(output.contains("33 101"), "got: {:?}", output);

        parts.teardown.release().await;
    }

    #[tokio::test]
    async fn writes_after_release_fail_with_session_closed() {
        let backend = LocalPtyBackend::spawn(&shell_config("/bin/sh")).unwrap();
        let mut parts = backend.into_parts();
        parts.teardown.release().await;

        let result = parts.input.as_mut().unwrap().write(b"ls\n").await;
        assert!(matches!(result, Err(BackendError::SessionClosed)));
        let result = parts
            .resize
            .as_mut()
            .unwrap()
            .resize(TerminalSize::new(24, 80))
            .await;
        assert!(matches!(result, Err(BackendError::SessionClosed)));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let backend = LocalPtyBackend::spawn(&shell_config("/bin/sh")).unwrap();
        let mut parts = backend.into_parts();
        parts.teardown.release().await;
        parts.teardown.release().await;
    }

    #[tokio::test]
    async fn output_ends_when_shell_exits() {
        let backend = LocalPtyBackend::spawn(&shell_config("/bin/sh")).unwrap();
        let mut parts = backend.into_parts();
        parts
            .input
            .as_mut()
            .unwrap()
            .write_all(b"exit\n")
            .await
            .unwrap();

        let mut buf = [0u8; 1024];
        let reached_eof = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match parts.output.read(&mut buf).await {
                    Ok(0) | Err(_) => return true,
                    Ok(_) => continue,
                }
            }
        })
        .await
        .unwrap_or(false);
        assert!(reached_eof);

        parts.teardown.release().await;
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn release_terminates_and_reaps_the_shell() {
        let backend = LocalPtyBackend::spawn(&shell_config("/bin/sh")).unwrap();
        let pid = backend.process_id().unwrap();
        let proc_path = PathBuf::from(format!("/proc/{}", pid));
        assert!(proc_path.exists());

        let mut parts = backend.into_parts();
        parts.teardown.release().await;

        assert!(!proc_path.exists(), "shell {} still present after release", pid);
    }
}
