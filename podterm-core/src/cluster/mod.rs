//! Cluster access used by the exec and log backends
//!
//! The bridge only needs three things from a cluster: a cheap probe command,
//! an interactive exec stream, and a follow-mode log stream. They are
//! collected in [`ClusterClient`] so sessions can be built against a real
//! API server ([`KubeCluster`]) or an in-process fake ([`MockClusterClient`]).

mod kubernetes;
mod mock;

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::backend::{InputSink, OutputStream, ResizeSink};
use crate::error::BackendError;
use crate::target::{ContainerRef, LogTarget};

pub use kubernetes::KubeCluster;
pub use mock::MockClusterClient;

/// Streams of a running remote command
pub struct RemoteProcess {
    pub stdin: Box<dyn InputSink>,
    /// Terminal output; stderr is merged in by the remote TTY
    pub stdout: Box<dyn OutputStream>,
    pub resize: Box<dyn ResizeSink>,
}

/// Resolves once a remote command has finished. `Err` carries the reason
/// when the command could not be run at all; a normal exit, even a nonzero
/// one, is `Ok`.
pub type ExitStatus = BoxFuture<'static, Result<(), String>>;

/// How long the end of an output stream waits for the command's status
const STATUS_WAIT: Duration = Duration::from_secs(2);

/// Remote command output that turns a failed start into a read error.
///
/// The remote side can accept the exec request and only then fail to start
/// the command, e.g. when the shell binary is missing from the image. The
/// stream then just ends, so the status is checked at end of stream and
/// reported as [`BackendError::StartFailed`].
pub struct StatusCheckedOutput {
    inner: Box<dyn OutputStream>,
    status: Option<ExitStatus>,
}

impl StatusCheckedOutput {
    pub fn new(inner: Box<dyn OutputStream>, status: ExitStatus) -> Self {
        Self {
            inner,
            status: Some(status),
        }
    }
}

#[async_trait]
impl OutputStream for StatusCheckedOutput {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, BackendError> {
        let n = self.inner.read(buf).await?;
        if n == 0
            && let Some(status) = self.status.take()
            && let Ok(Err(message)) = tokio::time::timeout(STATUS_WAIT, status).await
        {
            return Err(BackendError::StartFailed(message));
        }
        Ok(n)
    }
}

/// Remote command execution and log access for a cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Run a short non-interactive command and report whether it succeeded
    async fn probe(&self, target: &ContainerRef, command: Vec<String>)
    -> Result<bool, BackendError>;

    /// Start an interactive TTY exec stream.
    ///
    /// The remote call is aborted as soon as `cancel` fires.
    async fn exec(
        &self,
        target: &ContainerRef,
        command: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<RemoteProcess, BackendError>;

    /// Open a follow-mode log stream. Dropping the stream ends the request.
    async fn logs(&self, target: &LogTarget) -> Result<Box<dyn OutputStream>, BackendError>;
}
