//! Interactive exec stream into a container

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Backend, BackendKind, Teardown};
use crate::cluster::ClusterClient;
use crate::error::BackendError;
use crate::prober::ShellProber;
use crate::target::ExecTarget;

/// Opens a TTY exec stream running the best available shell
pub struct RemoteExecBackend;

impl RemoteExecBackend {
    /// Probe for a shell, then start the exec stream.
    ///
    /// The stream lives until `cancel` fires or the backend is released.
    pub async fn open(
        cluster: &dyn ClusterClient,
        prober: &ShellProber,
        target: &ExecTarget,
        cancel: CancellationToken,
    ) -> Result<Backend, BackendError> {
        let container = target.container_ref();
        let shell = prober.pick(cluster, &container).await;
        let command = target.command_line(&shell);

        info!(
            namespace = %container.namespace,
            pod = %container.pod,
            container = ?container.container,
            command = ?command,
            "Starting remote exec"
        );

        let token = cancel.child_token();
        let process = cluster.exec(&container, command, token.clone()).await?;

        Ok(Backend::interactive(
            BackendKind::RemoteExec,
            process.stdout,
            process.stdin,
            process.resize,
            Box::new(ExecTeardown { cancel: token }),
        ))
    }
}

struct ExecTeardown {
    cancel: CancellationToken,
}

#[async_trait]
impl Teardown for ExecTeardown {
    async fn release(&mut self) {
        if !self.cancel.is_cancelled() {
            debug!("Cancelling remote exec");
            self.cancel.cancel();
        }
    }
}
