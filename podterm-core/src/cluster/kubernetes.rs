//! [`ClusterClient`] backed by the Kubernetes API server

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{FutureExt, SinkExt};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{AttachParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ClusterClient, RemoteProcess, StatusCheckedOutput};
use crate::backend::{OutputStream, ReaderOutput, ResizeSink, WriterInput};
use crate::config::ClusterConfig;
use crate::error::{BackendError, ClusterError};
use crate::frame::TerminalSize;
use crate::target::{ContainerRef, LogTarget};

/// Cluster access through a kube [`Client`]
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the configured kubeconfig, or infer one
    pub async fn connect(config: &ClusterConfig) -> Result<Self, ClusterError> {
        let options = KubeConfigOptions {
            context: config.context.clone(),
            ..Default::default()
        };

        let kube_config = match &config.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| ClusterError::Config(format!("{}: {}", path.display(), e)))?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| ClusterError::Config(e.to_string()))?
            }
            None if config.context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| ClusterError::Config(e.to_string()))?,
            None => Config::infer()
                .await
                .map_err(|e| ClusterError::Config(e.to_string()))?,
        };

        info!(cluster_url = %kube_config.cluster_url, "Connecting to cluster");

        let client =
            Client::try_from(kube_config).map_err(|e| ClusterError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn for_container(params: AttachParams, target: &ContainerRef) -> AttachParams {
    match &target.container {
        Some(container) => params.container(container.clone()),
        None => params,
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn probe(
        &self,
        target: &ContainerRef,
        command: Vec<String>,
    ) -> Result<bool, BackendError> {
        let params = for_container(
            AttachParams::default().stdin(false).stdout(true).stderr(true),
            target,
        );
        let mut process = self
            .pods(&target.namespace)
            .exec(&target.pod, command, &params)
            .await
            .map_err(|e| BackendError::StartFailed(e.to_string()))?;

        let status = match process.take_status() {
            Some(status) => status.await,
            None => None,
        };
        Ok(status.and_then(|s| s.status).as_deref() == Some("Success"))
    }

    async fn exec(
        &self,
        target: &ContainerRef,
        command: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<RemoteProcess, BackendError> {
        let params = for_container(AttachParams::interactive_tty(), target);
        let mut process = self
            .pods(&target.namespace)
            .exec(&target.pod, command, &params)
            .await
            .map_err(|e| BackendError::StartFailed(e.to_string()))?;

        let stdin = process
            .stdin()
            .ok_or_else(|| BackendError::StartFailed("exec stream has no stdin".to_string()))?;
        let stdout = process
            .stdout()
            .ok_or_else(|| BackendError::StartFailed("exec stream has no stdout".to_string()))?;
        let resize = process.terminal_size().ok_or_else(|| {
            BackendError::StartFailed("exec stream has no resize channel".to_string())
        })?;
        let status = process
            .take_status()
            .ok_or_else(|| BackendError::StartFailed("exec stream has no status".to_string()))?;
        let status = async move { status.await.as_ref().map_or(Ok(()), exec_outcome) }.boxed();

        let pod = target.pod.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            debug!(pod = %pod, "Aborting remote exec");
            process.abort();
        });

        Ok(RemoteProcess {
            stdin: Box::new(WriterInput::new(stdin)),
            stdout: Box::new(StatusCheckedOutput::new(
                Box::new(ReaderOutput::new(stdout)),
                status,
            )),
            resize: Box::new(KubeResize { sender: resize }),
        })
    }

    async fn logs(&self, target: &LogTarget) -> Result<Box<dyn OutputStream>, BackendError> {
        let params = LogParams {
            container: target.container.container.clone(),
            follow: true,
            tail_lines: Some(target.tail_lines),
            previous: target.previous,
            timestamps: false,
            ..Default::default()
        };

        let stream = self
            .pods(&target.container.namespace)
            .log_stream(&target.container.pod, &params)
            .await
            .map_err(|e| BackendError::StartFailed(e.to_string()))?;

        Ok(Box::new(ReaderOutput::new(Box::pin(stream).compat())))
    }
}

/// Whether a finished exec ran its command. A nonzero exit is a normal end.
fn exec_outcome(status: &Status) -> Result<(), String> {
    if status.status.as_deref() == Some("Success")
        || status.reason.as_deref() == Some("NonZeroExitCode")
    {
        return Ok(());
    }
    Err(status
        .message
        .clone()
        .or_else(|| status.reason.clone())
        .unwrap_or_else(|| "remote command failed".to_string()))
}

struct KubeResize {
    sender: mpsc::Sender<kube::api::TerminalSize>,
}

#[async_trait]
impl ResizeSink for KubeResize {
    async fn resize(&mut self, size: TerminalSize) -> Result<(), BackendError> {
        self.sender
            .send(kube::api::TerminalSize {
                width: size.cols,
                height: size.rows,
            })
            .await
            .map_err(|e| BackendError::Resize(e.to_string()))
    }
}
