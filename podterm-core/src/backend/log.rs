//! Follow-mode container log stream

use async_trait::async_trait;
use tracing::info;

use super::{Backend, BackendKind, Teardown};
use crate::cluster::ClusterClient;
use crate::error::BackendError;
use crate::target::LogTarget;

/// Opens a read-only log stream. Dropping the output ends the request.
pub struct LogBackend;

impl LogBackend {
    pub async fn open(
        cluster: &dyn ClusterClient,
        target: &LogTarget,
    ) -> Result<Backend, BackendError> {
        info!(
            namespace = %target.container.namespace,
            pod = %target.container.pod,
            container = ?target.container.container,
            tail_lines = target.tail_lines,
            previous = target.previous,
            "Opening log stream"
        );

        let output = cluster.logs(target).await?;
        Ok(Backend::read_only(BackendKind::Log, output, Box::new(LogTeardown)))
    }
}

struct LogTeardown;

#[async_trait]
impl Teardown for LogTeardown {
    async fn release(&mut self) {}
}
