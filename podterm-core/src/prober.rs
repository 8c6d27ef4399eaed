//! Shell selection for container exec sessions

use std::time::Duration;

use tracing::{debug, warn};

use crate::cluster::ClusterClient;
use crate::config::ClusterConfig;
use crate::target::ContainerRef;

/// Picks the first shell that exists inside a container.
///
/// Each candidate is checked with `which <path>`. A probe that errors or
/// exceeds the timeout counts as "not found" and the next candidate is tried.
#[derive(Debug, Clone)]
pub struct ShellProber {
    candidates: Vec<String>,
    fallback: String,
    probe_timeout: Duration,
}

impl Default for ShellProber {
    fn default() -> Self {
        Self::from_config(&ClusterConfig::default())
    }
}

impl ShellProber {
    pub fn new(
        candidates: Vec<String>,
        fallback: impl Into<String>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            candidates,
            fallback: fallback.into(),
            probe_timeout,
        }
    }

    pub fn from_config(config: &ClusterConfig) -> Self {
        Self::new(
            config.shells.clone(),
            config.fallback_shell.clone(),
            config.probe_timeout,
        )
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Return the first available candidate, or the fallback
    pub async fn pick(&self, cluster: &dyn ClusterClient, target: &ContainerRef) -> String {
        for shell in &self.candidates {
            let command = vec!["which".to_string(), shell.clone()];
            match tokio::time::timeout(self.probe_timeout, cluster.probe(target, command)).await {
                Ok(Ok(true)) => {
                    debug!(pod = %target.pod, shell = %shell, "Shell found");
                    return shell.clone();
                }
                Ok(Ok(false)) => {
                    debug!(pod = %target.pod, shell = %shell, "Shell not present");
                }
                Ok(Err(e)) => {
                    warn!(pod = %target.pod, shell = %shell, error = %e, "Shell probe failed");
                }
                Err(_) => {
                    warn!(pod = %target.pod, shell = %shell, "Shell probe timed out");
                }
            }
        }

        debug!(pod = %target.pod, fallback = %self.fallback, "Using fallback shell");
        self.fallback.clone()
    }
}
