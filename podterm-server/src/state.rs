//! Shared application state for the podterm server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use podterm_core::{ClusterClient, PtyConfig, ShellProber};

use crate::SessionConfig;

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Cluster access for exec and log sessions; `None` when no cluster is reachable
    pub cluster: Option<Arc<dyn ClusterClient>>,
    /// Shell selection for exec sessions
    pub prober: ShellProber,
    /// Shell spawned for local sessions
    pub pty_config: PtyConfig,
    pub session_config: SessionConfig,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state without cluster access
    pub fn new() -> Self {
        Self {
            cluster: None,
            prober: ShellProber::default(),
            pty_config: PtyConfig::default(),
            session_config: SessionConfig::default(),
            started_at: Utc::now(),
        }
    }

    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterClient>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn with_prober(mut self, prober: ShellProber) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_pty_config(mut self, pty_config: PtyConfig) -> Self {
        self.pty_config = pty_config;
        self
    }

    pub fn with_session_config(mut self, session_config: SessionConfig) -> Self {
        self.session_config = session_config;
        self
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
