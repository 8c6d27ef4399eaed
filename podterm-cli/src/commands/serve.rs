//! podterm serve command
//!
//! Runs the terminal server in the foreground. Cluster access is optional:
//! when no kubeconfig can be loaded the server still serves local shells,
//! and pod sessions report the missing cluster to the client.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use podterm_core::{KubeCluster, ShellProber};
use podterm_server::{AppState, TerminalServer};
use tracing::{info, warn};

use crate::config::{ConfigLoader, PodtermConfig};

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on (defaults to the configured port, 9000)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Kubeconfig file for pod sessions
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context for pod sessions
    #[arg(long)]
    pub context: Option<String>,

    /// Serve local shells only; do not connect to a cluster
    #[arg(long)]
    pub no_cluster: bool,
}

impl ServeArgs {
    /// Apply command line overrides on top of the loaded configuration
    fn apply(&self, mut config: PodtermConfig) -> PodtermConfig {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            config.cluster.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(context) = &self.context {
            config.cluster.context = Some(context.clone());
        }
        config
    }
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = args.apply(ConfigLoader::load()?);
    let server_config = config.server_config();
    let cluster_config = config.cluster_config();

    let mut state = AppState::new()
        .with_pty_config(config.pty_config())
        .with_session_config(server_config.session.clone())
        .with_prober(ShellProber::from_config(&cluster_config));

    if args.no_cluster {
        info!("Cluster access disabled");
    } else {
        match KubeCluster::connect(&cluster_config).await {
            Ok(cluster) => state = state.with_cluster(Arc::new(cluster)),
            Err(e) => warn!(error = %e, "Cluster unavailable, serving local shells only"),
        }
    }

    info!(
        "Starting podterm server on {}:{}",
        server_config.host, server_config.port
    );

    let server = TerminalServer::with_state(server_config, Arc::new(state));
    server.run().await.map_err(Into::into)
}
