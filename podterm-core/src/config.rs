//! Backend configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shell used for local PTY sessions unless overridden
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// TERM exported to local shells
pub const DEFAULT_TERM: &str = "xterm-256color";

/// Configuration for local PTY sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtyConfig {
    /// Shell binary (defaults to /bin/bash, can be overridden via PODTERM_PTY_SHELL env var)
    pub shell: PathBuf,
    /// Arguments passed to the shell
    #[serde(default)]
    pub shell_args: Vec<String>,
    /// TERM value exported to the shell
    pub term: String,
    /// Initial terminal columns
    pub initial_cols: u16,
    /// Initial terminal rows
    pub initial_rows: u16,
    /// Working directory for the shell
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

/// Environment variable that overrides the local shell command
pub const PTY_SHELL_ENV: &str = "PODTERM_PTY_SHELL";

/// Split a "command arg1 arg2" string into a shell and its arguments
pub fn split_shell_command(command: &str) -> Option<(PathBuf, Vec<String>)> {
    let mut parts = command.split_whitespace();
    let shell = PathBuf::from(parts.next()?);
    Some((shell, parts.map(str::to_string).collect()))
}

impl Default for PtyConfig {
    fn default() -> Self {
        let (shell, shell_args) = std::env::var(PTY_SHELL_ENV)
            .ok()
            .and_then(|command| split_shell_command(&command))
            .unwrap_or_else(|| (PathBuf::from(DEFAULT_SHELL), Vec::new()));

        tracing::debug!(
            shell = %shell.display(),
            shell_args = ?shell_args,
            "PtyConfig initialized"
        );

        Self {
            shell,
            shell_args,
            term: DEFAULT_TERM.to_string(),
            initial_cols: 120,
            initial_rows: 40,
            cwd: None,
        }
    }
}

/// How to reach the cluster and which shells to try inside containers
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Explicit kubeconfig path; `None` infers (in-cluster, then ~/.kube/config)
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current one
    pub context: Option<String>,
    /// Shells probed inside the container, most preferred first
    pub shells: Vec<String>,
    /// Shell used when no candidate answers the probe
    pub fallback_shell: String,
    /// Upper bound on a single shell probe
    pub probe_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            shells: vec![
                "/bin/bash".to_string(),
                "/bin/ash".to_string(),
                "/bin/sh".to_string(),
            ],
            fallback_shell: "/bin/sh".to_string(),
            probe_timeout: Duration::from_secs(5),
        }
    }
}
