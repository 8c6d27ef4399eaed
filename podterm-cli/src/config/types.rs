use std::path::PathBuf;
use std::time::Duration;

use podterm_core::config::DEFAULT_SHELL;
use podterm_core::{ClusterConfig, PTY_SHELL_ENV, PtyConfig, split_shell_command};
use podterm_server::{DEFAULT_PORT, ServerConfig, SessionConfig};
use serde::{Deserialize, Serialize};

/// Default host for the podterm server
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPodtermConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub session: RawSessionConfig,

    #[serde(default)]
    pub pty: RawPtyConfig,

    #[serde(default)]
    pub cluster: RawClusterConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSessionConfig {
    pub idle_timeout_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
    pub resize_queue_capacity: Option<usize>,
    pub read_buffer_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPtyConfig {
    pub shell: Option<PathBuf>,
    pub shell_args: Option<Vec<String>>,
    pub term: Option<String>,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawClusterConfig {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub shells: Option<Vec<String>>,
    pub fallback_shell: Option<String>,
    pub probe_timeout_secs: Option<u64>,
}

/// Where the local shell command was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellSource {
    /// The PODTERM_PTY_SHELL environment variable
    Environment,
    ConfigFile,
    Default,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PodtermConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub pty: PtySection,

    #[serde(default)]
    pub cluster: ClusterSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Host address to bind to
    pub host: String,
    /// Port for the terminal server
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Close sessions that receive nothing for this long
    pub idle_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub resize_queue_capacity: usize,
    pub read_buffer_size: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            idle_timeout_secs: defaults.idle_timeout.as_secs(),
            write_timeout_secs: defaults.write_timeout.as_secs(),
            resize_queue_capacity: defaults.resize_queue_capacity,
            read_buffer_size: defaults.read_buffer_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PtySection {
    /// Local shell; `None` uses PODTERM_PTY_SHELL or /bin/bash
    pub shell: Option<PathBuf>,
    pub shell_args: Option<Vec<String>>,
    pub term: Option<String>,
    /// Working directory for local shells
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    /// Kubeconfig path; unset infers in-cluster or ~/.kube/config
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    /// Shells probed inside containers, most preferred first
    pub shells: Vec<String>,
    pub fallback_shell: String,
    pub probe_timeout_secs: u64,
}

impl Default for ClusterSection {
    fn default() -> Self {
        let defaults = ClusterConfig::default();
        Self {
            kubeconfig: defaults.kubeconfig,
            context: defaults.context,
            shells: defaults.shells,
            fallback_shell: defaults.fallback_shell,
            probe_timeout_secs: defaults.probe_timeout.as_secs(),
        }
    }
}

impl PodtermConfig {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            session: self.session_config(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            idle_timeout: Duration::from_secs(self.session.idle_timeout_secs),
            write_timeout: Duration::from_secs(self.session.write_timeout_secs),
            resize_queue_capacity: self.session.resize_queue_capacity.max(1),
            read_buffer_size: self.session.read_buffer_size.max(1),
        }
    }

    /// Local shell settings. PODTERM_PTY_SHELL takes precedence over the file.
    pub fn pty_config(&self) -> PtyConfig {
        let shell_override = std::env::var(PTY_SHELL_ENV).ok();
        self.resolve_pty(shell_override.as_deref()).0
    }

    /// Local shell settings given the value of the shell override, if any
    pub fn resolve_pty(&self, shell_override: Option<&str>) -> (PtyConfig, ShellSource) {
        let mut config = PtyConfig::default();
        let source = if let Some((shell, args)) = shell_override.and_then(split_shell_command) {
            config.shell = shell;
            config.shell_args = args;
            ShellSource::Environment
        } else if let Some(shell) = &self.pty.shell {
            config.shell = shell.clone();
            config.shell_args = self.pty.shell_args.clone().unwrap_or_default();
            ShellSource::ConfigFile
        } else {
            config.shell = PathBuf::from(DEFAULT_SHELL);
            config.shell_args = Vec::new();
            ShellSource::Default
        };
        if let Some(term) = &self.pty.term {
            config.term = term.clone();
        }
        config.cwd = self.pty.cwd.clone();
        (config, source)
    }

    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            kubeconfig: self.cluster.kubeconfig.clone(),
            context: self.cluster.context.clone(),
            shells: self.cluster.shells.clone(),
            fallback_shell: self.cluster.fallback_shell.clone(),
            probe_timeout: Duration::from_secs(self.cluster.probe_timeout_secs),
        }
    }
}
