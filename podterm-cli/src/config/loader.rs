use super::types::{
    ClusterSection, DEFAULT_HOST, PodtermConfig, PtySection, RawClusterConfig, RawPodtermConfig,
    RawPtyConfig, RawServerConfig, RawSessionConfig, ServerSection, SessionSection,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<PodtermConfig> {
        let mut layers = Vec::new();
        if let Some(user_path) = Self::user_config_path() {
            layers.push(user_path);
        }
        layers.push(Self::project_config_path());

        Self::load_layers(&layers)
    }

    /// Merge the given files in order; later files win, missing files are skipped
    pub fn load_layers(paths: &[PathBuf]) -> Result<PodtermConfig> {
        let mut raw = RawPodtermConfig::default();

        for path in paths {
            if let Some(layer) = Self::read_raw(path)? {
                raw = Self::merge_raw(raw, layer);
            }
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "podterm").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with PODTERM_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("PODTERM_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".podterm/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<Option<RawPodtermConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(Some(raw))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawPodtermConfig, overlay: RawPodtermConfig) -> RawPodtermConfig {
        RawPodtermConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
            },
            session: RawSessionConfig {
                idle_timeout_secs: overlay
                    .session
                    .idle_timeout_secs
                    .or(base.session.idle_timeout_secs),
                write_timeout_secs: overlay
                    .session
                    .write_timeout_secs
                    .or(base.session.write_timeout_secs),
                resize_queue_capacity: overlay
                    .session
                    .resize_queue_capacity
                    .or(base.session.resize_queue_capacity),
                read_buffer_size: overlay
                    .session
                    .read_buffer_size
                    .or(base.session.read_buffer_size),
            },
            pty: RawPtyConfig {
                shell: overlay.pty.shell.or(base.pty.shell),
                shell_args: overlay.pty.shell_args.or(base.pty.shell_args),
                term: overlay.pty.term.or(base.pty.term),
                cwd: overlay.pty.cwd.or(base.pty.cwd),
            },
            cluster: RawClusterConfig {
                kubeconfig: overlay.cluster.kubeconfig.or(base.cluster.kubeconfig),
                context: overlay.cluster.context.or(base.cluster.context),
                shells: overlay.cluster.shells.or(base.cluster.shells),
                fallback_shell: overlay.cluster.fallback_shell.or(base.cluster.fallback_shell),
                probe_timeout_secs: overlay
                    .cluster
                    .probe_timeout_secs
                    .or(base.cluster.probe_timeout_secs),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawPodtermConfig) -> PodtermConfig {
        let server = ServerSection::default();
        let session = SessionSection::default();
        let cluster = ClusterSection::default();

        PodtermConfig {
            server: ServerSection {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(server.port),
            },
            session: SessionSection {
                idle_timeout_secs: raw
                    .session
                    .idle_timeout_secs
                    .unwrap_or(session.idle_timeout_secs),
                write_timeout_secs: raw
                    .session
                    .write_timeout_secs
                    .unwrap_or(session.write_timeout_secs),
                resize_queue_capacity: raw
                    .session
                    .resize_queue_capacity
                    .unwrap_or(session.resize_queue_capacity),
                read_buffer_size: raw
                    .session
                    .read_buffer_size
                    .unwrap_or(session.read_buffer_size),
            },
            pty: PtySection {
                shell: raw.pty.shell,
                shell_args: raw.pty.shell_args,
                term: raw.pty.term,
                cwd: raw.pty.cwd,
            },
            cluster: ClusterSection {
                kubeconfig: raw.cluster.kubeconfig,
                context: raw.cluster.context,
                shells: raw.cluster.shells.unwrap_or(cluster.shells),
                fallback_shell: raw.cluster.fallback_shell.unwrap_or(cluster.fallback_shell),
                probe_timeout_secs: raw
                    .cluster
                    .probe_timeout_secs
                    .unwrap_or(cluster.probe_timeout_secs),
            },
        }
    }
}
