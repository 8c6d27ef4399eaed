//! podterm config command
//!
//! `show` prints the settings `podterm serve` would actually run with: the
//! merged config files plus environment overrides, after defaults.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use podterm_core::PTY_SHELL_ENV;
use serde::Serialize;

use crate::config::{ConfigLoader, PodtermConfig, ShellSource};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration (files, environment and defaults)
    Show,
    /// Show configuration file paths
    Path,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(),
        ConfigCommands::Path => show_paths(),
    }
}

#[derive(Debug, Serialize)]
struct EffectiveConfig {
    server: EffectiveServer,
    session: EffectiveSession,
    pty: EffectivePty,
    cluster: EffectiveCluster,
}

#[derive(Debug, Serialize)]
struct EffectiveServer {
    host: String,
    port: u16,
}

#[derive(Debug, Serialize)]
struct EffectiveSession {
    idle_timeout_secs: u64,
    write_timeout_secs: u64,
    resize_queue_capacity: usize,
    read_buffer_size: usize,
}

#[derive(Debug, Serialize)]
struct EffectivePty {
    shell: PathBuf,
    shell_args: Vec<String>,
    shell_source: ShellSource,
    term: String,
    initial_rows: u16,
    initial_cols: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    cwd: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct EffectiveCluster {
    #[serde(skip_serializing_if = "Option::is_none")]
    kubeconfig: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    shells: Vec<String>,
    fallback_shell: String,
    probe_timeout_secs: u64,
}

impl EffectiveConfig {
    fn resolve(config: &PodtermConfig, shell_override: Option<&str>) -> Self {
        let server = config.server_config();
        let (pty, shell_source) = config.resolve_pty(shell_override);
        let cluster = config.cluster_config();

        Self {
            server: EffectiveServer {
                host: server.host,
                port: server.port,
            },
            session: EffectiveSession {
                idle_timeout_secs: server.session.idle_timeout.as_secs(),
                write_timeout_secs: server.session.write_timeout.as_secs(),
                resize_queue_capacity: server.session.resize_queue_capacity,
                read_buffer_size: server.session.read_buffer_size,
            },
            pty: EffectivePty {
                shell: pty.shell,
                shell_args: pty.shell_args,
                shell_source,
                term: pty.term,
                initial_rows: pty.initial_rows,
                initial_cols: pty.initial_cols,
                cwd: pty.cwd,
            },
            cluster: EffectiveCluster {
                kubeconfig: cluster.kubeconfig,
                context: cluster.context,
                shells: cluster.shells,
                fallback_shell: cluster.fallback_shell,
                probe_timeout_secs: cluster.probe_timeout.as_secs(),
            },
        }
    }
}

fn render(config: &PodtermConfig, shell_override: Option<&str>) -> Result<String> {
    let effective = EffectiveConfig::resolve(config, shell_override);
    Ok(toml::to_string_pretty(&effective)?)
}

fn show_config() -> Result<()> {
    let config = ConfigLoader::load()?;
    let shell_override = std::env::var(PTY_SHELL_ENV).ok();
    println!("{}", render(&config, shell_override.as_deref())?);
    Ok(())
}

fn show_paths() -> Result<()> {
    match ConfigLoader::user_config_path() {
        Some(path) => println!("User config:    {}", path.display()),
        None => println!("User config:    (no home directory)"),
    }
    println!(
        "Project config: {}",
        ConfigLoader::project_config_path().display()
    );
    Ok(())
}
