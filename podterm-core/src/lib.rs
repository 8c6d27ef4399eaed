//! podterm-core: terminal backends for the podterm bridge
//!
//! This crate provides everything a terminal session needs below the
//! WebSocket layer:
//!
//! - **Frames** - [`ClientFrame`] decoding and [`ServerFrame`] encoding
//! - **Backends** - [`LocalPtyBackend`], [`RemoteExecBackend`] and [`LogBackend`]
//! - **Cluster access** - the [`ClusterClient`] trait with [`KubeCluster`]
//!   and [`MockClusterClient`]
//! - **Resize queue** - [`resize_queue`], a bounded queue that never blocks
//!   the reader and always converges to the last requested size
//!
//! # Quick Start
//!
//! ```no_run
//! use podterm_core::{LocalPtyBackend, PtyConfig};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = LocalPtyBackend::spawn(&PtyConfig::default())?;
//!     println!("shell pid: {:?}", backend.process_id());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cluster;
pub mod config;
pub mod error;
pub mod frame;
pub mod prober;
pub mod target;

pub use backend::{
    Backend, BackendKind, BackendParts, Capabilities, InputSink, LocalPtyBackend, LogBackend,
    OutputStream, RemoteExecBackend, ResizeReceiver, ResizeSender, ResizeSink, Teardown,
    drive_resizes, resize_queue,
};
pub use cluster::{
    ClusterClient, ExitStatus, KubeCluster, MockClusterClient, RemoteProcess, StatusCheckedOutput,
};
pub use config::{ClusterConfig, PTY_SHELL_ENV, PtyConfig, split_shell_command};
pub use error::{BackendError, ClusterError, FrameError};
pub use frame::{ClientFrame, ServerFrame, TerminalSize};
pub use prober::ShellProber;
pub use target::{ContainerRef, ExecTarget, LogTarget};
