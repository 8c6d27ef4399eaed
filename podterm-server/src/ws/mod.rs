//! WebSocket terminal endpoints

mod exec;
mod logs;
pub mod session;
mod shell;

pub use exec::podshell_ws;
pub use logs::{LogQuery, MISSING_PARAMETERS, podlogs_ws};
pub use session::Session;
pub use shell::shell_ws;

/// Error frame sent when a cluster session is requested without cluster access
pub const CLUSTER_UNAVAILABLE: &str = "cluster client is not configured";
