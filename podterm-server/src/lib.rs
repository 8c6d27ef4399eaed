//! podterm-server - HTTP and WebSocket server for terminal sessions
//!
//! Each WebSocket connection becomes one [`ws::Session`] bridging the client
//! to a local shell, a container exec stream, or a container log stream.

mod error;
pub mod http;
mod state;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

pub use error::{ServerError, SessionError};
pub use http::create_router;
pub use state::AppState;

/// Port the bridge listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 9000;

/// The podterm server
pub struct TerminalServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl TerminalServer {
    /// Create a server without cluster access; only local shells work
    pub fn new(config: ServerConfig) -> Self {
        let state = AppState::new().with_session_config(config.session.clone());
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Create a server with custom state
    pub fn with_state(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        self.run_with_listener(listener).await
    }

    /// Run the server on an already bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!(
            cluster_connected = self.state.cluster.is_some(),
            "podterm server listening on {}",
            local
        );

        let router = create_router(self.state);
        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Per-session timeouts and buffers
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            session: SessionConfig::default(),
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:9000")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings applied to every terminal session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// A session with no inbound message for this long is closed
    pub idle_timeout: Duration,
    /// Upper bound on a single outbound write
    pub write_timeout: Duration,
    /// Pending resize events kept per session
    pub resize_queue_capacity: usize,
    /// Size of a single backend read
    pub read_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(24 * 60 * 60),
            write_timeout: Duration::from_secs(24 * 60 * 60),
            resize_queue_capacity: podterm_core::backend::DEFAULT_RESIZE_CAPACITY,
            read_buffer_size: 4096,
        }
    }
}
