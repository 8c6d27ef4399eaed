//! Shared test utilities for podterm-server integration tests

pub mod client;

use std::net::SocketAddr;
use std::sync::Arc;

use podterm_core::{MockClusterClient, PtyConfig};
use tokio::net::TcpListener;
use podterm_server::{AppState, ServerConfig, TerminalServer};

/// Creates a test server without cluster access
#[allow(dead_code)]
pub async fn create_test_server() -> (Arc<AppState>, SocketAddr) {
    create_test_server_with_state(AppState::new()).await
}

/// Creates a test server backed by a mock cluster
#[allow(dead_code)]
pub async fn create_test_server_with_cluster(
    cluster: MockClusterClient,
) -> (Arc<AppState>, SocketAddr) {
    create_test_server_with_state(AppState::new().with_cluster(Arc::new(cluster))).await
}

/// Creates a test server with custom PTY config (for local shell tests)
#[allow(dead_code)]
pub async fn create_test_server_with_pty_config(
    pty_config: PtyConfig,
) -> (Arc<AppState>, SocketAddr) {
    create_test_server_with_state(AppState::new().with_pty_config(pty_config)).await
}

/// Creates a test server with the given state
pub async fn create_test_server_with_state(state: AppState) -> (Arc<AppState>, SocketAddr) {
    let state = Arc::new(state);
    let server = TerminalServer::with_state(ServerConfig::default(), Arc::clone(&state));
    let addr = spawn_server(server).await;

    (state, addr)
}

/// Spawns server in background task, returns bound address
async fn spawn_server(server: TerminalServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    addr
}

/// PTY config running a plain `sh` with a stable prompt
#[allow(dead_code)]
pub fn test_pty_config() -> PtyConfig {
    PtyConfig {
        shell: "/bin/sh".into(),
        shell_args: Vec::new(),
        ..Default::default()
    }
}
