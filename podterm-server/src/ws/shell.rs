//! `/execute/shell`: local shell on a pseudo-terminal

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::StreamExt;
use podterm_core::LocalPtyBackend;
use tracing::{info, warn};

use super::Session;
use crate::AppState;

/// WebSocket upgrade handler for local shells
pub async fn shell_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_failed_upgrade(|e| warn!(error = %e, "Shell upgrade failed"))
        .on_upgrade(move |socket| handle_shell(socket, state))
}

async fn handle_shell(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    let session = Session::new(sink, state.session_config.clone());

    let backend = match LocalPtyBackend::spawn(&state.pty_config) {
        Ok(backend) => backend,
        Err(e) => {
            session.fail(&e.to_string()).await;
            return;
        }
    };

    info!(
        session_id = %session.id(),
        pid = ?backend.process_id(),
        "Local shell session connected"
    );
    session.run(backend, stream).await;
}
