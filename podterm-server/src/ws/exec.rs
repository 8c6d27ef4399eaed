//! `/execute/podshell`: interactive shell inside a container
//!
//! The first client message is the JSON handshake naming the container.
//! Everything after it uses the regular input/resize frames.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::StreamExt;
use podterm_core::{ExecTarget, RemoteExecBackend};
use tracing::{debug, info, warn};

use super::session::read_first;
use super::{CLUSTER_UNAVAILABLE, Session};
use crate::AppState;

/// WebSocket upgrade handler for container exec
pub async fn podshell_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_failed_upgrade(|e| warn!(error = %e, "Pod shell upgrade failed"))
        .on_upgrade(move |socket| handle_podshell(socket, state))
}

async fn handle_podshell(socket: WebSocket, state: Arc<AppState>) {
    let (sink, mut stream) = socket.split();
    let session = Session::new(sink, state.session_config.clone());

    let Some(handshake) = read_first(&mut stream, state.session_config.idle_timeout).await else {
        debug!(session_id = %session.id(), "Connection ended before handshake");
        session.close().await;
        return;
    };

    let target = match ExecTarget::decode(&handshake) {
        Ok(target) => target,
        Err(e) => {
            session.fail(&e.to_string()).await;
            return;
        }
    };

    let Some(cluster) = state.cluster.clone() else {
        session.fail(CLUSTER_UNAVAILABLE).await;
        return;
    };

    let backend = match RemoteExecBackend::open(
        cluster.as_ref(),
        &state.prober,
        &target,
        session.close_token(),
    )
    .await
    {
        Ok(backend) => backend,
        Err(e) => {
            session.fail(&e.to_string()).await;
            return;
        }
    };

    info!(
        session_id = %session.id(),
        namespace = %target.namespace,
        pod = %target.pod_name,
        container = %target.container_name,
        "Pod shell session connected"
    );
    session.run(backend, stream).await;
}
