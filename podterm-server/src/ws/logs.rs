//! `/execute/podlogs`: follow a container's logs

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::StreamExt;
use podterm_core::{ContainerRef, LogBackend, LogTarget};
use serde::Deserialize;
use tracing::{info, warn};

use super::{CLUSTER_UNAVAILABLE, Session};
use crate::AppState;

/// Error frame sent when `namespace` or `podName` is missing
pub const MISSING_PARAMETERS: &str = "missing required parameters";

/// Query parameters of a log request; everything arrives as text
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub namespace: Option<String>,
    pub pod_name: Option<String>,
    pub container_name: Option<String>,
    pub previous: Option<String>,
    pub tail_lines: Option<String>,
}

impl LogQuery {
    /// Resolve the log target, or `None` when required parameters are missing
    pub fn target(&self) -> Option<LogTarget> {
        let namespace = non_empty(self.namespace.as_deref())?;
        let pod = non_empty(self.pod_name.as_deref())?;
        let container = ContainerRef::new(namespace, pod, self.container_name.clone());

        let tail_lines = self
            .tail_lines
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok());

        Some(LogTarget::new(container, tail_lines, parse_flag(self.previous.as_deref())))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Any non-empty value other than `false` or `0` enables a flag
fn parse_flag(value: Option<&str>) -> bool {
    match non_empty(value) {
        Some(v) => !(v.eq_ignore_ascii_case("false") || v == "0"),
        None => false,
    }
}

/// WebSocket upgrade handler for log streams
pub async fn podlogs_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    ws.on_failed_upgrade(|e| warn!(error = %e, "Pod logs upgrade failed"))
        .on_upgrade(move |socket| handle_podlogs(socket, state, query))
}

async fn handle_podlogs(socket: WebSocket, state: Arc<AppState>, query: LogQuery) {
    let (sink, stream) = socket.split();
    let session = Session::new(sink, state.session_config.clone());

    let Some(target) = query.target() else {
        session.fail(MISSING_PARAMETERS).await;
        return;
    };

    let Some(cluster) = state.cluster.clone() else {
        session.fail(CLUSTER_UNAVAILABLE).await;
        return;
    };

    let backend = match LogBackend::open(cluster.as_ref(), &target).await {
        Ok(backend) => backend,
        Err(e) => {
            session.fail(&e.to_string()).await;
            return;
        }
    };

    info!(
        session_id = %session.id(),
        namespace = %target.container.namespace,
        pod = %target.container.pod,
        container = ?target.container.container,
        tail_lines = target.tail_lines,
        previous = target.previous,
        "Pod logs session connected"
    );
    session.run(backend, stream).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> LogQuery {
        let encoded: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let Query(q) = Query::<LogQuery>::try_from_uri(
            &format!("http://localhost/execute/podlogs?{}", encoded.join("&"))
                .parse::<axum::http::Uri>()
                .unwrap(),
        )
        .unwrap();
        q
    }

    #[test]
    fn tail_lines_defaults_to_1000() {
        for tail in ["", "0", "-5", "lots"] {
            let target = query(&[
                ("namespace", "default"),
                ("podName", "web-0"),
                ("tailLines", tail),
            ])
            .target()
            .unwrap();
            assert_eq!(target.tail_lines, 1000, "tailLines={tail:?}");
        }
        let target = query(&[("namespace", "default"), ("podName", "web-0")])
            .target()
            .unwrap();
        assert_eq!(target.tail_lines, 1000);
    }

    #[test]
    fn explicit_tail_lines_are_kept() {
        let target = query(&[("namespace", "default"), ("podName", "web-0"), ("tailLines", "25")])
            .target()
            .unwrap();
        assert_eq!(target.tail_lines, 25);
    }

    #[test]
    fn previous_flag_parsing() {
        assert!(!parse_flag(None));
        assert!(!parse_flag(Some("")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(Some("FALSE")));
        assert!(!parse_flag(Some("0")));
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("1")));
    }

    #[test]
    fn missing_namespace_or_pod_has_no_target() {
        assert!(query(&[("podName", "web-0")]).target().is_none());
        assert!(query(&[("namespace", "default")]).target().is_none());
        assert!(query(&[("namespace", ""), ("podName", "web-0")]).target().is_none());
    }

    #[test]
    fn empty_container_name_is_dropped() {
        let target = query(&[
            ("namespace", "apps"),
            ("podName", "web-0"),
            ("containerName", ""),
        ])
        .target()
        .unwrap();
        assert_eq!(target.container.container, None);
        assert_eq!(target.container.namespace, "apps");
    }
}
