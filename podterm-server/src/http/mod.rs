//! HTTP server module

mod api;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::ws;

pub use api::HealthResponse;

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/execute/shell", get(ws::shell_ws))
        .route("/execute/podshell", get(ws::podshell_ws))
        .route("/execute/podlogs", get(ws::podlogs_ws))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;

    #[tokio::test]
    async fn test_router_has_health_endpoint() {
        let state = Arc::new(AppState::new());
        let router = create_router(state);
        let server = TestServer::new(router).unwrap();

        let response = server.get("/api/health").await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_terminal_routes_require_upgrade() {
        let state = Arc::new(AppState::new());
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/execute/shell").expect_failure().await;
        assert!(response.status_code().is_client_error());
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let state = Arc::new(AppState::new());
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server
            .get("/api/health")
            .add_header(
                axum::http::header::ORIGIN,
                axum::http::HeaderValue::from_static("http://dashboard.local"),
            )
            .await;
        assert_eq!(
            response.header(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "*"
        );
    }
}
