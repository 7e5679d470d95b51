use super::handlers::{admin, health, webhook};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route(
            "/webhook/instagram",
            get(webhook::verify_subscription).post(webhook::receive),
        )
        .route(
            "/admin/integrations/:id/refresh",
            post(admin::refresh_integration),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
