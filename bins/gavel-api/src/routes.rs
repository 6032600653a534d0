use crate::{handlers, AppState};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/submissions", post(handlers::create_submission))
        .route(
            "/api/v1/submissions/:submission_id",
            get(handlers::get_submission),
        )
        .route("/status", get(handlers::health_check))
}
