use axum::{routing::get, Router};

use crate::api::handlers::{self, AppState};

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Composite add/change screens
        .route(
            "/admin/:entity/add",
            get(handlers::add_view_get).post(handlers::add_view_post),
        )
        .route(
            "/admin/:entity/:object_id/change",
            get(handlers::change_view_get).post(handlers::change_view_post),
        )
}
