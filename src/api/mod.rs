pub mod ask;
pub mod render;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The web form: `/` (GET and POST) plus a JSON health check.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ask::index).post(ask::ask))
        .route("/health", get(ask::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
