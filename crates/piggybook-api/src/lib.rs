//! Piggybook API: HTTP surface over story generation.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full router.
pub fn app(state: AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with the reader app's origin once it is deployed.
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/stories", routes::stories::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
