//! Application assembly: services wiring and the router.

use std::sync::Arc;

use axum::{Router, extract::Extension, routing::get};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full router around an already-wired service set.
pub fn build_app(services: AppServices) -> Router {
    Router::new()
        .route("/healthz", get(routes::system::health))
        .merge(routes::router().layer(Extension(Arc::new(services))))
}
