use axum::Router;

pub mod clients;
pub mod reports;
pub mod system;

/// Router for all ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/clients", clients::router())
        .nest("/reports", reports::router())
}
