use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::get,
};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/outstanding", get(get_outstanding))
}

pub async fn get_outstanding(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.engine.list_outstanding_client_payments().await {
        Ok(rows) => {
            (StatusCode::OK, Json(serde_json::json!({ "items": rows }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
