use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use opsdesk_core::{ClientId, ScheduleId, UserId};
use opsdesk_infra::StoreError;
use opsdesk_ledger::PaymentMethod;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:id/schedules", post(create_schedules))
        .route("/:id/collections", post(collect_payment))
        .route("/:id/payment-summary", get(payment_summary))
        .route("/:id/payment-status/refresh", post(refresh_payment_status))
}

fn parse_client_id(id: &str) -> Result<ClientId, axum::response::Response> {
    id.parse::<ClientId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub async fn create_schedules(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateSchedulesRequest>,
) -> axum::response::Response {
    let client_id = match parse_client_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let items = body.items.into_iter().map(dto::new_schedule_item).collect();
    let source = body.source.unwrap_or_else(|| "api".to_string());
    let actor = body.actor_id.map(UserId::from_uuid);

    match services
        .engine
        .create_schedules_for_client(client_id, items, &source, actor)
        .await
    {
        Ok(created) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "items": created.iter().map(dto::schedule_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn collect_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CollectPaymentRequest>,
) -> axum::response::Response {
    let client_id = match parse_client_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let method = match body.method.as_deref() {
        Some(s) => match errors::parse_payment_method(s) {
            Ok(m) => m,
            Err(res) => return res,
        },
        None => PaymentMethod::Cash,
    };
    let schedule_id = body.schedule_id.map(ScheduleId::from_uuid);
    let actor = body.actor_id.map(UserId::from_uuid);

    match services
        .engine
        .collect_payment(client_id, body.amount, schedule_id, method, body.note, actor)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "updated_schedule_ids": outcome.updated_schedule_ids,
                "summary": dto::summary_to_json(&outcome.summary),
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn payment_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let client_id = match parse_client_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.engine.summarize_client_payments(client_id).await {
        Ok(summary) => {
            (StatusCode::OK, Json(dto::summary_to_json(&summary))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn refresh_payment_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let client_id = match parse_client_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .engine
        .projector()
        .sync_client_payment_status(client_id)
        .await
    {
        Ok(status) => (
            StatusCode::OK,
            Json(serde_json::json!({ "payment_status": status.as_str() })),
        )
            .into_response(),
        Err(StoreError::NotFound(msg)) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", msg)
        }
        Err(e) => errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string()),
    }
}
