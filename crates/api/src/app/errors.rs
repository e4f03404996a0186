use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use opsdesk_core::DomainError;
use opsdesk_infra::LedgerError;
use opsdesk_ledger::PaymentMethod;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Domain(DomainError::Validation(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        LedgerError::Domain(DomainError::InvalidId(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_id", msg)
        }
        LedgerError::Domain(DomainError::NotFound(msg)) => {
            json_error(StatusCode::NOT_FOUND, "not_found", msg)
        }
        LedgerError::Domain(DomainError::Conflict(msg)) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        LedgerError::Domain(DomainError::InvariantViolation(msg)) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        // The client needs the list of already-applied updates to
        // reconcile; a plain 500 would hide a half-applied sweep.
        LedgerError::PartialFailure { updated, source } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": "partial_failure",
                "message": source.to_string(),
                "updated_schedule_ids": updated,
            })),
        )
            .into_response(),
        LedgerError::Store(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_payment_method(s: &str) -> Result<PaymentMethod, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "cash" => Ok(PaymentMethod::Cash),
        "card" => Ok(PaymentMethod::Card),
        "transfer" => Ok(PaymentMethod::Transfer),
        "other" => Ok(PaymentMethod::Other),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_payment_method",
            "method must be one of: cash, card, transfer, other",
        )),
    }
}
