//! Request/response DTOs and mapping to/from domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use opsdesk_ledger::{ClientPaymentSummary, NewScheduleItem, ScheduleItem};

#[derive(Debug, Deserialize)]
pub struct NewScheduleItemRequest {
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSchedulesRequest {
    pub items: Vec<NewScheduleItemRequest>,
    /// Provenance tag stored on each row; defaults to "api".
    pub source: Option<String>,
    pub actor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CollectPaymentRequest {
    pub amount: Decimal,
    /// Target one schedule; omit for an earliest-due-first sweep.
    pub schedule_id: Option<Uuid>,
    /// Defaults to "cash".
    pub method: Option<String>,
    pub note: Option<String>,
    pub actor_id: Option<Uuid>,
}

pub fn new_schedule_item(req: NewScheduleItemRequest) -> NewScheduleItem {
    NewScheduleItem {
        amount: req.amount,
        due_date: req.due_date,
        note: req.note,
    }
}

pub fn schedule_to_json(s: &ScheduleItem) -> serde_json::Value {
    json!({
        "id": s.id,
        "client_id": s.client_id,
        "installment_number": s.installment_number,
        "amount_due": s.amount_due,
        "amount_paid": s.paid_amount(),
        "remaining": s.remaining(),
        "status": s.status.as_str(),
        "due_date": s.due_date.to_rfc3339(),
        "note": s.note,
        "source": s.source,
        "paid_at": s.paid_at.map(|t| t.to_rfc3339()),
    })
}

pub fn summary_to_json(summary: &ClientPaymentSummary) -> serde_json::Value {
    json!({
        "total_due": summary.total_due,
        "total_paid": summary.total_paid,
        "remaining": summary.remaining,
        "status": summary.status.as_str(),
    })
}
