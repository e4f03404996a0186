use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use opsdesk_core::{ClientId, ScheduleId, TransactionId};

/// How a collection was received. Closed set; anything outside it is
/// recorded as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Other => "other",
        }
    }
}

/// One recorded collection event.
///
/// Append-only: created exactly once per allocation step and never
/// mutated or deleted by the ledger. `amount` is the portion applied to
/// `schedule_id` in that step, which by construction never exceeds the
/// schedule's remaining balance at record time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub client_id: ClientId,
    pub schedule_id: Option<ScheduleId>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl Transaction {
    pub fn new(
        client_id: ClientId,
        schedule_id: Option<ScheduleId>,
        amount: Decimal,
        method: PaymentMethod,
        occurred_at: DateTime<Utc>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            client_id,
            schedule_id,
            amount,
            method,
            occurred_at,
            note,
        }
    }
}
