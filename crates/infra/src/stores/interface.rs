//! The narrow store contracts the Ledger Engine is written against.
//!
//! The underlying data store is assumed to offer row reads/writes and a
//! single-row atomic conditional update, nothing more. Application
//! invariants (conservation, monotonic paid amounts, FIFO order) are
//! enforced above these traits, in the engine and the allocation
//! planner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use opsdesk_core::{ClientId, ScheduleId, UserId};
use opsdesk_ledger::{ClientPaymentStatus, ScheduleItem, ScheduleStatus, Transaction};

/// Infrastructure-level store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The conditional update found different state than expected.
    /// Retryable: reload and re-plan.
    #[error("conditional update conflict: {0}")]
    Conflict(String),

    /// The addressed row does not exist.
    #[error("row not found: {0}")]
    NotFound(String),

    /// The backing table/collection is absent. Callers that treat the
    /// store as optional (reminders) downgrade this to a no-op.
    #[error("backing collection unavailable: {0}")]
    Unavailable(String),

    /// Anything else the backend reported.
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Fields written by a single collection step. The store must apply
/// them atomically, conditional on the previous paid amount.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub amount_paid: Decimal,
    pub status: ScheduleStatus,
    /// Set when the step settles the schedule; stores keep an earlier
    /// value if one exists.
    pub paid_at: Option<DateTime<Utc>>,
}

/// Persisted installments and collection records (the ledger store).
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// All schedules for one client, due-date ascending.
    async fn schedules_for_client(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<ScheduleItem>, StoreError>;

    /// Highest installment number ever assigned for the client; zero if
    /// none exist. Numbers continue from here and are never reused,
    /// even after deletion.
    async fn max_installment_number(&self, client_id: ClientId) -> Result<u32, StoreError>;

    /// Persist a creation batch atomically (all rows or none).
    async fn insert_batch(
        &self,
        items: Vec<ScheduleItem>,
    ) -> Result<Vec<ScheduleItem>, StoreError>;

    async fn get(&self, id: ScheduleId) -> Result<Option<ScheduleItem>, StoreError>;

    /// Atomic conditional read-modify-write of one schedule row.
    ///
    /// The update applies only if the row's resolved paid amount still
    /// equals `expected_paid`; otherwise `StoreError::Conflict` is
    /// returned and nothing changes. This is the race guard that turns
    /// a double-collection into a retryable failure.
    async fn apply_payment(
        &self,
        id: ScheduleId,
        expected_paid: Decimal,
        update: PaymentUpdate,
    ) -> Result<ScheduleItem, StoreError>;

    /// Every schedule across all clients with remaining balance > 0,
    /// due-date ascending. Feeds the outstanding-payments report.
    async fn open_schedules(&self) -> Result<Vec<ScheduleItem>, StoreError>;

    /// Append one collection record. Append-only; the ledger never
    /// mutates or deletes transactions.
    async fn record_transaction(&self, tx: Transaction) -> Result<(), StoreError>;
}

/// Follow-up reminder mirroring one schedule's due date and settled
/// state. At most one live reminder per schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub schedule_id: ScheduleId,
    pub client_id: ClientId,
    pub due_at: DateTime<Utc>,
    pub completed: bool,
}

impl Reminder {
    /// Mirror a schedule's current state.
    pub fn for_schedule(schedule: &ScheduleItem) -> Self {
        Self {
            schedule_id: schedule.id,
            client_id: schedule.client_id,
            due_at: schedule.due_date,
            completed: schedule.remaining() <= Decimal::ZERO,
        }
    }
}

/// Reminder persistence. A convenience projection, not a correctness
/// requirement: implementations tolerate a missing backing collection.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Idempotent upsert keyed by schedule id: re-running with the same
    /// schedule state produces no change.
    async fn upsert(&self, reminder: Reminder) -> Result<(), StoreError>;
}

/// What a ledger operation did, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    SchedulesCreated,
    PaymentCollected,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::SchedulesCreated => "schedules_created",
            AuditAction::PaymentCollected => "payment_collected",
        }
    }
}

/// Append-only audit record with a snapshot of the relevant values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub client_id: ClientId,
    pub actor: Option<UserId>,
    pub details: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        action: AuditAction,
        client_id: ClientId,
        actor: Option<UserId>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            action,
            client_id,
            actor,
            details,
            occurred_at: Utc::now(),
        }
    }
}

/// Audit persistence. Failures are swallowed one layer up, in the
/// side-effect boundary: audit logging must never fail a financial
/// operation.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), StoreError>;
}

/// The slice of the client record the ledger touches: identity, a
/// display name for reporting, and the cached payment status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: ClientId,
    pub name: Option<String>,
    /// Write-through projection of the derived aggregate status. Never
    /// hand-edited; refreshed by the status projector.
    pub payment_status: Option<ClientPaymentStatus>,
}

/// Client lookups and the cached-status write-back.
#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn get(&self, id: ClientId) -> Result<Option<ClientRecord>, StoreError>;

    /// Display names for a set of clients, one round trip. Clients
    /// without a record or without a usable name are simply absent from
    /// the map.
    async fn names_for(
        &self,
        ids: &[ClientId],
    ) -> Result<std::collections::HashMap<ClientId, String>, StoreError>;

    /// Write only the derived status string onto the client record.
    async fn set_payment_status(
        &self,
        id: ClientId,
        status: ClientPaymentStatus,
    ) -> Result<(), StoreError>;
}
