//! `opsdesk-infra`: persistence and orchestration for the payment
//! ledger.
//!
//! Contains the narrow store interfaces the ledger consumes (schedule,
//! reminder, audit, client), their in-memory and Postgres
//! implementations, the [`engine::LedgerEngine`] that drives the four
//! public ledger operations, the best-effort side-effect boundary, and
//! the client status projector.

pub mod engine;
pub mod projector;
pub mod stores;
pub mod sync;


pub use engine::{CollectionOutcome, LedgerEngine, LedgerError, OutstandingClientPayments};
pub use projector::ClientStatusProjector;
pub use stores::{
    AuditAction, AuditLogEntry, AuditStore, ClientRecord, ClientStore, InMemoryAuditStore,
    InMemoryClientStore, InMemoryReminderStore, InMemoryScheduleStore, PaymentUpdate,
    PostgresAuditStore, PostgresClientStore, PostgresReminderStore, PostgresScheduleStore,
    Reminder, ReminderStore, ScheduleStore, StoreError,
};
pub use sync::SideEffects;
