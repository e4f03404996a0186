//! Store interfaces consumed by the ledger, plus their implementations.
//!
//! The engine only ever sees the traits in [`interface`]; wiring picks
//! the in-memory implementations (tests, dev) or the Postgres ones
//! (production) at startup.

mod in_memory;
mod interface;
mod postgres;

pub use in_memory::{
    InMemoryAuditStore, InMemoryClientStore, InMemoryReminderStore, InMemoryScheduleStore,
};
pub use interface::{
    AuditAction, AuditLogEntry, AuditStore, ClientRecord, ClientStore, PaymentUpdate, Reminder,
    ReminderStore, ScheduleStore, StoreError,
};
pub use postgres::{
    PostgresAuditStore, PostgresClientStore, PostgresReminderStore, PostgresScheduleStore,
};
