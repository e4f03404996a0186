//! `opsdesk-ledger`: pure payment-ledger domain.
//!
//! Everything in this crate is deterministic and I/O-free: installment
//! records, collection transactions, status derivation, aggregate
//! summaries, and FIFO allocation planning. Persistence and side-effect
//! propagation live in `opsdesk-infra`.

pub mod allocation;
pub mod schedule;
pub mod summary;
pub mod transaction;

pub use allocation::{Allocation, plan_allocations, plan_targeted_allocation};
pub use schedule::{
    NewScheduleItem, ScheduleItem, ScheduleStatus, derive_status, resolve_paid_amount,
    validate_new_items,
};
pub use summary::{ClientPaymentStatus, ClientPaymentSummary, summarize_schedules};
pub use transaction::{PaymentMethod, Transaction};
