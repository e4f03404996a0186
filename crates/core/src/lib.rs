//! `opsdesk-core`: shared foundation for the opsdesk backend.
//!
//! Pure building blocks only: typed identifiers, the domain error
//! taxonomy, and monetary helpers. No I/O and no store concerns.

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{ClientId, ScheduleId, TransactionId, UserId};
