use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use opsdesk_core::money;
use opsdesk_core::{ClientId, DomainError, DomainResult, ScheduleId};

/// Payment state of a single installment. Derived, never hand-set:
/// always recomputed from `(amount_due, paid)` via [`derive_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    PartiallyPaid,
    Paid,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::PartiallyPaid => "partially_paid",
            ScheduleStatus::Paid => "paid",
        }
    }
}

/// Resolve the collected amount for a schedule row.
///
/// Rows written before the explicit paid-amount column existed carry
/// only a boolean paid flag. The resolution is two-tier: the explicit
/// value wins when set and positive, else the legacy flag resolves to
/// the full due amount, else zero. This is the single place the
/// fallback rule lives; every balance and status computation goes
/// through it.
pub fn resolve_paid_amount(
    explicit: Option<Decimal>,
    legacy_paid: bool,
    amount_due: Decimal,
) -> Decimal {
    match explicit {
        Some(v) if v > Decimal::ZERO => v,
        _ if legacy_paid => amount_due,
        _ => Decimal::ZERO,
    }
}

/// Derive installment status from amounts.
///
/// `paid` here is the already-resolved collected amount (see
/// [`resolve_paid_amount`]).
pub fn derive_status(amount_due: Decimal, paid: Decimal) -> ScheduleStatus {
    let remaining = (amount_due - paid).max(Decimal::ZERO);
    if remaining <= Decimal::ZERO {
        ScheduleStatus::Paid
    } else if remaining < amount_due {
        ScheduleStatus::PartiallyPaid
    } else {
        ScheduleStatus::Pending
    }
}

/// One promised installment: a due amount, a due date, and whatever has
/// been collected against it so far.
///
/// Invariants (enforced by the engine and the conditional store
/// update): `0 <= paid <= amount_due`, `paid` never decreases, and the
/// persisted `status` always equals `derive_status(amount_due, paid)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub id: ScheduleId,
    pub client_id: ClientId,
    pub amount_due: Decimal,
    /// Explicit collected amount. `None` on rows that predate the
    /// column; see [`resolve_paid_amount`].
    pub amount_paid: Option<Decimal>,
    /// Historical boolean paid flag, kept for back-compatibility.
    pub legacy_paid: bool,
    pub due_date: DateTime<Utc>,
    /// Per-client sequence, strictly increasing, never reused.
    pub installment_number: u32,
    pub status: ScheduleStatus,
    pub note: Option<String>,
    /// Provenance tag: which surface created the schedule.
    pub source: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduleItem {
    /// Build a fresh, unpaid installment.
    pub fn new(
        client_id: ClientId,
        installment_number: u32,
        amount_due: Decimal,
        due_date: DateTime<Utc>,
        note: Option<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: ScheduleId::new(),
            client_id,
            amount_due,
            amount_paid: Some(Decimal::ZERO),
            legacy_paid: false,
            due_date,
            installment_number,
            status: ScheduleStatus::Pending,
            note,
            source: source.into(),
            paid_at: None,
            created_at: Utc::now(),
        }
    }

    /// Collected amount after legacy-flag resolution.
    pub fn paid_amount(&self) -> Decimal {
        resolve_paid_amount(self.amount_paid, self.legacy_paid, self.amount_due)
    }

    /// Remaining balance, floored at zero.
    pub fn remaining(&self) -> Decimal {
        (self.amount_due - self.paid_amount()).max(Decimal::ZERO)
    }

    /// Status as derived from current amounts, ignoring the persisted
    /// `status` field.
    pub fn derived_status(&self) -> ScheduleStatus {
        derive_status(self.amount_due, self.paid_amount())
    }

    /// True while any balance remains.
    pub fn is_open(&self) -> bool {
        self.remaining() > Decimal::ZERO
    }
}

/// Input for one installment in a schedule-creation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScheduleItem {
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub note: Option<String>,
}

/// Validate a creation batch before anything is written.
///
/// The whole batch is rejected on the first bad item so a partial
/// schedule can never be persisted.
pub fn validate_new_items(items: &[NewScheduleItem]) -> DomainResult<()> {
    if items.is_empty() {
        return Err(DomainError::validation(
            "schedule batch must contain at least one installment",
        ));
    }
    for (idx, item) in items.iter().enumerate() {
        if money::round_minor(item.amount) <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "installment {} amount must be positive, got {}",
                idx + 1,
                item.amount
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(due: &str, paid: Option<&str>, legacy: bool) -> ScheduleItem {
        let mut s = ScheduleItem::new(
            ClientId::new(),
            1,
            dec(due),
            Utc::now(),
            None,
            "test",
        );
        s.amount_paid = paid.map(dec);
        s.legacy_paid = legacy;
        s
    }

    #[test]
    fn status_follows_amounts() {
        assert_eq!(derive_status(dec("100"), dec("0")), ScheduleStatus::Pending);
        assert_eq!(
            derive_status(dec("100"), dec("40")),
            ScheduleStatus::PartiallyPaid
        );
        assert_eq!(derive_status(dec("100"), dec("100")), ScheduleStatus::Paid);
    }

    #[test]
    fn legacy_flag_resolves_to_full_amount() {
        // A row with no explicit paid amount but is_paid=true must read
        // as fully collected.
        let s = item("2000", None, true);
        assert_eq!(s.paid_amount(), dec("2000"));
        assert_eq!(s.remaining(), Decimal::ZERO);
        assert_eq!(s.derived_status(), ScheduleStatus::Paid);
    }

    #[test]
    fn explicit_positive_amount_wins_over_legacy_flag() {
        let s = item("2000", Some("500"), true);
        assert_eq!(s.paid_amount(), dec("500"));
        assert_eq!(s.derived_status(), ScheduleStatus::PartiallyPaid);
    }

    #[test]
    fn explicit_zero_falls_through_to_legacy_flag() {
        let s = item("2000", Some("0"), true);
        assert_eq!(s.paid_amount(), dec("2000"));

        let s = item("2000", Some("0"), false);
        assert_eq!(s.paid_amount(), Decimal::ZERO);
        assert_eq!(s.derived_status(), ScheduleStatus::Pending);
    }

    #[test]
    fn batch_validation_rejects_empty_and_non_positive() {
        assert!(matches!(
            validate_new_items(&[]),
            Err(DomainError::Validation(_))
        ));

        let items = vec![
            NewScheduleItem {
                amount: dec("100"),
                due_date: Utc::now(),
                note: None,
            },
            NewScheduleItem {
                amount: dec("0"),
                due_date: Utc::now(),
                note: None,
            },
        ];
        let err = validate_new_items(&items).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("installment 2")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn sub_minor_unit_amount_is_rejected() {
        let items = vec![NewScheduleItem {
            amount: dec("0.001"),
            due_date: Utc::now(),
            note: None,
        }];
        assert!(validate_new_items(&items).is_err());
    }
}
