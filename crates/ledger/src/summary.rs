use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::schedule::ScheduleItem;

/// Client-level aggregate payment status.
///
/// `Unpaid` also covers a client with no schedules at all. That
/// conflation ("no obligation recorded" vs "fully unpaid obligation")
/// is preserved for compatibility with the data already projected onto
/// client records; a future revision may want a fourth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientPaymentStatus {
    Paid,
    Deposit,
    Unpaid,
}

impl ClientPaymentStatus {
    /// Stable string form, used for the cached status field on client
    /// records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientPaymentStatus::Paid => "paid",
            ClientPaymentStatus::Deposit => "deposit",
            ClientPaymentStatus::Unpaid => "unpaid",
        }
    }
}

/// Aggregate over one client's schedules. Recomputed on demand; never a
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPaymentSummary {
    pub total_due: Decimal,
    pub total_paid: Decimal,
    pub remaining: Decimal,
    pub status: ClientPaymentStatus,
}

/// Pure aggregation across a client's schedules.
pub fn summarize_schedules(schedules: &[ScheduleItem]) -> ClientPaymentSummary {
    let mut total_due = Decimal::ZERO;
    let mut total_paid = Decimal::ZERO;
    for s in schedules {
        total_due += s.amount_due;
        total_paid += s.paid_amount();
    }
    let remaining = (total_due - total_paid).max(Decimal::ZERO);

    let status = if remaining <= Decimal::ZERO {
        ClientPaymentStatus::Paid
    } else if total_paid > Decimal::ZERO {
        ClientPaymentStatus::Deposit
    } else {
        ClientPaymentStatus::Unpaid
    };

    ClientPaymentSummary {
        total_due,
        total_paid,
        remaining,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use opsdesk_core::ClientId;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn schedule(due: &str, paid: &str) -> ScheduleItem {
        let mut s = ScheduleItem::new(ClientId::new(), 1, dec(due), Utc::now(), None, "test");
        s.amount_paid = Some(dec(paid));
        s
    }

    #[test]
    fn no_schedules_is_unpaid() {
        // Empty set classifies as Unpaid ("no obligation recorded yet").
        let summary = summarize_schedules(&[]);
        assert_eq!(summary.status, ClientPaymentStatus::Unpaid);
        assert_eq!(summary.total_due, Decimal::ZERO);
        assert_eq!(summary.remaining, Decimal::ZERO);
    }

    #[test]
    fn nothing_collected_is_unpaid() {
        let summary = summarize_schedules(&[schedule("100", "0"), schedule("50", "0")]);
        assert_eq!(summary.status, ClientPaymentStatus::Unpaid);
        assert_eq!(summary.total_due, dec("150"));
        assert_eq!(summary.remaining, dec("150"));
    }

    #[test]
    fn partial_collection_is_deposit() {
        let summary = summarize_schedules(&[schedule("4000", "4000"), schedule("6000", "0")]);
        assert_eq!(summary.status, ClientPaymentStatus::Deposit);
        assert_eq!(summary.total_paid, dec("4000"));
        assert_eq!(summary.remaining, dec("6000"));
    }

    #[test]
    fn everything_collected_is_paid() {
        let summary = summarize_schedules(&[schedule("100", "100"), schedule("50", "50")]);
        assert_eq!(summary.status, ClientPaymentStatus::Paid);
        assert_eq!(summary.remaining, Decimal::ZERO);
    }

    #[test]
    fn legacy_rows_count_as_collected() {
        let mut legacy = schedule("2000", "0");
        legacy.amount_paid = None;
        legacy.legacy_paid = true;

        let summary = summarize_schedules(&[legacy]);
        assert_eq!(summary.status, ClientPaymentStatus::Paid);
        assert_eq!(summary.total_paid, dec("2000"));
    }
}
