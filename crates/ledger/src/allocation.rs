//! Collection allocation planning.
//!
//! A collection either targets one schedule or is swept across all of a
//! client's outstanding schedules earliest-due-first (FIFO), so the
//! most overdue obligations are cleared before anything newer. Planning
//! is pure: the engine validates the whole plan here before the first
//! store mutation, then applies each step as its own atomic conditional
//! update. Ordering and tolerance rules therefore exist in exactly one
//! place.

use rust_decimal::Decimal;

use opsdesk_core::money;
use opsdesk_core::{DomainError, DomainResult, ScheduleId};

use crate::schedule::ScheduleItem;

/// One planned application of money against a schedule.
///
/// `expected_paid` is the collected amount observed at planning time;
/// the store update is conditional on it so a racing collection
/// surfaces as a conflict instead of a double-collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub schedule_id: ScheduleId,
    pub amount: Decimal,
    pub amount_due: Decimal,
    pub expected_paid: Decimal,
    pub new_paid: Decimal,
}

/// Plan a collection against one named schedule.
///
/// Hard errors, no mutation implied: the schedule is already settled,
/// or the amount is over the remaining balance by more than the
/// tolerance. An amount within tolerance above the balance is clamped
/// so the paid amount never exceeds the due amount.
pub fn plan_targeted_allocation(
    schedule: &ScheduleItem,
    amount: Decimal,
) -> DomainResult<Allocation> {
    let remaining = schedule.remaining();
    if remaining <= Decimal::ZERO {
        return Err(DomainError::invariant(format!(
            "schedule {} is already fully paid",
            schedule.id
        )));
    }
    if money::exceeds(amount, remaining) {
        return Err(DomainError::invariant(format!(
            "amount {} exceeds remaining balance {} on schedule {}",
            amount, remaining, schedule.id
        )));
    }

    let expected_paid = schedule.paid_amount();
    let applied = amount.min(remaining);
    Ok(Allocation {
        schedule_id: schedule.id,
        amount: applied,
        amount_due: schedule.amount_due,
        expected_paid,
        new_paid: expected_paid + applied,
    })
}

/// Plan an untargeted (FIFO) collection across a client's schedules.
///
/// Walks the open schedules in due-date order, allocating
/// `min(left, remaining)` to each until the amount is exhausted. If the
/// amount is over the total outstanding balance (tolerance-adjusted)
/// the whole plan is rejected and nothing may be applied.
pub fn plan_allocations(
    schedules: &[ScheduleItem],
    amount: Decimal,
) -> DomainResult<Vec<Allocation>> {
    let mut open: Vec<&ScheduleItem> = schedules.iter().filter(|s| s.is_open()).collect();
    open.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then(a.installment_number.cmp(&b.installment_number))
    });

    let total_remaining: Decimal = open.iter().map(|s| s.remaining()).sum();
    if money::exceeds(amount, total_remaining) {
        return Err(DomainError::invariant(format!(
            "amount {} exceeds total outstanding balance {}",
            amount, total_remaining
        )));
    }

    let mut left = amount;
    let mut plan = Vec::new();
    for schedule in open {
        if left <= Decimal::ZERO {
            break;
        }
        let remaining = schedule.remaining();
        let applied = left.min(remaining);
        let expected_paid = schedule.paid_amount();
        plan.push(Allocation {
            schedule_id: schedule.id,
            amount: applied,
            amount_due: schedule.amount_due,
            expected_paid,
            new_paid: expected_paid + applied,
        });
        left -= applied;
    }
    // Any residue here is below the tolerance (guaranteed by the check
    // above) and is dropped rather than overpaying a schedule.

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use opsdesk_core::ClientId;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn schedule(number: u32, due: Decimal, paid: Decimal, due_in_days: i64) -> ScheduleItem {
        let mut s = ScheduleItem::new(
            ClientId::new(),
            number,
            due,
            Utc::now() + Duration::days(due_in_days),
            None,
            "test",
        );
        s.amount_paid = Some(paid);
        s
    }

    #[test]
    fn targeted_plan_clamps_within_tolerance() {
        let s = schedule(1, dec("500"), dec("0"), 0);
        let alloc = plan_targeted_allocation(&s, dec("500.004")).unwrap();
        assert_eq!(alloc.new_paid, dec("500"));
        assert_eq!(alloc.amount, dec("500"));
    }

    #[test]
    fn targeted_plan_rejects_over_collection() {
        let s = schedule(1, dec("500"), dec("0"), 0);
        let err = plan_targeted_allocation(&s, dec("500.01")).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn targeted_plan_rejects_settled_schedule() {
        let s = schedule(1, dec("500"), dec("500"), 0);
        let err = plan_targeted_allocation(&s, dec("1")).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("already fully paid")),
            other => panic!("expected invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn sweep_pays_earliest_due_first() {
        // 3,000 due yesterday, 2,000 due next week; collecting 4,000
        // settles the overdue schedule and leaves 1,000 on the later one.
        let overdue = schedule(1, dec("3000"), dec("0"), -1);
        let upcoming = schedule(2, dec("2000"), dec("0"), 7);

        let plan = plan_allocations(&[upcoming.clone(), overdue.clone()], dec("4000")).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].schedule_id, overdue.id);
        assert_eq!(plan[0].amount, dec("3000"));
        assert_eq!(plan[1].schedule_id, upcoming.id);
        assert_eq!(plan[1].amount, dec("1000"));
        assert_eq!(plan[1].new_paid, dec("1000"));
    }

    #[test]
    fn sweep_stops_once_amount_is_exhausted() {
        let first = schedule(1, dec("100"), dec("0"), 1);
        let second = schedule(2, dec("100"), dec("0"), 2);
        let third = schedule(3, dec("100"), dec("0"), 3);

        let plan = plan_allocations(&[first, second, third.clone()], dec("150")).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|a| a.schedule_id != third.id));
    }

    #[test]
    fn sweep_skips_settled_schedules() {
        let settled = schedule(1, dec("100"), dec("100"), 0);
        let open = schedule(2, dec("100"), dec("0"), 5);

        let plan = plan_allocations(&[settled, open.clone()], dec("50")).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].schedule_id, open.id);
    }

    #[test]
    fn sweep_rejects_aggregate_over_collection() {
        let a = schedule(1, dec("100"), dec("0"), 0);
        let b = schedule(2, dec("200"), dec("150"), 1);
        // Outstanding: 100 + 50 = 150.
        let err = plan_allocations(&[a, b], dec("150.01")).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    fn arb_schedules() -> impl Strategy<Value = Vec<ScheduleItem>> {
        // (due cents, paid fraction %, due offset days)
        prop::collection::vec((100i64..1_000_000, 0u8..100, -30i64..365), 1..12).prop_map(
            |specs| {
                specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, (due_cents, paid_pct, days))| {
                        let due = Decimal::new(due_cents, 2);
                        let paid =
                            money::round_minor(due * Decimal::new(paid_pct as i64, 2));
                        schedule(i as u32 + 1, due, paid, days)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Conservation: no planned step ever pushes a schedule past
        /// its due amount, and the plan disburses exactly the amount.
        #[test]
        fn plan_conserves_money(schedules in arb_schedules(), cents in 1i64..500_000) {
            let total: Decimal = schedules.iter().map(|s| s.remaining()).sum();
            let amount = Decimal::new(cents, 2).min(total);
            prop_assume!(amount > Decimal::ZERO);

            let plan = plan_allocations(&schedules, amount).unwrap();
            let disbursed: Decimal = plan.iter().map(|a| a.amount).sum();
            prop_assert_eq!(disbursed, amount);
            for step in &plan {
                prop_assert!(step.new_paid <= step.amount_due);
                prop_assert!(step.amount > Decimal::ZERO);
            }
        }

        /// FIFO: steps come out in due-date order, and every step but
        /// the last fully settles its schedule, so no later-due schedule
        /// receives money while an earlier one still has balance.
        #[test]
        fn plan_is_earliest_due_first(schedules in arb_schedules(), cents in 1i64..500_000) {
            let total: Decimal = schedules.iter().map(|s| s.remaining()).sum();
            let amount = Decimal::new(cents, 2).min(total);
            prop_assume!(amount > Decimal::ZERO);

            let plan = plan_allocations(&schedules, amount).unwrap();
            let by_id = |id: ScheduleId| schedules.iter().find(|s| s.id == id).unwrap();

            for pair in plan.windows(2) {
                let (a, b) = (by_id(pair[0].schedule_id), by_id(pair[1].schedule_id));
                prop_assert!(
                    (a.due_date, a.installment_number) <= (b.due_date, b.installment_number)
                );
            }
            for step in plan.iter().rev().skip(1) {
                prop_assert_eq!(step.new_paid, step.amount_due);
            }
        }

        /// Exact exhaustion: collecting the full outstanding balance
        /// settles every open schedule.
        #[test]
        fn collecting_everything_settles_everything(schedules in arb_schedules()) {
            let total: Decimal = schedules.iter().map(|s| s.remaining()).sum();
            prop_assume!(total > Decimal::ZERO);

            let plan = plan_allocations(&schedules, total).unwrap();
            let open_count = schedules.iter().filter(|s| s.is_open()).count();
            prop_assert_eq!(plan.len(), open_count);
            for step in &plan {
                prop_assert_eq!(step.new_paid, step.amount_due);
            }
        }

        /// Over-collection beyond tolerance is always rejected.
        #[test]
        fn over_collection_is_rejected(schedules in arb_schedules()) {
            let total: Decimal = schedules.iter().map(|s| s.remaining()).sum();
            let over = total + Decimal::new(1, 2); // one cent too much
            prop_assert!(plan_allocations(&schedules, over).is_err());
        }
    }
}
