//! The Ledger Engine: the four public payment-ledger operations.
//!
//! Stateless per request. All monetary decisions are delegated to the
//! pure planners in `opsdesk-ledger`; this module sequences store
//! reads, atomic conditional writes, and best-effort side effects.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use opsdesk_core::money;
use opsdesk_core::{ClientId, DomainError, ScheduleId, UserId};
use opsdesk_ledger::{
    ClientPaymentSummary, NewScheduleItem, PaymentMethod, ScheduleItem, ScheduleStatus,
    Transaction, derive_status, plan_allocations, plan_targeted_allocation, summarize_schedules,
    validate_new_items,
};

use crate::projector::ClientStatusProjector;
use crate::stores::{ClientStore, PaymentUpdate, ScheduleStore, StoreError};
use crate::sync::SideEffects;

/// Failure of a ledger operation.
///
/// The per-schedule updates inside a collection are each their own
/// atomic step, so a store failure partway through is *not*
/// all-or-nothing: `PartialFailure` reports exactly which schedules
/// were updated before the failure.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store failure after updating {} schedule(s): {source}", updated.len())]
    PartialFailure {
        updated: Vec<ScheduleId>,
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a collection: which schedules changed, and where the
/// client's aggregate now stands.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionOutcome {
    pub updated_schedule_ids: Vec<ScheduleId>,
    pub summary: ClientPaymentSummary,
}

/// One row of the outstanding-payments report.
#[derive(Debug, Clone, Serialize)]
pub struct OutstandingClientPayments {
    pub client_id: ClientId,
    pub client_name: String,
    pub total_due: Decimal,
    pub total_paid: Decimal,
    pub remaining: Decimal,
    pub next_due_date: DateTime<Utc>,
    pub overdue_count: u32,
}

/// Display name used when a client record is missing or unnamed.
const UNNAMED_CLIENT: &str = "Unknown client";

#[derive(Clone)]
pub struct LedgerEngine {
    schedules: Arc<dyn ScheduleStore>,
    clients: Arc<dyn ClientStore>,
    side_effects: SideEffects,
    projector: ClientStatusProjector,
}

impl LedgerEngine {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        clients: Arc<dyn ClientStore>,
        side_effects: SideEffects,
    ) -> Self {
        let projector = ClientStatusProjector::new(schedules.clone(), clients.clone());
        Self {
            schedules,
            clients,
            side_effects,
            projector,
        }
    }

    /// The projector, for surfaces that refresh the cached client
    /// status explicitly.
    pub fn projector(&self) -> &ClientStatusProjector {
        &self.projector
    }

    /// Create a batch of installments for a client.
    ///
    /// Validates the whole batch before any write; installment numbers
    /// continue from the client's current maximum in list order. The
    /// persisted rows start unpaid. Reminder sync, one audit entry
    /// (count and ids), and the cached-status refresh run afterwards,
    /// best-effort.
    #[instrument(skip(self, items), fields(client_id = %client_id, count = items.len()))]
    pub async fn create_schedules_for_client(
        &self,
        client_id: ClientId,
        items: Vec<NewScheduleItem>,
        source: &str,
        actor: Option<UserId>,
    ) -> Result<Vec<ScheduleItem>, LedgerError> {
        validate_new_items(&items)?;
        self.require_client(client_id).await?;

        let start = self.schedules.max_installment_number(client_id).await?;
        let rows: Vec<ScheduleItem> = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                ScheduleItem::new(
                    client_id,
                    start + 1 + i as u32,
                    money::round_minor(item.amount),
                    item.due_date,
                    item.note,
                    source,
                )
            })
            .collect();

        let created = self.schedules.insert_batch(rows).await?;

        self.side_effects
            .sync_reminders_for_schedules(client_id, &created)
            .await;
        self.side_effects
            .record_schedules_created(client_id, &created, source, actor)
            .await;
        self.refresh_cached_status(client_id).await;

        Ok(created)
    }

    /// Record a collection against one schedule (targeted) or sweep it
    /// across the client's outstanding schedules earliest-due-first.
    ///
    /// Over-collection (beyond the tolerance, against either the
    /// target's remaining balance or the aggregate) is rejected before
    /// anything is written. Each allocation step is one atomic
    /// conditional update plus one appended transaction; a concurrent
    /// collection surfaces as a retryable conflict.
    #[instrument(skip(self, note), fields(client_id = %client_id, amount = %amount))]
    pub async fn collect_payment(
        &self,
        client_id: ClientId,
        amount: Decimal,
        schedule_id: Option<ScheduleId>,
        method: PaymentMethod,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<CollectionOutcome, LedgerError> {
        let amount = money::round_minor(amount);
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "collection amount must be positive, got {amount}"
            ))
            .into());
        }
        self.require_client(client_id).await?;

        let plan = match schedule_id {
            Some(id) => {
                let schedule = self
                    .schedules
                    .get(id)
                    .await?
                    .ok_or_else(|| DomainError::not_found(format!("schedule {id}")))?;
                if schedule.client_id != client_id {
                    return Err(DomainError::not_found(format!(
                        "schedule {id} for client {client_id}"
                    ))
                    .into());
                }
                vec![plan_targeted_allocation(&schedule, amount)?]
            }
            None => {
                let schedules = self.schedules.schedules_for_client(client_id).await?;
                plan_allocations(&schedules, amount)?
            }
        };

        let occurred_at = Utc::now();
        let mut updated: Vec<ScheduleId> = Vec::with_capacity(plan.len());
        let mut touched: Vec<ScheduleItem> = Vec::with_capacity(plan.len());

        for step in &plan {
            let status = derive_status(step.amount_due, step.new_paid);
            let update = PaymentUpdate {
                amount_paid: step.new_paid,
                status,
                paid_at: (status == ScheduleStatus::Paid).then_some(occurred_at),
            };

            let row = match self
                .schedules
                .apply_payment(step.schedule_id, step.expected_paid, update)
                .await
            {
                Ok(row) => row,
                Err(StoreError::Conflict(msg)) if updated.is_empty() => {
                    return Err(DomainError::conflict(format!(
                        "remaining balance changed, retry the collection: {msg}"
                    ))
                    .into());
                }
                Err(source) => {
                    return Err(LedgerError::PartialFailure { updated, source });
                }
            };

            updated.push(step.schedule_id);
            touched.push(row);

            if let Err(source) = self
                .schedules
                .record_transaction(Transaction::new(
                    client_id,
                    Some(step.schedule_id),
                    step.amount,
                    method,
                    occurred_at,
                    note.clone(),
                ))
                .await
            {
                return Err(LedgerError::PartialFailure { updated, source });
            }
        }

        self.side_effects
            .sync_reminders_for_schedules(client_id, &touched)
            .await;
        self.side_effects
            .record_payment_collected(client_id, amount, method, schedule_id, &updated, actor)
            .await;
        self.refresh_cached_status(client_id).await;

        let summary = summarize_schedules(&self.schedules.schedules_for_client(client_id).await?);
        Ok(CollectionOutcome {
            updated_schedule_ids: updated,
            summary,
        })
    }

    /// Recompute the client's aggregate from current schedules.
    pub async fn summarize_client_payments(
        &self,
        client_id: ClientId,
    ) -> Result<ClientPaymentSummary, LedgerError> {
        self.require_client(client_id).await?;
        let schedules = self.schedules.schedules_for_client(client_id).await?;
        Ok(summarize_schedules(&schedules))
    }

    /// Group every open schedule by client: totals, earliest upcoming
    /// due date, overdue count. Sorted by remaining balance descending.
    #[instrument(skip(self))]
    pub async fn list_outstanding_client_payments(
        &self,
    ) -> Result<Vec<OutstandingClientPayments>, LedgerError> {
        let open = self.schedules.open_schedules().await?;
        let now = Utc::now();

        let mut grouped: HashMap<ClientId, OutstandingClientPayments> = HashMap::new();
        for schedule in &open {
            let entry = grouped
                .entry(schedule.client_id)
                .or_insert_with(|| OutstandingClientPayments {
                    client_id: schedule.client_id,
                    client_name: UNNAMED_CLIENT.to_string(),
                    total_due: Decimal::ZERO,
                    total_paid: Decimal::ZERO,
                    remaining: Decimal::ZERO,
                    next_due_date: schedule.due_date,
                    overdue_count: 0,
                });
            entry.total_due += schedule.amount_due;
            entry.total_paid += schedule.paid_amount();
            entry.remaining += schedule.remaining();
            entry.next_due_date = entry.next_due_date.min(schedule.due_date);
            if schedule.due_date < now {
                entry.overdue_count += 1;
            }
        }

        let mut rows: Vec<OutstandingClientPayments> = grouped.into_values().collect();

        // A client without a record (or without a usable name) still
        // shows up in the report, under a placeholder.
        let ids: Vec<ClientId> = rows.iter().map(|r| r.client_id).collect();
        let mut names = self.clients.names_for(&ids).await?;
        for row in &mut rows {
            if let Some(name) = names.remove(&row.client_id) {
                row.client_name = name;
            }
        }
        rows.sort_by(|a, b| b.remaining.cmp(&a.remaining));

        Ok(rows)
    }

    async fn require_client(&self, client_id: ClientId) -> Result<(), LedgerError> {
        match self.clients.get(client_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found(format!("client {client_id}")).into()),
        }
    }

    /// Cached-status refresh is best-effort at this call site: the
    /// financial write already succeeded.
    async fn refresh_cached_status(&self, client_id: ClientId) {
        if let Err(err) = self
            .projector
            .sync_client_payment_status(client_id)
            .await
        {
            tracing::warn!(
                %client_id,
                error = %err,
                "cached client payment status refresh failed"
            );
        }
    }
}
