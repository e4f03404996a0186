//! Best-effort side-effect boundary.
//!
//! Reminders and audit entries are projections of ledger state, not
//! part of it. Every method here follows the same policy: try, log at
//! `warn` on failure, continue. A reminder-store or audit-store outage
//! must never fail or roll back the financial write that triggered it.
//! Making that policy one visible boundary keeps empty catch blocks out
//! of the engine.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::warn;

use opsdesk_core::{ClientId, ScheduleId, UserId};
use opsdesk_ledger::{PaymentMethod, ScheduleItem};

use crate::stores::{AuditAction, AuditLogEntry, AuditStore, Reminder, ReminderStore};

/// Reminder and audit propagation for ledger operations.
#[derive(Clone)]
pub struct SideEffects {
    reminders: Arc<dyn ReminderStore>,
    audit: Arc<dyn AuditStore>,
}

impl SideEffects {
    pub fn new(reminders: Arc<dyn ReminderStore>, audit: Arc<dyn AuditStore>) -> Self {
        Self { reminders, audit }
    }

    /// Upsert one reminder per schedule, mirroring due date and settled
    /// state. Idempotent: re-running with identical schedule state
    /// changes nothing.
    pub async fn sync_reminders_for_schedules(
        &self,
        client_id: ClientId,
        schedules: &[ScheduleItem],
    ) {
        for schedule in schedules {
            let reminder = Reminder::for_schedule(schedule);
            if let Err(err) = self.reminders.upsert(reminder).await {
                warn!(
                    %client_id,
                    schedule_id = %schedule.id,
                    error = %err,
                    "reminder sync failed; ledger state is unaffected"
                );
            }
        }
    }

    /// Audit a schedule-creation batch: count and ids only.
    pub async fn record_schedules_created(
        &self,
        client_id: ClientId,
        schedules: &[ScheduleItem],
        source: &str,
        actor: Option<UserId>,
    ) {
        let details = json!({
            "count": schedules.len(),
            "schedule_ids": schedules.iter().map(|s| s.id).collect::<Vec<_>>(),
            "source": source,
        });
        self.append_audit(AuditLogEntry::new(
            AuditAction::SchedulesCreated,
            client_id,
            actor,
            details,
        ))
        .await;
    }

    /// Audit a collection: amount, method, target (if any), and the
    /// schedules actually updated.
    pub async fn record_payment_collected(
        &self,
        client_id: ClientId,
        amount: Decimal,
        method: PaymentMethod,
        targeted: Option<ScheduleId>,
        updated: &[ScheduleId],
        actor: Option<UserId>,
    ) {
        let details = json!({
            "amount": amount,
            "method": method.as_str(),
            "targeted_schedule_id": targeted,
            "updated_schedule_ids": updated,
        });
        self.append_audit(AuditLogEntry::new(
            AuditAction::PaymentCollected,
            client_id,
            actor,
            details,
        ))
        .await;
    }

    async fn append_audit(&self, entry: AuditLogEntry) {
        let action = entry.action;
        let client_id = entry.client_id;
        if let Err(err) = self.audit.append(entry).await {
            warn!(
                %client_id,
                action = action.as_str(),
                error = %err,
                "audit append failed; ledger state is unaffected"
            );
        }
    }
}
