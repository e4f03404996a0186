//! Postgres-backed store implementations.
//!
//! Expected tables (managed by the deployment, not this crate):
//!
//! - `payment_schedules(id uuid pk, client_id uuid, amount_due numeric,
//!   amount_paid numeric null, is_paid bool, due_date timestamptz,
//!   installment_number int, status text, note text null, source text,
//!   paid_at timestamptz null, created_at timestamptz)`
//! - `payment_transactions(id uuid pk, client_id uuid, schedule_id uuid
//!   null, amount numeric, method text, occurred_at timestamptz, note
//!   text null)`
//! - `payment_reminders(schedule_id uuid pk, client_id uuid, due_at
//!   timestamptz, completed bool, updated_at timestamptz)`
//! - `audit_log(id uuid pk, action text, client_id uuid, actor uuid
//!   null, details jsonb, occurred_at timestamptz)`
//! - `clients(id uuid pk, name text null, payment_status text null, ...)`
//!
//! ## Error mapping
//!
//! | sqlx error                  | `StoreError`  | scenario                          |
//! |-----------------------------|---------------|-----------------------------------|
//! | `RowNotFound`               | `NotFound`    | addressed row absent              |
//! | database code `42P01`       | `Unavailable` | backing table missing             |
//! | anything else               | `Backend`     | connectivity, constraint, etc.    |
//!
//! The conditional update in [`PostgresScheduleStore::apply_payment`]
//! reports `Conflict` itself when the `WHERE` guard matches no row but
//! the schedule exists.
//!
//! The legacy paid-flag resolution is replicated in SQL (explicit
//! positive `amount_paid`, else `amount_due` when `is_paid`, else 0) so
//! the optimistic guard and the open-schedule filter see the same paid
//! amount the domain does.

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use async_trait::async_trait;

use opsdesk_core::{ClientId, ScheduleId};
use opsdesk_ledger::{
    ClientPaymentStatus, ScheduleItem, Transaction, derive_status, resolve_paid_amount,
};

use super::interface::{
    AuditLogEntry, AuditStore, ClientRecord, ClientStore, PaymentUpdate, Reminder, ReminderStore,
    ScheduleStore, StoreError,
};

/// SQL expression of [`resolve_paid_amount`], used by the optimistic
/// guard and the open-schedule filter.
const RESOLVED_PAID_SQL: &str = "(CASE \
     WHEN amount_paid IS NOT NULL AND amount_paid > 0 THEN amount_paid \
     WHEN is_paid THEN amount_due \
     ELSE 0 END)";

const SCHEDULE_COLUMNS: &str = "id, client_id, amount_due, amount_paid, is_paid, due_date, \
     installment_number, status, note, source, paid_at, created_at";

fn map_sqlx_error(op: &str, e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("{op}: row not found")),
        sqlx::Error::Database(db) if db.code().as_deref() == Some("42P01") => {
            StoreError::Unavailable(format!("{op}: backing table missing"))
        }
        _ => StoreError::Backend(format!("{op}: {e}")),
    }
}

fn schedule_from_row(row: &PgRow) -> Result<ScheduleItem, StoreError> {
    let read = |e: sqlx::Error| StoreError::Backend(format!("schedule row decode: {e}"));

    let amount_due: Decimal = row.try_get("amount_due").map_err(read)?;
    let amount_paid: Option<Decimal> = row.try_get("amount_paid").map_err(read)?;
    let legacy_paid: bool = row.try_get("is_paid").map_err(read)?;
    let installment_number: i32 = row.try_get("installment_number").map_err(read)?;

    // The persisted status column is a projection for ad-hoc queries;
    // reads recompute it from the amounts so the derivation rule stays
    // in one place.
    let paid = resolve_paid_amount(amount_paid, legacy_paid, amount_due);

    Ok(ScheduleItem {
        id: ScheduleId::from_uuid(row.try_get("id").map_err(read)?),
        client_id: ClientId::from_uuid(row.try_get("client_id").map_err(read)?),
        amount_due,
        amount_paid,
        legacy_paid,
        due_date: row.try_get("due_date").map_err(read)?,
        installment_number: installment_number.max(0) as u32,
        status: derive_status(amount_due, paid),
        note: row.try_get("note").map_err(read)?,
        source: row.try_get("source").map_err(read)?,
        paid_at: row.try_get("paid_at").map_err(read)?,
        created_at: row.try_get("created_at").map_err(read)?,
    })
}

/// Postgres ledger store (schedules + transactions).
#[derive(Debug, Clone)]
pub struct PostgresScheduleStore {
    pool: PgPool,
}

impl PostgresScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleStore for PostgresScheduleStore {
    #[instrument(skip(self), fields(client_id = %client_id))]
    async fn schedules_for_client(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<ScheduleItem>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM payment_schedules \
             WHERE client_id = $1 \
             ORDER BY due_date ASC, installment_number ASC"
        ))
        .bind(client_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("schedules_for_client", e))?;

        rows.iter().map(schedule_from_row).collect()
    }

    async fn max_installment_number(&self, client_id: ClientId) -> Result<u32, StoreError> {
        let max: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(installment_number), 0) FROM payment_schedules \
             WHERE client_id = $1",
        )
        .bind(client_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("max_installment_number", e))?;

        Ok(max.max(0) as u32)
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn insert_batch(
        &self,
        items: Vec<ScheduleItem>,
    ) -> Result<Vec<ScheduleItem>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_batch/begin", e))?;

        for item in &items {
            sqlx::query(
                "INSERT INTO payment_schedules \
                 (id, client_id, amount_due, amount_paid, is_paid, due_date, \
                  installment_number, status, note, source, paid_at, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(item.id.as_uuid())
            .bind(item.client_id.as_uuid())
            .bind(item.amount_due)
            .bind(item.amount_paid)
            .bind(item.legacy_paid)
            .bind(item.due_date)
            .bind(item.installment_number as i32)
            .bind(item.status.as_str())
            .bind(item.note.as_deref())
            .bind(item.source.as_str())
            .bind(item.paid_at)
            .bind(item.created_at)
            .execute(tx.as_mut())
            .await
            .map_err(|e| map_sqlx_error("insert_batch", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_batch/commit", e))?;

        Ok(items)
    }

    async fn get(&self, id: ScheduleId) -> Result<Option<ScheduleItem>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM payment_schedules WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(schedule_from_row).transpose()
    }

    #[instrument(skip(self, update), fields(schedule_id = %id))]
    async fn apply_payment(
        &self,
        id: ScheduleId,
        expected_paid: Decimal,
        update: PaymentUpdate,
    ) -> Result<ScheduleItem, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE payment_schedules \
             SET amount_paid = $2, status = $3, paid_at = COALESCE(paid_at, $4) \
             WHERE id = $1 AND {RESOLVED_PAID_SQL} = $5 \
             RETURNING {SCHEDULE_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(update.amount_paid)
        .bind(update.status.as_str())
        .bind(update.paid_at)
        .bind(expected_paid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("apply_payment", e))?;

        if let Some(row) = row {
            return schedule_from_row(&row);
        }

        // Guard matched nothing: distinguish a vanished row from a
        // concurrent collection.
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM payment_schedules WHERE id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("apply_payment/exists", e))?;

        if exists {
            Err(StoreError::Conflict(format!(
                "schedule {id}: paid amount no longer {expected_paid}"
            )))
        } else {
            Err(StoreError::NotFound(format!("schedule {id}")))
        }
    }

    async fn open_schedules(&self) -> Result<Vec<ScheduleItem>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM payment_schedules \
             WHERE amount_due > {RESOLVED_PAID_SQL} \
             ORDER BY due_date ASC, installment_number ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("open_schedules", e))?;

        rows.iter().map(schedule_from_row).collect()
    }

    async fn record_transaction(&self, tx: Transaction) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payment_transactions \
             (id, client_id, schedule_id, amount, method, occurred_at, note) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(tx.id.as_uuid())
        .bind(tx.client_id.as_uuid())
        .bind(tx.schedule_id.map(|s| *s.as_uuid()))
        .bind(tx.amount)
        .bind(tx.method.as_str())
        .bind(tx.occurred_at)
        .bind(tx.note.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_transaction", e))?;

        Ok(())
    }
}

/// Postgres reminder store. Missing backing table is a no-op, not an
/// error: reminders are a convenience projection.
#[derive(Debug, Clone)]
pub struct PostgresReminderStore {
    pool: PgPool,
}

impl PostgresReminderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for PostgresReminderStore {
    async fn upsert(&self, reminder: Reminder) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO payment_reminders (schedule_id, client_id, due_at, completed, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (schedule_id) DO UPDATE \
             SET due_at = excluded.due_at, completed = excluded.completed, updated_at = now()",
        )
        .bind(reminder.schedule_id.as_uuid())
        .bind(reminder.client_id.as_uuid())
        .bind(reminder.due_at)
        .bind(reminder.completed)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match map_sqlx_error("reminder_upsert", e) {
                StoreError::Unavailable(msg) => {
                    debug!(%msg, "reminder table absent; skipping upsert");
                    Ok(())
                }
                other => Err(other),
            },
        }
    }
}

/// Postgres append-only audit store.
#[derive(Debug, Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO audit_log (id, action, client_id, actor, details, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.action.as_str())
        .bind(entry.client_id.as_uuid())
        .bind(entry.actor.map(|a| *a.as_uuid()))
        .bind(entry.details)
        .bind(entry.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("audit_append", e))?;

        Ok(())
    }
}

fn parse_client_status(raw: Option<&str>) -> Option<ClientPaymentStatus> {
    match raw {
        Some("paid") => Some(ClientPaymentStatus::Paid),
        Some("deposit") => Some(ClientPaymentStatus::Deposit),
        Some("unpaid") => Some(ClientPaymentStatus::Unpaid),
        _ => None,
    }
}

/// Postgres client store (lookup + cached status write-back).
#[derive(Debug, Clone)]
pub struct PostgresClientStore {
    pool: PgPool,
}

impl PostgresClientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientStore for PostgresClientStore {
    async fn get(&self, id: ClientId) -> Result<Option<ClientRecord>, StoreError> {
        let row = sqlx::query("SELECT id, name, payment_status FROM clients WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("client_get", e))?;

        let Some(row) = row else { return Ok(None) };
        let read = |e: sqlx::Error| StoreError::Backend(format!("client row decode: {e}"));

        let status: Option<String> = row.try_get("payment_status").map_err(read)?;
        Ok(Some(ClientRecord {
            id: ClientId::from_uuid(row.try_get("id").map_err(read)?),
            name: row.try_get("name").map_err(read)?,
            payment_status: parse_client_status(status.as_deref()),
        }))
    }

    async fn names_for(
        &self,
        ids: &[ClientId],
    ) -> Result<std::collections::HashMap<ClientId, String>, StoreError> {
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query("SELECT id, name FROM clients WHERE id = ANY($1)")
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("client_names_for", e))?;

        let read = |e: sqlx::Error| StoreError::Backend(format!("client row decode: {e}"));
        let mut names = std::collections::HashMap::with_capacity(rows.len());
        for row in rows {
            let name: Option<String> = row.try_get("name").map_err(read)?;
            if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
                names.insert(ClientId::from_uuid(row.try_get("id").map_err(read)?), name);
            }
        }
        Ok(names)
    }

    async fn set_payment_status(
        &self,
        id: ClientId,
        status: ClientPaymentStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE clients SET payment_status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("client_set_payment_status", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("client {id}")));
        }
        Ok(())
    }
}
