//! In-memory store implementations.
//!
//! Intended for tests and development. Same contracts as the Postgres
//! stores, including the conditional-update conflict semantics.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use rust_decimal::Decimal;

use opsdesk_core::{ClientId, ScheduleId};
use opsdesk_ledger::{ClientPaymentStatus, ScheduleItem, Transaction};

use super::interface::{
    AuditLogEntry, AuditStore, ClientRecord, ClientStore, PaymentUpdate, Reminder, ReminderStore,
    ScheduleStore, StoreError,
};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory ledger store: schedule rows plus the append-only
/// transaction log.
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    rows: RwLock<HashMap<ScheduleId, ScheduleItem>>,
    transactions: RwLock<Vec<Transaction>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded transactions, in append order. Test inspection only.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.read().map(|t| t.clone()).unwrap_or_default()
    }
}

fn sort_by_due(items: &mut [ScheduleItem]) {
    items.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then(a.installment_number.cmp(&b.installment_number))
    });
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn schedules_for_client(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<ScheduleItem>, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        let mut items: Vec<ScheduleItem> = rows
            .values()
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect();
        sort_by_due(&mut items);
        Ok(items)
    }

    async fn max_installment_number(&self, client_id: ClientId) -> Result<u32, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows
            .values()
            .filter(|s| s.client_id == client_id)
            .map(|s| s.installment_number)
            .max()
            .unwrap_or(0))
    }

    async fn insert_batch(
        &self,
        items: Vec<ScheduleItem>,
    ) -> Result<Vec<ScheduleItem>, StoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        for item in &items {
            if rows.contains_key(&item.id) {
                return Err(StoreError::Backend(format!(
                    "duplicate schedule id {}",
                    item.id
                )));
            }
        }
        for item in &items {
            rows.insert(item.id, item.clone());
        }
        Ok(items)
    }

    async fn get(&self, id: ScheduleId) -> Result<Option<ScheduleItem>, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&id).cloned())
    }

    async fn apply_payment(
        &self,
        id: ScheduleId,
        expected_paid: Decimal,
        update: PaymentUpdate,
    ) -> Result<ScheduleItem, StoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("schedule {id}")))?;

        // Same guard the Postgres store enforces in the WHERE clause.
        if row.paid_amount() != expected_paid {
            return Err(StoreError::Conflict(format!(
                "schedule {id}: expected paid {expected_paid}, found {}",
                row.paid_amount()
            )));
        }

        row.amount_paid = Some(update.amount_paid);
        row.status = update.status;
        if row.paid_at.is_none() {
            row.paid_at = update.paid_at;
        }
        Ok(row.clone())
    }

    async fn open_schedules(&self) -> Result<Vec<ScheduleItem>, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        let mut items: Vec<ScheduleItem> =
            rows.values().filter(|s| s.is_open()).cloned().collect();
        sort_by_due(&mut items);
        Ok(items)
    }

    async fn record_transaction(&self, tx: Transaction) -> Result<(), StoreError> {
        self.transactions.write().map_err(|_| poisoned())?.push(tx);
        Ok(())
    }
}

/// In-memory reminder store, keyed by schedule id.
#[derive(Debug, Default)]
pub struct InMemoryReminderStore {
    rows: RwLock<HashMap<ScheduleId, Reminder>>,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Reminder> {
        self.rows
            .read()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn upsert(&self, reminder: Reminder) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        rows.insert(reminder.schedule_id, reminder);
        Ok(())
    }
}

/// In-memory append-only audit log.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), StoreError> {
        self.entries.write().map_err(|_| poisoned())?.push(entry);
        Ok(())
    }
}

/// In-memory client records.
#[derive(Debug, Default)]
pub struct InMemoryClientStore {
    rows: RwLock<HashMap<ClientId, ClientRecord>>,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a client (clients are managed outside the ledger).
    pub fn insert(&self, record: ClientRecord) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(record.id, record);
        }
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn get(&self, id: ClientId) -> Result<Option<ClientRecord>, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&id).cloned())
    }

    async fn names_for(
        &self,
        ids: &[ClientId],
    ) -> Result<HashMap<ClientId, String>, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                let name = rows.get(id)?.name.clone()?;
                if name.trim().is_empty() {
                    None
                } else {
                    Some((*id, name))
                }
            })
            .collect())
    }

    async fn set_payment_status(
        &self,
        id: ClientId,
        status: ClientPaymentStatus,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("client {id}")))?;
        row.payment_status = Some(status);
        Ok(())
    }
}
