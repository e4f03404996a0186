//! Service wiring: stores, side effects, and the ledger engine.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use opsdesk_infra::{
    InMemoryAuditStore, InMemoryClientStore, InMemoryReminderStore, InMemoryScheduleStore,
    LedgerEngine, PostgresAuditStore, PostgresClientStore, PostgresReminderStore,
    PostgresScheduleStore, SideEffects,
};

/// Everything the handlers need, behind one `Extension`.
#[derive(Clone)]
pub struct AppServices {
    pub engine: LedgerEngine,
}

impl AppServices {
    pub fn new(engine: LedgerEngine) -> Self {
        Self { engine }
    }
}

/// In-memory wiring for development and tests. State lives for the
/// lifetime of the process only.
pub fn build_in_memory_services() -> AppServices {
    let schedules = Arc::new(InMemoryScheduleStore::new());
    let clients = Arc::new(InMemoryClientStore::new());
    let side_effects = SideEffects::new(
        Arc::new(InMemoryReminderStore::new()),
        Arc::new(InMemoryAuditStore::new()),
    );
    AppServices::new(LedgerEngine::new(schedules, clients, side_effects))
}

/// Postgres wiring: one pool shared across all stores.
pub async fn build_postgres_services(database_url: &str) -> Result<AppServices, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    let schedules = Arc::new(PostgresScheduleStore::new(pool.clone()));
    let clients = Arc::new(PostgresClientStore::new(pool.clone()));
    let side_effects = SideEffects::new(
        Arc::new(PostgresReminderStore::new(pool.clone())),
        Arc::new(PostgresAuditStore::new(pool)),
    );
    Ok(AppServices::new(LedgerEngine::new(
        schedules,
        clients,
        side_effects,
    )))
}
