//! Client status projector.
//!
//! The client record carries a cached copy of the derived aggregate
//! payment status so list views can filter without touching schedules.
//! It is a read optimization, never a source of truth: this projector
//! recomputes the summary from current schedules and writes only the
//! derived status back. Safe to call redundantly at any time.

use std::sync::Arc;

use opsdesk_core::ClientId;
use opsdesk_ledger::{ClientPaymentStatus, summarize_schedules};

use crate::stores::{ClientStore, ScheduleStore, StoreError};

#[derive(Clone)]
pub struct ClientStatusProjector {
    schedules: Arc<dyn ScheduleStore>,
    clients: Arc<dyn ClientStore>,
}

impl ClientStatusProjector {
    pub fn new(schedules: Arc<dyn ScheduleStore>, clients: Arc<dyn ClientStore>) -> Self {
        Self { schedules, clients }
    }

    /// Refresh the cached status and return the value written.
    pub async fn sync_client_payment_status(
        &self,
        client_id: ClientId,
    ) -> Result<ClientPaymentStatus, StoreError> {
        let schedules = self.schedules.schedules_for_client(client_id).await?;
        let summary = summarize_schedules(&schedules);
        self.clients
            .set_payment_status(client_id, summary.status)
            .await?;
        Ok(summary.status)
    }
}
