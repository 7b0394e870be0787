use std::{sync::Arc, time::Duration};

use rust_decimal::Decimal;
use ticket_market_pool::{TicketPool, VendorRegistration};
use ticket_market_proto::{Ticket, VendorSummary, DEFAULT_EVENT_NAME, DEFAULT_TICKET_PRICE};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{cadence::pause, errors::TaskError};

/// Releases tickets into a shared pool at a fixed cadence until the pool's quota is used up.
pub struct Vendor {
    id: String,
    registration: VendorRegistration,
    release_rate: Duration,
    event_name: String,
    price: Decimal,
}

impl Vendor {
    /// Create a vendor for `pool`. The vendor counts as registered with the pool from now
    /// until it is dropped or its run ends.
    pub fn new(id: impl Into<String>, pool: &Arc<TicketPool>, release_rate: Duration) -> Self {
        Self {
            id: id.into(),
            registration: pool.register_vendor(),
            release_rate,
            event_name: DEFAULT_EVENT_NAME.to_string(),
            price: Decimal::from(DEFAULT_TICKET_PRICE),
        }
    }

    pub fn with_ticket_details(mut self, event_name: impl Into<String>, price: Decimal) -> Self {
        self.event_name = event_name.into();
        self.price = price;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Claim an id, add its ticket, wait one cadence period; repeat until no id is left.
    pub async fn run(self, cancel: CancellationToken) -> Result<VendorSummary, TaskError> {
        let pool = self.registration.pool();
        let mut released = 0u64;
        let mut last_ticket_id = None;

        loop {
            let Some(claim) = pool.claim_ticket_id() else {
                info!(vendor = %self.id, released, "stopping as all tickets are released");
                return Ok(VendorSummary { vendor_id: self.id.clone(), tickets_released: released, last_ticket_id });
            };

            let ticket = Ticket::new(claim.id(), self.event_name.as_str(), self.price);
            tokio::select! {
                _ = pool.add(ticket) => {}
                _ = cancel.cancelled() => return Err(self.cancelled("adding a ticket")),
            }

            released += 1;
            last_ticket_id = Some(claim.id());
            drop(claim);
            info!(vendor = %self.id, released, "released a ticket");

            if !pause(self.release_rate, &cancel).await {
                return Err(self.cancelled("waiting to release the next ticket"));
            }
        }
    }

    fn cancelled(&self, during: &'static str) -> TaskError {
        let err = TaskError::Cancelled { task: self.id.clone(), during };
        error!(vendor = %self.id, "{}", err);
        err
    }
}
