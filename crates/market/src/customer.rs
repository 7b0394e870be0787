use std::{sync::Arc, time::Duration};

use ticket_market_pool::TicketPool;
use ticket_market_proto::{CustomerSummary, TerminationMode, Ticket};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{cadence::pause, errors::TaskError};

/// Buys tickets from a shared pool at a fixed cadence until its termination rule says stop.
pub struct Customer {
    id: String,
    pool: Arc<TicketPool>,
    retrieval_rate: Duration,
    mode: TerminationMode,
}

impl Customer {
    pub fn new(id: impl Into<String>, pool: Arc<TicketPool>, retrieval_rate: Duration, mode: TerminationMode) -> Self {
        Self { id: id.into(), pool, retrieval_rate, mode }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<CustomerSummary, TaskError> {
        let mut ticket_ids = Vec::new();

        loop {
            let Some(ticket) = self.next_ticket(&cancel).await? else {
                info!(customer = %self.id, purchased = ticket_ids.len(), "stopping as tickets are sold out");
                return Ok(CustomerSummary {
                    customer_id: self.id.clone(),
                    tickets_purchased: ticket_ids.len() as u64,
                    ticket_ids,
                });
            };

            info!(customer = %self.id, "{} sold", ticket);
            ticket_ids.push(ticket.id());

            if !pause(self.retrieval_rate, &cancel).await {
                return Err(self.cancelled("waiting to buy the next ticket"));
            }
        }
    }

    /// One purchase attempt. `Ok(None)` means this customer is done.
    async fn next_ticket(&self, cancel: &CancellationToken) -> Result<Option<Ticket>, TaskError> {
        match self.mode {
            TerminationMode::Legacy => {
                if !self.pool.claim_purchase() {
                    return Ok(None);
                }
                info!(customer = %self.id, "trying to purchase a ticket");
                tokio::select! {
                    ticket = self.pool.take() => Ok(Some(ticket)),
                    _ = cancel.cancelled() => Err(self.cancelled("waiting for a ticket")),
                }
            }
            TerminationMode::Strict => {
                tokio::select! {
                    ticket = self.pool.take_until_sold_out() => Ok(ticket),
                    _ = cancel.cancelled() => Err(self.cancelled("waiting for a ticket")),
                }
            }
        }
    }

    fn cancelled(&self, during: &'static str) -> TaskError {
        let err = TaskError::Cancelled { task: self.id.clone(), during };
        error!(customer = %self.id, "{}", err);
        err
    }
}
