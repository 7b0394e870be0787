use std::{future::Future, sync::Arc, time::Instant};

use ticket_market_pool::TicketPool;
use ticket_market_proto::{SimulationConfig, SimulationReport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use crate::{customer::Customer, errors::{MarketError, TaskError}, vendor::Vendor};

/// One run of the marketplace: a pool plus the vendor and customer tasks sharing it.
pub struct Simulation {
    config: SimulationConfig,
    pool: Arc<TicketPool>,
    cancel: CancellationToken,
}

impl Simulation {
    /// Validate `config` and build the pool it describes.
    pub fn new(config: SimulationConfig) -> Result<Self, MarketError> {
        config.validate()?;
        let pool = TicketPool::new(config.max_ticket_capacity, config.total_tickets)?;
        Ok(Self { config, pool: Arc::new(pool), cancel: CancellationToken::new() })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn pool(&self) -> Arc<TicketPool> {
        self.pool.clone()
    }

    /// Token shared by every task of this run. Cancelling it interrupts all of them.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn all vendors, then all customers, and wait for every one of them to stop.
    ///
    /// A task that is cancelled or panics only ends itself; it is counted in
    /// `failed_tasks` and the remaining tasks carry on.
    pub async fn run(self) -> SimulationReport {
        let start = Instant::now();
        info!(config = ?self.config, "starting simulation");

        // register every vendor before any customer can look at the pool
        let vendors: Vec<Vendor> = (1..=self.config.vendor_count)
            .map(|n| {
                Vendor::new(format!("V{:03}", n), &self.pool, self.config.release_interval())
                    .with_ticket_details(self.config.event_name.as_str(), self.config.ticket_price)
            })
            .collect();

        let vendor_handles: Vec<_> = vendors
            .into_iter()
            .map(|vendor| {
                let id = vendor.id().to_string();
                let span = info_span!("vendor", id = %id);
                (id, spawn_task(vendor.run(self.cancel.clone()), span))
            })
            .collect();

        let customer_handles: Vec<_> = (1..=self.config.customer_count)
            .map(|n| {
                let id = format!("C{:03}", n);
                let customer = Customer::new(
                    id.as_str(),
                    self.pool.clone(),
                    self.config.retrieval_interval(),
                    self.config.termination_mode,
                );
                let span = info_span!("customer", id = %id);
                (id, spawn_task(customer.run(self.cancel.clone()), span))
            })
            .collect();

        let mut failed_tasks = 0;

        let mut vendors = Vec::new();
        for (id, handle) in vendor_handles {
            match join_task(id, handle).await {
                Ok(summary) => vendors.push(summary),
                Err(_) => failed_tasks += 1,
            }
        }

        let mut customers = Vec::new();
        for (id, handle) in customer_handles {
            match join_task(id, handle).await {
                Ok(summary) => customers.push(summary),
                Err(_) => failed_tasks += 1,
            }
        }

        let report = SimulationReport {
            pool: self.pool.snapshot(),
            vendors,
            customers,
            failed_tasks,
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            issued = report.pool.issued,
            sold = report.pool.sold,
            failed_tasks,
            elapsed_ms = report.elapsed_ms,
            "simulation finished"
        );
        report
    }
}

fn spawn_task<F, T>(task: F, span: tracing::Span) -> JoinHandle<Result<T, TaskError>>
where
    F: Future<Output = Result<T, TaskError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(task.instrument(span))
}

async fn join_task<T>(id: String, handle: JoinHandle<Result<T, TaskError>>) -> Result<T, TaskError> {
    let result = match handle.await {
        Ok(result) => result,
        Err(join_err) => Err(TaskError::Panicked { task: id, message: join_err.to_string() }),
    };
    if let Err(e) = &result {
        error!("task ended early: {}", e);
    }
    result
}
