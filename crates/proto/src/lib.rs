use std::{fmt, time::Duration};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_EVENT_NAME: &str = "Simple Event";
pub const DEFAULT_TICKET_PRICE: i64 = 1000;

/// A single ticket released by a vendor. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: u64,
    event_name: String,
    price: Decimal,
}

impl Ticket {
    pub fn new(id: u64, event_name: impl Into<String>, price: Decimal) -> Self {
        Self { id, event_name: event_name.into(), price }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn price(&self) -> Decimal {
        self.price
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket-{} ({} @ {})", self.id, self.event_name, self.price)
    }
}

/// Which counter customers check before trying to buy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationMode {
    /// Customers stop once their shared purchase-attempt counter passes the quota.
    /// A customer can block forever if vendors stop short of the quota.
    #[default]
    Legacy,
    /// Customers stop once the pool can never hand out another ticket.
    Strict,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { field, reason: reason.into() }
    }
}

/// Simulation parameters, as entered by the operator or loaded from a saved file.
/// Field names match the camelCase keys of the configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Seconds a vendor waits between releases.
    pub ticket_release_rate: f64,
    /// Seconds a customer waits between purchases.
    pub customer_retrieval_rate: f64,
    pub max_ticket_capacity: i64,
    pub total_tickets: i64,
    #[serde(default = "default_task_count")]
    pub vendor_count: i64,
    #[serde(default = "default_task_count")]
    pub customer_count: i64,
    #[serde(default)]
    pub termination_mode: TerminationMode,
    #[serde(default = "default_event_name")]
    pub event_name: String,
    #[serde(default = "default_ticket_price")]
    pub ticket_price: Decimal,
}

fn default_task_count() -> i64 {
    1
}

fn default_event_name() -> String {
    DEFAULT_EVENT_NAME.to_string()
}

fn default_ticket_price() -> Decimal {
    Decimal::from(DEFAULT_TICKET_PRICE)
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticket_release_rate: 1.0,
            customer_retrieval_rate: 1.0,
            max_ticket_capacity: 10,
            total_tickets: 50,
            vendor_count: default_task_count(),
            customer_count: default_task_count(),
            termination_mode: TerminationMode::default(),
            event_name: default_event_name(),
            ticket_price: default_ticket_price(),
        }
    }
}

impl SimulationConfig {
    /// Check every field, reporting the first one that is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("ticketReleaseRate", self.ticket_release_rate)?;
        check_rate("customerRetrievalRate", self.customer_retrieval_rate)?;

        if self.max_ticket_capacity <= 0 {
            return Err(ConfigError::invalid(
                "maxTicketCapacity",
                format!("must be a positive integer, got {}", self.max_ticket_capacity),
            ));
        }
        if self.total_tickets <= 0 {
            return Err(ConfigError::invalid(
                "totalTickets",
                format!("must be a positive integer, got {}", self.total_tickets),
            ));
        }
        if self.vendor_count < 0 {
            return Err(ConfigError::invalid("vendorCount", format!("must not be negative, got {}", self.vendor_count)));
        }
        if self.customer_count < 0 {
            return Err(ConfigError::invalid("customerCount", format!("must not be negative, got {}", self.customer_count)));
        }
        if self.ticket_price.is_sign_negative() {
            return Err(ConfigError::invalid("ticketPrice", format!("must not be negative, got {}", self.ticket_price)));
        }
        Ok(())
    }

    pub fn release_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.ticket_release_rate).unwrap_or_default()
    }

    pub fn retrieval_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.customer_retrieval_rate).unwrap_or_default()
    }
}

fn check_rate(field: &'static str, seconds: f64) -> Result<(), ConfigError> {
    if Duration::try_from_secs_f64(seconds).is_err() {
        return Err(ConfigError::invalid(field, format!("must be a non-negative number of seconds, got {}", seconds)));
    }
    Ok(())
}

/// Point-in-time view of a ticket pool's counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub capacity: usize,
    pub quota: u64,
    pub queued: usize,
    pub issued: u64,
    pub added: u64,
    pub sold: u64,
    pub purchase_claims: u64,
    pub outstanding_claims: u64,
    pub registered_vendors: usize,
    /// Largest queue length ever observed.
    pub high_water: usize,
    pub waiting_vendors: usize,
    pub waiting_customers: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorSummary {
    pub vendor_id: String,
    pub tickets_released: u64,
    pub last_ticket_id: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_id: String,
    pub tickets_purchased: u64,
    /// Ticket ids in the order this customer received them.
    pub ticket_ids: Vec<u64>,
}

/// What a finished simulation run hands back to the operator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationReport {
    pub pool: PoolSnapshot,
    pub vendors: Vec<VendorSummary>,
    pub customers: Vec<CustomerSummary>,
    pub failed_tasks: usize,
    pub elapsed_ms: u64,
}
