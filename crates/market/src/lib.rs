//! Vendors and customers trading through a shared [`TicketPool`](ticket_market_pool::TicketPool).

mod cadence;
pub mod config_file;
mod customer;
mod errors;
mod simulation;
mod vendor;

pub use customer::Customer;
pub use errors::{MarketError, TaskError};
pub use simulation::Simulation;
pub use vendor::Vendor;
