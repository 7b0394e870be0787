//! Bounded, quota-limited ticket pool shared by vendor and customer tasks.

mod claim;
mod errors;
mod pool;
mod registration;
mod wait_ticket;

pub use claim::TicketClaim;
pub use errors::PoolError;
pub use pool::TicketPool;
pub use registration::VendorRegistration;
