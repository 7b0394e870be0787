use std::sync::Arc;

use crate::pool::TicketPool;

/// Membership of one vendor in a pool. Unregisters itself when dropped.
///
/// Strict customers stop waiting on an empty pool once no vendor is registered and no
/// claim is outstanding, since nothing could ever add another ticket.
#[derive(Debug)]
pub struct VendorRegistration {
    pool: Arc<TicketPool>,
}

impl TicketPool {
    /// Register a vendor with this pool for as long as the returned handle lives.
    pub fn register_vendor(self: &Arc<Self>) -> VendorRegistration {
        self.vendor_joined();
        VendorRegistration { pool: Arc::clone(self) }
    }
}

impl VendorRegistration {
    pub fn pool(&self) -> &TicketPool {
        &self.pool
    }
}

impl Drop for VendorRegistration {
    fn drop(&mut self) {
        self.pool.vendor_left();
    }
}
