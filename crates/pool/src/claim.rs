use crate::pool::TicketPool;

/// A vendor's reservation of the next ticket id.
///
/// The id is never handed out again. While the claim is alive the pool counts it as
/// outstanding, so strict customers keep waiting for the ticket it stands for. Drop it
/// once the ticket has been added, or when the vendor gives up on it.
#[must_use = "dropping a claim releases it"]
pub struct TicketClaim<'a> {
    pool: &'a TicketPool,
    id: u64,
}

impl<'a> TicketClaim<'a> {
    pub(crate) fn new(pool: &'a TicketPool, id: u64) -> Self {
        TicketClaim { pool, id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for TicketClaim<'_> {
    fn drop(&mut self) {
        self.pool.release_claim(self.id);
    }
}
