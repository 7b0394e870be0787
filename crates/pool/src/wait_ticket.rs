use std::sync::atomic::{AtomicUsize, Ordering};

/// Marks one task parked inside [`crate::TicketPool::add`] or one of the take methods.
///
/// Taken the first time the task has to wait and held across every re-check, so a task
/// woken without making progress is still counted once. Dropping the guard (because the
/// call returned or its future was dropped) takes the task out of the count.
pub(crate) struct WaitTicket<'a> {
    parked: &'a AtomicUsize,
}

impl<'a> WaitTicket<'a> {
    pub(crate) fn acquire(parked: &'a AtomicUsize) -> Self {
        parked.fetch_add(1, Ordering::SeqCst);
        WaitTicket { parked }
    }
}

impl Drop for WaitTicket<'_> {
    fn drop(&mut self) {
        self.parked.fetch_sub(1, Ordering::SeqCst);
    }
}
