use std::{
    collections::VecDeque,
    pin::pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use ticket_market_proto::{PoolSnapshot, Ticket};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::{claim::TicketClaim, errors::PoolError, wait_ticket::WaitTicket};

#[derive(Debug, Default)]
struct PoolState {
    queue: VecDeque<Ticket>,
    issued: u64,
    added: u64,
    sold: u64,
    purchase_claims: u64,
    outstanding_claims: u64,
    registered_vendors: usize,
    high_water: usize,
}

/// A bounded FIFO of tickets with a lifetime issuance quota.
///
/// All state lives behind one mutex that is never held across an `.await`. Tasks that
/// cannot make progress park on one of two notifiers: vendors on `not_full`, customers
/// on `not_empty`. Every state change that could unblock the other side wakes all of its
/// waiters, and each waiter re-checks its condition before proceeding.
#[derive(Debug)]
pub struct TicketPool {
    state: Mutex<PoolState>,
    capacity: usize,
    quota: u64,
    not_full: Notify,
    not_empty: Notify,
    waiting_vendors: AtomicUsize,
    waiting_customers: AtomicUsize,
}

impl TicketPool {
    /// Create a pool holding at most `capacity` tickets at once and issuing at most `quota`
    /// tickets over its lifetime. Both must be positive.
    pub fn new(capacity: i64, quota: i64) -> Result<Self, PoolError> {
        let capacity_limit = usize::try_from(capacity)
            .ok()
            .filter(|c| *c > 0)
            .ok_or(PoolError::InvalidConfiguration { field: "capacity", value: capacity })?;
        let quota_limit = u64::try_from(quota)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(PoolError::InvalidConfiguration { field: "quota", value: quota })?;

        Ok(Self {
            // the queue grows on demand; `capacity` is only a limit
            state: Mutex::new(PoolState::default()),
            capacity: capacity_limit,
            quota: quota_limit,
            not_full: Notify::new(),
            not_empty: Notify::new(),
            waiting_vendors: AtomicUsize::new(0),
            waiting_customers: AtomicUsize::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn quota(&self) -> u64 {
        self.quota
    }

    // Critical sections never panic, so a poisoned lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve the next sequential ticket id. Returns `None` once `quota` ids have been issued.
    pub fn claim_ticket_id(&self) -> Option<TicketClaim<'_>> {
        let mut state = self.lock();
        if state.issued >= self.quota {
            return None;
        }
        state.issued += 1;
        state.outstanding_claims += 1;
        Some(TicketClaim::new(self, state.issued))
    }

    pub(crate) fn vendor_joined(&self) {
        let mut state = self.lock();
        state.registered_vendors += 1;
        debug!(registered = state.registered_vendors, "vendor registered");
    }

    pub(crate) fn vendor_left(&self) {
        let mut state = self.lock();
        state.registered_vendors = state.registered_vendors.saturating_sub(1);
        debug!(registered = state.registered_vendors, "vendor unregistered");
        self.not_empty.notify_waiters();
    }

    pub(crate) fn release_claim(&self, id: u64) {
        let mut state = self.lock();
        state.outstanding_claims = state.outstanding_claims.saturating_sub(1);
        debug!(ticket_id = id, outstanding = state.outstanding_claims, "ticket claim released");
        // strict customers may be waiting to learn that nothing more is coming
        self.not_empty.notify_waiters();
    }

    /// Admit one more purchase attempt. Returns `false` once `quota` attempts have been admitted.
    pub fn claim_purchase(&self) -> bool {
        let mut state = self.lock();
        if state.purchase_claims >= self.quota {
            return false;
        }
        state.purchase_claims += 1;
        true
    }

    /// Append `ticket` to the tail of the pool, waiting while the pool is full.
    ///
    /// No quota check happens here; callers get their ids from [`TicketPool::claim_ticket_id`].
    /// Dropping the returned future before it completes leaves the pool untouched.
    pub async fn add(&self, ticket: Ticket) {
        let mut waiting = None;
        loop {
            let mut notified = pin!(self.not_full.notified());
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if state.queue.len() < self.capacity {
                    let ticket_id = ticket.id();
                    state.queue.push_back(ticket);
                    state.added += 1;
                    state.high_water = state.high_water.max(state.queue.len());
                    info!(
                        ticket_id,
                        queued = state.queue.len(),
                        total_added = state.added,
                        "ticket added to pool"
                    );
                    self.not_empty.notify_waiters();
                    return;
                }
                if waiting.is_none() {
                    info!(ticket_id = ticket.id(), "ticket pool full, waiting for tickets to be sold");
                    waiting = Some(WaitTicket::acquire(&self.waiting_vendors));
                }
            }
            notified.await;
        }
    }

    /// Remove and return the oldest ticket, waiting while the pool is empty.
    pub async fn take(&self) -> Ticket {
        let mut waiting = None;
        loop {
            let mut notified = pin!(self.not_empty.notified());
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if let Some(ticket) = self.pop_front(&mut state) {
                    return ticket;
                }
                if waiting.is_none() {
                    info!("waiting for more tickets");
                    waiting = Some(WaitTicket::acquire(&self.waiting_customers));
                }
            }
            notified.await;
        }
    }

    /// Like [`TicketPool::take`], but gives up instead of waiting when no ticket can ever
    /// arrive: either `quota` tickets have been sold, or the pool is empty, no claim is
    /// outstanding and either every id has been issued or no vendor is registered.
    pub async fn take_until_sold_out(&self) -> Option<Ticket> {
        let mut waiting = None;
        loop {
            let mut notified = pin!(self.not_empty.notified());
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if state.sold >= self.quota {
                    return None;
                }
                if let Some(ticket) = self.pop_front(&mut state) {
                    return Some(ticket);
                }
                if state.outstanding_claims == 0
                    && (state.issued >= self.quota || state.registered_vendors == 0)
                {
                    return None;
                }
                if waiting.is_none() {
                    info!("waiting for more tickets");
                    waiting = Some(WaitTicket::acquire(&self.waiting_customers));
                }
            }
            notified.await;
        }
    }

    fn pop_front(&self, state: &mut PoolState) -> Option<Ticket> {
        let ticket = state.queue.pop_front()?;
        state.sold += 1;
        info!(ticket_id = ticket.id(), total_sold = state.sold, "ticket purchased");
        self.not_full.notify_waiters();
        Some(ticket)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.lock();
        PoolSnapshot {
            capacity: self.capacity,
            quota: self.quota,
            queued: state.queue.len(),
            issued: state.issued,
            added: state.added,
            sold: state.sold,
            purchase_claims: state.purchase_claims,
            outstanding_claims: state.outstanding_claims,
            registered_vendors: state.registered_vendors,
            high_water: state.high_water,
            waiting_vendors: self.waiting_vendors.load(Ordering::SeqCst),
            waiting_customers: self.waiting_customers.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::{sync::Arc, time::Duration};
    use tokio::time::{sleep, timeout};

    fn ticket(id: u64) -> Ticket {
        Ticket::new(id, "Test Event", Decimal::from(10))
    }

    /// Claim an id and add its ticket, returning the id, or `None` once the quota is reached.
    async fn release_one(pool: &TicketPool) -> Option<u64> {
        let claim = pool.claim_ticket_id()?;
        let id = claim.id();
        pool.add(ticket(id)).await;
        Some(id)
    }

    #[test]
    fn construction_rejects_non_positive_limits() {
        assert_eq!(
            TicketPool::new(0, 3).unwrap_err(),
            PoolError::InvalidConfiguration { field: "capacity", value: 0 }
        );
        assert_eq!(
            TicketPool::new(2, -1).unwrap_err(),
            PoolError::InvalidConfiguration { field: "quota", value: -1 }
        );
        assert!(TicketPool::new(-4, 0).is_err());

        let pool = TicketPool::new(2, 3).unwrap();
        assert_eq!((pool.capacity(), pool.quota()), (2, 3));
        assert_eq!(pool.snapshot(), PoolSnapshot { capacity: 2, quota: 3, ..Default::default() });
    }

    #[tokio::test]
    async fn huge_capacity_does_not_reserve_up_front() {
        let pool = TicketPool::new(i64::MAX, 3).unwrap();
        assert_eq!(pool.capacity(), i64::MAX as usize);

        pool.add(ticket(1)).await;
        assert_eq!(pool.take().await.id(), 1);

        let snap = pool.snapshot();
        assert_eq!((snap.added, snap.sold, snap.queued), (1, 1, 0));
    }

    #[tokio::test]
    async fn take_returns_tickets_in_fifo_order() {
        let pool = TicketPool::new(3, 3).unwrap();
        for id in [3, 1, 2] {
            pool.add(ticket(id)).await;
        }

        let mut taken = Vec::new();
        for _ in 0..3 {
            taken.push(pool.take().await.id());
        }
        assert_eq!(taken, vec![3, 1, 2]);

        let snap = pool.snapshot();
        assert_eq!((snap.added, snap.sold, snap.queued, snap.high_water), (3, 3, 0, 3));
    }

    #[test]
    fn claims_stop_at_quota_without_overshooting() {
        let pool = TicketPool::new(1, 3).unwrap();
        let ids: Vec<u64> = std::iter::from_fn(|| pool.claim_ticket_id().map(|c| c.id())).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(pool.claim_ticket_id().is_none());
        assert_eq!(pool.snapshot().issued, 3);
    }

    #[test]
    fn purchase_claims_stop_at_quota() {
        let pool = TicketPool::new(1, 2).unwrap();
        assert!(pool.claim_purchase());
        assert!(pool.claim_purchase());
        assert!(!pool.claim_purchase());
        assert!(!pool.claim_purchase());
        assert_eq!(pool.snapshot().purchase_claims, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_claimers_issue_exactly_the_quota() {
        let pool = Arc::new(TicketPool::new(1, 500).unwrap());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let mut mine = Vec::new();
                while let Some(claim) = pool.claim_ticket_id() {
                    mine.push(claim.id());
                    tokio::task::yield_now().await;
                }
                mine
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (1..=500).collect::<Vec<_>>());
        assert_eq!(pool.snapshot().issued, 500);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocked_take_is_woken_by_a_later_add() {
        let pool = Arc::new(TicketPool::new(1, 1).unwrap());

        let taker = tokio::spawn({
            let pool = pool.clone();
            async move { pool.take().await }
        });

        sleep(Duration::from_millis(50)).await;
        assert!(!taker.is_finished());
        assert_eq!(pool.snapshot().waiting_customers, 1);

        pool.add(ticket(1)).await;

        let got = timeout(Duration::from_secs(5), taker).await.unwrap().unwrap();
        assert_eq!(got.id(), 1);
        assert_eq!(pool.snapshot().waiting_customers, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocked_add_is_woken_by_a_later_take() {
        let pool = Arc::new(TicketPool::new(1, 2).unwrap());
        pool.add(ticket(1)).await;

        let adder = tokio::spawn({
            let pool = pool.clone();
            async move { pool.add(ticket(2)).await }
        });

        sleep(Duration::from_millis(50)).await;
        assert!(!adder.is_finished());
        let snap = pool.snapshot();
        assert_eq!((snap.queued, snap.waiting_vendors), (1, 1));

        assert_eq!(pool.take().await.id(), 1);
        timeout(Duration::from_secs(5), adder).await.unwrap().unwrap();

        let snap = pool.snapshot();
        assert_eq!((snap.queued, snap.waiting_vendors, snap.high_water), (1, 0, 1));
        assert_eq!(pool.take().await.id(), 2);
    }

    #[tokio::test]
    async fn abandoned_waiter_leaves_no_trace() {
        let pool = TicketPool::new(1, 1).unwrap();

        assert!(timeout(Duration::from_millis(20), pool.take()).await.is_err());
        let snap = pool.snapshot();
        assert_eq!((snap.sold, snap.waiting_customers), (0, 0));

        pool.add(ticket(1)).await;
        assert!(timeout(Duration::from_millis(20), pool.add(ticket(2))).await.is_err());
        let snap = pool.snapshot();
        assert_eq!((snap.added, snap.queued, snap.waiting_vendors), (1, 1, 0));

        assert_eq!(pool.take().await.id(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn capacity_and_quota_hold_under_contention() {
        for (capacity, quota, vendors, customers) in [(1, 60, 3, 3), (3, 200, 4, 4), (8, 150, 2, 6), (2, 90, 6, 1)] {
            let pool = Arc::new(TicketPool::new(capacity, quota).unwrap());
            let mut handles = Vec::new();

            for _ in 0..vendors {
                let pool = pool.clone();
                handles.push(tokio::spawn(async move { while release_one(&pool).await.is_some() {} }));
            }
            for _ in 0..customers {
                let pool = pool.clone();
                handles.push(tokio::spawn(async move {
                    while pool.claim_purchase() {
                        pool.take().await;
                    }
                }));
            }

            let sampler = tokio::spawn({
                let pool = pool.clone();
                async move {
                    loop {
                        let snap = pool.snapshot();
                        assert!(snap.queued <= snap.capacity);
                        assert!(snap.issued <= snap.quota);
                        assert!(snap.sold <= snap.added);
                        if snap.sold == snap.quota {
                            break;
                        }
                        tokio::task::yield_now().await;
                    }
                }
            });

            for handle in handles {
                timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();
            }
            timeout(Duration::from_secs(10), sampler).await.unwrap().unwrap();

            let snap = pool.snapshot();
            assert!(snap.high_water <= capacity as usize);
            assert_eq!((snap.issued, snap.added, snap.sold), (quota as u64, quota as u64, quota as u64));
            assert_eq!((snap.queued, snap.outstanding_claims), (0, 0));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn each_vendor_sees_its_tickets_sold_in_release_order() {
        let pool = Arc::new(TicketPool::new(4, 300).unwrap());

        let mut vendors = Vec::new();
        for _ in 0..5 {
            let pool = pool.clone();
            vendors.push(tokio::spawn(async move {
                let mut released = Vec::new();
                while let Some(id) = release_one(&pool).await {
                    released.push(id);
                }
                released
            }));
        }

        let mut received = Vec::new();
        for _ in 0..300 {
            received.push(pool.take().await.id());
        }

        for vendor in vendors {
            let released = vendor.await.unwrap();
            let seen: Vec<u64> = received.iter().copied().filter(|id| released.contains(id)).collect();
            assert_eq!(seen, released);
        }

        let mut sorted = received.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, (1..=300).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn strict_take_stops_once_everything_is_sold() {
        let pool = TicketPool::new(2, 2).unwrap();
        assert_eq!(release_one(&pool).await, Some(1));
        assert_eq!(release_one(&pool).await, Some(2));

        assert_eq!(pool.take_until_sold_out().await.map(|t| t.id()), Some(1));
        assert_eq!(pool.take_until_sold_out().await.map(|t| t.id()), Some(2));
        assert!(pool.take_until_sold_out().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn strict_take_stops_when_an_abandoned_claim_closes_issuance() {
        let pool = Arc::new(TicketPool::new(2, 2).unwrap());
        assert_eq!(release_one(&pool).await, Some(1));
        let claim = pool.claim_ticket_id().unwrap();

        assert_eq!(pool.take_until_sold_out().await.map(|t| t.id()), Some(1));

        let taker = tokio::spawn({
            let pool = pool.clone();
            async move { pool.take_until_sold_out().await }
        });
        sleep(Duration::from_millis(50)).await;
        assert!(!taker.is_finished(), "claim 2 is still outstanding");

        drop(claim);
        let got = timeout(Duration::from_secs(5), taker).await.unwrap().unwrap();
        assert!(got.is_none());
        assert_eq!(pool.snapshot().sold, 1);
    }
}
