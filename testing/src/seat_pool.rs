//! In-memory seat store with real row locks.
//!
//! [`InMemorySeatPool`] behaves like a relational store running at READ COMMITTED
//! with `SELECT ... FOR UPDATE`:
//!
//! - every seat row has its own async lock, held until the owning transaction ends
//! - a select waits on a locked row instead of skipping it, then re-reads the row and
//!   moves on to the next free seat if a concurrent commit took it
//! - writes stay private to the transaction until commit; dropping the transaction
//!   discards them
//! - connections are limited by a semaphore and returned on drop
//!
//! Faults can be injected to drive the reservation protocol through its failure
//! paths (acquire, begin, lock contention, update, commit).

use seatlock_core::{
    AttemptError, Seat, SeatConnection, SeatId, SeatPool, SeatTransaction, TheatreId, User,
    UserId, seat_label,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Counters of pending injected failures.
#[derive(Debug, Default)]
struct Faults {
    acquire: AtomicUsize,
    begin: AtomicUsize,
    lock: AtomicUsize,
    update: AtomicUsize,
    unmatched_update: AtomicUsize,
    commit: AtomicUsize,
}

/// Consume one pending fault, if any.
fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[derive(Debug, Default)]
struct Tables {
    seats: BTreeMap<SeatId, Seat>,
    users: HashSet<UserId>,
    next_seat_id: i64,
}

#[derive(Debug)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<SeatId, Arc<RowLock<()>>>>,
    connections: Arc<Semaphore>,
    max_connections: usize,
    lock_wait_timeout: Option<Duration>,
    commit_delay: Option<Duration>,
    faults: Faults,
    acquisitions: Mutex<Vec<Instant>>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl Shared {
    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, id: SeatId) -> Arc<RowLock<()>> {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id).or_default())
    }
}

/// Builder for [`InMemorySeatPool`].
#[derive(Debug, Clone)]
pub struct InMemorySeatPoolBuilder {
    max_connections: usize,
    lock_wait_timeout: Option<Duration>,
    commit_delay: Option<Duration>,
}

impl InMemorySeatPoolBuilder {
    /// Number of connections the pool lends at once (default 10).
    #[must_use]
    pub const fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Fail a row-lock wait with a contention error after this long.
    #[must_use]
    pub const fn lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout = Some(timeout);
        self
    }

    /// Sleep inside `commit`, while row locks are still held.
    #[must_use]
    pub const fn commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = Some(delay);
        self
    }

    /// Build an empty pool.
    #[must_use]
    pub fn build(self) -> InMemorySeatPool {
        let max_connections = self.max_connections.max(1);
        InMemorySeatPool {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables {
                    next_seat_id: 1,
                    ..Tables::default()
                }),
                row_locks: Mutex::new(HashMap::new()),
                connections: Arc::new(Semaphore::new(max_connections)),
                max_connections,
                lock_wait_timeout: self.lock_wait_timeout,
                commit_delay: self.commit_delay,
                faults: Faults::default(),
                acquisitions: Mutex::new(Vec::new()),
                commits: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
            }),
        }
    }
}

/// In-memory [`SeatPool`] for tests.
///
/// # Example
///
/// ```
/// use seatlock_core::{SeatConnection, SeatPool, SeatTransaction, TheatreId};
/// use seatlock_testing::InMemorySeatPool;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = InMemorySeatPool::new();
/// let theatre = TheatreId::new(1);
/// pool.provision_theatre(theatre, 3, 3);
///
/// let mut conn = pool.acquire().await?;
/// let mut tx = conn.begin().await?;
/// let seat = tx.lock_first_available(theatre).await?;
/// assert_eq!(seat.map(|s| s.id.get()), Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InMemorySeatPool {
    shared: Arc<Shared>,
}

impl Default for InMemorySeatPool {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySeatPool {
    /// Create an empty pool with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder.
    #[must_use]
    pub const fn builder() -> InMemorySeatPoolBuilder {
        InMemorySeatPoolBuilder {
            max_connections: 10,
            lock_wait_timeout: None,
            commit_delay: None,
        }
    }

    /// Create `count` free seats in `theatre`, named row by row with
    /// `seats_per_row` seats per row. IDs continue from the highest ID issued so far.
    pub fn provision_theatre(
        &self,
        theatre: TheatreId,
        count: usize,
        seats_per_row: usize,
    ) -> Vec<Seat> {
        let mut tables = self.shared.tables();
        (0..count)
            .map(|index| {
                let id = SeatId::new(tables.next_seat_id);
                tables.next_seat_id += 1;
                let seat = Seat::new(id, seat_label(index, seats_per_row), theatre);
                tables.seats.insert(id, seat.clone());
                seat
            })
            .collect()
    }

    /// Insert a seat as-is, owner included.
    pub fn insert_seat(&self, seat: Seat) {
        let mut tables = self.shared.tables();
        tables.next_seat_id = tables.next_seat_id.max(seat.id.get() + 1);
        tables.seats.insert(seat.id, seat);
    }

    /// Register a user. Once any user is registered, assigning a seat to an
    /// unregistered user fails like a foreign-key violation.
    pub fn register_user(&self, user: &User) {
        self.shared.tables().users.insert(user.id);
    }

    /// Committed state of one seat.
    #[must_use]
    pub fn seat(&self, id: SeatId) -> Option<Seat> {
        self.shared.tables().seats.get(&id).cloned()
    }

    /// Committed seats of a theatre, in ID order.
    #[must_use]
    pub fn seats(&self, theatre: TheatreId) -> Vec<Seat> {
        self.shared
            .tables()
            .seats
            .values()
            .filter(|seat| seat.theatre_id == theatre)
            .cloned()
            .collect()
    }

    /// Number of committed free seats in a theatre.
    #[must_use]
    pub fn available_count(&self, theatre: TheatreId) -> usize {
        self.shared
            .tables()
            .seats
            .values()
            .filter(|seat| seat.theatre_id == theatre && seat.is_available())
            .count()
    }

    /// Connections currently lent out.
    #[must_use]
    pub fn outstanding_connections(&self) -> usize {
        self.shared.max_connections - self.shared.connections.available_permits()
    }

    /// Instants at which `acquire` was called, oldest first.
    #[must_use]
    pub fn acquisitions(&self) -> Vec<Instant> {
        self.shared
            .acquisitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of committed transactions.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    /// Number of transactions dropped without committing.
    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }

    /// Fail the next `n` calls to `acquire`.
    pub fn fail_next_acquires(&self, n: usize) {
        self.shared.faults.acquire.fetch_add(n, Ordering::SeqCst);
    }

    /// Fail the next `n` calls to `begin`.
    pub fn fail_next_begins(&self, n: usize) {
        self.shared.faults.begin.fetch_add(n, Ordering::SeqCst);
    }

    /// Abort the next `n` locking selects as deadlock victims.
    pub fn fail_next_locks_with_deadlock(&self, n: usize) {
        self.shared.faults.lock.fetch_add(n, Ordering::SeqCst);
    }

    /// Fail the next `n` owner updates with an integrity error.
    pub fn fail_next_updates(&self, n: usize) {
        self.shared.faults.update.fetch_add(n, Ordering::SeqCst);
    }

    /// Make the next `n` owner updates match no row, as if the seat had vanished.
    pub fn unmatch_next_updates(&self, n: usize) {
        self.shared.faults.unmatched_update.fetch_add(n, Ordering::SeqCst);
    }

    /// Fail the next `n` commits.
    pub fn fail_next_commits(&self, n: usize) {
        self.shared.faults.commit.fetch_add(n, Ordering::SeqCst);
    }
}

impl SeatPool for InMemorySeatPool {
    type Connection = InMemoryConnection;

    async fn acquire(&self) -> Result<InMemoryConnection, AttemptError> {
        self.shared
            .acquisitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Instant::now());

        if take(&self.shared.faults.acquire) {
            return Err(AttemptError::Connection("injected acquire failure".into()));
        }

        let permit = Arc::clone(&self.shared.connections)
            .acquire_owned()
            .await
            .map_err(|e| AttemptError::Connection(e.to_string()))?;

        Ok(InMemoryConnection {
            shared: Arc::clone(&self.shared),
            _permit: permit,
        })
    }
}

/// A connection lent by [`InMemorySeatPool`]; its slot is released on drop.
#[derive(Debug)]
pub struct InMemoryConnection {
    shared: Arc<Shared>,
    _permit: OwnedSemaphorePermit,
}

impl SeatConnection for InMemoryConnection {
    type Transaction<'c> = InMemoryTransaction<'c>;

    async fn begin(&mut self) -> Result<InMemoryTransaction<'_>, AttemptError> {
        if take(&self.shared.faults.begin) {
            return Err(AttemptError::Transaction("injected begin failure".into()));
        }

        Ok(InMemoryTransaction {
            conn: self,
            held: Vec::new(),
            pending: Vec::new(),
            committed: false,
        })
    }
}

/// A transaction on an [`InMemoryConnection`].
#[derive(Debug)]
pub struct InMemoryTransaction<'c> {
    conn: &'c mut InMemoryConnection,
    held: Vec<(SeatId, OwnedMutexGuard<()>)>,
    pending: Vec<(SeatId, UserId)>,
    committed: bool,
}

impl InMemoryTransaction<'_> {
    fn shared(&self) -> &Shared {
        &self.conn.shared
    }

    fn holds(&self, id: SeatId) -> bool {
        self.held.iter().any(|(held, _)| *held == id)
    }

    async fn lock_row(&self, id: SeatId) -> Result<OwnedMutexGuard<()>, AttemptError> {
        let lock = self.shared().row_lock(id);
        match self.shared().lock_wait_timeout {
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| {
                    AttemptError::Contention(format!("lock wait timeout exceeded on seat {id}"))
                }),
            None => Ok(lock.lock_owned().await),
        }
    }
}

impl SeatTransaction for InMemoryTransaction<'_> {
    async fn lock_first_available(
        &mut self,
        theatre: TheatreId,
    ) -> Result<Option<Seat>, AttemptError> {
        if take(&self.shared().faults.lock) {
            return Err(AttemptError::Contention(
                "deadlock detected (injected)".into(),
            ));
        }

        let candidates: Vec<SeatId> = self
            .shared()
            .tables()
            .seats
            .values()
            .filter(|seat| seat.theatre_id == theatre && seat.is_available())
            .map(|seat| seat.id)
            .collect();

        for id in candidates {
            if self.holds(id) {
                continue;
            }
            let guard = self.lock_row(id).await?;

            // Re-read under the lock: a concurrent commit may have taken the row.
            let current = self.shared().tables().seats.get(&id).cloned();
            match current {
                Some(seat) if seat.theatre_id == theatre && seat.is_available() => {
                    self.held.push((id, guard));
                    return Ok(Some(seat));
                }
                _ => drop(guard),
            }
        }

        Ok(None)
    }

    async fn assign_owner(&mut self, seat: SeatId, owner: UserId) -> Result<u64, AttemptError> {
        if take(&self.shared().faults.update) {
            return Err(AttemptError::Update {
                seat,
                reason: "injected integrity violation".into(),
            });
        }

        if !self.holds(seat) {
            let guard = self.lock_row(seat).await?;
            self.held.push((seat, guard));
        }

        if take(&self.shared().faults.unmatched_update) {
            return Ok(0);
        }

        // Same predicate as `WHERE id = $2 AND user_id IS NULL`: an owned seat,
        // committed or written earlier in this transaction, matches no row.
        if self.pending.iter().any(|(id, _)| *id == seat) {
            return Ok(0);
        }
        {
            let tables = self.shared().tables();
            if !tables.users.is_empty() && !tables.users.contains(&owner) {
                return Err(AttemptError::Update {
                    seat,
                    reason: format!("user {owner} does not exist"),
                });
            }
            if !tables.seats.get(&seat).is_some_and(Seat::is_available) {
                return Ok(0);
            }
        }

        self.pending.push((seat, owner));
        Ok(1)
    }

    async fn commit(mut self) -> Result<(), AttemptError> {
        if let Some(delay) = self.shared().commit_delay {
            tokio::time::sleep(delay).await;
        }

        if take(&self.shared().faults.commit) {
            return Err(AttemptError::Commit("injected commit failure".into()));
        }

        {
            let mut tables = self.shared().tables();
            for (id, owner) in &self.pending {
                if let Some(seat) = tables.seats.get_mut(id) {
                    seat.owner = Some(*owner);
                }
            }
        }

        self.committed = true;
        self.shared().commits.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(writes = self.pending.len(), "In-memory transaction committed");
        Ok(())
    }
}

impl Drop for InMemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.conn.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
        // Row locks are released when `held` drops, after the writes above are applied.
    }
}
