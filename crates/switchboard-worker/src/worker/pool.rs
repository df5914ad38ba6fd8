//! Fixed-capacity FIFO pool of long-lived connections.
//!
//! The pool is built eagerly at startup and never resized: every connection
//! the worker will ever use exists before the first request is read. A
//! checkout hands back an RAII guard; dropping the guard is the only release
//! path, so a connection returns to the pool on every exit, including early
//! returns and failed requests.
//!
//! ## Guarantees
//! - [`ConnectionPool::initialize`] either produces a pool with every
//!   connection open or fails the worker outright.
//! - [`ConnectionPool::acquire`] takes the head of the idle queue, releases
//!   append to the tail, and a caller finding the queue empty suspends with
//!   no timeout until a release wakes it.
//! - Idle plus checked-out always equals capacity.
//!
//! ## Non-guarantees
//! A connection that goes bad stays in rotation: there is no health check
//! and no reconnect. A worker whose connections are broken is expected to
//! be restarted by its supervisor.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use switchboard_core::{Error, Result};
use tokio::sync::Notify;

/// A fixed-capacity pool of reusable connections.
pub struct ConnectionPool<T> {
    state: Mutex<PoolState<T>>,
    available: Notify,
    capacity: usize,
}

struct PoolState<T> {
    idle: VecDeque<T>,
}

impl<T> ConnectionPool<T> {
    /// Eagerly builds a pool of `capacity` connections.
    ///
    /// # Errors
    /// Returns [`Error::PoolInit`] if `capacity` is zero or any factory call
    /// fails. A partial pool is never handed out.
    pub async fn initialize<F, Fut, E>(capacity: usize, factory: F) -> Result<Arc<Self>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = core::result::Result<T, E>>,
        E: core::fmt::Display,
    {
        if capacity == 0 {
            return Err(Error::pool_init("capacity must be at least 1"));
        }

        let mut idle = VecDeque::with_capacity(capacity);
        for slot in 0..capacity {
            let conn = factory().await.map_err(|e| {
                Error::pool_init(format!("connection {slot} of {capacity} failed: {e}"))
            })?;
            idle.push_back(conn);
        }

        Ok(Arc::new(Self {
            state: Mutex::new(PoolState { idle }),
            available: Notify::new(),
            capacity,
        }))
    }

    /// Checks out the connection at the head of the idle queue, suspending
    /// until one is available.
    ///
    /// The returned guard puts the connection back at the tail of the queue
    /// when dropped.
    pub async fn acquire(self: &Arc<Self>) -> PooledConnection<T> {
        loop {
            // Scope the lock so it is never held across an await.
            let conn = {
                let mut state = self.state.lock();
                state.idle.pop_front()
            };

            if let Some(conn) = conn {
                return PooledConnection {
                    pool: Arc::clone(self),
                    conn: Some(conn),
                };
            }

            // `notified()` consumes a permit buffered by `notify_one`, so a
            // release landing between the pop above and this await is not
            // lost.
            self.available.notified().await;
        }
    }

    fn release(&self, conn: T) {
        {
            let mut state = self.state.lock();
            state.idle.push_back(conn);
        }
        self.available.notify_one();
    }

    /// Total number of connections owned by the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Connections currently sitting idle.
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Connections currently lent out.
    pub fn checked_out(&self) -> usize {
        self.capacity - self.idle_count()
    }
}

/// RAII guard for a checked-out connection.
///
/// Dereferences to the pooled value and releases it on drop; there is no
/// other release path.
pub struct PooledConnection<T> {
    pool: Arc<ConnectionPool<T>>,
    conn: Option<T>,
}

impl<T> Deref for PooledConnection<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection already released")
    }
}

impl<T> DerefMut for PooledConnection<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection already released")
    }
}

impl<T> Drop for PooledConnection<T> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
