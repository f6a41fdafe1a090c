//! Bounded connection pool for the analytical engine.
//!
//! Bounds the number of concurrent engine sessions and amortizes connection
//! setup cost. All pool state lives under one mutex; a condvar provides the
//! bounded wait when the pool is exhausted. The factory call happens outside
//! the lock, so no lock is ever held across a call into the engine.

use crate::engine::{ConnectionFactory, EngineConnection, EngineError};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Acquire timed out with no connection available. Recoverable by
    /// retrying or raising `max_connections`.
    #[error("pool exhausted: no connection available within {timeout_ms}ms")]
    Exhausted { timeout_ms: u64 },

    /// The engine could not open a connection. Surfaced to the caller, not
    /// retried internally.
    #[error("backend unavailable: {0}")]
    Backend(#[from] EngineError),

    /// The pool has been shut down.
    #[error("pool is shut down")]
    Closed,
}

struct PoolState {
    idle: VecDeque<Box<dyn EngineConnection>>,
    /// Connections currently created (idle + leased). Never exceeds `limit`.
    created: usize,
    /// Configured maximum; adjustable at runtime.
    limit: usize,
    shut_down: bool,
}

/// Bounded pool of reusable engine connections.
pub struct ConnectionPool {
    factory: Arc<dyn ConnectionFactory>,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl ConnectionPool {
    pub fn new(factory: Arc<dyn ConnectionFactory>, max_connections: usize) -> Self {
        assert!(max_connections > 0, "pool requires at least one connection");
        Self {
            factory,
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(max_connections),
                created: 0,
                limit: max_connections,
                shut_down: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Configured maximum number of connections.
    pub fn max_connections(&self) -> usize {
        self.state.lock().unwrap().limit
    }

    /// Lower or raise the connection limit. Excess connections are closed
    /// lazily as they are released.
    pub fn set_max_connections(&self, max_connections: usize) {
        assert!(max_connections > 0, "pool requires at least one connection");
        self.state.lock().unwrap().limit = max_connections;
        // A raised limit may unblock waiters
        self.available.notify_all();
    }

    /// Connections currently created (idle + leased).
    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    /// Connections currently idle in the queue.
    pub fn idle_count(&self) -> usize {
        self.state.lock().unwrap().idle.len()
    }

    /// Lease a connection: an idle one if available, a freshly created one if
    /// under the limit, else wait until one is released or `timeout` elapses.
    ///
    /// A zero timeout on an exhausted pool fails immediately with
    /// `PoolError::Exhausted` — it never blocks.
    pub fn acquire(&self, timeout: Duration) -> Result<PooledConnection<'_>, PoolError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();

        loop {
            if state.shut_down {
                return Err(PoolError::Closed);
            }

            if let Some(conn) = state.idle.pop_front() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }

            if state.created < state.limit {
                // Reserve the slot before connecting so concurrent callers
                // cannot overshoot the bound; connect without the lock held.
                state.created += 1;
                drop(state);

                match self.factory.connect() {
                    Ok(conn) => {
                        return Ok(PooledConnection {
                            pool: self,
                            conn: Some(conn),
                        })
                    }
                    Err(e) => {
                        self.state.lock().unwrap().created -= 1;
                        // The freed slot may unblock a waiter
                        self.available.notify_one();
                        return Err(PoolError::Backend(e));
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PoolError::Exhausted {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }

            let (guard, _) = self.available.wait_timeout(state, deadline - now).unwrap();
            state = guard;
        }
    }

    /// Return a connection to the idle queue, or close it when the queue has
    /// no spare capacity (the limit was lowered) or the pool has shut down.
    fn release(&self, mut conn: Box<dyn EngineConnection>) {
        let mut state = self.state.lock().unwrap();

        if state.shut_down {
            // created was reset by shutdown(); this lease is no longer counted
            drop(state);
            conn.close();
            return;
        }

        if state.created <= state.limit && state.idle.len() < state.limit {
            state.idle.push_back(conn);
            drop(state);
        } else {
            state.created = state.created.saturating_sub(1);
            drop(state);
            conn.close();
        }

        self.available.notify_one();
    }

    /// Drain and close every idle connection, reset the created count, and
    /// mark the pool closed. Waiters fail with `PoolError::Closed`.
    ///
    /// Connections currently leased are not forcibly closed; they are closed
    /// when their guards drop.
    pub fn shutdown(&self) {
        let drained: Vec<Box<dyn EngineConnection>> = {
            let mut state = self.state.lock().unwrap();
            state.shut_down = true;
            state.created = 0;
            state.idle.drain(..).collect()
        };

        for mut conn in drained {
            conn.close();
        }

        self.available.notify_all();
    }
}

/// RAII lease on a pooled connection.
///
/// Dereferences to the engine connection; dropping the guard returns the
/// connection to the pool.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Box<dyn EngineConnection>>,
}

impl std::fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("has_conn", &self.conn.is_some())
            .finish()
    }
}

impl Deref for PooledConnection<'_> {
    type Target = dyn EngineConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_deref().unwrap()
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_deref_mut().unwrap()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
