//! Per-endpoint connection pool.
//!
//! Idle connections sit in a deque guarded by a mutex; a semaphore caps the
//! total number of sockets per endpoint. Checkout waits for a permit up to
//! the connection-request timeout, then either revives an idle connection
//! that is still within its TTL and keep-alive windows or dials a new one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::config::ConnectionReuseStrategy;
use crate::error::TransportError;

use super::wire::Connection;

/// Pool policy knobs, copied out of the client configuration.
#[derive(Debug, Clone)]
pub(crate) struct PoolOptions {
    pub max_connections: usize,
    pub connection_request_timeout: Duration,
    pub connect_timeout: Duration,
    pub connection_ttl: Option<Duration>,
    pub keep_alive: Option<Duration>,
    pub strategy: ConnectionReuseStrategy,
}

/// Counters exposed for observability and tests.
#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    pub opened: AtomicU64,
    pub closed: AtomicU64,
    pub reused: AtomicU64,
}

/// Connection pool for one endpoint.
#[derive(Debug)]
pub(crate) struct Pool {
    host: String,
    port: u16,
    options: PoolOptions,
    idle: Mutex<VecDeque<Connection>>,
    semaphore: Arc<Semaphore>,
    stats: PoolStats,
}

impl Pool {
    pub fn new(host: String, port: u16, options: PoolOptions) -> Arc<Pool> {
        let semaphore = Arc::new(Semaphore::new(options.max_connections));
        Arc::new(Pool {
            host,
            port,
            options,
            idle: Mutex::new(VecDeque::new()),
            semaphore,
            stats: PoolStats::default(),
        })
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Checks out a connection, waiting up to the connection-request
    /// timeout for a free slot.
    pub async fn acquire(self: &Arc<Pool>) -> Result<PooledConn, TransportError> {
        let wait = self.options.connection_request_timeout;
        let permit = tokio::time::timeout(wait, Arc::clone(&self.semaphore).acquire_owned())
            .await
            .map_err(|_| TransportError::ConnectionRequestTimeout(wait.as_millis() as u64))?
            .map_err(|_| TransportError::ConnectionRequestTimeout(wait.as_millis() as u64))?;

        if let Some(conn) = self.pop_reusable() {
            self.stats.reused.fetch_add(1, Ordering::Relaxed);
            return Ok(PooledConn {
                pool: Arc::clone(self),
                conn: Some(conn),
                reusable: false,
                _permit: permit,
            });
        }

        let conn = Connection::connect(&self.host, self.port, self.options.connect_timeout).await?;
        self.stats.opened.fetch_add(1, Ordering::Relaxed);
        debug!(host = %self.host, port = self.port, "opened connection");
        Ok(PooledConn {
            pool: Arc::clone(self),
            conn: Some(conn),
            reusable: false,
            _permit: permit,
        })
    }

    /// Pops idle connections per the reuse strategy, discarding any that
    /// aged past the TTL or sat idle past the keep-alive window.
    fn pop_reusable(&self) -> Option<Connection> {
        let mut idle = self.idle.lock();
        loop {
            let conn = match self.options.strategy {
                ConnectionReuseStrategy::Lifo => idle.pop_back(),
                ConnectionReuseStrategy::Fifo => idle.pop_front(),
            }?;
            if self.expired(&conn) || self.idled_out(&conn) {
                self.stats.closed.fetch_add(1, Ordering::Relaxed);
                debug!(host = %self.host, "discarded stale connection");
                continue;
            }
            return Some(conn);
        }
    }

    fn expired(&self, conn: &Connection) -> bool {
        self.options
            .connection_ttl
            .is_some_and(|ttl| conn.age() >= ttl)
    }

    fn idled_out(&self, conn: &Connection) -> bool {
        self.options
            .keep_alive
            .is_some_and(|keep_alive| conn.idle_for() >= keep_alive)
    }

    /// Returns a connection after a clean exchange; the TTL is enforced
    /// here as well so an aged-out socket is never parked.
    fn release(&self, mut conn: Connection) {
        conn.touch();
        if self.expired(&conn) {
            self.stats.closed.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.idle.lock().push_back(conn);
    }

    fn discard(&self) {
        self.stats.closed.fetch_add(1, Ordering::Relaxed);
    }
}

/// A checked-out connection; carries the semaphore permit for its slot.
///
/// Dropping it returns the connection to the pool when the exchange
/// finished cleanly, and closes the socket otherwise — a connection
/// abandoned mid-stream cannot be safely reused.
#[derive(Debug)]
pub(crate) struct PooledConn {
    pool: Arc<Pool>,
    conn: Option<Connection>,
    reusable: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConn {
    /// Marks the exchange as cleanly finished.
    pub fn mark_reusable(&mut self) {
        self.reusable = true;
    }

    /// Closes the socket regardless of state.
    pub fn close(mut self) {
        self.reusable = false;
        drop(self.conn.take());
        self.pool.discard();
    }
}

impl std::ops::Deref for PooledConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already closed")
    }
}

impl std::ops::DerefMut for PooledConn {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already closed")
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.reusable && !conn.has_residue() {
                self.pool.release(conn);
            } else {
                self.pool.discard();
            }
        }
    }
}
