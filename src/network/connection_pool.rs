//! Bounded concurrency for proxied connections

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::MAX_CONNECTIONS;

/// Caps the number of connections served at once
#[derive(Clone)]
pub struct ConnectionPool {
    semaphore: Arc<Semaphore>,
    max_connections: usize,
}

impl ConnectionPool {
    /// Create a pool admitting at most `max_connections`
    ///
    /// # Panics
    ///
    /// Panics if `max_connections` is 0
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        assert!(max_connections > 0, "max_connections must be > 0");

        Self {
            semaphore: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Admit a connection if a slot is free
    pub fn try_acquire(&self) -> Option<ConnectionGuard> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| ConnectionGuard { _permit: permit })
    }

    /// Number of connections currently admitted
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.semaphore.available_permits()
    }

    /// Maximum number of connections
    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(MAX_CONNECTIONS)
    }
}

/// Holds a connection slot until dropped
pub struct ConnectionGuard {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_admits_up_to_limit() {
        let pool = ConnectionPool::new(2);
        assert_eq!(pool.max_connections(), 2);

        let first = pool.try_acquire();
        let second = pool.try_acquire();
        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(pool.active_connections(), 2);

        assert!(pool.try_acquire().is_none());
    }

    #[test]
    fn test_guard_releases_slot() {
        let pool = ConnectionPool::new(1);

        {
            let _guard = pool.try_acquire().unwrap();
            assert_eq!(pool.active_connections(), 1);
        }

        assert_eq!(pool.active_connections(), 0);
        assert!(pool.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_slots() {
        let pool = ConnectionPool::new(1);
        let clone = pool.clone();

        let _guard = pool.try_acquire().unwrap();
        assert!(clone.try_acquire().is_none());
    }

    #[test]
    #[should_panic(expected = "max_connections must be > 0")]
    fn test_zero_connections_panics() {
        let _ = ConnectionPool::new(0);
    }
}
