//! Store implementations
//!
//! Both stores implement [`LedgerStore`](crate::core::LedgerStore):
//! - `memory` - In-process store with per-row async locks (always available)
//! - `postgres` - PostgreSQL store using `SELECT ... FOR UPDATE` (feature `postgres`)

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{MemoryStore, MemoryUnitOfWork};
#[cfg(feature = "postgres")]
pub use postgres::{PgStore, PgUnitOfWork};

use std::time::Duration;

/// Configuration shared by the store implementations
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// How long a unit of work waits for a row lock before failing with `Unavailable`
    pub lock_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Create a new StoreConfig, falling back to the default for a zero timeout
    pub fn new(lock_timeout: Duration) -> Self {
        let default = Self::default();

        let lock_timeout = if lock_timeout.is_zero() {
            tracing::warn!(
                default_ms = default.lock_timeout.as_millis() as u64,
                "invalid lock timeout (0ms), using default"
            );
            default.lock_timeout
        } else {
            lock_timeout
        };

        Self { lock_timeout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::custom(Duration::from_millis(250), Duration::from_millis(250))]
    #[case::zero_falls_back(Duration::ZERO, Duration::from_secs(5))]
    fn test_store_config_new(#[case] requested: Duration, #[case] expected: Duration) {
        assert_eq!(StoreConfig::new(requested).lock_timeout, expected);
    }
}
