//! Connection pooling over a [`Driver`].

use loam_core::driver::{Connection, Dialect, Driver};
use loam_core::{Error, Result};

use std::ops::{Deref, DerefMut};
use std::time::Duration;

pub use deadpool::managed::Timeouts;

/// Configuration for connection pool behavior.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: usize,
    pub timeouts: Timeouts,
}

impl PoolConfig {
    pub fn new() -> Self {
        Self {
            max_size: deadpool::managed::PoolConfig::default().max_size,
            timeouts: Timeouts {
                // A saturated pool fails the waiter instead of blocking it
                // forever.
                wait: Some(Duration::from_secs(30)),
                ..Timeouts::default()
            },
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A bounded pool of backend connections.
#[derive(Debug)]
pub struct Pool {
    inner: deadpool::managed::Pool<PoolManager>,
    dialect: Dialect,
}

impl Pool {
    pub fn new(driver: impl Driver) -> Result<Self> {
        Self::with_config(driver, PoolConfig::default())
    }

    pub fn with_config(driver: impl Driver, config: PoolConfig) -> Result<Self> {
        let dialect = driver.dialect();
        let max_size = driver.max_connections().unwrap_or(config.max_size);
        let inner = deadpool::managed::Pool::builder(PoolManager {
            driver: Box::new(driver),
        })
        .runtime(deadpool::Runtime::Tokio1)
        .max_size(max_size)
        .timeouts(config.timeouts)
        .build()
        .map_err(Error::pool)?;

        Ok(Self { inner, dialect })
    }

    pub async fn get(&self) -> Result<PoolConnection> {
        let inner = self.inner.get().await.map_err(Error::pool)?;
        Ok(PoolConnection { inner })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

#[derive(Debug)]
struct PoolManager {
    driver: Box<dyn Driver>,
}

/// A pooled connection plus the bookkeeping the recycler needs: one that
/// comes back with a backend transaction still open must never be reused.
#[derive(Debug)]
pub(crate) struct PooledConn {
    conn: Box<dyn Connection>,
    tx_open: bool,
}

impl deadpool::managed::Manager for PoolManager {
    type Type = PooledConn;
    type Error = Error;

    async fn create(&self) -> Result<Self::Type> {
        Ok(PooledConn {
            conn: self.driver.connect().await?,
            tx_open: false,
        })
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _metrics: &deadpool::managed::Metrics,
    ) -> deadpool::managed::RecycleResult<Self::Error> {
        if conn.tx_open {
            return Err(deadpool::managed::RecycleError::Message(
                "connection returned with a transaction still open".into(),
            ));
        }
        Ok(())
    }
}

/// A connection checked out of a pool; returned on drop.
pub struct PoolConnection {
    inner: deadpool::managed::Object<PoolManager>,
}

impl PoolConnection {
    pub(crate) fn connection(&mut self) -> &mut dyn Connection {
        &mut *self.inner.conn
    }

    /// Flags the pinned connection as carrying an open backend
    /// transaction. Until cleared, the pool discards it instead of
    /// handing it out again.
    pub(crate) fn set_tx_open(&mut self, open: bool) {
        self.inner.tx_open = open;
    }
}

impl Deref for PoolConnection {
    type Target = Box<dyn Connection>;

    fn deref(&self) -> &Self::Target {
        &self.inner.conn
    }
}

impl DerefMut for PoolConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner.conn
    }
}
