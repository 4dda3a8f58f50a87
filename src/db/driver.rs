//! The collaborator contracts a caller supplies to get a
//! [`crate::db::ConnectionPool`]: a way to open a raw connection, and the
//! operations the pool needs to perform on one it already has.

use async_trait::async_trait;

use crate::error::{FactoryError, Result};

/// A live database connection, as delivered by [`DatabaseDriver::connect`].
/// `PooledConnection` wraps one of these and gates every operation on
/// whether the wrapper is still open.
#[async_trait]
pub trait RawConnection: Send + Sync {
    /// Side-effect-free liveness check, e.g. `SELECT 1` or a protocol-level
    /// ping. `validation_query`, if given, overrides the driver's default.
    async fn is_valid(&self, validation_query: Option<&str>) -> bool;

    fn auto_commit(&self) -> bool;
    async fn set_auto_commit(&mut self, on: bool) -> Result<()>;
    async fn rollback(&mut self) -> Result<()>;
    fn clear_warnings(&mut self);
    async fn close(&mut self);
}

/// Opens new [`RawConnection`]s on behalf of a [`crate::db::ConnectionPool`].
#[async_trait]
pub trait DatabaseDriver<C: RawConnection>: Send + Sync {
    /// Returns the driver's own error type (a connect timeout, a DNS
    /// failure, a malformed URL) rather than [`crate::error::PoolError`] —
    /// see [`FactoryError`].
    async fn connect(&self) -> std::result::Result<C, FactoryError>;
}
