//! A pooled database connection: a raw driver handle plus the three
//! statement sub-caches that live alongside it for its whole lifetime in
//! the pool.

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::Resource;
use crate::statement_cache::{RawStatement, StatementCaches};

use super::driver::RawConnection;

/// Wraps a raw connection with statement caching and the open/dirty
/// bookkeeping the pool needs at check-in. `C` is the driver's raw
/// connection type; `S` is its raw statement type.
pub struct PooledConnection<C: RawConnection, S: RawStatement> {
    pub raw: C,
    pub caches: StatementCaches<S>,
    open: bool,
    used_raw: bool,
    recycle_after_delegate_use: bool,
    validation_query: Option<String>,
}

impl<C: RawConnection, S: RawStatement> PooledConnection<C, S> {
    pub fn new(
        raw: C,
        cache_statements: bool,
        recycle_after_delegate_use: bool,
        validation_query: Option<String>,
    ) -> Self {
        PooledConnection {
            raw,
            caches: StatementCaches::new(cache_statements),
            open: true,
            used_raw: false,
            recycle_after_delegate_use,
            validation_query,
        }
    }

    pub fn validation_query(&self) -> Option<&str> {
        self.validation_query.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Client-visible `Close`: does not touch the raw handle, just flips
    /// `open` so further operations on this wrapper are rejected. The
    /// caller is still responsible for calling `Pool::check_in`.
    pub fn mark_closed(&mut self) {
        self.open = false;
    }

    /// Gives the caller direct access to the raw handle. Marks the
    /// connection dirty unless the pool allows recycling after delegate
    /// use, per `is_dirty`.
    pub fn unwrap_raw(&mut self) -> &mut C {
        self.used_raw = true;
        &mut self.raw
    }
}

#[async_trait]
impl<C: RawConnection, S: RawStatement + Send + Sync> Resource for PooledConnection<C, S> {
    /// If auto-commit is off, rolls back and restores it; clears warnings;
    /// reopens the wrapper for its next checkout.
    ///
    /// Statements the caller still holds checked out at this point cannot
    /// be force-closed here — the statement's raw handle lives with the
    /// caller, not the connection, by construction. Any still outstanding
    /// are logged; they continue to report back to these sub-caches
    /// through `release` whenever the caller eventually drops or closes
    /// them, independent of this connection's recycle cycle.
    async fn recycle(&mut self) -> Result<()> {
        let outstanding = self.caches.all_used().len();
        if outstanding > 0 {
            tracing::warn!(outstanding, "connection recycled with statements still checked out");
        }

        if !self.raw.auto_commit() {
            self.raw.rollback().await?;
            self.raw.set_auto_commit(true).await?;
        }
        self.raw.clear_warnings();

        self.open = true;
        self.used_raw = false;
        Ok(())
    }

    /// Dirty once the raw handle has escaped to the caller, unless the
    /// pool is configured to recycle after delegate use anyway.
    fn is_dirty(&self) -> bool {
        self.used_raw && !self.recycle_after_delegate_use
    }
}
