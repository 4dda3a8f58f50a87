//! Unified error taxonomy for the pool core.
//!
//! Every failure the pool can surface to a caller funnels through a single
//! `thiserror`-derived enum rather than one error type per module.

use thiserror::Error;

/// The error type a [`crate::resource::ResourceFactory`] or
/// [`crate::db::DatabaseDriver`] returns for its own domain failures (a
/// connect timeout, a DNS failure, a malformed URL) — deliberately not
/// [`PoolError`] itself, since none of its variants fit an arbitrary
/// factory's own failure modes. [`PoolError::FactoryFailure`] wraps one of
/// these as its `#[source]` instead of flattening it to a string, so a
/// caller who downcasts (or who returns a `PoolError` from their own
/// factory) gets it back unchanged on the other side of `check_out`.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by [`crate::pool::Pool`] and its specializations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// Operation attempted on a pool whose `released` flag is already set.
    #[error("pool '{0}' has been released")]
    PoolReleased(String),

    /// Non-blocking check-out found the hard cap reached and no free entry.
    ///
    /// Not normally constructed as an `Err` — check-out returns `Ok(None)`
    /// for plain exhaustion instead. Kept for callers that want a typed way
    /// to describe a `None` result after the fact.
    #[error("pool '{pool}' exhausted: {used}/{max} in use")]
    PoolExhausted {
        pool: String,
        used: usize,
        max: usize,
    },

    /// A freshly created resource failed validation before it could be
    /// handed to the caller.
    #[error("newly created resource failed validation: {0}")]
    InvalidNewResource(String),

    /// The resource factory itself returned an error. Wraps the factory's
    /// own error unchanged rather than flattening it to a string, so a
    /// caller can match on or downcast the original failure.
    #[error("resource factory failed: {0}")]
    FactoryFailure(#[source] FactoryError),

    /// `check_in` was called with a resource the pool does not recognize as
    /// checked out (double check-in, or a resource from another pool).
    #[error("attempted to check in a resource this pool did not check out")]
    ForeignCheckIn,

    /// Pool size/timeout configuration violates a bound (e.g. `min_pool >
    /// max_pool`, or an unparseable numeric value).
    #[error("invalid pool configuration: {0}")]
    ConfigInvalid(String),

    /// Changing the selection strategy after resources already exist.
    #[error("cannot change selection strategy on a pool that already holds resources")]
    StrategyLocked,
}

pub type Result<T> = std::result::Result<T, PoolError>;
