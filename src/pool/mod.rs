//! The generic pool: a bounded, concurrent collection of interchangeable
//! resources checked out and returned by callers, backed by a single
//! monitor lock and a pair of background workers (`cleaner`, `init`) that
//! keep the free list within its configured bounds.

mod cleaner;
mod init;
mod state;

mod core;

pub use self::core::{Lease, Pool, PoolConfig, PoolParameters, PoolStats};
