//! Per-connection statement caching: three independent sub-caches (simple,
//! parameterized, callable) sharing one implementation, keyed differently
//! per kind.

mod cache;
mod kind;

pub use cache::{RawStatement, StatementHandle, StatementSubCache};
pub use kind::{Concurrency, Holdability, ResultSetType, StatementKind, StatementTriple};

/// The three sub-caches a [`crate::db::PooledConnection`] owns, bundled
/// together since every operation on a connection's cache touches exactly
/// one of the three by its `StatementKind`.
pub struct StatementCaches<S> {
    pub simple: StatementSubCache<S>,
    pub parameterized: StatementSubCache<S>,
    pub callable: StatementSubCache<S>,
}

impl<S: RawStatement> StatementCaches<S> {
    pub fn new(enabled: bool) -> Self {
        StatementCaches {
            simple: StatementSubCache::new(StatementKind::Simple, enabled),
            parameterized: StatementSubCache::new(StatementKind::Parameterized, enabled),
            callable: StatementSubCache::new(StatementKind::Callable, enabled),
        }
    }

    pub fn sub_cache(&self, kind: StatementKind) -> &StatementSubCache<S> {
        match kind {
            StatementKind::Simple => &self.simple,
            StatementKind::Parameterized => &self.parameterized,
            StatementKind::Callable => &self.callable,
        }
    }

    /// Every statement currently checked out across all three sub-caches,
    /// tagged with the kind it belongs to.
    pub fn all_used(&self) -> Vec<(StatementKind, u64)> {
        let mut out = Vec::new();
        for (kind, sub) in [
            (StatementKind::Simple, &self.simple),
            (StatementKind::Parameterized, &self.parameterized),
            (StatementKind::Callable, &self.callable),
        ] {
            out.extend(sub.used_ids().into_iter().map(|id| (kind, id)));
        }
        out
    }

    /// Destroy every free statement across all three sub-caches.
    pub fn drain_all_free(&self) -> Vec<S> {
        let mut out = self.simple.drain_free();
        out.extend(self.parameterized.drain_free());
        out.extend(self.callable.drain_free());
        out
    }
}

