//! One sub-cache (simple, parameterized, or callable) of a connection's
//! statement cache. All three share this implementation; they differ only
//! in whether callers pass a SQL-text key or leave it absent.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use crate::error::Result;

use super::kind::{StatementKind, StatementTriple};

/// The raw, driver-owned statement handle a sub-cache wraps. Implemented by
/// the specialization that actually talks to a database; the cache itself
/// never inspects the statement's contents.
pub trait RawStatement: Send {
    /// Reset to a neutral reusable state: clear warnings, clear any
    /// accumulated batch, clear bound parameters, close a pending result
    /// set. Tolerates driver bugs raised here by returning an error rather
    /// than panicking.
    fn recycle(&mut self) -> Result<()>;

    /// Release the underlying driver handle. Called on destroy; never
    /// expected to fail in a way the cache needs to react to.
    fn close_raw(&mut self);
}

/// A cached statement as it sits on a sub-cache's free sequence.
struct CachedStmt<S> {
    raw: S,
    triple: StatementTriple,
}

struct UsedMeta {
    key: Option<String>,
    triple: StatementTriple,
    cacheable: bool,
}

struct SubCacheState<S> {
    free: HashMap<Option<String>, VecDeque<(u64, CachedStmt<S>)>>,
    used: HashMap<u64, UsedMeta>,
    requests: u64,
    hits: u64,
    next_id: u64,
    enabled: bool,
}

/// A checked-out statement: the raw handle plus the id needed to
/// [`StatementSubCache::release`] it later.
pub struct StatementHandle<S> {
    pub id: u64,
    pub raw: S,
}

/// One of a connection's three independent statement sub-caches.
pub struct StatementSubCache<S> {
    kind: StatementKind,
    state: Mutex<SubCacheState<S>>,
}

impl<S: RawStatement> StatementSubCache<S> {
    pub fn new(kind: StatementKind, enabled: bool) -> Self {
        StatementSubCache {
            kind,
            state: Mutex::new(SubCacheState {
                free: HashMap::new(),
                used: HashMap::new(),
                requests: 0,
                hits: 0,
                next_id: 1,
                enabled,
            }),
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn hit_rate(&self) -> f64 {
        let state = self.state.lock();
        if state.requests == 0 {
            0.0
        } else {
            state.hits as f64 / state.requests as f64
        }
    }

    /// Acquire a statement matching `key`/`triple`, reusing a free one with
    /// an equal triple (first-fit, in free-sequence order) if caching is
    /// enabled and one exists, otherwise calling `create`.
    ///
    /// `key` is `None` for [`StatementKind::Simple`] (the triple alone is
    /// the key) and `Some(sql)` for the other two kinds. `cacheable_request`
    /// is `false` for statement creations that are inherently non-cacheable
    /// (auto-generated keys, explicit return-column lists) — such
    /// statements are tracked but never enter a free sequence.
    pub fn acquire<F>(
        &self,
        key: Option<String>,
        triple: StatementTriple,
        cacheable_request: bool,
        create: F,
    ) -> Result<StatementHandle<S>>
    where
        F: FnOnce() -> Result<S>,
    {
        {
            let mut state = self.state.lock();
            state.requests += 1;
            if state.enabled {
                if let Some(seq) = state.free.get_mut(&key) {
                    if let Some(pos) = seq.iter().position(|(_, cs)| cs.triple == triple) {
                        let (id, cs) = seq.remove(pos).unwrap();
                        if seq.is_empty() {
                            state.free.remove(&key);
                        }
                        state.hits += 1;
                        state.used.insert(
                            id,
                            UsedMeta {
                                key,
                                triple,
                                cacheable: true,
                            },
                        );
                        return Ok(StatementHandle { id, raw: cs.raw });
                    }
                }
            }
        }

        let raw = create()?;
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let cacheable = state.enabled && cacheable_request;
        state.used.insert(
            id,
            UsedMeta {
                key,
                triple,
                cacheable,
            },
        );
        Ok(StatementHandle { id, raw })
    }

    /// Unwrapping a cached statement to the driver's native type
    /// permanently marks it non-cacheable, even if it is currently
    /// checked out.
    pub fn mark_non_cacheable(&self, id: u64) {
        if let Some(meta) = self.state.lock().used.get_mut(&id) {
            meta.cacheable = false;
        }
    }

    /// Release a statement back to the cache. Invoked from the listener
    /// callback fired when the client closes the statement. Destroys
    /// `raw` on any of: caching disabled for this sub-cache, the statement
    /// was marked non-cacheable, the id is unrecognized, or `recycle`
    /// fails.
    pub fn release(&self, id: u64, mut raw: S) {
        let meta = self.state.lock().used.remove(&id);
        let Some(meta) = meta else {
            raw.close_raw();
            return;
        };

        if !meta.cacheable {
            raw.close_raw();
            return;
        }

        match raw.recycle() {
            Ok(()) => {
                let mut state = self.state.lock();
                state.free.entry(meta.key).or_default().push_back((
                    id,
                    CachedStmt {
                        raw,
                        triple: meta.triple,
                    },
                ));
            }
            Err(_) => raw.close_raw(),
        }
    }

    /// Destroy every statement the sub-cache is holding free, and every
    /// id it still has recorded as used (caller supplies their raw
    /// handles since the cache itself never owns a `used` statement's raw
    /// value).
    pub fn drain_free(&self) -> Vec<S> {
        let mut state = self.state.lock();
        let mut drained = Vec::new();
        for (_, mut seq) in state.free.drain() {
            drained.extend(seq.drain(..).map(|(_, cs)| cs.raw));
        }
        drained
    }

    pub fn used_ids(&self) -> HashSet<u64> {
        self.state.lock().used.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeStmt {
        closed: bool,
        recycle_ok: bool,
    }

    impl RawStatement for FakeStmt {
        fn recycle(&mut self) -> Result<()> {
            if self.recycle_ok {
                Ok(())
            } else {
                Err(crate::error::PoolError::ConfigInvalid("recycle failed".into()))
            }
        }
        fn close_raw(&mut self) {
            self.closed = true;
        }
    }

    #[test]
    fn first_fit_reuses_matching_triple() {
        let cache = StatementSubCache::<FakeStmt>::new(StatementKind::Parameterized, true);
        let triple = StatementTriple::default();
        let handle = cache
            .acquire(Some("select 1".into()), triple, true, || {
                Ok(FakeStmt { closed: false, recycle_ok: true })
            })
            .unwrap();
        let id = handle.id;
        cache.release(id, handle.raw);

        let handle2 = cache
            .acquire(Some("select 1".into()), triple, true, || {
                panic!("should not create a new statement")
            })
            .unwrap();
        assert_eq!(handle2.id, id);
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn non_cacheable_never_enters_free() {
        let cache = StatementSubCache::<FakeStmt>::new(StatementKind::Parameterized, true);
        let triple = StatementTriple::default();
        let handle = cache
            .acquire(Some("insert ...".into()), triple, false, || {
                Ok(FakeStmt { closed: false, recycle_ok: true })
            })
            .unwrap();
        cache.release(handle.id, handle.raw);
        assert!(cache.drain_free().is_empty());
    }

    #[test]
    fn recycle_failure_destroys_instead_of_caching() {
        let cache = StatementSubCache::<FakeStmt>::new(StatementKind::Simple, true);
        let triple = StatementTriple::default();
        let handle = cache
            .acquire(None, triple, true, || {
                Ok(FakeStmt { closed: false, recycle_ok: false })
            })
            .unwrap();
        cache.release(handle.id, handle.raw);
        assert!(cache.drain_free().is_empty());
    }
}
