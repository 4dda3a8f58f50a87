//! Process-wide registry of named pools, so a long-lived process can look
//! up a pool by name from code that did not construct it, and shut every
//! registered pool down on exit without relying on destructor ordering.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::pool::Pool;
use crate::resource::Resource;

struct Registry<R: Resource> {
    pools: Mutex<HashMap<String, Pool<R>>>,
}

impl<R: Resource> Registry<R> {
    fn new() -> Self {
        Registry {
            pools: Mutex::new(HashMap::new()),
        }
    }
}

/// A process-wide, name-keyed table of pools of one resource type.
///
/// There is intentionally no single global registry spanning every `R` at
/// once (Rust has no type-erased way to store `Pool<R>` for heterogeneous
/// `R` without `dyn Any` indirection); callers needing one per resource
/// type declare a `static` via [`PoolRegistry::new_static`] the way a
/// process typically has exactly one kind of database connection pool.
pub struct PoolRegistry<R: Resource> {
    inner: Lazy<Registry<R>>,
}

impl<R: Resource> PoolRegistry<R> {
    pub const fn new_static() -> Self {
        PoolRegistry {
            inner: Lazy::new(Registry::new),
        }
    }

    /// Register `pool` under `name`, replacing and returning any pool
    /// previously registered under that name.
    pub fn register(&self, name: impl Into<String>, pool: Pool<R>) -> Option<Pool<R>> {
        self.inner.pools.lock().insert(name.into(), pool)
    }

    pub fn get(&self, name: &str) -> Option<Pool<R>> {
        self.inner.pools.lock().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Pool<R>> {
        self.inner.pools.lock().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.pools.lock().keys().cloned().collect()
    }
}

impl<R: Resource + Send + Sync + 'static> PoolRegistry<R> {
    /// Release every registered pool and empty the table. Replaces
    /// reliance on process-exit hooks with an explicit call a caller makes
    /// from its own shutdown path.
    pub async fn shutdown_all(&self, forced: bool) {
        let pools: Vec<Pool<R>> = self.inner.pools.lock().drain().map(|(_, p)| p).collect();
        for pool in pools {
            let _ = pool.release(forced).await;
        }
    }
}
