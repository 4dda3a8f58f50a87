//! Background sweep that evicts expired free entries and tops the pool
//! back up to `min_pool` when the sweep leaves it short.

use std::sync::Arc;

use crate::resource::Resource;

use super::core::PoolInner;
use super::init;

/// Spawn (or respawn) the cleaner for `inner`, replacing any previously
/// stored handle. The new task captures the current `cleaner_generation`
/// and exits as soon as that generation is superseded — by a later
/// `set_parameters` call or by `release` — so an old sweep loop never runs
/// concurrently with a new one over the same pool.
pub(super) fn spawn<R: Resource + Send + Sync + 'static>(inner: &Arc<PoolInner<R>>) {
    let task_inner = Arc::clone(inner);
    let generation = inner.state.lock().cleaner_generation;

    let handle = tokio::spawn(async move {
        let inner = task_inner;
        loop {
            let (interval, idle_timeout) = {
                let state = inner.state.lock();
                if state.released || state.cleaner_generation != generation {
                    return;
                }
                (
                    super::core::PoolConfig::cleaner_interval(
                        state.idle_timeout,
                        inner.cleaner_lo,
                        inner.cleaner_hi,
                    ),
                    state.idle_timeout,
                )
            };
            if idle_timeout.is_zero() {
                return;
            }

            tokio::time::sleep(interval).await;

            let mut expired = Vec::new();
            let (min_pool, shortfall) = {
                let mut state = inner.state.lock();
                if state.released || state.cleaner_generation != generation {
                    return;
                }
                let before = state.free.len();
                let mut kept = std::collections::VecDeque::with_capacity(before);
                while let Some((id, entry)) = state.free.pop_front() {
                    if entry.is_expired() {
                        expired.push((id, entry.into_resource()));
                    } else {
                        kept.push_back((id, entry));
                    }
                }
                state.free = kept;
                let total = state.total();
                let shortfall = state.min_pool.saturating_sub(total);
                (state.min_pool, shortfall)
            };

            for (_, resource) in expired {
                super::core::destroy_resource(&inner, resource).await;
            }

            if min_pool > 0 && shortfall > 0 {
                init::spawn(&inner, min_pool);
            }
        }
    });

    if let Some(old) = inner.cleaner_handle.lock().replace(handle) {
        old.abort();
    }
}
