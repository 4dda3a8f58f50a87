//! Background refill worker: creates fresh resources up to a target size
//! without blocking whoever triggered it (construction, a flush with no
//! idle timeout, or the cleaner finding the pool under `min_pool`).

use std::sync::Arc;

use crate::event::EventKind;
use crate::resource::Resource;

use super::core::PoolInner;

/// Spawn a worker that creates resources until the pool holds `target` or
/// `max_size` (if set) is reached, then emits `InitCompleted`. Supersedes
/// any previously running init worker for this pool: the old task is
/// aborted and its generation is bumped so it cannot race the new one's
/// writes to `free`.
pub(super) fn spawn<R: Resource + Send + Sync + 'static>(inner: &Arc<PoolInner<R>>, target: usize) {
    let generation = {
        let mut state = inner.state.lock();
        state.init_generation += 1;
        state.init_generation
    };

    let inner_task = Arc::clone(inner);
    let handle = tokio::spawn(async move {
        loop {
            let should_create = {
                let state = inner_task.state.lock();
                if state.released || state.init_generation != generation {
                    return;
                }
                let at_target = state.total() >= target;
                let at_cap = state.max_size > 0 && state.total() >= state.max_size;
                !at_target && !at_cap
            };

            if !should_create {
                break;
            }

            {
                let mut state = inner_task.state.lock();
                if state.released || state.init_generation != generation {
                    return;
                }
                state.pending_creates += 1;
            }

            let created = inner_task.factory.create().await;
            let resource = match created {
                Ok(r) => r,
                Err(e) => {
                    let mut state = inner_task.state.lock();
                    state.pending_creates -= 1;
                    tracing::warn!(pool = %state.name, error = %e, "background init failed to create a resource");
                    continue;
                }
            };

            if !inner_task.factory.is_valid(&resource).await {
                {
                    let mut state = inner_task.state.lock();
                    state.pending_creates -= 1;
                    tracing::warn!(pool = %state.name, "background init discarded a resource that failed validation");
                }
                super::core::destroy_resource(&inner_task, resource).await;
                continue;
            }

            let (stale, resource) = {
                let mut state = inner_task.state.lock();
                let stale = state.released || state.init_generation != generation;
                state.pending_creates -= 1;
                if !stale {
                    let id = state.alloc_id();
                    let idle_timeout = state.idle_timeout;
                    state
                        .free
                        .push_back((id, crate::entry::TimedEntry::new(resource, idle_timeout)));
                    state.strategy_locked = true;
                    (stale, None)
                } else {
                    (stale, Some(resource))
                }
            };
            if stale {
                super::core::destroy_resource(&inner_task, resource.expect("resource present when stale")).await;
                return;
            }
            inner_task.notify.notify_one();
        }

        let state = inner_task.state.lock();
        if state.init_generation == generation {
            inner_task.dispatcher.emit(crate::event::PoolEvent {
                kind: EventKind::InitCompleted,
                pool_name: state.name.clone(),
                snapshot: super::core::snapshot_locked(&state),
            });
        }
    });

    if let Some(old) = inner.init_handle.lock().replace(handle) {
        old.abort();
    }
}
