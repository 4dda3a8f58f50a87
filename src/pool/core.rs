//! The generic pool core: capacity management, concurrent check-out/
//! check-in, validation, and the release protocol.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::timeout;

use crate::error::{PoolError, Result};
use crate::event::{EventDispatcher, EventKind, EventListener, PoolEvent, PoolSnapshot};
use crate::resource::{Resource, ResourceFactory};
use crate::strategy::SelectionStrategy;

use super::cleaner;
use super::init;
use super::state::PoolState;

/// Configuration accepted by [`Pool::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    pub min_pool: usize,
    pub max_pool: usize,
    pub max_size: usize,
    pub idle_timeout: Duration,
    pub strategy: SelectionStrategy,
    pub async_destroy: bool,
    /// Cleaner sweep interval bounds. The generic pool uses `200ms..=5s`;
    /// [`crate::db::ConnectionPool`] raises the floor to `1s` since
    /// connection validation is comparatively expensive.
    #[serde(default = "default_cleaner_lo")]
    pub cleaner_lo: Duration,
    #[serde(default = "default_cleaner_hi")]
    pub cleaner_hi: Duration,
}

fn default_cleaner_lo() -> Duration {
    Duration::from_millis(200)
}

fn default_cleaner_hi() -> Duration {
    Duration::from_secs(5)
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_pool > self.max_pool {
            return Err(PoolError::ConfigInvalid(format!(
                "min_pool ({}) > max_pool ({})",
                self.min_pool, self.max_pool
            )));
        }
        if self.max_size > 0 && self.max_pool > self.max_size {
            return Err(PoolError::ConfigInvalid(format!(
                "max_pool ({}) > max_size ({})",
                self.max_pool, self.max_size
            )));
        }
        Ok(())
    }

    /// The cleaner's sweep interval for a given idle timeout, clamped to
    /// `[lo, hi]`. The generic pool uses `200ms..=5s`;
    /// [`crate::db::ConnectionPool`] overrides with a coarser `1s..=5s`
    /// window since connection validation is comparatively expensive.
    pub fn cleaner_interval(idle_timeout: Duration, lo: Duration, hi: Duration) -> Duration {
        (idle_timeout / 5).clamp(lo, hi)
    }
}

/// Parameters accepted by [`Pool::set_parameters`].
#[derive(Debug, Clone, Copy)]
pub struct PoolParameters {
    pub min_pool: usize,
    pub max_pool: usize,
    pub max_size: usize,
    pub idle_timeout: Duration,
}

/// Point-in-time counters, returned by [`Pool::stats`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolStats {
    pub requests: u64,
    pub hits: u64,
    pub free_count: usize,
    pub used_count: usize,
    pub size: usize,
}

pub(crate) struct PoolInner<R> {
    pub(crate) state: Mutex<PoolState<R>>,
    pub(crate) notify: Notify,
    pub(crate) factory: Arc<dyn ResourceFactory<R>>,
    pub(crate) dispatcher: EventDispatcher,
    pub(crate) cleaner_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    pub(crate) init_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    pub(crate) cleaner_lo: Duration,
    pub(crate) cleaner_hi: Duration,
}

pub(super) fn snapshot_locked<R>(state: &PoolState<R>) -> PoolSnapshot {
    PoolSnapshot {
        min_pool: state.min_pool,
        max_pool: state.max_pool,
        max_size: state.max_size,
        idle_timeout_secs: state.idle_timeout.as_secs(),
        checked_out: state.used_ids.len(),
        free_count: state.free.len(),
        size: state.total(),
        hit_rate: state.hit_rate(),
        strategy: state.strategy,
    }
}

fn emit<R>(dispatcher: &EventDispatcher, kind: EventKind, state: &PoolState<R>) {
    dispatcher.emit(PoolEvent {
        kind,
        pool_name: state.name.clone(),
        snapshot: snapshot_locked(state),
    });
}

/// `Pool<R>` is a cheap-to-clone handle (an `Arc` under the hood) over the
/// shared pool state. Clone it freely to share across tasks.
pub struct Pool<R: Resource> {
    pub(crate) inner: Arc<PoolInner<R>>,
}

impl<R: Resource> Clone for Pool<R> {
    fn clone(&self) -> Self {
        Pool {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A checked-out resource. Returned by [`Pool::check_out`] /
/// [`Pool::check_out_timeout`]. Dropping a `Lease` without calling
/// [`Pool::check_in`] returns the resource to the pool automatically from a
/// spawned task.
#[derive(Debug)]
pub struct Lease<R: Resource + Send + Sync + 'static> {
    id: u64,
    resource: Option<R>,
    pool: Weak<PoolInner<R>>,
}

impl<R: Resource + Send + Sync + 'static> Lease<R> {
    pub fn get(&self) -> &R {
        self.resource
            .as_ref()
            .expect("Lease resource missing: this is a pool bug, not caller error")
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.resource
            .as_mut()
            .expect("Lease resource missing: this is a pool bug, not caller error")
    }
}

impl<R: Resource + Send + Sync + 'static> Drop for Lease<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            if let Some(inner) = self.pool.upgrade() {
                let id = self.id;
                tokio::spawn(async move {
                    check_in_by_id(inner, id, resource).await;
                });
            }
            // Every `Pool<R>` handle is already gone: nothing left to
            // return to, so the resource is simply dropped here.
        }
    }
}

impl<R: Resource + Send + Sync + 'static> Pool<R> {
    /// Construct a new pool. If `config.min_pool > 0`, a background worker
    /// is started to populate the free list up to `min_pool` off the
    /// constructor's critical path.
    pub fn new(config: PoolConfig, factory: Arc<dyn ResourceFactory<R>>) -> Result<Self> {
        config.validate()?;

        let state = PoolState::new(
            config.name.clone(),
            config.min_pool,
            config.max_pool,
            config.max_size,
            config.idle_timeout,
            config.strategy,
            config.async_destroy,
        );

        let inner = Arc::new(PoolInner {
            state: Mutex::new(state),
            notify: Notify::new(),
            factory,
            dispatcher: EventDispatcher::new(),
            cleaner_handle: Mutex::new(None),
            init_handle: Mutex::new(None),
            cleaner_lo: config.cleaner_lo,
            cleaner_hi: config.cleaner_hi,
        });

        let pool = Pool { inner };

        if config.idle_timeout > Duration::ZERO {
            cleaner::spawn(&pool.inner);
        }
        if config.min_pool > 0 {
            init::spawn(&pool.inner, config.min_pool);
        }

        Ok(pool)
    }

    /// Register an event listener. Listeners are invoked in registration
    /// order.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.inner.dispatcher.add_listener(listener);
    }

    /// Change the free-list draw order. Rejected once the pool already
    /// holds resources, since resources already on the free list were
    /// ordered under the previous strategy.
    pub fn set_strategy(&self, strategy: SelectionStrategy) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.strategy_locked {
            return Err(PoolError::StrategyLocked);
        }
        state.strategy = strategy;
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            requests: state.requests,
            hits: state.hits,
            free_count: state.free.len(),
            used_count: state.used_ids.len(),
            size: state.total(),
        }
    }

    /// Non-blocking check-out. Returns `Ok(None)` when the hard cap is
    /// reached and no free entry is available — never an error.
    pub async fn check_out(&self) -> Result<Option<Lease<R>>> {
        self.check_out_timeout(Duration::ZERO).await
    }

    /// Check out with a deadline. `Duration::ZERO` is exactly the
    /// non-blocking form. Suspends until a resource becomes available or
    /// `deadline` elapses, whichever comes first.
    pub async fn check_out_timeout(&self, deadline: Duration) -> Result<Option<Lease<R>>> {
        if let Some(lease) = self.try_check_out_once().await? {
            return Ok(Some(lease));
        }
        if deadline == Duration::ZERO {
            return Ok(None);
        }

        let deadline_at = tokio::time::Instant::now() + deadline;
        loop {
            let remaining = deadline_at.saturating_duration_since(tokio::time::Instant::now());
            if remaining == Duration::ZERO {
                return Ok(None);
            }
            let notified = self.inner.notify.notified();
            if timeout(remaining, notified).await.is_err() {
                return Ok(None);
            }
            if self.inner.state.lock().released {
                return Err(PoolError::PoolReleased(self.inner.state.lock().name.clone()));
            }
            if let Some(lease) = self.try_check_out_once().await? {
                return Ok(Some(lease));
            }
        }
    }

    /// One non-blocking attempt: drain invalid free entries, try to create
    /// a fresh resource if none are free and capacity allows, or report
    /// exhaustion. Resource creation happens outside the lock — only a
    /// `pending_creates` reservation is taken and released under it — so a
    /// slow `factory.create()` call never blocks other checkouts or
    /// check-ins.
    async fn try_check_out_once(&self) -> Result<Option<Lease<R>>> {
        loop {
            let candidate = {
                let mut state = self.inner.state.lock();
                if state.released {
                    return Err(PoolError::PoolReleased(state.name.clone()));
                }
                state.requests += 1;
                state.take_free_entry()
            };

            let Some((id, entry)) = candidate else {
                break;
            };

            let resource = entry.into_resource();
            if self.inner.factory.is_valid(&resource).await {
                let mut state = self.inner.state.lock();
                state.hits += 1;
                return Ok(Some(self.commit_checkout(&mut state, id, resource)));
            }

            let state = self.inner.state.lock();
            emit(&self.inner.dispatcher, EventKind::ValidationError, &state);
            drop(state);
            self.destroy(resource).await;
        }

        let reserved = {
            let mut state = self.inner.state.lock();
            if state.max_size > 0 && state.total() >= state.max_size {
                emit(&self.inner.dispatcher, EventKind::MaxSizeLimitError, &state);
                false
            } else {
                state.pending_creates += 1;
                true
            }
        };

        if !reserved {
            return Ok(None);
        }

        let created = self.inner.factory.create().await;
        let resource = match created {
            Ok(r) => r,
            Err(e) => {
                self.inner.state.lock().pending_creates -= 1;
                return Err(PoolError::FactoryFailure(e));
            }
        };

        if !self.inner.factory.is_valid(&resource).await {
            let state = self.inner.state.lock();
            emit(&self.inner.dispatcher, EventKind::ValidationError, &state);
            drop(state);
            self.inner.state.lock().pending_creates -= 1;
            self.destroy(resource).await;
            return Err(PoolError::InvalidNewResource(
                "factory produced a resource that failed validation".to_string(),
            ));
        }

        let mut state = self.inner.state.lock();
        state.pending_creates -= 1;
        let id = state.alloc_id();
        Ok(Some(self.commit_checkout(&mut state, id, resource)))
    }

    /// Insert `resource` into `used`, emit `Checkout` plus any capacity
    /// boundary-crossing events, and hand back a `Lease`. Caller holds the
    /// lock.
    fn commit_checkout(&self, state: &mut PoolState<R>, id: u64, resource: R) -> Lease<R> {
        let before = state.total();
        state.used_ids.insert(id);
        state.strategy_locked = true;
        let after = state.total();

        emit(&self.inner.dispatcher, EventKind::Checkout, state);
        if before < state.max_pool && after >= state.max_pool {
            emit(&self.inner.dispatcher, EventKind::MaxPoolLimitReached, state);
        }
        if before < state.max_pool + 1 && after >= state.max_pool + 1 {
            emit(&self.inner.dispatcher, EventKind::MaxPoolLimitExceeded, state);
        }
        if state.max_size > 0 && before < state.max_size && after >= state.max_size {
            emit(&self.inner.dispatcher, EventKind::MaxSizeLimitReached, state);
        }

        Lease {
            id,
            resource: Some(resource),
            pool: Arc::downgrade(&self.inner),
        }
    }

    /// Explicit check-in. Fails with [`PoolError::ForeignCheckIn`] if
    /// `lease` does not belong to this pool or was already checked in.
    pub async fn check_in(&self, mut lease: Lease<R>) -> Result<()> {
        match lease.pool.upgrade() {
            Some(inner) if Arc::ptr_eq(&inner, &self.inner) => {}
            _ => return Err(PoolError::ForeignCheckIn),
        }
        let resource = lease.resource.take().ok_or(PoolError::ForeignCheckIn)?;
        let id = lease.id;
        if check_in_by_id(Arc::clone(&self.inner), id, resource).await {
            Ok(())
        } else {
            Err(PoolError::ForeignCheckIn)
        }
    }

    async fn destroy(&self, resource: R) {
        destroy_resource(&self.inner, resource).await;
    }

    /// Destroy every free entry and emit `PoolFlushed`. If the pool has no
    /// idle timeout and a nonzero `min_pool`, triggers a background refill
    /// immediately afterward.
    pub async fn flush(&self) -> Result<()> {
        let drained: Vec<R> = {
            let mut state = self.inner.state.lock();
            if state.released {
                return Err(PoolError::PoolReleased(state.name.clone()));
            }
            state.free.drain(..).map(|(_, e)| e.into_resource()).collect()
        };

        for resource in drained {
            self.destroy(resource).await;
        }

        let (idle_timeout_zero, min_pool) = {
            let state = self.inner.state.lock();
            emit(&self.inner.dispatcher, EventKind::PoolFlushed, &state);
            (state.idle_timeout == Duration::ZERO, state.min_pool)
        };

        if idle_timeout_zero && min_pool > 0 {
            init::spawn(&self.inner, min_pool);
        }

        Ok(())
    }

    /// Update sizing/timeout parameters. Restarts the cleaner with the
    /// newly clamped interval, refreshes every free entry's expiry, and
    /// resets the hit counters.
    pub async fn set_parameters(&self, params: PoolParameters) -> Result<()> {
        let candidate = PoolConfig {
            name: String::new(),
            min_pool: params.min_pool,
            max_pool: params.max_pool,
            max_size: params.max_size,
            idle_timeout: params.idle_timeout,
            strategy: SelectionStrategy::Lifo,
            async_destroy: false,
            cleaner_lo: self.inner.cleaner_lo,
            cleaner_hi: self.inner.cleaner_hi,
        };
        candidate.validate()?;

        if let Some(h) = self.inner.cleaner_handle.lock().take() {
            h.abort();
        }

        {
            let mut state = self.inner.state.lock();
            if state.released {
                return Err(PoolError::PoolReleased(state.name.clone()));
            }
            state.min_pool = params.min_pool;
            state.max_pool = params.max_pool;
            state.max_size = params.max_size;
            state.idle_timeout = params.idle_timeout;
            state.requests = 0;
            state.hits = 0;
            for (_, entry) in state.free.iter_mut() {
                entry.reset_expiry(params.idle_timeout);
            }
            state.cleaner_generation += 1;
            emit(&self.inner.dispatcher, EventKind::ParametersChanged, &state);
        }

        if params.idle_timeout > Duration::ZERO {
            cleaner::spawn(&self.inner);
        }

        Ok(())
    }

    /// One-way, irrevocable release. `forced = false` waits for every
    /// checked-out resource to be returned before finishing; `forced =
    /// true` proceeds immediately, leaving any still-outstanding leases to
    /// be dropped on their own.
    pub async fn release(&self, forced: bool) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.released {
                return Ok(());
            }
            state.released = true;
            state.cleaner_generation += 1;
            state.init_generation += 1;
        }

        if let Some(h) = self.inner.cleaner_handle.lock().take() {
            h.abort();
        }
        if let Some(h) = self.inner.init_handle.lock().take() {
            h.abort();
        }

        let drained: Vec<R> = {
            let mut state = self.inner.state.lock();
            state.free.drain(..).map(|(_, e)| e.into_resource()).collect()
        };
        for resource in drained {
            self.destroy(resource).await;
        }

        if !forced {
            loop {
                if self.inner.state.lock().used_ids.is_empty() {
                    break;
                }
                self.inner.notify.notified().await;
            }
        }
        // A `forced` release does not reach into outstanding `Lease`s —
        // Rust's ownership model gives the pool no path to a resource a
        // caller still holds. Each such lease's own `Drop` still runs it
        // through `check_in_by_id`, which discovers the pool already
        // released and destroys the resource instead of freeing it.

        // Drain every event enqueued before this point (e.g. the `Checkin`
        // from the very check-in that just emptied `used_ids` above) by
        // shutting the worker down first. `emit_sync` below then runs only
        // after that backlog has actually been delivered, so `PoolReleased`
        // is provably the last event any listener observes rather than
        // merely usually-last by scheduling luck.
        self.inner.dispatcher.shutdown().await;

        {
            let state = self.inner.state.lock();
            let event = PoolEvent {
                kind: EventKind::PoolReleased,
                pool_name: state.name.clone(),
                snapshot: snapshot_locked(&state),
            };
            self.inner.dispatcher.emit_sync(event);
        }

        Ok(())
    }

    /// Spawn a background task performing a non-forced `release`.
    pub fn release_async(&self) {
        let pool = self.clone();
        tokio::spawn(async move {
            let _ = pool.release(false).await;
        });
    }
}

/// Check a resource back in by id: non-recyclable/dirty resources are
/// destroyed; otherwise `recycle()` runs outside the lock and, on success,
/// the resource rejoins `free`. Returns `false` if `id` was not actually
/// outstanding (double check-in, or a resource whose pool already released
/// and cleared `used_ids`).
async fn check_in_by_id<R: Resource + Send + Sync + 'static>(
    inner: Arc<PoolInner<R>>,
    id: u64,
    mut resource: R,
) -> bool {
    let was_used = {
        let mut state = inner.state.lock();
        let present = state.used_ids.remove(&id);
        emit(&inner.dispatcher, EventKind::Checkin, &state);
        present
    };

    if !was_used {
        return false;
    }

    let (released, non_recyclable) = {
        let state = inner.state.lock();
        (state.released, state.is_non_recyclable())
    };

    if released || resource.is_dirty() || non_recyclable {
        destroy_resource(&inner, resource).await;
    } else {
        match resource.recycle().await {
            Ok(()) => {
                let mut state = inner.state.lock();
                let idle_timeout = state.idle_timeout;
                state
                    .free
                    .push_back((id, crate::entry::TimedEntry::new(resource, idle_timeout)));
                state.strategy_locked = true;
            }
            Err(_) => {
                destroy_resource(&inner, resource).await;
            }
        }
    }

    inner.notify.notify_one();
    true
}

pub(super) async fn destroy_resource<R: Resource + Send + Sync + 'static>(inner: &Arc<PoolInner<R>>, resource: R) {
    let async_destroy = inner.state.lock().async_destroy;
    if async_destroy {
        let factory = Arc::clone(&inner.factory);
        tokio::spawn(async move {
            factory.destroy(resource).await;
        });
    } else {
        inner.factory.destroy(resource).await;
    }
}
