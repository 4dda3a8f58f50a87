//! End-to-end scenarios against the generic pool, exercising the literal
//! sequences a caller would actually run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use respool::event::{EventKind, EventListener, PoolEvent};
use respool::{Pool, PoolConfig, PoolError, PoolParameters, Resource, ResourceFactory, SelectionStrategy};

#[derive(Debug)]
struct NumberedResource {
    id: u64,
}

#[async_trait]
impl Resource for NumberedResource {
    async fn recycle(&mut self) -> respool::Result<()> {
        Ok(())
    }
}

struct NumberedFactory {
    next: AtomicU64,
    created: AtomicU64,
}

impl NumberedFactory {
    fn new() -> Arc<Self> {
        Arc::new(NumberedFactory {
            next: AtomicU64::new(1),
            created: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl ResourceFactory<NumberedResource> for NumberedFactory {
    async fn create(&self) -> Result<NumberedResource, respool::FactoryError> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(NumberedResource { id })
    }

    async fn is_valid(&self, _resource: &NumberedResource) -> bool {
        true
    }

    async fn destroy(&self, _resource: NumberedResource) {}
}

fn config(name: &str, min_pool: usize, max_pool: usize, max_size: usize, idle_timeout: Duration) -> PoolConfig {
    PoolConfig {
        name: name.to_string(),
        min_pool,
        max_pool,
        max_size,
        idle_timeout,
        strategy: SelectionStrategy::Lifo,
        async_destroy: false,
        cleaner_lo: Duration::from_millis(20),
        cleaner_hi: Duration::from_millis(200),
    }
}

struct RecordingListener {
    events: Arc<parking_lot::Mutex<Vec<EventKind>>>,
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &PoolEvent) {
        self.events.lock().push(event.kind);
    }
}

#[tokio::test]
async fn s1_third_checkout_is_exhausted_not_an_error() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("s1", 0, 2, 2, Duration::ZERO), factory).unwrap();

    let a = pool.check_out().await.unwrap();
    let b = pool.check_out().await.unwrap();
    assert!(a.is_some());
    assert!(b.is_some());

    let c = pool.check_out().await.unwrap();
    assert!(c.is_none());

    let stats = pool.stats();
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.used_count, 2);
}

#[tokio::test]
async fn s2_checked_in_resource_is_reused_lifo() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("s2", 0, 2, 2, Duration::ZERO), factory).unwrap();

    let a = pool.check_out().await.unwrap().unwrap();
    let _b = pool.check_out().await.unwrap().unwrap();
    let returned_id = a.get().id;
    pool.check_in(a).await.unwrap();

    let c = pool.check_out().await.unwrap().unwrap();
    assert_eq!(c.get().id, returned_id);

    let stats = pool.stats();
    assert_eq!(stats.requests, 4);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn s3_cleaner_destroys_expired_idle_entry() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("s3", 0, 1, 1, Duration::from_millis(100)), factory).unwrap();

    let a = pool.check_out().await.unwrap().unwrap();
    let first_id = a.get().id;
    pool.check_in(a).await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;

    let b = pool.check_out().await.unwrap().unwrap();
    assert_ne!(b.get().id, first_id);

    let stats = pool.stats();
    assert_eq!(stats.hits, 0);
}

#[tokio::test]
async fn s4_two_concurrent_checkouts_on_empty_pool_both_succeed() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("s4", 0, 2, 2, Duration::ZERO), factory).unwrap();

    let p1 = pool.clone();
    let p2 = pool.clone();
    let (r1, r2) = tokio::join!(
        p1.check_out_timeout(Duration::from_secs(1)),
        p2.check_out_timeout(Duration::from_secs(1)),
    );

    let a = r1.unwrap().expect("first checkout should not time out");
    let b = r2.unwrap().expect("second checkout should not time out");
    assert_ne!(a.get().id, b.get().id);
}

#[tokio::test]
async fn s5_flush_destroys_free_and_refills_to_min_pool() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("s5", 2, 2, 2, Duration::ZERO), factory).unwrap();

    // Let the background init populate the free list.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pool.stats().free_count, 2);

    let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
    pool.add_listener(Arc::new(RecordingListener {
        events: Arc::clone(&events),
    }));

    pool.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(pool.stats().free_count, 2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(events.lock().contains(&EventKind::PoolFlushed));
}

#[tokio::test]
async fn s6_release_waits_for_outstanding_checkin_then_emits_released_last() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("s6", 0, 1, 1, Duration::ZERO), factory).unwrap();

    let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
    pool.add_listener(Arc::new(RecordingListener {
        events: Arc::clone(&events),
    }));

    let lease = pool.check_out().await.unwrap().unwrap();

    let release_pool = pool.clone();
    let release_task = tokio::spawn(async move { release_pool.release(false).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!release_task.is_finished());

    pool.check_in(lease).await.unwrap();
    release_task.await.unwrap().unwrap();

    let seen = events.lock().clone();
    assert_eq!(seen.last(), Some(&EventKind::PoolReleased));

    let err = pool.check_out().await.unwrap_err();
    assert!(matches!(err, PoolError::PoolReleased(_)));
}

#[tokio::test]
async fn strategy_cannot_change_once_a_resource_has_been_held() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("strategy", 0, 1, 1, Duration::ZERO), factory).unwrap();

    let lease = pool.check_out().await.unwrap().unwrap();
    pool.check_in(lease).await.unwrap();

    assert!(matches!(
        pool.set_strategy(SelectionStrategy::Fifo),
        Err(PoolError::StrategyLocked)
    ));
}

#[tokio::test]
async fn strategy_locks_on_checkout_even_without_a_checkin() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("strategy-checkout", 0, 1, 1, Duration::ZERO), factory).unwrap();

    let _lease = pool.check_out().await.unwrap().unwrap();

    assert!(matches!(
        pool.set_strategy(SelectionStrategy::Fifo),
        Err(PoolError::StrategyLocked)
    ));
}

#[tokio::test]
async fn strategy_locks_once_background_init_populates_free() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("strategy-init", 2, 2, 2, Duration::ZERO), factory).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pool.stats().free_count, 2);

    assert!(matches!(
        pool.set_strategy(SelectionStrategy::Fifo),
        Err(PoolError::StrategyLocked)
    ));
}

#[tokio::test]
async fn b1_non_blocking_checkout_never_blocks_on_an_exhausted_pool() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("b1", 0, 1, 1, Duration::ZERO), factory).unwrap();

    let _lease = pool.check_out().await.unwrap().unwrap();

    let started = tokio::time::Instant::now();
    let second = pool.check_out().await.unwrap();
    assert!(second.is_none());
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[tokio::test]
async fn b2_timed_checkout_returns_near_the_deadline_on_an_exhausted_pool() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("b2", 0, 1, 1, Duration::ZERO), factory).unwrap();

    let _lease = pool.check_out().await.unwrap().unwrap();

    let deadline = Duration::from_millis(200);
    let started = tokio::time::Instant::now();
    let result = pool.check_out_timeout(deadline).await.unwrap();
    let elapsed = started.elapsed();

    assert!(result.is_none());
    assert!(elapsed >= deadline);
    assert!(elapsed < deadline + Duration::from_millis(150));
}

#[tokio::test]
async fn b3_shrinking_max_size_below_used_converges_by_destroying_at_checkin() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("b3", 0, 2, 2, Duration::ZERO), factory).unwrap();

    let a = pool.check_out().await.unwrap().unwrap();
    let b = pool.check_out().await.unwrap().unwrap();
    assert_eq!(pool.stats().used_count, 2);

    pool.set_parameters(PoolParameters {
        min_pool: 0,
        max_pool: 1,
        max_size: 1,
        idle_timeout: Duration::ZERO,
    })
    .await
    .unwrap();

    // Both check-ins happen against a pool that now only has room for one
    // resource: the first is destroyed (non-recyclable), the second is
    // recycled back into `free`, converging on I1 (`free + used <= maxSize`).
    pool.check_in(a).await.unwrap();
    pool.check_in(b).await.unwrap();

    let stats = pool.stats();
    assert_eq!(stats.used_count, 0);
    assert_eq!(stats.free_count, 1);
    assert_eq!(stats.size, 1);
}

#[tokio::test]
async fn r1_checkin_of_checkout_is_a_noop_over_pool_size() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("r1", 0, 2, 2, Duration::ZERO), factory.clone()).unwrap();

    let first = pool.check_out().await.unwrap().unwrap();
    pool.check_in(first).await.unwrap();
    let size_after_first_round_trip = pool.stats().size;
    assert_eq!(size_after_first_round_trip, 1);

    for _ in 0..3 {
        let lease = pool.check_out().await.unwrap().unwrap();
        pool.check_in(lease).await.unwrap();
        assert_eq!(pool.stats().size, size_after_first_round_trip);
    }

    // No new resource was ever created beyond the very first check-out.
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn r2_applying_set_parameters_twice_matches_applying_it_once() {
    let factory = NumberedFactory::new();
    let pool = Pool::new(config("r2", 0, 2, 2, Duration::ZERO), factory).unwrap();

    let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
    pool.add_listener(Arc::new(RecordingListener {
        events: Arc::clone(&events),
    }));

    let params = PoolParameters {
        min_pool: 0,
        max_pool: 3,
        max_size: 3,
        idle_timeout: Duration::from_millis(50),
    };

    pool.set_parameters(params).await.unwrap();
    let stats_after_one = pool.stats();

    pool.set_parameters(params).await.unwrap();
    let stats_after_two = pool.stats();

    assert_eq!(stats_after_one.free_count, stats_after_two.free_count);
    assert_eq!(stats_after_one.used_count, stats_after_two.used_count);
    assert_eq!(stats_after_two.requests, 0);
    assert_eq!(stats_after_two.hits, 0);

    let changed_count = events
        .lock()
        .iter()
        .filter(|k| **k == EventKind::ParametersChanged)
        .count();
    assert_eq!(changed_count, 2);
}
