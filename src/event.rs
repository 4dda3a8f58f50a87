//! Pool lifecycle events and the single-consumer dispatcher that delivers
//! them to listeners without blocking the caller that emitted them.
//!
//! Listeners implement one method taking a tagged event rather than one
//! callback per event kind, so adding a new event never breaks existing
//! implementors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::strategy::SelectionStrategy;

/// Exhaustive set of notifications a [`crate::pool::Pool`] can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    InitCompleted,
    Checkout,
    Checkin,
    ValidationError,
    MaxPoolLimitReached,
    MaxPoolLimitExceeded,
    MaxSizeLimitReached,
    MaxSizeLimitError,
    ParametersChanged,
    PoolFlushed,
    PoolReleased,
}

/// A point-in-time view of pool state, taken under the pool lock at the
/// moment an event is emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub min_pool: usize,
    pub max_pool: usize,
    pub max_size: usize,
    pub idle_timeout_secs: u64,
    pub checked_out: usize,
    pub free_count: usize,
    pub size: usize,
    pub hit_rate: f64,
    pub strategy: SelectionStrategy,
}

/// A single pool notification, carrying its kind, the emitting pool's name,
/// and a snapshot of pool state at emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEvent {
    pub kind: EventKind,
    pub pool_name: String,
    pub snapshot: PoolSnapshot,
}

/// Receives tagged pool events. Implementors switch on `event.kind` rather
/// than implementing one method per event.
///
/// `on_event` is synchronous and must not block for long: it runs on the
/// dispatcher's single worker task (or, for `PoolReleased`, on the thread
/// that called `release`), and a slow listener delays every other listener
/// behind it.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &PoolEvent);
}

/// Single-consumer queue worker that fans pool events out to registered
/// listeners in registration order, without ever blocking the thread that
/// emitted the event.
///
/// All event kinds except [`EventKind::PoolReleased`] travel through the
/// unbounded channel and are delivered by the background worker task.
/// `PoolReleased` is delivered synchronously by [`EventDispatcher::emit_sync`]
/// so every listener observes it before the dispatcher's worker is told to
/// stop.
pub struct EventDispatcher {
    sender: parking_lot::Mutex<Option<mpsc::UnboundedSender<PoolEvent>>>,
    listeners: Arc<parking_lot::RwLock<Vec<Arc<dyn EventListener>>>>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<PoolEvent>();
        let listeners: Arc<parking_lot::RwLock<Vec<Arc<dyn EventListener>>>> =
            Arc::new(parking_lot::RwLock::new(Vec::new()));
        let worker_listeners = Arc::clone(&listeners);

        let worker = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                dispatch_one(&worker_listeners, &event);
            }
        });

        Self {
            sender: parking_lot::Mutex::new(Some(sender)),
            listeners,
            worker: parking_lot::Mutex::new(Some(worker)),
        }
    }

    /// Register a listener. Listeners are invoked in registration order.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().push(listener);
    }

    /// Enqueue an event for asynchronous delivery. Never blocks.
    pub fn emit(&self, event: PoolEvent) {
        // A missing sender means `shutdown` already ran; there is nobody
        // left to observe the event.
        if let Some(sender) = self.sender.lock().as_ref() {
            let _ = sender.send(event);
        }
    }

    /// Deliver an event synchronously, on the calling thread, bypassing the
    /// queue. Used exclusively for `PoolReleased` so listeners are
    /// guaranteed to see it before the dispatcher shuts down.
    pub fn emit_sync(&self, event: PoolEvent) {
        dispatch_one(&self.listeners, &event);
    }

    /// Stop the background worker, after every event enqueued before this
    /// call has been delivered. Dropping the sender closes the channel,
    /// which lets the worker's `recv` loop return `None` only once the
    /// backlog is drained, so we await the worker here instead of aborting
    /// it — aborting could discard events a listener never got to see.
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch_one(listeners: &parking_lot::RwLock<Vec<Arc<dyn EventListener>>>, event: &PoolEvent) {
    let snapshot = listeners.read().clone();
    for listener in snapshot.iter() {
        // A panicking listener must not take down the dispatcher or any
        // listener registered after it.
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            listener.on_event(event);
        }));
        if let Err(panic) = result {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(kind = ?event.kind, pool = %event.pool_name, %msg, "event listener panicked");
        }
    }
}
