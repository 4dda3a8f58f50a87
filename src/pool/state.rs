//! The pool's guarded mutable state: free list, in-use id set, counters,
//! and the generation counters used to retire superseded background
//! workers. Everything in here lives behind the single monitor lock in
//! [`super::core::Pool`].

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use rand::Rng;

use crate::entry::TimedEntry;
use crate::strategy::SelectionStrategy;

pub struct PoolState<R> {
    pub name: String,
    pub min_pool: usize,
    pub max_pool: usize,
    pub max_size: usize,
    pub idle_timeout: Duration,
    pub strategy: SelectionStrategy,
    /// Set once the pool has handed out (or holds) at least one resource;
    /// after that, [`super::core::Pool::set_strategy`] is rejected.
    pub strategy_locked: bool,

    /// Free entries tagged with the id they were checked out under, so a
    /// later `check_in` can be matched back to its originating slot.
    pub free: VecDeque<(u64, TimedEntry<R>)>,
    /// Identities of resources currently checked out. The resource value
    /// itself lives inside the caller's `Lease<R>`, not here — see
    /// `pool/core.rs` for why R need not be `Eq + Hash` to be pooled.
    pub used_ids: HashSet<u64>,
    /// Capacity reserved for an in-flight `factory.create()` call that has
    /// not yet committed a resource into `used_ids`. Counted against
    /// `max_size` exactly like a `used` entry, so concurrent creators can
    /// never collectively exceed the cap.
    pub pending_creates: usize,

    pub requests: u64,
    pub hits: u64,

    pub released: bool,
    pub async_destroy: bool,

    pub next_id: u64,
    /// Bumped every time a new cleaner/init worker is spawned; a running
    /// worker compares its captured generation against the current one to
    /// know it has been superseded and should exit.
    pub cleaner_generation: u64,
    pub init_generation: u64,
}

impl<R> PoolState<R> {
    pub fn new(
        name: String,
        min_pool: usize,
        max_pool: usize,
        max_size: usize,
        idle_timeout: Duration,
        strategy: SelectionStrategy,
        async_destroy: bool,
    ) -> Self {
        Self {
            name,
            min_pool,
            max_pool,
            max_size,
            idle_timeout,
            strategy,
            strategy_locked: false,
            free: VecDeque::new(),
            used_ids: HashSet::new(),
            pending_creates: 0,
            requests: 0,
            hits: 0,
            released: false,
            async_destroy,
            next_id: 1,
            cleaner_generation: 0,
            init_generation: 0,
        }
    }

    pub fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Resources that exist or are in the process of being created —
    /// counted against `max_size`.
    pub fn total(&self) -> usize {
        self.free.len() + self.used_ids.len() + self.pending_creates
    }

    pub fn hit_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.requests as f64
        }
    }

    /// Remove and return one entry from `free` per the pool's selection
    /// strategy: LIFO from the tail, FIFO from the head, RANDOM from a
    /// uniform index.
    pub fn take_free_entry(&mut self) -> Option<(u64, TimedEntry<R>)> {
        if self.free.is_empty() {
            return None;
        }
        match self.strategy {
            SelectionStrategy::Lifo => self.free.pop_back(),
            SelectionStrategy::Fifo => self.free.pop_front(),
            SelectionStrategy::Random => {
                let idx = rand::rng().random_range(0..self.free.len());
                self.free.remove(idx)
            }
        }
    }

    /// A checked-in resource is non-recyclable (destroyed instead of
    /// freed) once the pool is already at its steady-state target: with a
    /// hard cap configured, that means free+used has reached `max_pool`;
    /// without one, it means the free list alone has.
    pub fn is_non_recyclable(&self) -> bool {
        if self.max_size > 0 {
            (self.free.len() + self.used_ids.len()) >= self.max_pool
        } else {
            self.free.len() >= self.max_pool
        }
    }
}
