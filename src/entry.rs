//! [`TimedEntry`] pairs a pooled resource with its absolute expiry deadline.

use std::time::{Duration, Instant};

/// A resource sitting in the free list, tagged with the instant it becomes
/// eligible for eviction by the cleaner.
///
/// `expiry` of `None` means "eternal", represented natively as
/// `Option<Instant>` instead of a magic zero deadline.
pub struct TimedEntry<R> {
    pub resource: R,
    expiry: Option<Instant>,
}

impl<R> TimedEntry<R> {
    /// Wrap `resource`, expiring `idle_timeout` from now. `idle_timeout` of
    /// zero duration means "never expire".
    pub fn new(resource: R, idle_timeout: Duration) -> Self {
        let expiry = if idle_timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + idle_timeout)
        };
        Self { resource, expiry }
    }

    /// `true` if this entry's deadline has passed.
    pub fn is_expired(&self) -> bool {
        matches!(self.expiry, Some(deadline) if Instant::now() > deadline)
    }

    /// Replace the expiry deadline, e.g. after `SetParameters` changes the
    /// pool's idle timeout.
    pub fn reset_expiry(&mut self, idle_timeout: Duration) {
        self.expiry = if idle_timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + idle_timeout)
        };
    }

    pub fn into_resource(self) -> R {
        self.resource
    }
}
