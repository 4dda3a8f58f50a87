//! Collaborator contracts: [`ResourceFactory`] creates/validates/destroys a
//! resource; [`Resource`] lets the resource itself reset between uses.

use async_trait::async_trait;

use crate::error::{FactoryError, Result};

/// Resets a pooled resource to a neutral, reusable state between check-outs
/// and reports whether it must be destroyed rather than recycled.
///
/// Implemented by the pooled resource type itself (e.g. `PooledConnection`),
/// not by the factory, so a resource can reset its own internal state
/// without the factory needing to know its concrete type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Reset to a neutral reusable state. An error here causes the pool to
    /// destroy the resource instead of returning it to the free list.
    async fn recycle(&mut self) -> Result<()>;

    /// `true` if the resource must be destroyed at check-in regardless of
    /// capacity headroom (e.g. its raw handle escaped to the caller).
    ///
    /// Default `false`: most resources are always recyclable.
    fn is_dirty(&self) -> bool {
        false
    }
}

/// Creates, validates, and destroys instances of `R` on behalf of a
/// [`crate::pool::Pool`]. Supplied once at pool construction; the pool core
/// never knows anything about what `R` actually is.
#[async_trait]
pub trait ResourceFactory<R>: Send + Sync {
    /// Produce a fully-initialized resource ready for hand-off. Returns the
    /// factory's own error type rather than [`crate::error::PoolError`] —
    /// the pool has no opinion on why a factory failed, only that it did;
    /// see [`FactoryError`] and [`crate::error::PoolError::FactoryFailure`].
    async fn create(&self) -> std::result::Result<R, FactoryError>;

    /// Side-effect-free liveness check. `false` triggers destroy-and-retry
    /// during check-out.
    async fn is_valid(&self, resource: &R) -> bool;

    /// Release all OS resources held by `resource`. Errors are logged by
    /// the caller, never propagated — a misbehaving destructor must not be
    /// able to wedge the pool.
    async fn destroy(&self, resource: R);
}
