//! A generic, bounded, concurrent object pool, with a database
//! connection-pool specialization that layers per-connection statement
//! caching on top.
//!
//! [`pool::Pool<R>`] is the core: parameterize it with anything that
//! implements [`resource::Resource`] and supply a
//! [`resource::ResourceFactory`] to create, validate, and destroy
//! instances. [`db::ConnectionPool`] builds on it for the common case of
//! pooling database connections behind a [`db::DatabaseDriver`].

pub mod config;
pub mod db;
pub mod entry;
pub mod error;
pub mod event;
pub mod pool;
pub mod registry;
pub mod resource;
pub mod statement_cache;
pub mod strategy;

pub use error::{FactoryError, PoolError, Result};
pub use pool::{Lease, Pool, PoolConfig, PoolParameters, PoolStats};
pub use resource::{Resource, ResourceFactory};
pub use strategy::SelectionStrategy;
