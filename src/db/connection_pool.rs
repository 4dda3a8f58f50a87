//! The database connection-pool specialization: wires [`DatabaseDriver`] up
//! to the generic [`Pool`] through a [`ResourceFactory`] implementation,
//! and narrows the cleaner's sweep interval.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FactoryError, Result};
use crate::pool::{Pool, PoolConfig};
use crate::resource::ResourceFactory;
use crate::statement_cache::RawStatement;
use crate::strategy::SelectionStrategy;

use super::driver::{DatabaseDriver, RawConnection};
use super::pooled_connection::PooledConnection;

struct ConnectionResourceFactory<C: RawConnection, S: RawStatement> {
    driver: Arc<dyn DatabaseDriver<C>>,
    cache_statements: bool,
    recycle_after_delegate_use: bool,
    validation_query: Option<String>,
    _statement: PhantomData<fn() -> S>,
}

#[async_trait]
impl<C, S> ResourceFactory<PooledConnection<C, S>> for ConnectionResourceFactory<C, S>
where
    C: RawConnection + 'static,
    S: RawStatement + Send + Sync + 'static,
{
    async fn create(&self) -> std::result::Result<PooledConnection<C, S>, FactoryError> {
        let raw = self.driver.connect().await?;
        Ok(PooledConnection::new(
            raw,
            self.cache_statements,
            self.recycle_after_delegate_use,
            self.validation_query.clone(),
        ))
    }

    async fn is_valid(&self, resource: &PooledConnection<C, S>) -> bool {
        resource.raw.is_valid(resource.validation_query()).await
    }

    async fn destroy(&self, mut resource: PooledConnection<C, S>) {
        for mut stmt in resource.caches.drain_all_free() {
            stmt.close_raw();
        }
        resource.raw.close().await;
    }
}

/// Configuration specific to a connection pool, layered over the generic
/// [`PoolConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionPoolConfig {
    pub name: String,
    pub min_pool: usize,
    pub max_pool: usize,
    pub max_size: usize,
    pub idle_timeout: Duration,
    pub strategy: SelectionStrategy,
    pub async_destroy: bool,
    pub cache_statements: bool,
    pub recycle_after_delegate_use: bool,
    pub validation_query: Option<String>,
}

/// A bounded pool of database connections: `Pool<PooledConnection<C, S>>`
/// wired to a [`DatabaseDriver`], with the cleaner's sweep interval raised
/// to `1s..=5s` since validating a connection is comparatively expensive
/// next to validating an arbitrary in-process resource.
pub struct ConnectionPool<C: RawConnection, S: RawStatement + Send + Sync> {
    pool: Pool<PooledConnection<C, S>>,
}

impl<C, S> ConnectionPool<C, S>
where
    C: RawConnection + 'static,
    S: RawStatement + Send + Sync + 'static,
{
    pub fn new(config: ConnectionPoolConfig, driver: Arc<dyn DatabaseDriver<C>>) -> Result<Self> {
        let factory = Arc::new(ConnectionResourceFactory {
            driver,
            cache_statements: config.cache_statements,
            recycle_after_delegate_use: config.recycle_after_delegate_use,
            validation_query: config.validation_query,
            _statement: PhantomData,
        });

        let pool_config = PoolConfig {
            name: config.name,
            min_pool: config.min_pool,
            max_pool: config.max_pool,
            max_size: config.max_size,
            idle_timeout: config.idle_timeout,
            strategy: config.strategy,
            async_destroy: config.async_destroy,
            cleaner_lo: Duration::from_secs(1),
            cleaner_hi: Duration::from_secs(5),
        };

        Ok(ConnectionPool {
            pool: Pool::new(pool_config, factory)?,
        })
    }

    pub fn inner(&self) -> &Pool<PooledConnection<C, S>> {
        &self.pool
    }
}

impl<C: RawConnection, S: RawStatement + Send + Sync> Clone for ConnectionPool<C, S> {
    fn clone(&self) -> Self {
        ConnectionPool {
            pool: self.pool.clone(),
        }
    }
}
