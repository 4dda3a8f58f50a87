//! Database connection pooling: the specialization of the generic pool for
//! pooled database connections with per-connection statement caching.

mod connection_pool;
mod driver;
mod pooled_connection;

pub use connection_pool::{ConnectionPool, ConnectionPoolConfig};
pub use driver::{DatabaseDriver, RawConnection};
pub use pooled_connection::PooledConnection;
