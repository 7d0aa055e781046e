//! Connection pool and lifecycle manager.
//!
//! The pool hands out one backend connection per logical operation, probes
//! liveness lazily on reuse, fails fast when saturated, and offers a
//! bounded retry wrapper for operations interrupted by a dropped session.
//!
//! The pool is generic over a [`Backend`] so its behavior is testable
//! without a live database; [`SqlBackend`] is the production
//! implementation on top of sqlx's runtime-selected `Any` driver.

pub mod backend;
pub mod error;
pub mod pool;

pub use backend::{Backend, SqlBackend};
pub use error::PoolError;
pub use pool::{ConnectionPool, PoolStats, PooledConnection};

/// The production pool type used by the tool executor.
pub type SqlPool = ConnectionPool<SqlBackend>;
