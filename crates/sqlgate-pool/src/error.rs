//! Pool error types.

use thiserror::Error;

/// Errors surfaced by the connection pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every slot holds a live connection and none is idle. Surfaced
    /// immediately: the pool never queues callers waiting for a slot.
    #[error("connection pool saturated. Maximum: {max}")]
    Saturated { max: usize },

    /// Opening a new backend connection failed (unreachable host, bad
    /// credentials). Wraps the driver's native error.
    #[error("unable to open backend connection: {source}")]
    Connect {
        #[source]
        source: sqlx::Error,
    },

    /// A retried operation kept hitting disconnects until the retry budget
    /// ran out.
    #[error("operation failed after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// A backend round trip exceeded the configured query timeout. Not a
    /// disconnect: the statement may still be running server-side.
    #[error("query timed out after {seconds}s")]
    QueryTimeout { seconds: u64 },

    /// A backend query error, passed through verbatim. Never reclassified
    /// as a connection problem.
    #[error(transparent)]
    Backend(#[from] sqlx::Error),
}
