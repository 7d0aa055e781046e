//! Backend abstraction for the pool.
//!
//! The pool only needs three things from a backend: open a connection,
//! probe one for liveness, and decide whether an error means the session
//! was dropped. Keeping that behind a trait lets the pool logic run
//! against a scripted fake in tests.

use crate::error::PoolError;
use async_trait::async_trait;
use sqlgate_core::{DatabaseConfig, Dialect, ErrorClass};
use sqlx::AnyConnection;
use sqlx::Connection;
use std::sync::Once;

/// What the pool needs from a database backend.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// The connection handle type.
    type Conn: Send + 'static;

    /// Open a fresh connection.
    async fn connect(&self) -> Result<Self::Conn, PoolError>;

    /// Run a trivial round trip to check the session is alive.
    async fn probe(&self, conn: &mut Self::Conn) -> Result<(), PoolError>;

    /// Whether an error means the session was dropped server-side.
    /// Query-content errors (syntax, constraints) must return false.
    fn is_transient(&self, err: &PoolError) -> bool;
}

/// Production backend over sqlx's runtime-selected `Any` driver.
pub struct SqlBackend {
    dialect: Dialect,
    dsn: String,
    charset: String,
}

impl SqlBackend {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            dialect: config.backend,
            dsn: config.backend.build_dsn(config),
            charset: config.charset.clone(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

#[async_trait]
impl Backend for SqlBackend {
    type Conn = AnyConnection;

    async fn connect(&self) -> Result<AnyConnection, PoolError> {
        static DRIVERS: Once = Once::new();
        DRIVERS.call_once(sqlx::any::install_default_drivers);

        let mut conn = AnyConnection::connect(&self.dsn)
            .await
            .map_err(|source| PoolError::Connect { source })?;

        if let Some(setup) = self.dialect.session_setup(&self.charset) {
            sqlx::query(&setup).execute(&mut conn).await?;
        }
        Ok(conn)
    }

    async fn probe(&self, conn: &mut AnyConnection) -> Result<(), PoolError> {
        sqlx::query("SELECT 1").fetch_one(&mut *conn).await?;
        Ok(())
    }

    fn is_transient(&self, err: &PoolError) -> bool {
        match err {
            PoolError::Backend(source) | PoolError::Connect { source } => {
                self.dialect.classify_error(source) == ErrorClass::Transient
            }
            _ => false,
        }
    }
}
