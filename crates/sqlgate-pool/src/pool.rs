//! The connection pool.
//!
//! Entry bookkeeping lives in one map behind an async mutex; every state
//! mutation (acquire, release, cleanup, close) is serialized through it.
//! Liveness is checked lazily when an idle entry is about to be reused,
//! not by a background heartbeat. `acquire` never waits for a free slot:
//! at capacity it fails immediately so request latency stays predictable.

use crate::backend::Backend;
use crate::error::PoolError;
use sqlgate_core::PoolConfig;
use std::collections::HashMap;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// One managed backend connection plus its bookkeeping.
struct PoolEntry<C> {
    /// The handle; `None` while checked out by a caller.
    conn: Option<C>,
    in_use: bool,
    created_at: Instant,
    last_used: Instant,
}

/// A connection checked out of the pool.
///
/// Owned exclusively by the caller until handed back via
/// [`ConnectionPool::release`]. Dropping it without releasing closes the
/// handle and permanently occupies the entry's slot, so always release.
#[derive(Debug)]
pub struct PooledConnection<C> {
    id: Uuid,
    conn: C,
}

impl<C> PooledConnection<C> {
    /// Pool-local identity, meaningful only for logging.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}

/// Pool usage counters, exposed through the server status tool.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub total: usize,
    pub in_use: usize,
    pub max_size: usize,
}

struct PoolInner<B: Backend> {
    backend: B,
    max_size: usize,
    idle_timeout: Duration,
    state: Mutex<HashMap<Uuid, PoolEntry<B::Conn>>>,
}

/// Process-wide pool of live backend connections.
///
/// Cheap to clone; all clones share the same state.
pub struct ConnectionPool<B: Backend> {
    inner: Arc<PoolInner<B>>,
}

impl<B: Backend> Clone for ConnectionPool<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Backend> ConnectionPool<B> {
    pub fn new(backend: B, config: &PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                backend,
                max_size: config.max_size,
                idle_timeout: Duration::from_secs(config.idle_timeout_seconds),
                state: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The backend this pool opens connections through.
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Hand out a connection: reuse a liveness-checked idle entry, open a
    /// new one if there is spare capacity, or fail with
    /// [`PoolError::Saturated`].
    pub async fn acquire(&self) -> Result<PooledConnection<B::Conn>, PoolError> {
        let mut state = self.inner.state.lock().await;

        let idle_ids: Vec<Uuid> = state
            .iter()
            .filter(|(_, entry)| !entry.in_use)
            .map(|(id, _)| *id)
            .collect();

        for id in idle_ids {
            let mut conn = match state.get_mut(&id).and_then(|entry| entry.conn.take()) {
                Some(conn) => conn,
                None => continue,
            };

            match self.inner.backend.probe(&mut conn).await {
                Ok(()) => {
                    if let Some(entry) = state.get_mut(&id) {
                        entry.in_use = true;
                        entry.last_used = Instant::now();
                    }
                    tracing::debug!(connection_id = %id, "reusing pooled connection");
                    return Ok(PooledConnection { id, conn });
                }
                Err(err) if self.inner.backend.is_transient(&err) => {
                    state.remove(&id);
                    tracing::warn!(connection_id = %id, error = %err, "removed dead connection from pool");
                }
                Err(err) => {
                    // A probe failure that is not a disconnect (e.g. a
                    // permission quirk on SELECT 1) does not invalidate the
                    // session.
                    tracing::debug!(connection_id = %id, error = %err, "probe errored without disconnect");
                    if let Some(entry) = state.get_mut(&id) {
                        entry.in_use = true;
                        entry.last_used = Instant::now();
                    }
                    return Ok(PooledConnection { id, conn });
                }
            }
        }

        if state.len() < self.inner.max_size {
            let conn = self.inner.backend.connect().await?;
            let id = Uuid::new_v4();
            let now = Instant::now();
            state.insert(
                id,
                PoolEntry {
                    conn: None,
                    in_use: true,
                    created_at: now,
                    last_used: now,
                },
            );
            tracing::info!(connection_id = %id, total = state.len(), "opened new backend connection");
            return Ok(PooledConnection { id, conn });
        }

        Err(PoolError::Saturated {
            max: self.inner.max_size,
        })
    }

    /// Return a connection to the pool. Releasing a connection the pool
    /// does not know (entry evicted, pool reset) is a no-op, not an error.
    pub async fn release(&self, conn: PooledConnection<B::Conn>) {
        let PooledConnection { id, conn } = conn;
        let mut state = self.inner.state.lock().await;
        match state.get_mut(&id) {
            Some(entry) => {
                entry.conn = Some(conn);
                entry.in_use = false;
                tracing::debug!(connection_id = %id, "connection released");
            }
            None => {
                tracing::debug!(connection_id = %id, "released connection unknown to the pool");
            }
        }
    }

    /// Acquire, probe, release. All errors collapse into `false`.
    pub async fn test_connection(&self) -> bool {
        match self.acquire().await {
            Ok(mut conn) => {
                let alive = self.inner.backend.probe(&mut conn).await.is_ok();
                self.release(conn).await;
                alive
            }
            Err(err) => {
                tracing::error!(error = %err, "connection test failed");
                false
            }
        }
    }

    /// Run `op`, retrying on transient disconnects.
    ///
    /// Dead idle entries are evicted between attempts so the retry opens a
    /// fresh connection instead of picking up the same broken session.
    /// Non-transient errors propagate unchanged on first occurrence.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        mut op: F,
        max_retries: u32,
    ) -> Result<T, PoolError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PoolError>>,
    {
        for attempt in 1..=max_retries {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if self.inner.backend.is_transient(&err) => {
                    tracing::warn!(attempt, error = %err, "transient backend error, evicting dead connections");
                    self.evict_dead().await;
                }
                Err(err) => return Err(err),
            }
        }
        Err(PoolError::RetryExhausted {
            attempts: max_retries,
        })
    }

    /// Probe every idle entry and drop the ones whose session is gone.
    pub async fn evict_dead(&self) {
        let mut state = self.inner.state.lock().await;

        let idle_ids: Vec<Uuid> = state
            .iter()
            .filter(|(_, entry)| !entry.in_use)
            .map(|(id, _)| *id)
            .collect();

        for id in idle_ids {
            let mut conn = match state.get_mut(&id).and_then(|entry| entry.conn.take()) {
                Some(conn) => conn,
                None => continue,
            };
            match self.inner.backend.probe(&mut conn).await {
                Err(err) if self.inner.backend.is_transient(&err) => {
                    state.remove(&id);
                    tracing::warn!(connection_id = %id, "evicted dead idle connection");
                }
                _ => {
                    if let Some(entry) = state.get_mut(&id) {
                        entry.conn = Some(conn);
                    }
                }
            }
        }
    }

    /// Reap idle entries older than the idle timeout. In-use entries are
    /// never touched.
    pub async fn cleanup(&self) {
        let mut state = self.inner.state.lock().await;
        let idle_timeout = self.inner.idle_timeout;
        state.retain(|id, entry| {
            let keep = entry.in_use || entry.last_used.elapsed() <= idle_timeout;
            if !keep {
                tracing::info!(
                    connection_id = %id,
                    age_secs = entry.created_at.elapsed().as_secs(),
                    "reaped idle connection"
                );
            }
            keep
        });
    }

    /// Drop every entry unconditionally (shutdown / test teardown).
    pub async fn close_all(&self) {
        let mut state = self.inner.state.lock().await;
        let count = state.len();
        state.clear();
        tracing::info!(closed = count, "closed all pooled connections");
    }

    /// Current pool usage.
    pub async fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock().await;
        PoolStats {
            total: state.len(),
            in_use: state.values().filter(|entry| entry.in_use).count(),
            max_size: self.inner.max_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Debug)]
    struct FakeConn {
        serial: u64,
    }

    #[derive(Default)]
    struct FakeState {
        next_serial: AtomicU64,
        connects: AtomicU64,
        /// Serials whose session is "gone": probing them is a disconnect.
        dead: StdMutex<HashSet<u64>>,
        /// Serials whose probe fails with a non-disconnect error.
        flaky: StdMutex<HashSet<u64>>,
        fail_connect: AtomicU64,
    }

    #[derive(Clone, Default)]
    struct FakeBackend {
        state: Arc<FakeState>,
    }

    fn gone() -> PoolError {
        PoolError::Backend(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "server has gone away",
        )))
    }

    fn query_error() -> PoolError {
        PoolError::Backend(sqlx::Error::RowNotFound)
    }

    #[async_trait]
    impl Backend for FakeBackend {
        type Conn = FakeConn;

        async fn connect(&self) -> Result<FakeConn, PoolError> {
            if self.state.fail_connect.load(Ordering::SeqCst) != 0 {
                return Err(PoolError::Connect {
                    source: sqlx::Error::PoolClosed,
                });
            }
            self.state.connects.fetch_add(1, Ordering::SeqCst);
            let serial = self.state.next_serial.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConn { serial })
        }

        async fn probe(&self, conn: &mut FakeConn) -> Result<(), PoolError> {
            if self.state.dead.lock().unwrap().contains(&conn.serial) {
                return Err(gone());
            }
            if self.state.flaky.lock().unwrap().contains(&conn.serial) {
                return Err(query_error());
            }
            Ok(())
        }

        fn is_transient(&self, err: &PoolError) -> bool {
            matches!(
                err,
                PoolError::Backend(sqlx::Error::Io(_))
                    | PoolError::Connect {
                        source: sqlx::Error::Io(_)
                    }
            )
        }
    }

    fn pool_with(max_size: usize, idle_timeout_seconds: u64) -> (ConnectionPool<FakeBackend>, FakeBackend) {
        let backend = FakeBackend::default();
        let handle = backend.clone();
        let pool = ConnectionPool::new(
            backend,
            &PoolConfig {
                max_size,
                idle_timeout_seconds,
            },
        );
        (pool, handle)
    }

    #[tokio::test]
    async fn saturation_fails_immediately_with_the_maximum() {
        let (pool, _backend) = pool_with(2, 3600);

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert_ne!(first.serial, second.serial);

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, PoolError::Saturated { max: 2 }));
        assert!(err.to_string().contains("Maximum: 2"));
    }

    #[tokio::test]
    async fn released_connection_is_reused() {
        let (pool, backend) = pool_with(2, 3600);

        let first = pool.acquire().await.unwrap();
        let first_serial = first.serial;
        pool.release(first).await;

        let again = pool.acquire().await.unwrap();
        assert_eq!(again.serial, first_serial);
        assert_eq!(backend.state.connects.load(Ordering::SeqCst), 1);

        let stats = pool.stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.in_use, 1);
    }

    #[tokio::test]
    async fn acquire_after_release_never_exceeds_max() {
        let (pool, backend) = pool_with(2, 3600);

        let first = pool.acquire().await.unwrap();
        let _second = pool.acquire().await.unwrap();
        pool.release(first).await;

        let _third = pool.acquire().await.unwrap();
        let stats = pool.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(backend.state.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn releasing_a_foreign_connection_is_a_noop() {
        let (pool, _backend) = pool_with(2, 3600);

        let conn = pool.acquire().await.unwrap();
        pool.close_all().await;

        // The pool no longer knows this entry; releasing must not panic or
        // resurrect it.
        pool.release(conn).await;
        assert_eq!(pool.stats().await.total, 0);
    }

    #[tokio::test]
    async fn dead_idle_connection_is_evicted_on_reuse() {
        let (pool, backend) = pool_with(2, 3600);

        let conn = pool.acquire().await.unwrap();
        let serial = conn.serial;
        pool.release(conn).await;
        backend.state.dead.lock().unwrap().insert(serial);

        let fresh = pool.acquire().await.unwrap();
        assert_ne!(fresh.serial, serial);
        assert_eq!(backend.state.connects.load(Ordering::SeqCst), 2);
        assert_eq!(pool.stats().await.total, 1);
    }

    #[tokio::test]
    async fn non_disconnect_probe_error_keeps_the_connection() {
        let (pool, backend) = pool_with(2, 3600);

        let conn = pool.acquire().await.unwrap();
        let serial = conn.serial;
        pool.release(conn).await;
        backend.state.flaky.lock().unwrap().insert(serial);

        let again = pool.acquire().await.unwrap();
        assert_eq!(again.serial, serial);
        assert_eq!(backend.state.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_succeeds_after_a_transient_failure() {
        let (pool, _backend) = pool_with(2, 3600);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in_op = calls.clone();
        let result = pool
            .execute_with_retry(
                move || {
                    let calls = calls_in_op.clone();
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(gone())
                        } else {
                            Ok(42)
                        }
                    }
                },
                2,
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_evicts_dead_idle_entries_between_attempts() {
        let (pool, backend) = pool_with(2, 3600);

        let conn = pool.acquire().await.unwrap();
        let serial = conn.serial;
        pool.release(conn).await;
        backend.state.dead.lock().unwrap().insert(serial);
        assert_eq!(pool.stats().await.total, 1);

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        pool.execute_with_retry(
            move || {
                let calls = calls_in_op.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(gone())
                    } else {
                        Ok(())
                    }
                }
            },
            2,
        )
        .await
        .unwrap();

        // The dead entry was purged during the retry.
        assert_eq!(pool.stats().await.total, 0);
    }

    #[tokio::test]
    async fn non_transient_error_propagates_without_retry() {
        let (pool, _backend) = pool_with(2, 3600);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in_op = calls.clone();
        let result: Result<(), _> = pool
            .execute_with_retry(
                move || {
                    let calls = calls_in_op.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(query_error())
                    }
                },
                2,
            )
            .await;

        assert!(matches!(
            result.unwrap_err(),
            PoolError::Backend(sqlx::Error::RowNotFound)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn persistent_disconnects_exhaust_the_retry_budget() {
        let (pool, _backend) = pool_with(2, 3600);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in_op = calls.clone();
        let result: Result<(), _> = pool
            .execute_with_retry(
                move || {
                    let calls = calls_in_op.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(gone())
                    }
                },
                2,
            )
            .await;

        assert!(matches!(
            result.unwrap_err(),
            PoolError::RetryExhausted { attempts: 2 }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cleanup_reaps_idle_entries_but_spares_in_use() {
        let (pool, _backend) = pool_with(2, 0);

        let held = pool.acquire().await.unwrap();
        let idle = pool.acquire().await.unwrap();
        pool.release(idle).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        pool.cleanup().await;

        let stats = pool.stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.in_use, 1);
        pool.release(held).await;
    }

    #[tokio::test]
    async fn test_connection_reports_health() {
        let (pool, backend) = pool_with(2, 3600);
        assert!(pool.test_connection().await);

        backend.state.fail_connect.store(1, Ordering::SeqCst);
        pool.close_all().await;
        assert!(!pool.test_connection().await);
    }
}
