//! Single-worker guard backed by a Postgres session advisory lock.
//!
//! Startup orphan recovery requeues every running job. That is only correct
//! when no other worker is alive, so the worker takes this lock first and
//! refuses to start if someone else holds it. The lock lives on its own
//! connection, outside the pool, and Postgres releases it when that
//! connection closes, including on a crash.

use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};

/// Advisory lock key reserved for the bulk job worker.
pub const WORKER_LOCK_KEY: i64 = 0x6e69_6e6a_615f_776b;

/// Held advisory lock. Dropping it closes the session, which releases the lock.
pub struct WorkerLock {
    conn: PgConnection,
}

impl WorkerLock {
    /// Try to become the single active worker.
    ///
    /// Opens a dedicated connection to `database_url`. Returns `Ok(None)`
    /// when another session already holds the lock.
    pub async fn try_acquire(database_url: &str) -> Result<Option<Self>, sqlx::Error> {
        Self::try_acquire_with(&database_url.parse()?).await
    }

    pub async fn try_acquire_with(
        options: &PgConnectOptions,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut conn = PgConnection::connect_with(options).await?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(WORKER_LOCK_KEY)
            .fetch_one(&mut conn)
            .await?;

        if acquired {
            Ok(Some(Self { conn }))
        } else {
            conn.close().await?;
            Ok(None)
        }
    }

    /// Release the lock and close its connection.
    pub async fn release(mut self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(WORKER_LOCK_KEY)
            .execute(&mut self.conn)
            .await?;
        self.conn.close().await
    }
}
