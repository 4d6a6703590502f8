//! `PostgreSQL` implementation of the seat store traits.
//!
//! A [`PgSeatConnection`] wraps a pooled sqlx connection and goes back to the pool on
//! drop. A [`PgSeatTransaction`] wraps a `sqlx::Transaction` borrowed from that
//! connection; dropping it without commit queues a `ROLLBACK` that runs before the
//! connection is handed out again, so the next borrower never inherits an open
//! transaction.

use crate::config::PostgresConfig;
use crate::error::{
    PostgresError, acquire_error, begin_error, commit_error, select_error, update_error,
};
use seatlock_core::{
    AttemptError, Seat, SeatConnection, SeatId, SeatPool, SeatTransaction, TheatreId, UserId,
};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;

/// Row shape of the `seats` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SeatRow {
    pub id: i64,
    pub name: String,
    pub theatre_id: i64,
    pub user_id: Option<i64>,
}

impl From<SeatRow> for Seat {
    fn from(row: SeatRow) -> Self {
        Self {
            id: SeatId::new(row.id),
            name: row.name,
            theatre_id: TheatreId::new(row.theatre_id),
            owner: row.user_id.map(UserId::new),
        }
    }
}

/// Seat store backed by a sqlx `PgPool`.
///
/// # Example
///
/// ```no_run
/// use seatlock_postgres::{PostgresConfig, PostgresSeatPool};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PostgresSeatPool::connect(&PostgresConfig::from_env()).await?;
/// pool.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PostgresSeatPool {
    pool: PgPool,
}

impl PostgresSeatPool {
    /// Wrap an existing pool.
    ///
    /// The store-side lock-wait bound is whatever the pool's sessions are configured
    /// with; use [`PostgresSeatPool::connect`] to set it from [`PostgresConfig`].
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    ///
    /// Every session gets `lock_timeout` set from the config, so a locking select
    /// stuck behind another transaction fails with `55P03` instead of waiting forever.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Config`] for an unparsable URL and
    /// [`PostgresError::Database`] if the pool cannot connect.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, PostgresError> {
        let mut options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| PostgresError::Config(format!("Invalid DATABASE_URL: {e}")))?;
        if config.lock_timeout_ms > 0 {
            options = options.options([("lock_timeout", format!("{}ms", config.lock_timeout_ms))]);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_with(options)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            lock_timeout_ms = config.lock_timeout_ms,
            "Connected seat store"
        );

        Ok(Self { pool })
    }

    /// Create the `theatres`, `users` and `seats` tables if missing.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Migration`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), PostgresError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SeatPool for PostgresSeatPool {
    type Connection = PgSeatConnection;

    async fn acquire(&self) -> Result<PgSeatConnection, AttemptError> {
        self.pool
            .acquire()
            .await
            .map(PgSeatConnection)
            .map_err(|e| acquire_error(&e))
    }
}

/// A pooled connection; returned to the pool on drop.
#[derive(Debug)]
pub struct PgSeatConnection(PoolConnection<Postgres>);

impl SeatConnection for PgSeatConnection {
    type Transaction<'c> = PgSeatTransaction<'c>;

    async fn begin(&mut self) -> Result<PgSeatTransaction<'_>, AttemptError> {
        let tx = sqlx::Connection::begin(&mut *self.0)
            .await
            .map_err(|e| begin_error(&e))?;
        Ok(PgSeatTransaction { tx })
    }
}

/// An open transaction; rolled back on drop unless committed.
#[derive(Debug)]
pub struct PgSeatTransaction<'c> {
    tx: Transaction<'c, Postgres>,
}

impl SeatTransaction for PgSeatTransaction<'_> {
    async fn lock_first_available(
        &mut self,
        theatre: TheatreId,
    ) -> Result<Option<Seat>, AttemptError> {
        let row: Option<SeatRow> = sqlx::query_as(
            r"
            SELECT id, name, theatre_id, user_id
            FROM seats
            WHERE theatre_id = $1 AND user_id IS NULL
            ORDER BY id
            LIMIT 1
            FOR UPDATE
            ",
        )
        .bind(theatre.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| select_error(&e))?;

        Ok(row.map(Seat::from))
    }

    async fn assign_owner(&mut self, seat: SeatId, owner: UserId) -> Result<u64, AttemptError> {
        // The row is locked by this transaction, so the NULL check cannot race; it
        // only guards against a caller assigning a seat it never locked.
        let result = sqlx::query(
            r"
            UPDATE seats
            SET user_id = $1
            WHERE id = $2 AND user_id IS NULL
            ",
        )
        .bind(owner.get())
        .bind(seat.get())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| update_error(seat, &e))?;

        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<(), AttemptError> {
        self.tx.commit().await.map_err(|e| commit_error(&e))
    }
}
