//! Provisioning and inspection of theatres, users and seats.
//!
//! None of this is part of the reservation protocol. It sets up the tables the
//! protocol reads and reports on what it wrote.

use crate::error::PostgresError;
use crate::pool::{PostgresSeatPool, SeatRow};
use seatlock_core::{Seat, SeatId, SeatMap, Theatre, TheatreId, User, UserId, seat_label};

impl PostgresSeatPool {
    /// Insert a theatre and return it with its generated ID.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Database`] if the insert fails.
    pub async fn create_theatre(&self, name: &str) -> Result<Theatre, PostgresError> {
        let (id,): (i64,) = sqlx::query_as("INSERT INTO theatres (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(self.pool())
            .await?;

        Ok(Theatre {
            id: TheatreId::new(id),
            name: name.to_string(),
        })
    }

    /// Insert a theatre with `count` unowned seats labelled row by row.
    ///
    /// Seats are inserted in label order, so the lowest-ID seat is `"1-A"` and the
    /// reservation order walks the theatre front to back.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Database`] if either insert fails. The theatre and
    /// its seats are written in one transaction.
    pub async fn provision_theatre(
        &self,
        name: &str,
        count: usize,
        seats_per_row: usize,
    ) -> Result<(Theatre, Vec<Seat>), PostgresError> {
        let labels: Vec<String> = (0..count).map(|i| seat_label(i, seats_per_row)).collect();

        let mut tx = self.pool().begin().await?;

        let (id,): (i64,) = sqlx::query_as("INSERT INTO theatres (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

        let rows: Vec<SeatRow> = sqlx::query_as(
            r"
            INSERT INTO seats (name, theatre_id)
            SELECT label, $2
            FROM UNNEST($1::TEXT[]) WITH ORDINALITY AS t (label, position)
            ORDER BY position
            RETURNING id, name, theatre_id, user_id
            ",
        )
        .bind(&labels)
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut seats: Vec<Seat> = rows.into_iter().map(Seat::from).collect();
        seats.sort_by_key(|seat| seat.id);

        tracing::info!(theatre_id = id, seats = seats.len(), "Provisioned theatre");

        Ok((
            Theatre {
                id: TheatreId::new(id),
                name: name.to_string(),
            },
            seats,
        ))
    }

    /// Insert a user and return it with its generated ID.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Database`] if the insert fails.
    pub async fn create_user(&self, name: &str) -> Result<User, PostgresError> {
        let (id,): (i64,) = sqlx::query_as("INSERT INTO users (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(self.pool())
            .await?;

        Ok(User::new(UserId::new(id), name))
    }

    /// Insert `count` users named `"{prefix}-1"`, `"{prefix}-2"`, ...
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Database`] if the insert fails.
    pub async fn create_users(&self, prefix: &str, count: usize) -> Result<Vec<User>, PostgresError> {
        let names: Vec<String> = (1..=count).map(|i| format!("{prefix}-{i}")).collect();

        let rows: Vec<(i64, String)> = sqlx::query_as(
            r"
            INSERT INTO users (name)
            SELECT name
            FROM UNNEST($1::TEXT[]) WITH ORDINALITY AS t (name, position)
            ORDER BY position
            RETURNING id, name
            ",
        )
        .bind(&names)
        .fetch_all(self.pool())
        .await?;

        let mut users: Vec<User> = rows
            .into_iter()
            .map(|(id, name)| User::new(UserId::new(id), name))
            .collect();
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    /// Clear every owner in a theatre, returning how many seats were freed.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Database`] if the update fails.
    pub async fn reset_theatre(&self, theatre: TheatreId) -> Result<u64, PostgresError> {
        let result = sqlx::query(
            "UPDATE seats SET user_id = NULL WHERE theatre_id = $1 AND user_id IS NOT NULL",
        )
        .bind(theatre.get())
        .execute(self.pool())
        .await?;

        tracing::info!(
            theatre_id = %theatre,
            freed = result.rows_affected(),
            "Reset theatre"
        );

        Ok(result.rows_affected())
    }

    /// Committed seats of a theatre, in ID order.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Database`] if the query fails.
    pub async fn load_seats(&self, theatre: TheatreId) -> Result<Vec<Seat>, PostgresError> {
        let rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT id, name, theatre_id, user_id FROM seats WHERE theatre_id = $1 ORDER BY id",
        )
        .bind(theatre.get())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Seat::from).collect())
    }

    /// Committed state of one seat.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Database`] if the query fails.
    pub async fn find_seat(&self, id: SeatId) -> Result<Option<Seat>, PostgresError> {
        let row: Option<SeatRow> =
            sqlx::query_as("SELECT id, name, theatre_id, user_id FROM seats WHERE id = $1")
                .bind(id.get())
                .fetch_optional(self.pool())
                .await?;

        Ok(row.map(Seat::from))
    }

    /// Number of unowned seats in a theatre.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Database`] if the query fails.
    pub async fn available_count(&self, theatre: TheatreId) -> Result<u64, PostgresError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM seats WHERE theatre_id = $1 AND user_id IS NULL")
                .bind(theatre.get())
                .fetch_one(self.pool())
                .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Render a theatre's committed seats as a [`SeatMap`].
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Database`] if the query fails.
    pub async fn seat_map(
        &self,
        theatre: TheatreId,
        seats_per_row: usize,
    ) -> Result<SeatMap, PostgresError> {
        let seats = self.load_seats(theatre).await?;
        Ok(SeatMap::new(&seats, seats_per_row))
    }
}
