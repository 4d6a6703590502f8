//! Seat, theatre and user types.
//!
//! A [`Seat`] is one allocatable row of a [`Theatre`]. Its `owner` is `None` while the
//! seat is free and is set exactly once, by a committed reservation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for identifier parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {kind} ID: {input}")]
pub struct ParseIdError {
    kind: &'static str,
    input: String,
}

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw database identifier.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw database identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self).map_err(|_| ParseIdError {
                    kind: $kind,
                    input: s.to_string(),
                })
            }
        }
    };
}

row_id!(
    /// Identifier of a seat row.
    ///
    /// Seat IDs are totally ordered; reservation always takes the lowest free ID so
    /// that concurrent attempts contend for row locks in the same order.
    ///
    /// ```
    /// use seatlock_core::SeatId;
    ///
    /// let a = SeatId::new(1);
    /// let b: SeatId = "2".parse().unwrap();
    /// assert!(a < b);
    /// ```
    SeatId,
    "seat"
);

row_id!(
    /// Identifier of a theatre, the partition a seat belongs to.
    TheatreId,
    "theatre"
);

row_id!(
    /// Identifier of a user. Stored as the seat owner (a foreign key into `users`).
    UserId,
    "user"
);

/// A requester: the actor trying to claim a seat.
///
/// Read-only to the reservation protocol; only `id` is written, as the seat owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identity used as the owner reference
    pub id: UserId,
    /// Display name
    pub name: String,
}

impl User {
    /// Create a user.
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A theatre: a named pool of seats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theatre {
    /// Partition identifier
    pub id: TheatreId,
    /// Display name
    pub name: String,
}

/// One allocatable unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Unique, orderable identity
    pub id: SeatId,
    /// Display name, e.g. `"3-C"`
    pub name: String,
    /// Theatre this seat belongs to
    pub theatre_id: TheatreId,
    /// Owner, `None` while the seat is available
    pub owner: Option<UserId>,
}

impl Seat {
    /// Create an unowned seat.
    #[must_use]
    pub fn new(id: SeatId, name: impl Into<String>, theatre_id: TheatreId) -> Self {
        Self {
            id,
            name: name.into(),
            theatre_id,
            owner: None,
        }
    }

    /// Whether nobody owns this seat yet.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.owner.is_none()
    }

    /// The seat as read under lock, merged with its new owner.
    #[must_use]
    pub fn assigned_to(mut self, user: UserId) -> Self {
        self.owner = Some(user);
        self
    }
}

/// Display name for the seat at `index` (0-based) in a theatre with `seats_per_row`
/// seats per row: row number, then a column letter (`"1-A"`, `"1-B"`, ...).
#[must_use]
pub fn seat_label(index: usize, seats_per_row: usize) -> String {
    let per_row = seats_per_row.max(1);
    let row = index / per_row + 1;
    let column = index % per_row;
    let letter = u8::try_from(column % 26).map_or('?', |c| char::from(b'A' + c));
    if column < 26 {
        format!("{row}-{letter}")
    } else {
        format!("{row}-{letter}{}", column / 26)
    }
}
