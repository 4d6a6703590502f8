//! # Seat Lock Core
//!
//! Domain types and store traits for reserving exactly one free seat per request
//! while many requests race for the same theatre.
//!
//! ## Core Concepts
//!
//! - **Seat**: one allocatable row, free while its owner is unset
//! - **Theatre**: the partition a reservation draws from
//! - **Attempt**: one acquire-lock-assign-commit cycle against the store
//! - **Store traits**: [`SeatPool`] → [`SeatConnection`] → [`SeatTransaction`]
//!
//! The store is the only arbiter of mutual exclusion. Nothing in this crate holds
//! shared mutable state; the coordinator in `seatlock-runtime` is generic over
//! [`SeatPool`] and relies on row-level locks taken by
//! [`SeatTransaction::lock_first_available`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod seat;
pub mod seat_map;
pub mod store;

pub use error::{AttemptError, FailureKind, ReservationError};
pub use seat::{ParseIdError, Seat, SeatId, Theatre, TheatreId, User, UserId, seat_label};
pub use seat_map::SeatMap;
pub use store::{SeatConnection, SeatPool, SeatTransaction};
