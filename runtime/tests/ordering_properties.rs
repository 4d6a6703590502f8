//! Property tests for allocation order and depletion.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use proptest::prelude::*;
use seatlock_core::{SeatId, TheatreId};
use seatlock_runtime::{RetryPolicy, SeatReserver};
use seatlock_testing::{InMemorySeatPool, helpers};
use std::sync::Arc;
use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime should build")
}

proptest! {
    /// Sequential reservations take seats in ascending ID order and the free pool
    /// shrinks by exactly one per success.
    #[test]
    fn sequential_reservations_take_lowest_free_id(
        seats in 1usize..24,
        requests in 1usize..32,
        pre_booked in proptest::collection::vec(any::<bool>(), 24),
    ) {
        let theatre = TheatreId::new(1);
        let pool = Arc::new(InMemorySeatPool::new());
        let provisioned = pool.provision_theatre(theatre, seats, 6);

        // Mark some seats as already owned before the run.
        for (seat, booked) in provisioned.iter().zip(&pre_booked) {
            if *booked {
                pool.insert_seat(seat.clone().assigned_to(helpers::user(999).id));
            }
        }
        let mut expected: Vec<SeatId> = pool
            .seats(theatre)
            .into_iter()
            .filter(|seat| seat.is_available())
            .map(|seat| seat.id)
            .collect();
        expected.truncate(requests);

        let policy = RetryPolicy::builder()
            .max_attempts(2)
            .backoff_unit(Duration::from_millis(1))
            .build();
        let reserver = SeatReserver::new(Arc::clone(&pool), policy);

        let assigned: Vec<SeatId> = runtime().block_on(async {
            let mut assigned = Vec::new();
            for user in helpers::users(requests) {
                let before = pool.available_count(theatre);
                match reserver.reserve(&user, theatre).await {
                    Ok(seat) => {
                        assert_eq!(pool.available_count(theatre), before - 1);
                        assigned.push(seat.id);
                    }
                    Err(_) => assert_eq!(before, 0),
                }
            }
            assigned
        });

        prop_assert_eq!(assigned, expected);
    }
}
