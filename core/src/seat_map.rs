//! Text rendering of a theatre's seats.

use crate::seat::Seat;
use std::fmt;

/// Grid view of a theatre, one line per row: `x` for a booked seat, `.` for a free one.
///
/// ```
/// use seatlock_core::{Seat, SeatId, SeatMap, TheatreId, UserId};
///
/// let theatre = TheatreId::new(1);
/// let seats = vec![
///     Seat::new(SeatId::new(1), "1-A", theatre).assigned_to(UserId::new(9)),
///     Seat::new(SeatId::new(2), "1-B", theatre),
///     Seat::new(SeatId::new(3), "2-A", theatre),
/// ];
///
/// let map = SeatMap::new(&seats, 2);
/// assert_eq!(map.to_string(), "x .\n.\n");
/// assert_eq!(map.booked(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SeatMap {
    rows: Vec<Vec<bool>>,
}

impl SeatMap {
    /// Build a map from seats in ID order, `seats_per_row` to a line.
    #[must_use]
    pub fn new(seats: &[Seat], seats_per_row: usize) -> Self {
        let mut ordered: Vec<&Seat> = seats.iter().collect();
        ordered.sort_by_key(|seat| seat.id);

        let rows = ordered
            .chunks(seats_per_row.max(1))
            .map(|row| row.iter().map(|seat| !seat.is_available()).collect())
            .collect();

        Self { rows }
    }

    /// Number of booked seats.
    #[must_use]
    pub fn booked(&self) -> usize {
        self.rows.iter().flatten().filter(|booked| **booked).count()
    }

    /// Number of free seats.
    #[must_use]
    pub fn available(&self) -> usize {
        self.rows.iter().flatten().filter(|booked| !**booked).count()
    }
}

impl fmt::Display for SeatMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            let line: Vec<&str> = row
                .iter()
                .map(|booked| if *booked { "x" } else { "." })
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seat::{SeatId, TheatreId, UserId};

    #[test]
    fn renders_in_id_order_regardless_of_input_order() {
        let theatre = TheatreId::new(3);
        let seats = vec![
            Seat::new(SeatId::new(4), "2-B", theatre),
            Seat::new(SeatId::new(1), "1-A", theatre).assigned_to(UserId::new(1)),
            Seat::new(SeatId::new(3), "2-A", theatre).assigned_to(UserId::new(2)),
            Seat::new(SeatId::new(2), "1-B", theatre),
        ];

        let map = SeatMap::new(&seats, 2);
        assert_eq!(map.to_string(), "x .\nx .\n");
        assert_eq!(map.booked(), 2);
        assert_eq!(map.available(), 2);
    }

    #[test]
    fn empty_theatre_renders_nothing() {
        let map = SeatMap::new(&[], 10);
        assert_eq!(map.to_string(), "");
        assert_eq!(map.booked(), 0);
    }
}
