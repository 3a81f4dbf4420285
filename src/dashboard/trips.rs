//! Trip lists partitioned by status.

use crate::api::{Trip, TripStatus};

/// Trips split into the three dashboard columns, in service order.
#[derive(Debug, Clone, Default)]
pub struct TripBoard {
    pub pending: Vec<Trip>,
    pub accepted: Vec<Trip>,
    pub completed: Vec<Trip>,
}

impl TripBoard {
    /// Partition `trips` by status. Trips with an unrecognised status are
    /// left out of every column.
    pub fn from_trips(trips: impl IntoIterator<Item = Trip>) -> Self {
        let mut board = Self::default();
        for trip in trips {
            match trip.status {
                TripStatus::Pending => board.pending.push(trip),
                TripStatus::Accepted => board.accepted.push(trip),
                TripStatus::Completed => board.completed.push(trip),
                TripStatus::Other => {
                    tracing::debug!(trip_id = %trip.id, "Skipping trip with unknown status");
                }
            }
        }
        board
    }

    pub fn counts(&self) -> TripCounts {
        TripCounts {
            pending: self.pending.len(),
            accepted: self.accepted.len(),
            completed: self.completed.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.pending.len() + self.accepted.len() + self.completed.len()
    }

    pub fn find(&self, trip_id: &str) -> Option<&Trip> {
        self.pending
            .iter()
            .chain(&self.accepted)
            .chain(&self.completed)
            .find(|t| t.id == trip_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TripCounts {
    pub pending: usize,
    pub accepted: usize,
    pub completed: usize,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn trip(id: &str, status: TripStatus) -> Trip {
        Trip {
            id: id.into(),
            status,
            pickup_location: None,
            delivery_location: None,
            item_type: None,
            description: None,
            recipient_phone: None,
            delivery_fee: Decimal::ZERO,
            created_at: None,
        }
    }

    #[test]
    fn partitions_preserve_order() {
        let board = TripBoard::from_trips(vec![
            trip("a", TripStatus::Pending),
            trip("b", TripStatus::Completed),
            trip("c", TripStatus::Pending),
            trip("d", TripStatus::Accepted),
            trip("e", TripStatus::Other),
        ]);

        let ids = |v: &[Trip]| v.iter().map(|t| t.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&board.pending), ["a", "c"]);
        assert_eq!(ids(&board.accepted), ["d"]);
        assert_eq!(ids(&board.completed), ["b"]);
        assert_eq!(
            board.counts(),
            TripCounts {
                pending: 2,
                accepted: 1,
                completed: 1
            }
        );
        assert_eq!(board.total(), 4);
    }

    #[test]
    fn find_searches_every_column() {
        let board = TripBoard::from_trips(vec![
            trip("a", TripStatus::Pending),
            trip("b", TripStatus::Completed),
        ]);
        assert_eq!(board.find("b").unwrap().status, TripStatus::Completed);
        assert!(board.find("zzz").is_none());
    }

    #[test]
    fn empty_input_gives_empty_board() {
        let board = TripBoard::from_trips(Vec::new());
        assert_eq!(board.counts(), TripCounts::default());
    }
}
