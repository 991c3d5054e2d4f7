//! Booking domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::BookingError;

/// Booking lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// A stay from check-in to check-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateRange {
    /// Build a range; check-out must fall after check-in.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, BookingError> {
        if check_out <= check_in {
            return Err(BookingError::Validation(format!(
                "check-out {} must be after check-in {}",
                check_out, check_in
            )));
        }
        Ok(Self { check_in, check_out })
    }

    /// Overlap test shared by every availability computation.
    ///
    /// Inclusive on both ends: a stay ending on the day another begins
    /// counts as overlapping.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in <= other.check_out && self.check_out >= other.check_in
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// A reservation of one or more rooms of a room type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hotel_id: Uuid,
    pub room_type_id: Uuid,
    /// Assigned at confirmation time.
    pub room_id: Option<String>,
    pub stay: DateRange,
    pub guest_count: u32,
    /// Rooms held by this booking.
    pub rooms: u32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub hotel_id: Uuid,
    pub room_type_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_count: u32,
    #[serde(default = "default_rooms")]
    pub rooms: u32,
}

fn default_rooms() -> u32 {
    1
}

/// Inventory record for a room type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub total_rooms: u32,
    /// Individually bookable room identifiers (e.g. "101").
    #[serde(default)]
    pub room_ids: Vec<String>,
    pub nightly_rate: Decimal,
    pub max_occupancy: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, day).unwrap()
    }

    fn range(a: u32, b: u32) -> DateRange {
        DateRange::new(d(a), d(b)).unwrap()
    }

    #[test]
    fn test_overlap_predicate() {
        assert!(range(1, 5).overlaps(&range(3, 8)));
        assert!(range(3, 8).overlaps(&range(1, 5)));
        assert!(range(1, 10).overlaps(&range(3, 4)));
        assert!(!range(1, 3).overlaps(&range(4, 6)));
        // Touching ends count.
        assert!(range(1, 3).overlaps(&range(3, 6)));
    }

    #[test]
    fn test_overlap_symmetry_exhaustive() {
        for a in 1..8 {
            for b in (a + 1)..9 {
                for c in 1..8 {
                    for e in (c + 1)..9 {
                        let x = range(a, b);
                        let y = range(c, e);
                        assert_eq!(x.overlaps(&y), y.overlaps(&x));
                        assert_eq!(x.overlaps(&y), a <= e && b >= c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_invalid_range() {
        assert!(DateRange::new(d(5), d(5)).is_err());
        assert!(DateRange::new(d(6), d(5)).is_err());
        assert_eq!(range(1, 4).nights(), 3);
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&BookingStatus::Confirmed).unwrap();
        assert_eq!(json, "\"CONFIRMED\"");
        assert!(BookingStatus::Completed.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
    }
}
