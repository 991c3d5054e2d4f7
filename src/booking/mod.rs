//! Booking subsystem.
//!
//! # Data Flow
//! ```text
//! NewBooking
//!     → service.rs (validate, price, persist PENDING)
//!     → availability.rs (CONFIRMED overlaps vs. room-type inventory)
//!     → state.rs (PENDING → CONFIRMED → COMPLETED, or → CANCELLED)
//! ```
//!
//! # Design Decisions
//! - One overlap predicate (`DateRange::overlaps`) for every availability query
//! - Status only changes through `BookingStateMachine`
//! - Availability is checked, then the row is written, with no hold in between.
//!   Two concurrent confirmations for the last room can both succeed.

pub mod availability;
pub mod service;
pub mod state;
pub mod types;

use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;

pub use availability::{AvailabilityChecker, AvailabilityReport};
pub use service::BookingService;
pub use state::{BookingStateError, BookingStateMachine, Transition};
pub use types::{Booking, BookingStatus, DateRange, NewBooking, RoomType};

/// The requested rooms are not free for the requested dates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("room type {room_type_id} has {available} room(s) free, {requested} requested")]
pub struct BookingConflict {
    pub room_type_id: Uuid,
    pub requested: u32,
    pub available: u32,
}

/// Booking errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BookingError {
    #[error("invalid booking request: {0}")]
    Validation(String),

    #[error(transparent)]
    Conflict(#[from] BookingConflict),

    #[error(transparent)]
    State(#[from] BookingStateError),

    #[error("booking {0} not found")]
    NotFound(Uuid),

    #[error("room type {0} not found")]
    UnknownRoomType(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
