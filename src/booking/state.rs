//! Booking lifecycle state machine.
//!
//! ```text
//! PENDING ──confirm──▶ CONFIRMED ──complete──▶ COMPLETED
//!    │                    │
//!    └──cancel──▶ CANCELLED ◀──cancel──┘
//! ```
//!
//! CANCELLED and COMPLETED are terminal. Every applied transition stamps
//! `updated_at`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::booking::types::{Booking, BookingStatus};
use crate::observability::metrics;

/// A requested lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    Cancel,
    Complete,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::Cancel => "cancel",
            Transition::Complete => "complete",
        }
    }

    /// Target status if the transition is allowed from `from`.
    pub fn target(self, from: BookingStatus) -> Option<BookingStatus> {
        use BookingStatus::*;
        match (self, from) {
            (Transition::Confirm, Pending) => Some(Confirmed),
            (Transition::Cancel, Pending | Confirmed) => Some(Cancelled),
            (Transition::Complete, Confirmed) => Some(Completed),
            _ => None,
        }
    }
}

/// Illegal transition attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot {} booking in status {}", .attempted.as_str(), .current)]
pub struct BookingStateError {
    pub attempted: Transition,
    pub current: BookingStatus,
}

/// Applies lifecycle transitions to bookings.
pub struct BookingStateMachine;

impl BookingStateMachine {
    pub fn apply(
        booking: &mut Booking,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<(), BookingStateError> {
        let target = transition.target(booking.status).ok_or(BookingStateError {
            attempted: transition,
            current: booking.status,
        })?;

        tracing::info!(
            booking_id = %booking.id,
            from = %booking.status,
            to = %target,
            "Booking transition"
        );
        metrics::record_booking_transition(transition.as_str());

        booking.status = target;
        booking.updated_at = now;
        Ok(())
    }

    /// PENDING → CONFIRMED.
    pub fn confirm(booking: &mut Booking, now: DateTime<Utc>) -> Result<(), BookingStateError> {
        Self::apply(booking, Transition::Confirm, now)
    }

    /// PENDING or CONFIRMED → CANCELLED.
    pub fn cancel(booking: &mut Booking, now: DateTime<Utc>) -> Result<(), BookingStateError> {
        Self::apply(booking, Transition::Cancel, now)
    }

    /// CONFIRMED → COMPLETED.
    pub fn complete(booking: &mut Booking, now: DateTime<Utc>) -> Result<(), BookingStateError> {
        Self::apply(booking, Transition::Complete, now)
    }
}
