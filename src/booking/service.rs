//! Booking operations over the repository and availability checker.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::booking::availability::AvailabilityChecker;
use crate::booking::state::{BookingStateError, BookingStateMachine, Transition};
use crate::booking::types::{Booking, BookingStatus, DateRange, NewBooking};
use crate::booking::{BookingConflict, BookingError};
use crate::storage::BookingRepository;

/// Creates bookings and drives them through their lifecycle.
#[derive(Clone)]
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    availability: AvailabilityChecker,
}

impl BookingService {
    pub fn new(bookings: Arc<dyn BookingRepository>, availability: AvailabilityChecker) -> Self {
        Self { bookings, availability }
    }

    pub fn availability(&self) -> &AvailabilityChecker {
        &self.availability
    }

    /// Validate, check availability, price and persist a PENDING booking.
    pub async fn create(&self, request: NewBooking) -> Result<Booking, BookingError> {
        let stay = DateRange::new(request.check_in, request.check_out)?;
        if request.rooms == 0 {
            return Err(BookingError::Validation("at least one room is required".into()));
        }
        if request.guest_count == 0 {
            return Err(BookingError::Validation("at least one guest is required".into()));
        }

        let room_type = self.availability.room_type(request.room_type_id).await?;
        if room_type.hotel_id != request.hotel_id {
            return Err(BookingError::Validation(format!(
                "room type {} does not belong to hotel {}",
                room_type.id, request.hotel_id
            )));
        }
        let capacity = room_type.max_occupancy.saturating_mul(request.rooms);
        if request.guest_count > capacity {
            return Err(BookingError::Validation(format!(
                "{} guests exceed the capacity of {} room(s) ({})",
                request.guest_count, request.rooms, capacity
            )));
        }

        self.ensure_available(request.room_type_id, &stay, request.rooms).await?;

        let total_price =
            room_type.nightly_rate * Decimal::from(stay.nights()) * Decimal::from(request.rooms);
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            hotel_id: request.hotel_id,
            room_type_id: request.room_type_id,
            room_id: None,
            stay,
            guest_count: request.guest_count,
            rooms: request.rooms,
            total_price,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let booking = self.bookings.insert(booking).await?;
        tracing::info!(
            booking_id = %booking.id,
            room_type_id = %booking.room_type_id,
            nights = booking.stay.nights(),
            total = %booking.total_price,
            "Booking created"
        );
        Ok(booking)
    }

    pub async fn get(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.bookings
            .find_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))
    }

    /// Re-check availability, assign a room and move PENDING → CONFIRMED.
    ///
    /// The check and the write are separate steps; a concurrent confirmation
    /// for the same rooms can pass the same check before either is stored.
    pub async fn confirm(&self, id: Uuid) -> Result<Booking, BookingError> {
        let mut booking = self.get(id).await?;
        if booking.status != BookingStatus::Pending {
            return Err(BookingStateError {
                attempted: Transition::Confirm,
                current: booking.status,
            }
            .into());
        }

        self.ensure_available(booking.room_type_id, &booking.stay, booking.rooms)
            .await?;

        if booking.rooms == 1 && booking.room_id.is_none() {
            let report = self
                .availability
                .detailed_availability(booking.room_type_id, &booking.stay)
                .await?;
            booking.room_id = report.free_rooms.into_iter().next();
        }

        BookingStateMachine::confirm(&mut booking, Utc::now())?;
        Ok(self.bookings.update(booking).await?)
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.transition(id, Transition::Cancel).await
    }

    pub async fn complete(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.transition(id, Transition::Complete).await
    }

    /// Remove a booking that was never confirmed.
    pub async fn delete(&self, id: Uuid) -> Result<(), BookingError> {
        let booking = self.get(id).await?;
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::Validation(format!(
                "booking {} is {} and can no longer be deleted",
                id, booking.status
            )));
        }
        self.bookings.delete(id).await?;
        tracing::info!(booking_id = %id, "Booking deleted");
        Ok(())
    }

    async fn transition(&self, id: Uuid, transition: Transition) -> Result<Booking, BookingError> {
        let mut booking = self.get(id).await?;
        BookingStateMachine::apply(&mut booking, transition, Utc::now())?;
        Ok(self.bookings.update(booking).await?)
    }

    async fn ensure_available(&self, room_type_id: Uuid, stay: &DateRange, rooms: u32) -> Result<(), BookingError> {
        let available = self.availability.available_rooms(room_type_id, stay).await?;
        if available < rooms {
            tracing::warn!(%room_type_id, available, requested = rooms, "Booking conflict");
            return Err(BookingConflict {
                room_type_id,
                requested: rooms,
                available,
            }
            .into());
        }
        Ok(())
    }
}
