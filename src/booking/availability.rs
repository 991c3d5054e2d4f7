//! Room availability.
//!
//! Free capacity for a room type is its total room count minus the rooms
//! held by CONFIRMED bookings whose stay overlaps the requested range.
//! PENDING bookings hold nothing.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::booking::types::{BookingStatus, DateRange, RoomType};
use crate::booking::BookingError;
use crate::storage::{BookingRepository, OverlapScope, RoomInventory};

/// Availability of a room type over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityReport {
    pub room_type_id: Uuid,
    pub total_rooms: u32,
    pub booked_rooms: u32,
    pub available: u32,
    /// Room identifiers not assigned to any overlapping CONFIRMED booking.
    pub free_rooms: Vec<String>,
}

/// Computes free capacity from inventory and confirmed bookings.
#[derive(Clone)]
pub struct AvailabilityChecker {
    inventory: Arc<dyn RoomInventory>,
    bookings: Arc<dyn BookingRepository>,
}

impl AvailabilityChecker {
    pub fn new(inventory: Arc<dyn RoomInventory>, bookings: Arc<dyn BookingRepository>) -> Self {
        Self { inventory, bookings }
    }

    pub async fn room_type(&self, room_type_id: Uuid) -> Result<RoomType, BookingError> {
        self.inventory
            .room_type(room_type_id)
            .await?
            .ok_or(BookingError::UnknownRoomType(room_type_id))
    }

    /// Whether `rooms_requested` rooms are free for the whole range.
    pub async fn is_available(
        &self,
        room_type_id: Uuid,
        range: &DateRange,
        rooms_requested: u32,
    ) -> Result<bool, BookingError> {
        let available = self.available_rooms(room_type_id, range).await?;
        tracing::debug!(%room_type_id, available, requested = rooms_requested, "Availability check");
        Ok(available >= rooms_requested)
    }

    /// Rooms of the type still free for the whole range.
    pub async fn available_rooms(&self, room_type_id: Uuid, range: &DateRange) -> Result<u32, BookingError> {
        let room_type = self.room_type(room_type_id).await?;
        let booked = self.booked_rooms(room_type_id, range).await?;
        Ok(room_type.total_rooms.saturating_sub(booked))
    }

    /// Capacity plus the explicit list of unassigned room identifiers.
    pub async fn detailed_availability(
        &self,
        room_type_id: Uuid,
        range: &DateRange,
    ) -> Result<AvailabilityReport, BookingError> {
        let room_type = self.room_type(room_type_id).await?;
        let overlapping = self
            .bookings
            .find_overlapping(&OverlapScope::RoomType(room_type_id), range, BookingStatus::Confirmed)
            .await?;

        let booked_rooms: u32 = overlapping.iter().map(|b| b.rooms).sum();
        let taken: HashSet<&str> = overlapping
            .iter()
            .filter_map(|b| b.room_id.as_deref())
            .collect();
        let free_rooms = room_type
            .room_ids
            .iter()
            .filter(|id| !taken.contains(id.as_str()))
            .cloned()
            .collect();

        Ok(AvailabilityReport {
            room_type_id,
            total_rooms: room_type.total_rooms,
            booked_rooms,
            available: room_type.total_rooms.saturating_sub(booked_rooms),
            free_rooms,
        })
    }

    /// Whether one physical room has no overlapping CONFIRMED booking.
    pub async fn is_room_free(&self, room_id: &str, range: &DateRange) -> Result<bool, BookingError> {
        let overlapping = self
            .bookings
            .find_overlapping(&OverlapScope::Room(room_id.to_string()), range, BookingStatus::Confirmed)
            .await?;
        Ok(overlapping.is_empty())
    }

    async fn booked_rooms(&self, room_type_id: Uuid, range: &DateRange) -> Result<u32, BookingError> {
        let overlapping = self
            .bookings
            .find_overlapping(&OverlapScope::RoomType(room_type_id), range, BookingStatus::Confirmed)
            .await?;
        Ok(overlapping.iter().map(|b| b.rooms).sum())
    }
}
