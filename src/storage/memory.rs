//! In-memory stores backed by `DashMap`.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::booking::types::{Booking, BookingStatus, DateRange, RoomType};
use crate::payments::types::Payment;
use crate::storage::{BookingRepository, OverlapScope, PaymentRepository, RoomInventory, StorageError};

/// Booking rows keyed by id.
#[derive(Clone, Default)]
pub struct InMemoryBookingRepository {
    rows: Arc<DashMap<Uuid, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: Booking) -> Result<Booking, StorageError> {
        match self.rows.entry(booking.id) {
            Entry::Occupied(_) => Err(StorageError::Duplicate {
                key: booking.id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(booking.clone());
                Ok(booking)
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, StorageError> {
        Ok(self.rows.get(&id).map(|row| row.value().clone()))
    }

    async fn find_overlapping(
        &self,
        scope: &OverlapScope,
        range: &DateRange,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, StorageError> {
        let matches = self
            .rows
            .iter()
            .filter(|row| {
                let b = row.value();
                let in_scope = match scope {
                    OverlapScope::RoomType(id) => b.room_type_id == *id,
                    OverlapScope::Room(room) => b.room_id.as_deref() == Some(room.as_str()),
                };
                in_scope && b.status == status && b.stay.overlaps(range)
            })
            .map(|row| row.value().clone())
            .collect();
        Ok(matches)
    }

    async fn update(&self, booking: Booking) -> Result<Booking, StorageError> {
        match self.rows.get_mut(&booking.id) {
            Some(mut row) => {
                *row = booking.clone();
                Ok(booking)
            }
            None => Err(StorageError::NotFound(booking.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        self.rows
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound(id))
    }
}

/// Payment rows with a unique idempotency-key index.
#[derive(Clone, Default)]
pub struct InMemoryPaymentRepository {
    rows: Arc<DashMap<Uuid, Payment>>,
    by_key: Arc<DashMap<String, Uuid>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, payment: Payment) -> Result<Payment, StorageError> {
        // The key's shard stays locked until the row is visible, so a
        // concurrent insert with the same key observes Occupied.
        match self.by_key.entry(payment.idempotency_key.clone()) {
            Entry::Occupied(_) => Err(StorageError::Duplicate {
                key: payment.idempotency_key,
            }),
            Entry::Vacant(slot) => {
                self.rows.insert(payment.id, payment.clone());
                slot.insert(payment.id);
                Ok(payment)
            }
        }
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>, StorageError> {
        let Some(id) = self.by_key.get(key).map(|id| *id.value()) else {
            return Ok(None);
        };
        Ok(self.rows.get(&id).map(|row| row.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, StorageError> {
        Ok(self.rows.get(&id).map(|row| row.value().clone()))
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, StorageError> {
        Ok(self
            .rows
            .iter()
            .find(|row| row.value().gateway_transaction_id.as_deref() == Some(transaction_id))
            .map(|row| row.value().clone()))
    }

    async fn update(&self, payment: Payment) -> Result<Payment, StorageError> {
        match self.rows.get_mut(&payment.id) {
            Some(mut row) => {
                if row.idempotency_key != payment.idempotency_key {
                    return Err(StorageError::Backend(format!(
                        "idempotency key of payment {} is immutable",
                        payment.id
                    )));
                }
                *row = payment.clone();
                Ok(payment)
            }
            None => Err(StorageError::NotFound(payment.id)),
        }
    }
}

/// Static room-type catalogue.
#[derive(Clone, Default)]
pub struct InMemoryRoomInventory {
    room_types: Arc<DashMap<Uuid, RoomType>>,
}

impl InMemoryRoomInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, room_type: RoomType) {
        self.room_types.insert(room_type.id, room_type);
    }
}

#[async_trait]
impl RoomInventory for InMemoryRoomInventory {
    async fn room_type(&self, id: Uuid) -> Result<Option<RoomType>, StorageError> {
        Ok(self.room_types.get(&id).map(|rt| rt.value().clone()))
    }
}
