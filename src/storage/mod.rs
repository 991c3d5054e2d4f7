//! Persistence seams.
//!
//! # Responsibilities
//! - Booking rows and the overlap query availability is computed from
//! - Payment rows with a unique index on the idempotency key
//! - Room-type inventory lookups
//!
//! # Design Decisions
//! - Traits are async so remote stores can sit behind the same seam
//! - A duplicate idempotency key is reported as an error, never overwritten
//! - `memory.rs` backs tests and the demo binary

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::booking::types::{Booking, BookingStatus, DateRange, RoomType};
use crate::payments::types::Payment;
use crate::resilience::CallError;

pub use memory::{InMemoryBookingRepository, InMemoryPaymentRepository, InMemoryRoomInventory};

/// Storage failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    /// A unique index rejected the insert.
    #[error("duplicate key '{key}'")]
    Duplicate { key: String },

    #[error("record {0} not found")]
    NotFound(Uuid),

    #[error("storage backend error: {0}")]
    Backend(String),

    /// A remote store could not be reached under its resilience policy.
    #[error("store unavailable: {0}")]
    Unavailable(CallError),
}

/// Which bookings an overlap query should match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlapScope {
    /// Every booking of the room type.
    RoomType(Uuid),
    /// Bookings assigned to one physical room.
    Room(String),
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: Booking) -> Result<Booking, StorageError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, StorageError>;

    /// Bookings in `scope` with `status` whose stay overlaps `range`.
    async fn find_overlapping(
        &self,
        scope: &OverlapScope,
        range: &DateRange,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, StorageError>;

    /// Replace an existing row. Fails with `NotFound` if absent.
    async fn update(&self, booking: Booking) -> Result<Booking, StorageError>;

    async fn delete(&self, id: Uuid) -> Result<(), StorageError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a new payment. Fails with `Duplicate` when the idempotency key
    /// is already taken; the existing row is left untouched.
    async fn insert(&self, payment: Payment) -> Result<Payment, StorageError>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>, StorageError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, StorageError>;

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, StorageError>;

    async fn update(&self, payment: Payment) -> Result<Payment, StorageError>;
}

#[async_trait]
pub trait RoomInventory: Send + Sync {
    async fn room_type(&self, id: Uuid) -> Result<Option<RoomType>, StorageError>;
}
