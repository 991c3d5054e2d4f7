//! Payment subsystem.
//!
//! # Data Flow
//! ```text
//! initiate(key, request)
//!     → idempotency.rs (lookup by key, insert PENDING under a unique index)
//!     → gateway.rs (charge once per key)
//!     → handle_callback / refund (settle or reverse)
//! ```

pub mod gateway;
pub mod idempotency;
pub mod types;

pub use gateway::{GatewayError, PaymentGateway};
pub use idempotency::{PaymentError, PaymentIdempotencyGuard};
pub use types::{ChargeRequest, Payment, PaymentRequest, PaymentStatus};
