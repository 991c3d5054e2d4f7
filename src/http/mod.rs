//! Outbound HTTP.
//!
//! # Data Flow
//! ```text
//! RemoteRoomInventory::room_type(id)
//!     → client.rs (service name → base URL, policy of the same name)
//!     → ResilientCaller (admission, retries, fallback)
//!     → reqwest (JSON over HTTP)
//! ```
//!
//! # Design Decisions
//! - 2xx is success; 408, 429 and 5xx are transient; other statuses are terminal
//! - A body that does not decode is terminal: retrying returns the same bytes

pub mod client;
pub mod inventory;

pub use client::ServiceClient;
pub use inventory::RemoteRoomInventory;
