//! Payment gateway seam.

use async_trait::async_trait;
use thiserror::Error;

use crate::payments::types::ChargeRequest;

/// Errors reported by a payment gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The charge was declined (card, limits, fraud).
    #[error("charge declined: {0}")]
    Declined(String),

    /// Gateway unreachable or timed out; the outcome is unknown.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// Refund refused or the transaction is unknown to the gateway.
    #[error("refund rejected: {0}")]
    RefundRejected(String),
}

/// Adapter for an external payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge and return the provider's transaction id.
    async fn charge(&self, request: &ChargeRequest) -> Result<String, GatewayError>;

    /// Refund a previously successful charge.
    async fn refund(&self, transaction_id: &str) -> Result<(), GatewayError>;
}
