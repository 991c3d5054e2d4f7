//! At-most-once payment initiation keyed by idempotency key.
//!
//! The unique index in the payment store decides which request owns a key.
//! Every other request with that key gets the owner's row back and never
//! reaches the gateway.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::observability::metrics;
use crate::payments::gateway::{GatewayError, PaymentGateway};
use crate::payments::types::{ChargeRequest, Payment, PaymentRequest, PaymentStatus};
use crate::storage::{PaymentRepository, StorageError};

/// Payment errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PaymentError {
    #[error("invalid payment request: {0}")]
    Validation(String),

    /// The row stays PENDING and the key still maps to it.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("payment {0} not found")]
    NotFound(String),

    #[error("payment {id} is {status}, expected {expected}")]
    InvalidStatus {
        id: Uuid,
        status: PaymentStatus,
        expected: PaymentStatus,
    },
}

/// Guards the gateway against duplicate charges.
#[derive(Clone)]
pub struct PaymentIdempotencyGuard {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentIdempotencyGuard {
    pub fn new(payments: Arc<dyn PaymentRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { payments, gateway }
    }

    /// Create and charge a payment, or return the one already bound to `key`.
    ///
    /// An existing row is returned whatever its status. A gateway failure
    /// leaves the new row PENDING, so a retry with the same key returns it
    /// without charging again.
    pub async fn initiate(&self, key: &str, request: PaymentRequest) -> Result<Payment, PaymentError> {
        if key.trim().is_empty() {
            return Err(PaymentError::Validation("idempotency key must not be empty".into()));
        }
        request.validate().map_err(PaymentError::Validation)?;

        if let Some(existing) = self.payments.find_by_idempotency_key(key).await? {
            return Ok(self.deduplicated(existing));
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id: request.booking_id,
            user_id: request.user_id,
            amount: request.amount,
            currency: request.currency,
            idempotency_key: key.to_string(),
            gateway_transaction_id: None,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut payment = match self.payments.insert(payment).await {
            Ok(payment) => payment,
            Err(StorageError::Duplicate { .. }) => {
                // Lost the race on the unique index; the winner's row is the answer.
                let existing = self
                    .payments
                    .find_by_idempotency_key(key)
                    .await?
                    .ok_or_else(|| PaymentError::NotFound(key.to_string()))?;
                return Ok(self.deduplicated(existing));
            }
            Err(e) => return Err(e.into()),
        };

        let charge = ChargeRequest {
            payment_id: payment.id,
            amount: payment.amount,
            currency: payment.currency.clone(),
            idempotency_key: payment.idempotency_key.clone(),
        };
        let transaction_id = match self.gateway.charge(&charge).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(payment_id = %payment.id, key, error = %e, "Charge failed, payment left pending");
                return Err(e.into());
            }
        };

        payment.gateway_transaction_id = Some(transaction_id);
        payment.updated_at = Utc::now();
        let payment = self.payments.update(payment).await?;
        tracing::info!(
            payment_id = %payment.id,
            booking_id = %payment.booking_id,
            amount = %payment.amount,
            currency = %payment.currency,
            "Payment charged"
        );
        Ok(payment)
    }

    /// Settle a PENDING payment from the gateway's asynchronous result.
    ///
    /// Callbacks for an already settled payment change nothing.
    pub async fn handle_callback(&self, transaction_id: &str, succeeded: bool) -> Result<Payment, PaymentError> {
        let mut payment = self
            .payments
            .find_by_transaction_id(transaction_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(transaction_id.to_string()))?;

        if payment.status != PaymentStatus::Pending {
            tracing::debug!(payment_id = %payment.id, status = %payment.status, "Ignoring repeated callback");
            return Ok(payment);
        }

        payment.status = if succeeded {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        };
        payment.updated_at = Utc::now();
        let payment = self.payments.update(payment).await?;
        tracing::info!(payment_id = %payment.id, status = %payment.status, "Payment settled");
        Ok(payment)
    }

    /// Refund a successful payment.
    pub async fn refund(&self, payment_id: Uuid) -> Result<Payment, PaymentError> {
        let mut payment = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;

        if payment.status != PaymentStatus::Success {
            return Err(PaymentError::InvalidStatus {
                id: payment.id,
                status: payment.status,
                expected: PaymentStatus::Success,
            });
        }
        let transaction_id = payment.gateway_transaction_id.clone().ok_or_else(|| {
            PaymentError::Validation(format!("payment {} has no gateway transaction", payment.id))
        })?;

        self.gateway.refund(&transaction_id).await?;

        payment.status = PaymentStatus::Refunded;
        payment.updated_at = Utc::now();
        let payment = self.payments.update(payment).await?;
        tracing::info!(payment_id = %payment.id, "Payment refunded");
        Ok(payment)
    }

    fn deduplicated(&self, existing: Payment) -> Payment {
        metrics::record_payment_deduplicated();
        tracing::info!(
            payment_id = %existing.id,
            key = %existing.idempotency_key,
            status = %existing.status,
            "Returning existing payment for idempotency key"
        );
        existing
    }
}
