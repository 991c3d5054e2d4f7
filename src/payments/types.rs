//! Payment types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

/// A payment for a booking; at most one per idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    /// ISO 4217 code.
    pub currency: String,
    pub idempotency_key: String,
    /// Set once the gateway accepted the charge.
    pub gateway_transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A request to take payment for a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
}

impl PaymentRequest {
    /// Check amount and currency.
    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= Decimal::ZERO {
            return Err(format!("amount must be positive, got {}", self.amount));
        }
        let code_ok = self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase());
        if !code_ok {
            return Err(format!("currency '{}' is not an ISO 4217 code", self.currency));
        }
        Ok(())
    }
}

/// What the gateway is asked to charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    /// Forwarded so the gateway can deduplicate as well.
    pub idempotency_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: Decimal, currency: &str) -> PaymentRequest {
        PaymentRequest {
            booking_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount,
            currency: currency.to_string(),
        }
    }

    #[test]
    fn test_request_validation() {
        assert!(request(Decimal::new(1999, 2), "EUR").validate().is_ok());
        assert!(request(Decimal::ZERO, "EUR").validate().is_err());
        assert!(request(Decimal::new(-5, 0), "EUR").validate().is_err());
        assert!(request(Decimal::ONE, "eur").validate().is_err());
        assert!(request(Decimal::ONE, "EURO").validate().is_err());
    }

    #[test]
    fn test_payment_serde() {
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: Decimal::new(12050, 2),
            currency: "USD".into(),
            idempotency_key: "k1".into(),
            gateway_transaction_id: None,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["status"], "PENDING");
        let decoded: Payment = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.amount, Decimal::new(12050, 2));
    }
}
