//! Payment Gateway
//!
//! The payment provider is an external collaborator specified only by
//! interface (SPEC_FULL §1, §6.4): credit-card charge/refund and
//! convenience-store code issue/void. No concrete network transport lives
//! here — callers wrap every call in a 30-second timeout per SPEC_FULL §4.3.1
//! / §5. Implementations must never log card data.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::Money;

/// Credit card details for a single charge. Never persisted, never logged,
/// never echoed back in a response body (SPEC_FULL §4.3.1 security
/// invariant). Only `Deserialize` is derived — this type is read off an
/// HTTP request body and goes no further than the payment gateway call.
#[derive(Clone, Deserialize)]
pub struct CreditCardDetails {
    pub number: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
    pub cvv: String,
    pub holder_name: String,
}

impl fmt::Debug for CreditCardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = self.number.chars().rev().take(4).collect::<String>();
        let masked: String = masked.chars().rev().collect();
        f.debug_struct("CreditCardDetails")
            .field("number", &format!("****{masked}"))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvv", &"***")
            .field("holder_name", &self.holder_name)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ChargeResult {
    pub transaction_id: String,
}

#[derive(Debug, Clone)]
pub struct ConvenienceStorePayment {
    pub payment_code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    #[error("payment was declined")]
    Declined,
    #[error("payment gateway error: {0}")]
    Gateway(String),
}

/// Narrow trait behind which the concrete payment provider lives. Handlers
/// only ever see this interface (SPEC_FULL §6.4).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge_credit_card(
        &self,
        amount: Money,
        card: &CreditCardDetails,
    ) -> Result<ChargeResult, PaymentError>;

    async fn issue_convenience_store_payment(
        &self,
        amount: Money,
    ) -> Result<ConvenienceStorePayment, PaymentError>;

    async fn refund(&self, transaction_id: &str, amount: Money) -> Result<(), PaymentError>;

    async fn void_convenience_store_payment(&self, payment_code: &str) -> Result<(), PaymentError>;
}

/// Test/dev double. Always succeeds, producing deterministic-shaped but
/// unique identifiers. A real deployment swaps this for a provider SDK
/// client behind the same trait.
pub struct MockPaymentGateway;

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge_credit_card(
        &self,
        _amount: Money,
        _card: &CreditCardDetails,
    ) -> Result<ChargeResult, PaymentError> {
        Ok(ChargeResult {
            transaction_id: format!("txn_{}", uuid::Uuid::new_v4()),
        })
    }

    async fn issue_convenience_store_payment(
        &self,
        _amount: Money,
    ) -> Result<ConvenienceStorePayment, PaymentError> {
        Ok(ConvenienceStorePayment {
            payment_code: format!("CVS{:010}", rand::random::<u32>()),
            expires_at: Utc::now() + chrono::Duration::hours(72),
        })
    }

    async fn refund(&self, _transaction_id: &str, _amount: Money) -> Result<(), PaymentError> {
        Ok(())
    }

    async fn void_convenience_store_payment(&self, _payment_code: &str) -> Result<(), PaymentError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway_charges_succeed() {
        let gateway = MockPaymentGateway;
        let card = CreditCardDetails {
            number: "4242424242424242".to_string(),
            expiry_month: 12,
            expiry_year: 2030,
            cvv: "123".to_string(),
            holder_name: "Jane Doe".to_string(),
        };

        let result = gateway
            .charge_credit_card(Money::new(1000).unwrap(), &card)
            .await
            .unwrap();
        assert!(result.transaction_id.starts_with("txn_"));
    }

    #[tokio::test]
    async fn test_mock_gateway_issues_convenience_store_code() {
        let gateway = MockPaymentGateway;
        let result = gateway
            .issue_convenience_store_payment(Money::new(2300).unwrap())
            .await
            .unwrap();
        assert!(result.expires_at > Utc::now());
    }
}
