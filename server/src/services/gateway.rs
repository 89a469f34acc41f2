//! Payment confirmation collaborator.
//!
//! Card processing lives outside this service; settlement only needs a
//! yes/no answer for a given amount, and a way to hand money back when a
//! confirmed charge cannot be turned into a sale.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub payment_id: Uuid,
    pub buyer_id: Uuid,
    pub amount: Decimal,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub payment_id: Uuid,
    /// Processor-side reference for the charge.
    pub reference: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn confirm(&self, intent: &PaymentIntent) -> Result<Confirmation, GatewayError>;

    async fn refund(&self, confirmation: &Confirmation) -> Result<(), GatewayError>;
}

/// Approves every charge. Stands in for a real processor in development.
#[derive(Debug, Clone, Default)]
pub struct ApprovingGateway;

#[async_trait]
impl PaymentGateway for ApprovingGateway {
    async fn confirm(&self, intent: &PaymentIntent) -> Result<Confirmation, GatewayError> {
        let reference = format!("approved_{}", Uuid::new_v4().simple());
        tracing::info!(
            payment_id = %intent.payment_id,
            amount = %intent.amount,
            reference = %reference,
            "Payment approved"
        );
        Ok(Confirmation {
            payment_id: intent.payment_id,
            reference,
            amount: intent.amount,
        })
    }

    async fn refund(&self, confirmation: &Confirmation) -> Result<(), GatewayError> {
        tracing::info!(
            payment_id = %confirmation.payment_id,
            reference = %confirmation.reference,
            amount = %confirmation.amount,
            "Payment refunded"
        );
        Ok(())
    }
}
