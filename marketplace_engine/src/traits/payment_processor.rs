//! The seam to the payment processor.
//!
//! Amounts cross this boundary in minor units (cents). Conversion happens in the engine with
//! [`mkt_common::Money::to_minor_units`], so implementations never have to round.
use mkt_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{OrderId, PaymentMethod};

#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    /// The processor understood the request and declined it, e.g. the charge was already refunded.
    #[error("The payment processor rejected the request: {0}")]
    Rejected(String),
    #[error("The payment processor could not be reached: {0}")]
    Unavailable(String),
    #[error("Invalid request to the payment processor: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    pub order_id: OrderId,
    pub amount_minor: i64,
    pub currency: String,
    pub method: PaymentMethod,
    /// The seller's connected account, if the charge should be routed to it.
    pub destination_account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRefundRequest {
    pub charge_reference: String,
    pub amount_minor: i64,
    pub currency: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRefund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorBalance {
    pub available: Money,
    pub pending: Money,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub account: String,
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub id: String,
    pub status: String,
}

#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    async fn create_payment_intent(&self, request: PaymentIntentRequest) -> Result<PaymentIntent, ProcessorError>;

    /// Refunds (part of) a charge.
    async fn create_refund(&self, request: ProcessorRefundRequest) -> Result<ProcessorRefund, ProcessorError>;

    /// The balance of a connected account, or of the platform account when `account` is `None`.
    async fn account_balance(&self, account: Option<&str>) -> Result<ProcessorBalance, ProcessorError>;

    /// Pays money out to a connected account.
    async fn create_payout(&self, request: PayoutRequest) -> Result<Payout, ProcessorError>;
}
