use std::{collections::HashMap, fmt::Display};

use marketplace_engine::db_types::{MessageKind, PaymentMethod};
use mkt_common::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityUpdate {
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelParams {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupCodeParams {
    pub code: String,
}

/// An explicit `country` overrides the IP lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentOptionsQuery {
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentParams {
    pub method: PaymentMethod,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardCheckParams {
    pub number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProofParams {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeParams {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerRegistration {
    pub seller_id: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorAccountParams {
    pub account: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalParams {
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageParams {
    pub sender: String,
    pub kind: MessageKind,
}

//----------------------------------------------   Stripe webhooks  ----------------------------------------------------
/// The envelope of every Stripe webhook delivery. Only the fields we act on are decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePaymentIntentObject {
    pub id: String,
    pub amount_received: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}
