use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use mkt_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::{fees::FeeBreakdown, pickup_code::PickupCode};

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Generates `Display` and `FromStr` for a fieldless enum from a single list of `Variant => "tag"` pairs, so that the
/// tags used in the database, in JSON and in logs can never drift apart.
macro_rules! string_tags {
    ($type:ident { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $tag),)+
                }
            }
        }

        impl FromStr for $type {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok(Self::$variant),)+
                    s => Err(ConversionError::new(stringify!($type), s)),
                }
            }
        }
    };
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The workflow tag of an order.
///
/// The happy path is `Shopping → DoneAdding → Bagging → ReadyForPayment → Paid → Delivered | Collected`. Any
/// non-terminal order can be cancelled. See [`crate::rules::lifecycle`] for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The customer is still adding items to the cart.
    Shopping,
    /// The customer has finished adding items. The cart is locked from here on.
    DoneAdding,
    /// The seller is bagging the items.
    Bagging,
    /// Fees have been frozen and the customer has been asked to pay.
    ReadyForPayment,
    /// Payment has been received.
    Paid,
    /// The order was handed over to the customer at their address.
    Delivered,
    /// The customer collected the order from the store.
    Collected,
    /// The order was cancelled by the customer or the seller.
    Cancelled,
}

string_tags!(OrderStatusType {
    Shopping => "shopping",
    DoneAdding => "done_adding",
    Bagging => "bagging",
    ReadyForPayment => "ready_for_payment",
    Paid => "paid",
    Delivered => "delivered",
    Collected => "collected",
    Cancelled => "cancelled",
});

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Shopping");
            OrderStatusType::Shopping
        })
    }
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Collected | Self::Cancelled)
    }
}

//--------------------------------------     DeliveryType      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryType {
    Delivery,
    Collection,
    PayAtStore,
}

string_tags!(DeliveryType {
    Delivery => "Delivery",
    Collection => "Collection",
    PayAtStore => "PayAtStore",
});

impl DeliveryType {
    /// Collection and pay-at-store orders are handed over at the store.
    pub fn is_collected_at_store(&self) -> bool {
        matches!(self, Self::Collection | Self::PayAtStore)
    }

    /// The terminal status reached when the pickup code is verified.
    pub fn handoff_status(&self) -> OrderStatusType {
        match self {
            Self::Delivery => OrderStatusType::Delivered,
            Self::Collection | Self::PayAtStore => OrderStatusType::Collected,
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    GooglePay,
    ApplePay,
    Paypal,
    Klarna,
    BankTransfer,
    Cash,
}

string_tags!(PaymentMethod {
    Card => "card",
    GooglePay => "google_pay",
    ApplePay => "apple_pay",
    Paypal => "paypal",
    Klarna => "klarna",
    BankTransfer => "bank_transfer",
    Cash => "cash",
});

impl PaymentMethod {
    /// Payments settled through the payment processor. These can be refunded automatically and credit the seller's
    /// wallet. Everything else is settled directly between customer and seller.
    pub fn is_processor_settled(&self) -> bool {
        matches!(self, Self::Card | Self::GooglePay | Self::ApplePay | Self::Paypal | Self::Klarna)
    }
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub price: Money,
    pub quantity: u32,
    pub currency: String,
}

impl OrderItem {
    pub fn new<S: Into<String>>(name: S, price: Money, quantity: u32, currency: S) -> Self {
        Self { name: name.into(), price, quantity, currency: currency.into() }
    }

    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub store_id: String,
    pub customer_id: String,
    pub currency: String,
    pub delivery_type: DeliveryType,
    pub status: OrderStatusType,
    pub items: Vec<OrderItem>,
    /// Set the first time the order leaves `Shopping` and never cleared again.
    pub items_locked: bool,
    /// The fees frozen when payment was requested.
    pub fees: Option<FeeBreakdown>,
    pub payment_method: Option<PaymentMethod>,
    /// The processor's charge reference, for processor-settled payments.
    pub payment_reference: Option<String>,
    pub pickup_code: Option<PickupCode>,
    pub pickup_code_used: bool,
    pub refund_status: Option<RefundStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// True once the cart may no longer be changed.
    pub fn is_cart_locked(&self) -> bool {
        self.items_locked || self.status != OrderStatusType::Shopping
    }

    /// True if money has changed hands for this order, i.e. there is something to refund.
    pub fn has_been_paid(&self) -> bool {
        self.payment_method.is_some()
    }

    /// The amount the customer paid (or was asked to pay), falling back to the cart subtotal.
    pub fn amount_due(&self) -> Money {
        self.fees.as_ref().map(|f| f.total).unwrap_or_else(|| self.subtotal())
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub store_id: String,
    pub customer_id: String,
    pub currency: String,
    pub delivery_type: DeliveryType,
}

impl NewOrder {
    pub fn new<S: Into<String>>(order_id: OrderId, store_id: S, customer_id: S, delivery_type: DeliveryType) -> Self {
        Self {
            order_id,
            store_id: store_id.into(),
            customer_id: customer_id.into(),
            currency: mkt_common::DEFAULT_CURRENCY_CODE.to_string(),
            delivery_type,
        }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }
}

//--------------------------------------      FeeSettings      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceFeeType {
    Percentage,
    Fixed,
}

/// Per-store fee and payment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSettings {
    pub delivery_enabled: bool,
    pub delivery_fee: Money,
    /// Orders at or above this subtotal ship for free. Zero disables the threshold.
    pub free_delivery_threshold: Money,
    pub service_fee_enabled: bool,
    pub service_fee_type: ServiceFeeType,
    /// Percentage rate, e.g. `2.5` for 2.5%.
    pub service_fee_rate: rust_decimal::Decimal,
    pub service_fee_amount: Money,
    /// Cap on percentage service fees. Zero means uncapped.
    pub service_fee_max: Money,
    pub refunds_enabled: bool,
    pub card_payments_enabled: bool,
    pub google_pay_enabled: bool,
    pub manual_transfer_only: bool,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            delivery_enabled: false,
            delivery_fee: Money::zero(),
            free_delivery_threshold: Money::zero(),
            service_fee_enabled: false,
            service_fee_type: ServiceFeeType::Percentage,
            service_fee_rate: rust_decimal::Decimal::ZERO,
            service_fee_amount: Money::zero(),
            service_fee_max: Money::zero(),
            refunds_enabled: true,
            card_payments_enabled: true,
            google_pay_enabled: false,
            manual_transfer_only: false,
        }
    }
}

//--------------------------------------         Store         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub store_id: String,
    pub seller_id: String,
    pub name: String,
    pub fee_settings: FeeSettings,
}

//--------------------------------------   Seller and Wallet   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub seller_id: String,
    /// ISO 3166 alpha-2 country code the seller declared at sign-up.
    pub country: String,
    /// The seller's connected account at the payment processor, if they have one.
    pub processor_account: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub seller_id: String,
    pub balance: Money,
    pub total_earnings: Money,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn empty<S: Into<String>>(seller_id: S, currency: S) -> Self {
        Self {
            seller_id: seller_id.into(),
            balance: Money::zero(),
            total_earnings: Money::zero(),
            currency: currency.into(),
            updated_at: Utc::now(),
        }
    }
}

//--------------------------------------        Refunds        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Waiting for the seller to approve or reject.
    Requested,
    /// Claimed for an automatic refund; the processor call is in flight.
    Processing,
    /// The processor refunded the customer.
    Completed,
    /// Manual refund approved; the seller has to transfer the money.
    AwaitingTransfer,
    /// The seller uploaded proof of the manual transfer.
    ProofUploaded,
    /// The customer confirmed receipt of the manual transfer.
    Received,
    /// The customer disputes the manual transfer.
    Disputed,
    Rejected,
}

string_tags!(RefundStatus {
    Requested => "requested",
    Processing => "processing",
    Completed => "completed",
    AwaitingTransfer => "awaiting_transfer",
    ProofUploaded => "proof_uploaded",
    Received => "received",
    Disputed => "disputed",
    Rejected => "rejected",
});

impl RefundStatus {
    /// True while the refund still needs someone to act on it.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Requested | Self::Processing | Self::AwaitingTransfer | Self::ProofUploaded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundInitiator {
    Customer,
    Seller,
}

string_tags!(RefundInitiator {
    Customer => "customer",
    Seller => "seller",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: i64,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    pub reason: String,
    pub payment_method: PaymentMethod,
    pub requires_stripe_refund: bool,
    pub charge_reference: Option<String>,
    pub initiator: RefundInitiator,
    pub status: RefundStatus,
    pub proof_url: Option<String>,
    pub dispute_reason: Option<String>,
    pub processor_refund_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefund {
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    pub reason: String,
    pub payment_method: PaymentMethod,
    /// The processor charge to refund. Required for processor-settled payments.
    #[serde(default)]
    pub charge_reference: Option<String>,
    pub initiator: RefundInitiator,
}

impl NewRefund {
    pub fn requires_stripe_refund(&self) -> bool {
        crate::rules::refunds::requires_stripe_refund(self.payment_method)
    }
}

//--------------------------------------      Withdrawals      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: i64,
    pub seller_id: String,
    pub amount: Money,
    pub tax: Money,
    pub net_amount: Money,
    pub currency: String,
    pub country: String,
    pub payout_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWithdrawal {
    pub seller_id: String,
    pub amount: Money,
    pub tax: Money,
    pub net_amount: Money,
    pub currency: String,
    pub country: String,
    pub payout_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Messages       ---------------------------------------------------------
/// Every kind of message that can appear in a buyer/seller conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    Text { body: String },
    Image { url: String },
    CartUpdated { item_count: usize, subtotal: Money },
    DoneAdding,
    ItemsBagged,
    PaymentRequest { fees: FeeBreakdown },
    PaymentConfirmed { method: PaymentMethod, amount: Money },
    PickupCode { code: PickupCode },
    HandoffConfirmed { status: OrderStatusType },
    OrderCancelled { reason: String },
    RefundUpdate { refund_id: i64, status: RefundStatus },
    WithdrawalRequested { amount: Money },
}

impl MessageKind {
    /// Messages generated by the order flow rather than typed by a person.
    pub fn is_system(&self) -> bool {
        !matches!(self, Self::Text { .. } | Self::Image { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub sender: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender: String,
    pub kind: MessageKind,
}

impl NewMessage {
    pub fn new<S: Into<String>>(conversation_id: S, sender: S, kind: MessageKind) -> Self {
        Self { conversation_id: conversation_id.into(), sender: sender.into(), kind }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_tags_round_trip() {
        for status in [
            OrderStatusType::Shopping,
            OrderStatusType::DoneAdding,
            OrderStatusType::Bagging,
            OrderStatusType::ReadyForPayment,
            OrderStatusType::Paid,
            OrderStatusType::Delivered,
            OrderStatusType::Collected,
            OrderStatusType::Cancelled,
        ] {
            let tag = status.to_string();
            assert_eq!(tag.parse::<OrderStatusType>().unwrap(), status);
            assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{tag}\""));
        }
        assert!("on_hold".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn processor_settled_methods() {
        assert!(PaymentMethod::Card.is_processor_settled());
        assert!(PaymentMethod::Klarna.is_processor_settled());
        assert!(!PaymentMethod::BankTransfer.is_processor_settled());
        assert!(!PaymentMethod::Cash.is_processor_settled());
        assert_eq!("google_pay".parse::<PaymentMethod>().unwrap(), PaymentMethod::GooglePay);
    }

    #[test]
    fn message_kinds_are_tagged() {
        let kind = MessageKind::Text { body: "Is this still available?".into() };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "text");
        assert!(!kind.is_system());
        assert!(MessageKind::ItemsBagged.is_system());
        let back: MessageKind = serde_json::from_str(r#"{"type":"done_adding"}"#).unwrap();
        assert_eq!(back, MessageKind::DoneAdding);
    }

    #[test]
    fn handoff_status_depends_on_delivery_type() {
        assert_eq!(DeliveryType::Delivery.handoff_status(), OrderStatusType::Delivered);
        assert_eq!(DeliveryType::Collection.handoff_status(), OrderStatusType::Collected);
        assert_eq!(DeliveryType::PayAtStore.handoff_status(), OrderStatusType::Collected);
    }
}
