use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{FeeSettings, Order, OrderItem, OrderStatusType, PaymentMethod, Refund, RefundStatus},
    rules::{fees::FeeBreakdown, lifecycle::OrderAction, pickup_code::PickupCode},
};

/// Where an order is in its workflow, together with exactly the data that is meaningful at that point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum WorkflowPhase {
    Shopping { item_count: usize, subtotal: Money },
    /// The customer is done. Waiting for the seller to start bagging.
    AwaitingBagging,
    Bagging,
    AwaitingPayment { fees: FeeBreakdown, pickup_code: Option<PickupCode> },
    AwaitingHandoff { payment_method: Option<PaymentMethod>, pickup_code: Option<PickupCode> },
    Completed { status: OrderStatusType, refund_status: Option<RefundStatus> },
    Cancelled { refund_status: Option<RefundStatus> },
}

impl From<&Order> for WorkflowPhase {
    fn from(order: &Order) -> Self {
        match order.status {
            OrderStatusType::Shopping => {
                WorkflowPhase::Shopping { item_count: order.items.len(), subtotal: order.subtotal() }
            },
            OrderStatusType::DoneAdding => WorkflowPhase::AwaitingBagging,
            OrderStatusType::Bagging => WorkflowPhase::Bagging,
            OrderStatusType::ReadyForPayment => WorkflowPhase::AwaitingPayment {
                fees: order.fees.clone().unwrap_or_default(),
                pickup_code: order.pickup_code.clone(),
            },
            OrderStatusType::Paid => WorkflowPhase::AwaitingHandoff {
                payment_method: order.payment_method,
                pickup_code: order.pickup_code.clone(),
            },
            OrderStatusType::Delivered | OrderStatusType::Collected => {
                WorkflowPhase::Completed { status: order.status, refund_status: order.refund_status }
            },
            OrderStatusType::Cancelled => WorkflowPhase::Cancelled { refund_status: order.refund_status },
        }
    }
}

/// Everything a buyer or seller view needs to render an order, in one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSession {
    pub order: Order,
    pub fee_settings: FeeSettings,
    /// The frozen fees once payment was requested, or a live quote of the current cart before that.
    pub quote: FeeBreakdown,
    pub phase: WorkflowPhase,
    pub allowed_actions: Vec<OrderAction>,
    pub refunds: Vec<Refund>,
}

/// A new cart line, as submitted by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    pub name: String,
    pub price: Money,
    pub quantity: u32,
    #[serde(default)]
    pub currency: Option<String>,
}

impl NewCartItem {
    pub fn new<S: Into<String>>(name: S, price: Money, quantity: u32) -> Self {
        Self { name: name.into(), price, quantity, currency: None }
    }

    /// Converts into an order line, defaulting the currency to the order's.
    pub fn into_order_item(self, order_currency: &str) -> OrderItem {
        let currency = self.currency.unwrap_or_else(|| order_currency.to_string());
        OrderItem { name: self.name, price: self.price, quantity: self.quantity, currency }
    }
}
