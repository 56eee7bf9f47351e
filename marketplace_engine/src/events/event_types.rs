use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Refund, Wallet, Withdrawal};

/// Published every time an order moves to a new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub old_status: OrderStatusType,
    pub order: Order,
}

impl OrderStatusChangedEvent {
    pub fn new(old_status: OrderStatusType, order: Order) -> Self {
        Self { old_status, order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    /// The seller's wallet after the payment was credited.
    pub wallet: Wallet,
}

impl OrderPaidEvent {
    pub fn new(order: Order, wallet: Wallet) -> Self {
        Self { order, wallet }
    }
}

/// Published when a refund changes status. `wallet` is set when the refund was deducted from the seller's wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundUpdatedEvent {
    pub refund: Refund,
    pub wallet: Option<Wallet>,
}

impl RefundUpdatedEvent {
    pub fn new(refund: Refund, wallet: Option<Wallet>) -> Self {
        Self { refund, wallet }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecordedEvent {
    pub withdrawal: Withdrawal,
    pub wallet: Wallet,
}
