//! The order state tracker.
//!
//! ```text
//! shopping → done_adding → bagging → ready_for_payment → paid → delivered | collected
//!                                          └───────── (pay at store) ─────────→ collected
//! ```
//!
//! Any order that has not reached a terminal state can be cancelled. The cart can only be changed while the order is
//! `shopping`, and once it has left `shopping` it stays locked, even if the order is later cancelled.
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{DeliveryType, Order, OrderId, OrderStatusType, RefundStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Order {0} is locked. Items can no longer be added, removed or changed.")]
    OrderLocked(OrderId),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} has no items")]
    EmptyCart(OrderId),
    #[error("{action} is not allowed while order {order_id} is {status}")]
    ActionNotAllowed { order_id: OrderId, action: OrderAction, status: OrderStatusType },
}

/// Something a customer or seller can do to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    AddItem,
    UpdateQuantity,
    RemoveItem,
    FinishAdding,
    MarkBagged,
    RequestPayment,
    RecordPayment,
    IssuePickupCode,
    VerifyPickupCode,
    Cancel,
    RequestRefund,
}

impl Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AddItem => "Adding items",
            Self::UpdateQuantity => "Changing quantities",
            Self::RemoveItem => "Removing items",
            Self::FinishAdding => "Finishing the cart",
            Self::MarkBagged => "Bagging",
            Self::RequestPayment => "Requesting payment",
            Self::RecordPayment => "Recording a payment",
            Self::IssuePickupCode => "Issuing a pickup code",
            Self::VerifyPickupCode => "Verifying a pickup code",
            Self::Cancel => "Cancelling",
            Self::RequestRefund => "Requesting a refund",
        };
        write!(f, "{s}")
    }
}

/// The actions available on `order` in its current state.
pub fn allowed_actions(order: &Order) -> Vec<OrderAction> {
    use OrderAction::*;
    let mut actions = match order.status {
        OrderStatusType::Shopping if order.items_locked => vec![],
        OrderStatusType::Shopping if order.items.is_empty() => vec![AddItem],
        OrderStatusType::Shopping => vec![AddItem, UpdateQuantity, RemoveItem, FinishAdding],
        OrderStatusType::DoneAdding => vec![MarkBagged],
        OrderStatusType::Bagging => vec![RequestPayment],
        OrderStatusType::ReadyForPayment if order.delivery_type == DeliveryType::PayAtStore => {
            vec![RecordPayment, IssuePickupCode, VerifyPickupCode]
        },
        OrderStatusType::ReadyForPayment => vec![RecordPayment],
        OrderStatusType::Paid => vec![IssuePickupCode, VerifyPickupCode],
        OrderStatusType::Delivered | OrderStatusType::Collected | OrderStatusType::Cancelled => vec![],
    };
    if order.pickup_code.is_some() {
        actions.retain(|a| *a != IssuePickupCode);
    }
    if !order.status.is_terminal() {
        actions.push(Cancel);
    }
    if can_request_refund(order) {
        actions.push(RequestRefund);
    }
    actions
}

/// Fails with [`LifecycleError::ActionNotAllowed`] unless `action` is currently available on `order`.
pub fn ensure_action_allowed(order: &Order, action: OrderAction) -> Result<(), LifecycleError> {
    if matches!(action, OrderAction::AddItem | OrderAction::UpdateQuantity | OrderAction::RemoveItem) {
        ensure_cart_mutable(order)?;
    }
    if allowed_actions(order).contains(&action) {
        Ok(())
    } else {
        Err(LifecycleError::ActionNotAllowed { order_id: order.order_id.clone(), action, status: order.status })
    }
}

/// Cart changes are only possible while shopping, and never after the cart has been locked.
pub fn ensure_cart_mutable(order: &Order) -> Result<(), LifecycleError> {
    if order.is_cart_locked() {
        Err(LifecycleError::OrderLocked(order.order_id.clone()))
    } else {
        Ok(())
    }
}

/// Checks whether `order` may move to the status `to`.
pub fn check_transition(order: &Order, to: OrderStatusType) -> Result<(), LifecycleError> {
    use OrderStatusType::*;
    let from = order.status;
    let valid = match (from, to) {
        (Shopping, DoneAdding) => {
            if order.items.is_empty() {
                return Err(LifecycleError::EmptyCart(order.order_id.clone()));
            }
            true
        },
        (DoneAdding, Bagging) | (Bagging, ReadyForPayment) | (ReadyForPayment, Paid) => true,
        (ReadyForPayment, Collected) => order.delivery_type == DeliveryType::PayAtStore,
        (Paid, Delivered) | (Paid, Collected) => order.delivery_type.handoff_status() == to,
        (from, Cancelled) => !from.is_terminal(),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition { order_id: order.order_id.clone(), from, to })
    }
}

fn can_request_refund(order: &Order) -> bool {
    order.has_been_paid() && matches!(order.refund_status, None | Some(RefundStatus::Rejected))
}
