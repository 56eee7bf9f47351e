//! The refund router.
//!
//! Digital payments are refunded automatically through the payment processor. Everything else (bank transfers, cash)
//! is refunded manually: the seller transfers the money out-of-band and uploads proof, after which the customer either
//! confirms receipt or opens a dispute.
//!
//! ```text
//! automatic: requested → processing → completed
//! manual:    requested → awaiting_transfer → proof_uploaded → received | disputed
//! both:      requested → rejected
//! ```
use mkt_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{FeeSettings, NewRefund, Order, PaymentMethod, Refund, RefundInitiator, RefundStatus, Wallet},
    rules::validation::ValidationErrors,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefundRuleError {
    #[error("Refund {refund_id} cannot move from {from} to {to}")]
    InvalidTransition { refund_id: i64, from: RefundStatus, to: RefundStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundRoute {
    /// Refunded by the payment processor against the original charge.
    Automatic,
    /// Transferred by the seller, with proof.
    Manual,
}

/// True for payment methods settled through the payment processor.
pub fn requires_stripe_refund(method: PaymentMethod) -> bool {
    method.is_processor_settled()
}

pub fn route_refund(method: PaymentMethod) -> RefundRoute {
    if requires_stripe_refund(method) {
        RefundRoute::Automatic
    } else {
        RefundRoute::Manual
    }
}

/// Customers have to wait for the seller to approve. A refund the seller initiates is approved on creation.
pub fn requires_seller_approval(initiator: RefundInitiator) -> bool {
    initiator == RefundInitiator::Customer
}

/// Validates a refund request against the order it refunds and the store's settings.
///
/// Every failed check is reported, not just the first.
pub fn validate_refund_request(
    request: &NewRefund,
    order: &Order,
    settings: &FeeSettings,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors
        .check(settings.refunds_enabled, "This store does not accept refund requests")
        .check(request.order_id == order.order_id, "The refund does not belong to this order")
        .check(order.has_been_paid(), "The order has not been paid, so there is nothing to refund")
        .check(request.amount.is_positive(), "The refund amount must be greater than zero")
        .check(
            request.amount <= order.amount_due(),
            format!("The refund amount {} exceeds the order total {}", request.amount, order.amount_due()),
        )
        .check(!request.reason.trim().is_empty(), "A reason for the refund is required")
        .check(
            request.currency == order.currency,
            format!("The refund currency {} does not match the order currency {}", request.currency, order.currency),
        )
        .check(
            matches!(order.refund_status, None | Some(RefundStatus::Rejected)),
            "A refund has already been requested for this order",
        );
    if let Some(paid_with) = order.payment_method {
        errors.check(
            paid_with == request.payment_method,
            format!("The order was paid with {paid_with}, not {}", request.payment_method),
        );
    }
    if requires_stripe_refund(request.payment_method) {
        // The charge to refund is always the one stored on the order. A caller-supplied reference may only repeat it.
        let charged = order.payment_reference.as_deref().filter(|c| !c.trim().is_empty());
        errors.check(charged.is_some(), "The order has no payment reference to refund a digital payment against");
        if let (Some(charged), Some(given)) = (charged, request.charge_reference.as_deref()) {
            errors.check(given == charged, "The payment reference does not match the order's payment");
        }
    }
    errors.into_result()
}

/// Applies a refund to the seller's wallet. Neither the balance nor total earnings ever drop below zero.
pub fn deduct_refund_from_wallet(wallet: &Wallet, amount: Money) -> Wallet {
    Wallet {
        balance: wallet.balance.saturating_sub(amount),
        total_earnings: wallet.total_earnings.saturating_sub(amount),
        ..wallet.clone()
    }
}

/// Checks whether `refund` may move to status `to`, given the route its payment method dictates.
pub fn check_refund_transition(refund: &Refund, to: RefundStatus) -> Result<(), RefundRuleError> {
    use RefundStatus::*;
    let route = route_refund(refund.payment_method);
    let valid = match (refund.status, to) {
        (Requested, Rejected) => true,
        (Requested, Processing) | (Processing, Completed) | (Processing, Requested) => {
            route == RefundRoute::Automatic
        },
        (Requested, AwaitingTransfer) | (AwaitingTransfer, ProofUploaded) => route == RefundRoute::Manual,
        (ProofUploaded, Received) | (ProofUploaded, Disputed) => route == RefundRoute::Manual,
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RefundRuleError::InvalidTransition { refund_id: refund.id, from: refund.status, to })
    }
}
