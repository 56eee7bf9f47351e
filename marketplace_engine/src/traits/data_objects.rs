use serde::{Deserialize, Serialize};

use crate::{
    db_types::{OrderStatusType, PaymentMethod, RefundStatus},
    rules::fees::FeeBreakdown,
};

/// A conditional order status change. It only applies if the order is still in the `expected` status.
///
/// The optional fields are written alongside the status when present, and left untouched otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChange {
    pub expected: OrderStatusType,
    pub new_status: OrderStatusType,
    pub fees: Option<FeeBreakdown>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
}

impl OrderStatusChange {
    pub fn new(expected: OrderStatusType, new_status: OrderStatusType) -> Self {
        Self { expected, new_status, fees: None, payment_method: None, payment_reference: None }
    }

    pub fn with_fees(mut self, fees: FeeBreakdown) -> Self {
        self.fees = Some(fees);
        self
    }

    pub fn with_payment(mut self, method: PaymentMethod, reference: Option<String>) -> Self {
        self.payment_method = Some(method);
        self.payment_reference = reference;
        self
    }
}

/// Claims an order's pickup code and completes the handoff in one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupClaim {
    pub expected: OrderStatusType,
    pub new_status: OrderStatusType,
    /// Record a cash payment taken at the store, for pay-at-store orders that were not paid in advance.
    pub settle_in_cash: bool,
}

/// A conditional refund status change. It only applies if the refund is still in the `expected` status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundTransition {
    pub expected: RefundStatus,
    pub new_status: RefundStatus,
    pub proof_url: Option<String>,
    pub dispute_reason: Option<String>,
}

impl RefundTransition {
    pub fn new(expected: RefundStatus, new_status: RefundStatus) -> Self {
        Self { expected, new_status, proof_url: None, dispute_reason: None }
    }

    pub fn with_proof_url<S: Into<String>>(mut self, url: S) -> Self {
        self.proof_url = Some(url.into());
        self
    }

    pub fn with_dispute_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.dispute_reason = Some(reason.into());
        self
    }
}
