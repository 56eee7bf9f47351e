use crate::{
    db_types::{NewRefund, OrderId, Refund, RefundStatus},
    traits::{RefundTransition, RepositoryError},
};

#[allow(async_fn_in_trait)]
pub trait RefundRepository {
    /// Stores the refund in `status` and mirrors that status on the order, atomically.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the order already has a refund that was not rejected.
    async fn insert_refund(&self, refund: NewRefund, status: RefundStatus) -> Result<Refund, RepositoryError>;

    async fn fetch_refund(&self, refund_id: i64) -> Result<Option<Refund>, RepositoryError>;

    /// All refunds for the order, oldest first.
    async fn fetch_refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<Refund>, RepositoryError>;

    /// Applies a conditional status change to the refund, and mirrors the new status on its order.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the refund is no longer in the expected status.
    async fn transition_refund(&self, refund_id: i64, change: RefundTransition) -> Result<Refund, RepositoryError>;

    /// Deletes a refund that never left `Requested` and restores the order's refund status to what it was before.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the refund has already moved on.
    async fn discard_refund(&self, refund_id: i64) -> Result<Refund, RepositoryError>;
}
