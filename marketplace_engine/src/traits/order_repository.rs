use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, RefundStatus},
    rules::pickup_code::PickupCode,
    traits::{OrderStatusChange, PickupClaim, RepositoryError},
};

/// Storage for orders.
#[allow(async_fn_in_trait)]
pub trait OrderRepository {
    /// Stores a new order in `shopping` status with an empty cart.
    ///
    /// Fails with [`RepositoryError::AlreadyExists`] if an order with the same order id exists.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// All orders placed at the store, oldest first.
    async fn fetch_orders_for_store(&self, store_id: &str) -> Result<Vec<Order>, RepositoryError>;

    /// All orders placed by the customer, oldest first.
    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, RepositoryError>;

    /// Replaces the cart contents.
    ///
    /// Only applies while the order is `shopping` and the cart has never been locked. Otherwise fails with
    /// [`RepositoryError::Conflict`].
    async fn replace_items(&self, order_id: &OrderId, items: &[OrderItem]) -> Result<Order, RepositoryError>;

    /// Applies a conditional status change.
    ///
    /// Leaving `shopping` locks the cart for good. Fails with [`RepositoryError::Conflict`] if the order is no longer
    /// in the expected status.
    async fn change_status(&self, order_id: &OrderId, change: OrderStatusChange) -> Result<Order, RepositoryError>;

    /// Attaches a pickup code to an order that does not have one yet.
    async fn set_pickup_code(&self, order_id: &OrderId, code: &PickupCode) -> Result<Order, RepositoryError>;

    /// True if another open order of the store already uses `code`, and it has not been claimed yet.
    async fn pickup_code_in_use(&self, store_id: &str, code: &PickupCode) -> Result<bool, RepositoryError>;

    /// Marks the pickup code as used and completes the handoff.
    ///
    /// This succeeds exactly once per order. Any later attempt, or an attempt while the order is not in the expected
    /// status, fails with [`RepositoryError::Conflict`].
    async fn claim_pickup_code(&self, order_id: &OrderId, claim: PickupClaim) -> Result<Order, RepositoryError>;

    /// Records the progress of a refund on the order itself.
    async fn set_refund_status(&self, order_id: &OrderId, status: RefundStatus) -> Result<Order, RepositoryError>;
}
