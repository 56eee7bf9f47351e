use thiserror::Error;

use crate::{
    db_types::{Order, OrderId, Refund, Wallet},
    traits::{
        MessageRepository,
        OrderRepository,
        OrderStatusChange,
        RefundRepository,
        SellerRepository,
        StoreRepository,
        WalletRepository,
        WithdrawalRepository,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the marketplace engine.
///
/// Besides the individual repositories, a backend provides the operations that span several records and must succeed
/// or fail as a unit.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase:
    Clone
    + OrderRepository
    + StoreRepository
    + SellerRepository
    + WalletRepository
    + RefundRepository
    + WithdrawalRepository
    + MessageRepository
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// In a single atomic transaction,
    /// * applies the `change` to the order (which must move it to `Paid`),
    /// * if the payment was settled through the payment processor, credits the seller's share of the frozen fees
    ///   (subtotal plus delivery fee) to `seller_id`'s wallet. The service fee is kept by the platform.
    ///
    /// Returns the paid order and the seller's wallet after the credit.
    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        seller_id: &str,
        change: OrderStatusChange,
    ) -> Result<(Order, Wallet), RepositoryError>;

    /// In a single atomic transaction,
    /// * moves the refund from `Processing` to `Completed` and stores the processor's refund id,
    /// * deducts the refund amount from `seller_id`'s wallet, flooring balance and earnings at zero,
    /// * marks the order's refund status as completed.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the refund is not `Processing`.
    async fn complete_refund(
        &self,
        refund_id: i64,
        seller_id: &str,
        processor_refund_id: &str,
    ) -> Result<(Refund, Wallet), RepositoryError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("Cannot insert {0}, since it already exists")]
    AlreadyExists(String),
    #[error("The requested {0} does not exist")]
    NotFound(String),
    /// A conditional update found the record in a different state than expected.
    #[error("The record was changed by someone else: {0}")]
    Conflict(String),
    #[error("Stored data could not be decoded. {0}")]
    CorruptData(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref de) if de.is_unique_violation() => {
                RepositoryError::AlreadyExists(de.message().to_string())
            },
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            sqlx::Error::ColumnDecode { index, source } => {
                RepositoryError::CorruptData(format!("column {index}: {source}"))
            },
            e => RepositoryError::DatabaseError(e.to_string()),
        }
    }
}
