use mkt_common::Money;

use crate::{db_types::Wallet, traits::RepositoryError};

#[allow(async_fn_in_trait)]
pub trait WalletRepository {
    async fn fetch_wallet(&self, seller_id: &str) -> Result<Option<Wallet>, RepositoryError>;

    /// Returns the seller's wallet, creating an empty one in `currency` if the seller has none yet.
    async fn fetch_or_create_wallet(&self, seller_id: &str, currency: &str) -> Result<Wallet, RepositoryError>;

    /// Adds `amount` to both the balance and total earnings.
    async fn credit_wallet(&self, seller_id: &str, amount: Money, currency: &str) -> Result<Wallet, RepositoryError>;

    /// Removes a refunded `amount` from the balance and total earnings, flooring both at zero.
    async fn deduct_refund(&self, seller_id: &str, amount: Money) -> Result<Wallet, RepositoryError>;
}
