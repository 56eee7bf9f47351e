use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewWithdrawal, Wallet, Withdrawal},
    traits::RepositoryError,
};

#[allow(async_fn_in_trait)]
pub trait WithdrawalRepository {
    /// The number of withdrawals the seller made in `[start, end)`.
    async fn count_withdrawals_between(
        &self,
        seller_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32, RepositoryError>;

    /// Reserves a withdrawal. In one transaction, with the seller's wallet locked,
    /// * counts the seller's withdrawals in the calendar month of `withdrawal.created_at`,
    /// * debits the gross amount from the wallet,
    /// * stores the withdrawal without a payout reference.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the seller already made `monthly_limit` withdrawals that month, or
    /// if the balance no longer covers the amount. Nothing is written in either case.
    async fn record_withdrawal(
        &self,
        withdrawal: NewWithdrawal,
        monthly_limit: u32,
    ) -> Result<(Withdrawal, Wallet), RepositoryError>;

    /// Stores the processor's payout reference on a reserved withdrawal.
    async fn settle_withdrawal(&self, withdrawal_id: i64, payout_reference: &str)
        -> Result<Withdrawal, RepositoryError>;

    /// Undoes a reservation whose payout failed: deletes the withdrawal and returns its amount to the balance.
    ///
    /// Fails with [`RepositoryError::NotFound`] if there is no unsettled withdrawal with this id.
    async fn cancel_withdrawal(&self, withdrawal_id: i64) -> Result<Wallet, RepositoryError>;

    /// The seller's withdrawals, most recent first.
    async fn fetch_withdrawals(&self, seller_id: &str) -> Result<Vec<Withdrawal>, RepositoryError>;
}
