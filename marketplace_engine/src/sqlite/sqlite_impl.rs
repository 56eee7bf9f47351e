//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Conditional updates that match no row are reported as [`RepositoryError::Conflict`].
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use mkt_common::Money;
use sqlx::SqlitePool;

use super::db::{db_url, messages, new_pool, orders, refunds, stores, wallets, withdrawals};
use crate::{
    db_types::{
        FeeSettings,
        Message,
        NewMessage,
        NewOrder,
        NewRefund,
        NewWithdrawal,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        Refund,
        RefundStatus,
        Seller,
        Store,
        Wallet,
        Withdrawal,
    },
    rules::{pickup_code::PickupCode, withdrawals::month_bounds},
    traits::{
        MarketplaceDatabase,
        MessageRepository,
        OrderRepository,
        OrderStatusChange,
        PickupClaim,
        RefundRepository,
        RefundTransition,
        RepositoryError,
        SellerRepository,
        StoreRepository,
        WalletRepository,
        WithdrawalRepository,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

fn order_conflict(order_id: &OrderId, what: &str) -> RepositoryError {
    RepositoryError::Conflict(format!("order {order_id} {what}"))
}

impl OrderRepository for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(order_id, &mut conn).await?)
    }

    async fn fetch_orders_for_store(&self, store_id: &str) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_store(store_id, &mut conn).await?)
    }

    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_customer(customer_id, &mut conn).await?)
    }

    async fn replace_items(&self, order_id: &OrderId, items: &[OrderItem]) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::replace_items(order_id, items, &mut tx)
            .await?
            .ok_or_else(|| order_conflict(order_id, "no longer accepts cart changes"))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn change_status(&self, order_id: &OrderId, change: OrderStatusChange) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let expected = change.expected;
        let order = orders::change_status(order_id, change, &mut tx)
            .await?
            .ok_or_else(|| order_conflict(order_id, &format!("is no longer {expected}")))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn set_pickup_code(&self, order_id: &OrderId, code: &PickupCode) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::set_pickup_code(order_id, code, &mut tx)
            .await?
            .ok_or_else(|| order_conflict(order_id, "already has a pickup code"))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn pickup_code_in_use(&self, store_id: &str, code: &PickupCode) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::pickup_code_in_use(store_id, code, &mut conn).await?)
    }

    async fn claim_pickup_code(&self, order_id: &OrderId, claim: PickupClaim) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::claim_pickup_code(order_id, claim, &mut tx)
            .await?
            .ok_or_else(|| order_conflict(order_id, "has no unused pickup code to claim"))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn set_refund_status(&self, order_id: &OrderId, status: RefundStatus) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::set_refund_status(order_id, status, &mut tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("order {order_id}")))?;
        tx.commit().await?;
        Ok(order)
    }
}

impl StoreRepository for SqliteDatabase {
    async fn upsert_store(&self, store: Store) -> Result<Store, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let store = stores::upsert_store(store, &mut tx).await?;
        tx.commit().await?;
        Ok(store)
    }

    async fn fetch_store(&self, store_id: &str) -> Result<Option<Store>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(stores::fetch_store(store_id, &mut conn).await?)
    }

    async fn update_fee_settings(&self, store_id: &str, settings: &FeeSettings) -> Result<Store, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let store = stores::update_fee_settings(store_id, settings, &mut tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("store {store_id}")))?;
        tx.commit().await?;
        Ok(store)
    }
}

impl SellerRepository for SqliteDatabase {
    async fn insert_seller(&self, seller: Seller) -> Result<Seller, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let seller = stores::insert_seller(seller, &mut tx).await?;
        tx.commit().await?;
        Ok(seller)
    }

    async fn fetch_seller(&self, seller_id: &str) -> Result<Option<Seller>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(stores::fetch_seller(seller_id, &mut conn).await?)
    }

    async fn set_processor_account(&self, seller_id: &str, account: &str) -> Result<Seller, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let seller = stores::set_processor_account(seller_id, account, &mut tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("seller {seller_id}")))?;
        tx.commit().await?;
        Ok(seller)
    }
}

impl WalletRepository for SqliteDatabase {
    async fn fetch_wallet(&self, seller_id: &str) -> Result<Option<Wallet>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(wallets::fetch_wallet(seller_id, &mut conn).await?)
    }

    async fn fetch_or_create_wallet(&self, seller_id: &str, currency: &str) -> Result<Wallet, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::fetch_or_create_wallet(seller_id, currency, &mut tx).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    async fn credit_wallet(&self, seller_id: &str, amount: Money, currency: &str) -> Result<Wallet, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::credit_wallet(seller_id, amount, currency, &mut tx).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    async fn deduct_refund(&self, seller_id: &str, amount: Money) -> Result<Wallet, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::deduct_refund(seller_id, amount, &mut tx).await.map_err(|e| match e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(format!("wallet for seller {seller_id}")),
            e => e.into(),
        })?;
        tx.commit().await?;
        Ok(wallet)
    }
}

impl RefundRepository for SqliteDatabase {
    async fn insert_refund(&self, refund: NewRefund, status: RefundStatus) -> Result<Refund, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order_id = refund.order_id.clone();
        if orders::claim_refund(&order_id, status, &mut tx).await?.is_none() {
            tx.rollback().await?;
            return match self.fetch_order(&order_id).await? {
                Some(_) => Err(order_conflict(&order_id, "already has an active refund")),
                None => Err(RepositoryError::NotFound(format!("order {order_id}"))),
            };
        }
        let refund = refunds::insert_refund(refund, status, &mut tx).await?;
        tx.commit().await?;
        Ok(refund)
    }

    async fn fetch_refund(&self, refund_id: i64) -> Result<Option<Refund>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(refunds::fetch_refund(refund_id, &mut conn).await?)
    }

    async fn fetch_refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<Refund>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(refunds::fetch_refunds_for_order(order_id, &mut conn).await?)
    }

    async fn transition_refund(&self, refund_id: i64, change: RefundTransition) -> Result<Refund, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let expected = change.expected;
        let refund = refunds::transition_refund(refund_id, change, &mut tx)
            .await?
            .ok_or_else(|| RepositoryError::Conflict(format!("refund #{refund_id} is no longer {expected}")))?;
        orders::set_refund_status(&refund.order_id, refund.status, &mut tx).await?;
        tx.commit().await?;
        Ok(refund)
    }

    async fn discard_refund(&self, refund_id: i64) -> Result<Refund, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(refund) = refunds::delete_requested_refund(refund_id, &mut tx).await? else {
            tx.rollback().await?;
            return Err(RepositoryError::Conflict(format!("refund #{refund_id} is no longer requested")));
        };
        orders::restore_refund_status(&refund.order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("💸️ Refund #{refund_id} for order {} discarded", refund.order_id);
        Ok(refund)
    }
}

impl WithdrawalRepository for SqliteDatabase {
    async fn count_withdrawals_between(
        &self,
        seller_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(withdrawals::count_between(seller_id, start, end, &mut conn).await?)
    }

    async fn record_withdrawal(
        &self,
        withdrawal: NewWithdrawal,
        monthly_limit: u32,
    ) -> Result<(Withdrawal, Wallet), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let seller_id = withdrawal.seller_id.clone();
        let amount = withdrawal.amount;
        // Taking the wallet lock first serialises the count below with other withdrawals by the same seller.
        wallets::lock_wallet(&seller_id, &mut tx).await?;
        let (start, end) = month_bounds(withdrawal.created_at);
        let made = withdrawals::count_between(&seller_id, start, end, &mut tx).await?;
        if made >= monthly_limit {
            tx.rollback().await?;
            return Err(RepositoryError::Conflict(format!(
                "seller {seller_id} already made {made} of {monthly_limit} withdrawals this month"
            )));
        }
        let Some(wallet) = wallets::debit_withdrawal(&seller_id, amount, &mut tx).await? else {
            tx.rollback().await?;
            return Err(RepositoryError::Conflict(format!("wallet of seller {seller_id} does not cover {amount}")));
        };
        let withdrawal = withdrawals::insert_withdrawal(withdrawal, &mut tx).await?;
        tx.commit().await?;
        Ok((withdrawal, wallet))
    }

    async fn settle_withdrawal(
        &self,
        withdrawal_id: i64,
        payout_reference: &str,
    ) -> Result<Withdrawal, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let withdrawal = withdrawals::settle_withdrawal(withdrawal_id, payout_reference, &mut tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("withdrawal #{withdrawal_id}")))?;
        tx.commit().await?;
        Ok(withdrawal)
    }

    async fn cancel_withdrawal(&self, withdrawal_id: i64) -> Result<Wallet, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(withdrawal) = withdrawals::delete_unsettled_withdrawal(withdrawal_id, &mut tx).await? else {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!("unsettled withdrawal #{withdrawal_id}")));
        };
        let wallet = wallets::return_withdrawal(&withdrawal.seller_id, withdrawal.amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🏦️ Withdrawal #{withdrawal_id} cancelled. Seller {} balance: {}", withdrawal.seller_id, wallet.balance);
        Ok(wallet)
    }

    async fn fetch_withdrawals(&self, seller_id: &str) -> Result<Vec<Withdrawal>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(withdrawals::fetch_withdrawals(seller_id, &mut conn).await?)
    }
}

impl MessageRepository for SqliteDatabase {
    async fn insert_message(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let message = messages::insert_message(message, &mut tx).await?;
        tx.commit().await?;
        Ok(message)
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(messages::fetch_messages(conversation_id, &mut conn).await?)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        seller_id: &str,
        change: OrderStatusChange,
    ) -> Result<(Order, Wallet), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let expected = change.expected;
        let order = orders::change_status(order_id, change, &mut tx)
            .await?
            .ok_or_else(|| order_conflict(order_id, &format!("is no longer {expected}")))?;
        if order.status != OrderStatusType::Paid {
            return Err(RepositoryError::DatabaseError(format!(
                "order {order_id} must move to paid when a payment is recorded, not {}",
                order.status
            )));
        }
        let settled = order.payment_method.is_some_and(|m| m.is_processor_settled());
        let wallet = match (&order.fees, settled) {
            (Some(fees), true) => {
                wallets::credit_wallet(seller_id, fees.seller_share(), &order.currency, &mut tx).await?
            },
            _ => wallets::fetch_or_create_wallet(seller_id, &order.currency, &mut tx).await?,
        };
        tx.commit().await?;
        debug!("💰️ Order {order_id} marked as paid. Seller {seller_id} balance: {}", wallet.balance);
        Ok((order, wallet))
    }

    async fn complete_refund(
        &self,
        refund_id: i64,
        seller_id: &str,
        processor_refund_id: &str,
    ) -> Result<(Refund, Wallet), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let refund = refunds::complete_refund(refund_id, processor_refund_id, &mut tx)
            .await?
            .ok_or_else(|| RepositoryError::Conflict(format!("refund #{refund_id} is not processing")))?;
        let wallet = wallets::deduct_refund(seller_id, refund.amount, &mut tx).await.map_err(|e| match e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(format!("wallet for seller {seller_id}")),
            e => e.into(),
        })?;
        orders::set_refund_status(&refund.order_id, refund.status, &mut tx).await?;
        tx.commit().await?;
        debug!("💸️ Refund #{refund_id} completed. Seller {seller_id} balance: {}", wallet.balance);
        Ok((refund, wallet))
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `MKT_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
