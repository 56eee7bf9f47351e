//! Wallet balances are read, adjusted in Rust and written back. Callers that modify a wallet must do so inside a
//! transaction, and call [`lock_wallet`] first so that concurrent writers queue up behind the lock instead of
//! overwriting each other's balances.
use chrono::Utc;
use log::trace;
use mkt_common::Money;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::decode_parsed;
use crate::{db_types::Wallet, rules::refunds::deduct_refund_from_wallet};

impl FromRow<'_, SqliteRow> for Wallet {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            seller_id: row.try_get("seller_id")?,
            balance: decode_parsed(row, "balance")?,
            total_earnings: decode_parsed(row, "total_earnings")?,
            currency: row.try_get("currency")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub async fn fetch_wallet(seller_id: &str, conn: &mut SqliteConnection) -> Result<Option<Wallet>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallets WHERE seller_id = $1").bind(seller_id).fetch_optional(conn).await
}

/// Creates an empty wallet in `currency` unless the seller already has one, and returns the seller's wallet.
pub async fn fetch_or_create_wallet(
    seller_id: &str,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<Wallet, sqlx::Error> {
    let empty = Wallet::empty(seller_id, currency);
    sqlx::query(
        r#"
            INSERT INTO wallets (seller_id, balance, total_earnings, currency, updated_at)
            VALUES ($1, $2, $2, $3, $4)
            ON CONFLICT (seller_id) DO NOTHING;
        "#,
    )
    .bind(seller_id)
    .bind(empty.balance.to_string())
    .bind(currency)
    .bind(empty.updated_at)
    .execute(&mut *conn)
    .await?;
    sqlx::query_as("SELECT * FROM wallets WHERE seller_id = $1").bind(seller_id).fetch_one(conn).await
}

/// Takes the database write lock by touching the wallet row. Within a transaction, this must be the first statement
/// that modifies a wallet.
pub async fn lock_wallet(seller_id: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE wallets SET updated_at = $1 WHERE seller_id = $2")
        .bind(Utc::now())
        .bind(seller_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn save_wallet(wallet: &Wallet, conn: &mut SqliteConnection) -> Result<Wallet, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE wallets SET balance = $1, total_earnings = $2, updated_at = $3
            WHERE seller_id = $4
            RETURNING *;
        "#,
    )
    .bind(wallet.balance.to_string())
    .bind(wallet.total_earnings.to_string())
    .bind(Utc::now())
    .bind(&wallet.seller_id)
    .fetch_one(conn)
    .await
}

/// Adds `amount` to the balance and total earnings. Call inside a transaction.
pub async fn credit_wallet(
    seller_id: &str,
    amount: Money,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<Wallet, sqlx::Error> {
    // The insert in `fetch_or_create_wallet` takes the write lock before the balance is read.
    let mut wallet = fetch_or_create_wallet(seller_id, currency, &mut *conn).await?;
    wallet.balance += amount;
    wallet.total_earnings += amount;
    let wallet = save_wallet(&wallet, conn).await?;
    trace!("💰️ Credited {amount} to seller {seller_id}. Balance: {}", wallet.balance);
    Ok(wallet)
}

/// Removes a refunded amount from the balance and total earnings, flooring both at zero. Call inside a transaction.
pub async fn deduct_refund(seller_id: &str, amount: Money, conn: &mut SqliteConnection) -> Result<Wallet, sqlx::Error> {
    lock_wallet(seller_id, &mut *conn).await?;
    let Some(wallet) = fetch_wallet(seller_id, &mut *conn).await? else {
        return Err(sqlx::Error::RowNotFound);
    };
    let wallet = deduct_refund_from_wallet(&wallet, amount);
    let wallet = save_wallet(&wallet, conn).await?;
    trace!("💰️ Deducted refund of {amount} from seller {seller_id}. Balance: {}", wallet.balance);
    Ok(wallet)
}

/// Debits a withdrawal from the balance. Returns `None` if the balance does not cover `amount`. Call inside a
/// transaction.
pub async fn debit_withdrawal(
    seller_id: &str,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, sqlx::Error> {
    lock_wallet(seller_id, &mut *conn).await?;
    let Some(mut wallet) = fetch_wallet(seller_id, &mut *conn).await? else {
        return Ok(None);
    };
    if wallet.balance < amount {
        return Ok(None);
    }
    wallet.balance -= amount;
    let wallet = save_wallet(&wallet, conn).await?;
    trace!("💰️ Debited withdrawal of {amount} from seller {seller_id}. Balance: {}", wallet.balance);
    Ok(Some(wallet))
}

/// Puts a cancelled withdrawal back on the balance. Total earnings are left alone. Call inside a transaction.
pub async fn return_withdrawal(
    seller_id: &str,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Wallet, sqlx::Error> {
    lock_wallet(seller_id, &mut *conn).await?;
    let Some(mut wallet) = fetch_wallet(seller_id, &mut *conn).await? else {
        return Err(sqlx::Error::RowNotFound);
    };
    wallet.balance += amount;
    let wallet = save_wallet(&wallet, conn).await?;
    trace!("💰️ Returned withdrawal of {amount} to seller {seller_id}. Balance: {}", wallet.balance);
    Ok(wallet)
}
