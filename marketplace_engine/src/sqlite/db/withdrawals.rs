use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::decode_parsed;
use crate::db_types::{NewWithdrawal, Withdrawal};

impl FromRow<'_, SqliteRow> for Withdrawal {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            seller_id: row.try_get("seller_id")?,
            amount: decode_parsed(row, "amount")?,
            tax: decode_parsed(row, "tax")?,
            net_amount: decode_parsed(row, "net_amount")?,
            currency: row.try_get("currency")?,
            country: row.try_get("country")?,
            payout_reference: row.try_get("payout_reference")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

pub async fn count_between(
    seller_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u32, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM withdrawals WHERE seller_id = $1 AND created_at >= $2 AND created_at < $3",
    )
    .bind(seller_id)
    .bind(start)
    .bind(end)
    .fetch_one(conn)
    .await?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

pub async fn insert_withdrawal(
    withdrawal: NewWithdrawal,
    conn: &mut SqliteConnection,
) -> Result<Withdrawal, sqlx::Error> {
    let withdrawal: Withdrawal = sqlx::query_as(
        r#"
            INSERT INTO withdrawals (
                seller_id,
                amount,
                tax,
                net_amount,
                currency,
                country,
                payout_reference,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(withdrawal.seller_id)
    .bind(withdrawal.amount.to_string())
    .bind(withdrawal.tax.to_string())
    .bind(withdrawal.net_amount.to_string())
    .bind(withdrawal.currency)
    .bind(withdrawal.country)
    .bind(withdrawal.payout_reference)
    .bind(withdrawal.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🏦️ Withdrawal #{} of {} stored for seller {}", withdrawal.id, withdrawal.amount, withdrawal.seller_id);
    Ok(withdrawal)
}

pub async fn fetch_withdrawals(seller_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Withdrawal>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM withdrawals WHERE seller_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(seller_id)
        .fetch_all(conn)
        .await
}

/// Stores the processor's payout reference on a reserved withdrawal.
pub async fn settle_withdrawal(
    withdrawal_id: i64,
    payout_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Withdrawal>, sqlx::Error> {
    sqlx::query_as("UPDATE withdrawals SET payout_reference = $1 WHERE id = $2 RETURNING *")
        .bind(payout_reference)
        .bind(withdrawal_id)
        .fetch_optional(conn)
        .await
}

/// Deletes a withdrawal that has no payout reference yet. Returns `None` if there is no such withdrawal.
pub async fn delete_unsettled_withdrawal(
    withdrawal_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Withdrawal>, sqlx::Error> {
    sqlx::query_as("DELETE FROM withdrawals WHERE id = $1 AND payout_reference IS NULL RETURNING *")
        .bind(withdrawal_id)
        .fetch_optional(conn)
        .await
}
