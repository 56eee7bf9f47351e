use chrono::Utc;
use log::debug;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::{decode_parsed, decode_parsed_opt};
use crate::{
    db_types::{NewRefund, OrderId, Refund, RefundStatus},
    traits::RefundTransition,
};

impl FromRow<'_, SqliteRow> for Refund {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            order_id: OrderId(row.try_get("order_id")?),
            amount: decode_parsed(row, "amount")?,
            currency: row.try_get("currency")?,
            reason: row.try_get("reason")?,
            payment_method: decode_parsed(row, "payment_method")?,
            requires_stripe_refund: row.try_get("requires_stripe_refund")?,
            charge_reference: row.try_get("charge_reference")?,
            initiator: decode_parsed(row, "initiator")?,
            status: decode_parsed(row, "status")?,
            proof_url: row.try_get("proof_url")?,
            dispute_reason: row.try_get("dispute_reason")?,
            processor_refund_id: row.try_get("processor_refund_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub async fn insert_refund(
    refund: NewRefund,
    status: RefundStatus,
    conn: &mut SqliteConnection,
) -> Result<Refund, sqlx::Error> {
    let requires_stripe_refund = refund.requires_stripe_refund();
    let refund: Refund = sqlx::query_as(
        r#"
            INSERT INTO refunds (
                order_id,
                amount,
                currency,
                reason,
                payment_method,
                requires_stripe_refund,
                charge_reference,
                initiator,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(refund.order_id.as_str())
    .bind(refund.amount.to_string())
    .bind(refund.currency)
    .bind(refund.reason)
    .bind(refund.payment_method.to_string())
    .bind(requires_stripe_refund)
    .bind(refund.charge_reference)
    .bind(refund.initiator.to_string())
    .bind(status.to_string())
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("💸️ Refund #{} for order {} stored as {}", refund.id, refund.order_id, refund.status);
    Ok(refund)
}

pub async fn fetch_refund(refund_id: i64, conn: &mut SqliteConnection) -> Result<Option<Refund>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM refunds WHERE id = $1").bind(refund_id).fetch_optional(conn).await
}

pub async fn fetch_refunds_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Refund>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM refunds WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

/// Returns `None` if the refund is not in `change.expected`.
pub async fn transition_refund(
    refund_id: i64,
    change: RefundTransition,
    conn: &mut SqliteConnection,
) -> Result<Option<Refund>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE refunds SET
                status = $1,
                proof_url = COALESCE($2, proof_url),
                dispute_reason = COALESCE($3, dispute_reason),
                updated_at = $4
            WHERE id = $5 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(change.new_status.to_string())
    .bind(change.proof_url)
    .bind(change.dispute_reason)
    .bind(Utc::now())
    .bind(refund_id)
    .bind(change.expected.to_string())
    .fetch_optional(conn)
    .await
}

/// Moves a `processing` refund to `completed`. Returns `None` if the refund is not `processing`.
pub async fn complete_refund(
    refund_id: i64,
    processor_refund_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Refund>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE refunds SET status = $1, processor_refund_id = $2, updated_at = $3
            WHERE id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(RefundStatus::Completed.to_string())
    .bind(processor_refund_id)
    .bind(Utc::now())
    .bind(refund_id)
    .bind(RefundStatus::Processing.to_string())
    .fetch_optional(conn)
    .await
}

/// Deletes a refund that is still `requested`. Returns `None` if it has moved on.
pub async fn delete_requested_refund(
    refund_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Refund>, sqlx::Error> {
    sqlx::query_as("DELETE FROM refunds WHERE id = $1 AND status = $2 RETURNING *")
        .bind(refund_id)
        .bind(RefundStatus::Requested.to_string())
        .fetch_optional(conn)
        .await
}
