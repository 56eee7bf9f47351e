use chrono::Utc;
use log::{debug, trace};
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::{decode_json, decode_json_opt, decode_parsed, decode_parsed_opt, encode_json};
use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatusType, PaymentMethod, RefundStatus},
    rules::pickup_code::PickupCode,
    traits::{OrderStatusChange, PickupClaim},
};

impl FromRow<'_, SqliteRow> for Order {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            order_id: OrderId(row.try_get("order_id")?),
            store_id: row.try_get("store_id")?,
            customer_id: row.try_get("customer_id")?,
            currency: row.try_get("currency")?,
            delivery_type: decode_parsed(row, "delivery_type")?,
            status: decode_parsed(row, "status")?,
            items: decode_json(row, "items")?,
            items_locked: row.try_get("items_locked")?,
            fees: decode_json_opt(row, "fees")?,
            payment_method: decode_parsed_opt(row, "payment_method")?,
            payment_reference: row.try_get("payment_reference")?,
            pickup_code: decode_parsed_opt(row, "pickup_code")?,
            pickup_code_used: row.try_get("pickup_code_used")?,
            refund_status: decode_parsed_opt(row, "refund_status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Inserts a new order with an empty cart. This is not atomic on its own. Embed the call in a transaction if you need
/// that, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let now = Utc::now();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                store_id,
                customer_id,
                currency,
                delivery_type,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(order.store_id)
    .bind(order.customer_id)
    .bind(order.currency)
    .bind(order.delivery_type.to_string())
    .bind(OrderStatusType::Shopping.to_string())
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("📦️ Order {} inserted with id {}", order.order_id, order.id);
    Ok(order)
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

pub async fn fetch_orders_for_store(store_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE store_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(store_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_orders_for_customer(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(customer_id)
        .fetch_all(conn)
        .await
}

/// Overwrites the cart. Returns `None` if the order is not `shopping`, or its cart has been locked.
pub async fn replace_items(
    order_id: &OrderId,
    items: &[OrderItem],
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET items = $1, updated_at = $2
            WHERE order_id = $3 AND status = $4 AND items_locked = 0
            RETURNING *;
        "#,
    )
    .bind(encode_json(&items)?)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .bind(OrderStatusType::Shopping.to_string())
    .fetch_optional(conn)
    .await?;
    trace!("📦️ Cart of order {order_id} replaced with {} line(s)", items.len());
    Ok(order)
}

/// Moves the order from `change.expected` to `change.new_status`. Returns `None` if the order was not in the expected
/// status.
///
/// Any status other than `shopping` locks the cart, and the lock is never cleared.
pub async fn change_status(
    order_id: &OrderId,
    change: OrderStatusChange,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let lock = change.new_status != OrderStatusType::Shopping;
    let fees = change.fees.as_ref().map(encode_json).transpose()?;
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                items_locked = items_locked OR $2,
                fees = COALESCE($3, fees),
                payment_method = COALESCE($4, payment_method),
                payment_reference = COALESCE($5, payment_reference),
                updated_at = $6
            WHERE order_id = $7 AND status = $8
            RETURNING *;
        "#,
    )
    .bind(change.new_status.to_string())
    .bind(lock)
    .bind(fees)
    .bind(change.payment_method.map(|m| m.to_string()))
    .bind(change.payment_reference)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .bind(change.expected.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Returns `None` if the order already has a pickup code.
pub async fn set_pickup_code(
    order_id: &OrderId,
    code: &PickupCode,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE orders SET pickup_code = $1, updated_at = $2 WHERE order_id = $3 AND pickup_code IS NULL RETURNING *",
    )
    .bind(code.as_str())
    .bind(Utc::now())
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await
}

pub async fn pickup_code_in_use(
    store_id: &str,
    code: &PickupCode,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let in_use: bool = sqlx::query_scalar(
        r#"
            SELECT EXISTS (
                SELECT 1 FROM orders
                WHERE store_id = $1
                  AND pickup_code = $2
                  AND pickup_code_used = 0
                  AND status NOT IN ($3, $4, $5)
            );
        "#,
    )
    .bind(store_id)
    .bind(code.as_str())
    .bind(OrderStatusType::Delivered.to_string())
    .bind(OrderStatusType::Collected.to_string())
    .bind(OrderStatusType::Cancelled.to_string())
    .fetch_one(conn)
    .await?;
    Ok(in_use)
}

/// Marks the code as used and applies the handoff status. Returns `None` if the code was already used, the order has
/// no code, or the order is not in the expected status.
pub async fn claim_pickup_code(
    order_id: &OrderId,
    claim: PickupClaim,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let cash = claim.settle_in_cash.then(|| PaymentMethod::Cash.to_string());
    sqlx::query_as(
        r#"
            UPDATE orders SET
                pickup_code_used = 1,
                items_locked = 1,
                status = $1,
                payment_method = COALESCE(payment_method, $2),
                updated_at = $3
            WHERE order_id = $4 AND status = $5 AND pickup_code_used = 0 AND pickup_code IS NOT NULL
            RETURNING *;
        "#,
    )
    .bind(claim.new_status.to_string())
    .bind(cash)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .bind(claim.expected.to_string())
    .fetch_optional(conn)
    .await
}

pub async fn set_refund_status(
    order_id: &OrderId,
    status: RefundStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("UPDATE orders SET refund_status = $1, updated_at = $2 WHERE order_id = $3 RETURNING *")
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await
}

/// Sets the refund status only while the order has no active refund (none yet, or the last one was rejected).
pub async fn claim_refund(
    order_id: &OrderId,
    status: RefundStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET refund_status = $1, updated_at = $2
            WHERE order_id = $3 AND (refund_status IS NULL OR refund_status = 'rejected')
            RETURNING *;
        "#,
    )
    .bind(status.to_string())
    .bind(Utc::now())
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await
}

/// Resets the order's refund status to that of its most recent remaining refund, or NULL if there is none.
pub async fn restore_refund_status(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE orders SET
                refund_status = (SELECT status FROM refunds WHERE order_id = $1 ORDER BY id DESC LIMIT 1),
                updated_at = $2
            WHERE order_id = $1;
        "#,
    )
    .bind(order_id.as_str())
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}
