use chrono::Utc;
use log::debug;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::{decode_json, encode_json};
use crate::db_types::{FeeSettings, Seller, Store};

impl FromRow<'_, SqliteRow> for Store {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            store_id: row.try_get("store_id")?,
            seller_id: row.try_get("seller_id")?,
            name: row.try_get("name")?,
            fee_settings: decode_json(row, "fee_settings")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for Seller {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            seller_id: row.try_get("seller_id")?,
            country: row.try_get("country")?,
            processor_account: row.try_get("processor_account")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

pub async fn upsert_store(store: Store, conn: &mut SqliteConnection) -> Result<Store, sqlx::Error> {
    let now = Utc::now();
    let store: Store = sqlx::query_as(
        r#"
            INSERT INTO stores (store_id, seller_id, name, fee_settings, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (store_id) DO UPDATE SET
                name = excluded.name,
                fee_settings = excluded.fee_settings,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(store.store_id)
    .bind(store.seller_id)
    .bind(store.name)
    .bind(encode_json(&store.fee_settings)?)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🏪️ Store {} saved for seller {}", store.store_id, store.seller_id);
    Ok(store)
}

pub async fn fetch_store(store_id: &str, conn: &mut SqliteConnection) -> Result<Option<Store>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM stores WHERE store_id = $1").bind(store_id).fetch_optional(conn).await
}

pub async fn update_fee_settings(
    store_id: &str,
    settings: &FeeSettings,
    conn: &mut SqliteConnection,
) -> Result<Option<Store>, sqlx::Error> {
    sqlx::query_as("UPDATE stores SET fee_settings = $1, updated_at = $2 WHERE store_id = $3 RETURNING *")
        .bind(encode_json(settings)?)
        .bind(Utc::now())
        .bind(store_id)
        .fetch_optional(conn)
        .await
}

pub async fn insert_seller(seller: Seller, conn: &mut SqliteConnection) -> Result<Seller, sqlx::Error> {
    let seller: Seller = sqlx::query_as(
        r#"
            INSERT INTO sellers (seller_id, country, processor_account, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(seller.seller_id)
    .bind(seller.country)
    .bind(seller.processor_account)
    .bind(seller.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🏪️ Seller {} registered in {}", seller.seller_id, seller.country);
    Ok(seller)
}

pub async fn fetch_seller(seller_id: &str, conn: &mut SqliteConnection) -> Result<Option<Seller>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM sellers WHERE seller_id = $1").bind(seller_id).fetch_optional(conn).await
}

pub async fn set_processor_account(
    seller_id: &str,
    account: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Seller>, sqlx::Error> {
    sqlx::query_as("UPDATE sellers SET processor_account = $1 WHERE seller_id = $2 RETURNING *")
        .bind(account)
        .bind(seller_id)
        .fetch_optional(conn)
        .await
}
