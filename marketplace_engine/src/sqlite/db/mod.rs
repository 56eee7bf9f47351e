//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open a transaction when several calls must succeed or fail
//! together, and pass `&mut *tx` through without any other changes.
//!
//! Values that SQLite has no native type for are stored as TEXT: money as decimal strings, enums as their tags and
//! composite values as JSON. The helpers below decode them, reporting failures as column decode errors.
use std::{env, str::FromStr};

use log::info;
use serde::de::DeserializeOwned;
use sqlx::{sqlite::SqlitePoolOptions, sqlite::SqliteRow, Error as SqlxError, Row, SqlitePool};

pub mod messages;
pub mod orders;
pub mod refunds;
pub mod stores;
pub mod wallets;
pub mod withdrawals;

const SQLITE_DB_URL: &str = "sqlite://data/marketplace.db";

pub fn db_url() -> String {
    let result = env::var("MKT_DATABASE_URL").unwrap_or_else(|_| {
        info!("MKT_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

fn decode_error<E>(column: &str, e: E) -> SqlxError
where E: std::error::Error + Send + Sync + 'static {
    SqlxError::ColumnDecode { index: column.to_string(), source: Box::new(e) }
}

/// Decodes a column written with `Display` back into `T`, e.g. money or an enum tag.
pub(crate) fn decode_parsed<T>(row: &SqliteRow, column: &str) -> Result<T, SqlxError>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = row.try_get::<String, _>(column)?;
    value.parse::<T>().map_err(|e| decode_error(column, e))
}

/// Like [`decode_parsed`], for nullable columns.
pub(crate) fn decode_parsed_opt<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, SqlxError>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    row.try_get::<Option<String>, _>(column)?
        .map(|value| value.parse::<T>().map_err(|e| decode_error(column, e)))
        .transpose()
}

pub(crate) fn decode_json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T, SqlxError> {
    let value = row.try_get::<String, _>(column)?;
    serde_json::from_str(&value).map_err(|e| decode_error(column, e))
}

pub(crate) fn decode_json_opt<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<Option<T>, SqlxError> {
    row.try_get::<Option<String>, _>(column)?
        .map(|value| serde_json::from_str(&value).map_err(|e| decode_error(column, e)))
        .transpose()
}

pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, SqlxError> {
    serde_json::to_string(value).map_err(|e| SqlxError::Decode(Box::new(e)))
}
