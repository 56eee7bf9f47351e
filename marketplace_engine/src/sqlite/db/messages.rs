use chrono::Utc;
use log::trace;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::{decode_json, encode_json};
use crate::db_types::{Message, NewMessage};

impl FromRow<'_, SqliteRow> for Message {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            sender: row.try_get("sender")?,
            kind: decode_json(row, "kind")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

pub async fn insert_message(message: NewMessage, conn: &mut SqliteConnection) -> Result<Message, sqlx::Error> {
    let message: Message = sqlx::query_as(
        r#"
            INSERT INTO messages (conversation_id, sender, kind, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(message.conversation_id)
    .bind(message.sender)
    .bind(encode_json(&message.kind)?)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!("💬️ Message #{} posted to {}", message.id, message.conversation_id);
    Ok(message)
}

pub async fn fetch_messages(conversation_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM messages WHERE conversation_id = $1 ORDER BY id ASC")
        .bind(conversation_id)
        .fetch_all(conn)
        .await
}
