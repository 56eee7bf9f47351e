use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Message, MessageKind, NewMessage},
    mp_api::errors::MarketplaceError,
    rules::validation::ValidationErrors,
    traits::MessageRepository,
};

/// Longest text message accepted, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4_000;

/// Buyer/seller conversations.
pub struct MessagingApi<B> {
    db: B,
}

impl<B> Debug for MessagingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessagingApi")
    }
}

impl<B> MessagingApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> MessagingApi<B>
where B: MessageRepository
{
    /// Posts a message written by a person. System message kinds are reserved for the order flow.
    pub async fn send(
        &self,
        conversation_id: &str,
        sender: &str,
        kind: MessageKind,
    ) -> Result<Message, MarketplaceError> {
        let mut errors = ValidationErrors::new();
        errors
            .check(!conversation_id.trim().is_empty(), "A conversation is required")
            .check(!sender.trim().is_empty(), "A sender is required")
            .check(!kind.is_system(), "Only text and image messages can be sent directly");
        match &kind {
            MessageKind::Text { body } => {
                errors
                    .check(!body.trim().is_empty(), "The message is empty")
                    .check(body.chars().count() <= MAX_MESSAGE_LENGTH, "The message is too long");
            },
            MessageKind::Image { url } => {
                errors.check(url.starts_with("https://") || url.starts_with("http://"), "The image must be a web link");
            },
            _ => {},
        }
        errors.into_result()?;
        let message = self.db.insert_message(NewMessage::new(conversation_id, sender, kind)).await?;
        trace!("💬️ Message #{} posted to {conversation_id} by {sender}", message.id);
        Ok(message)
    }

    pub async fn send_text(
        &self,
        conversation_id: &str,
        sender: &str,
        body: &str,
    ) -> Result<Message, MarketplaceError> {
        self.send(conversation_id, sender, MessageKind::Text { body: body.to_string() }).await
    }

    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, MarketplaceError> {
        Ok(self.db.fetch_messages(conversation_id).await?)
    }
}
