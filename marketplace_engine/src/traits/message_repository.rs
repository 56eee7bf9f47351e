use crate::{
    db_types::{Message, NewMessage},
    traits::RepositoryError,
};

#[allow(async_fn_in_trait)]
pub trait MessageRepository {
    async fn insert_message(&self, message: NewMessage) -> Result<Message, RepositoryError>;

    /// The conversation's messages in the order they were posted.
    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, RepositoryError>;
}
