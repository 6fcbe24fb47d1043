//! Persistence collaborator: the `ChatStore` contract and an in-memory
//! reference implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::types::{AppError, AppResult, Chat, Message, Role, Vote};

/// Request/response persistence surface consumed by the chat flow. Every
/// call has its own failure mode; implementations must be safe under
/// concurrent writes.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn get_chat(&self, id: &str) -> AppResult<Option<Chat>>;
    async fn save_chat(&self, chat: Chat) -> AppResult<()>;
    /// Removes the chat along with its messages, votes and stream ids.
    async fn delete_chat(&self, id: &str) -> AppResult<Chat>;

    async fn messages_by_chat(&self, chat_id: &str) -> AppResult<Vec<Message>>;
    /// Upserts by message id, preserving insertion order for new rows.
    async fn save_messages(&self, chat_id: &str, messages: &[Message]) -> AppResult<()>;
    /// User-authored messages across this user's chats inside the rolling
    /// window ending now.
    async fn message_count_by_user(&self, user_id: &str, window: Duration) -> AppResult<usize>;

    async fn create_stream_id(&self, stream_id: &str, chat_id: &str) -> AppResult<()>;
    async fn stream_ids_by_chat(&self, chat_id: &str) -> AppResult<Vec<String>>;

    async fn votes_by_chat(&self, chat_id: &str) -> AppResult<Vec<Vote>>;
}

#[derive(Default)]
struct StoreInner {
    chats: HashMap<String, Chat>,
    messages: HashMap<String, Vec<Message>>,
    streams: HashMap<String, Vec<String>>,
    votes: HashMap<String, Vec<Vote>>,
}

/// In-memory store, the development and test double for the real database.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Votes are written by a separate feedback flow; the chat core only
    /// reads them. Exposed here so tests and demos can seed state.
    pub async fn insert_vote(&self, vote: Vote) {
        let mut inner = self.inner.write().await;
        inner
            .votes
            .entry(vote.chat_id.clone())
            .or_default()
            .push(vote);
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn get_chat(&self, id: &str) -> AppResult<Option<Chat>> {
        Ok(self.inner.read().await.chats.get(id).cloned())
    }

    async fn save_chat(&self, chat: Chat) -> AppResult<()> {
        self.inner.write().await.chats.insert(chat.id.clone(), chat);
        Ok(())
    }

    async fn delete_chat(&self, id: &str) -> AppResult<Chat> {
        let mut inner = self.inner.write().await;
        let chat = inner
            .chats
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("chat {id}")))?;
        inner.messages.remove(id);
        inner.streams.remove(id);
        inner.votes.remove(id);
        Ok(chat)
    }

    async fn messages_by_chat(&self, chat_id: &str) -> AppResult<Vec<Message>> {
        Ok(self
            .inner
            .read()
            .await
            .messages
            .get(chat_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_messages(&self, chat_id: &str, messages: &[Message]) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let rows = inner.messages.entry(chat_id.to_string()).or_default();
        for message in messages {
            match rows.iter_mut().find(|row| row.id == message.id) {
                Some(row) => *row = message.clone(),
                None => rows.push(message.clone()),
            }
        }
        Ok(())
    }

    async fn message_count_by_user(&self, user_id: &str, window: Duration) -> AppResult<usize> {
        let inner = self.inner.read().await;
        let cutoff = Utc::now() - window;

        let count = inner
            .chats
            .values()
            .filter(|chat| chat.user_id == user_id)
            .filter_map(|chat| inner.messages.get(&chat.id))
            .flatten()
            .filter(|message| message.role == Role::User && message.created_at >= cutoff)
            .count();

        Ok(count)
    }

    async fn create_stream_id(&self, stream_id: &str, chat_id: &str) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .streams
            .entry(chat_id.to_string())
            .or_default()
            .push(stream_id.to_string());
        Ok(())
    }

    async fn stream_ids_by_chat(&self, chat_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .inner
            .read()
            .await
            .streams
            .get(chat_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn votes_by_chat(&self, chat_id: &str) -> AppResult<Vec<Vote>> {
        Ok(self
            .inner
            .read()
            .await
            .votes
            .get(chat_id)
            .cloned()
            .unwrap_or_default())
    }
}
