use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Favorite, Message, MessageRole, NewMessage, OwnerId, Session};

mod favorites;
mod memory;
mod messages;
mod sessions;

pub use memory::MemoryStore;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

/// Owner-scoped persistence for sessions, messages and favorites.
///
/// Reads are ordered by creation time. Deleting a session does not cascade on
/// its own; callers remove messages and favorites first.
pub trait ChatStore: Send + Sync {
    fn list_sessions<'a>(&'a self, owner: &'a OwnerId) -> StoreFuture<'a, Vec<Session>>;

    fn get_session<'a>(
        &'a self,
        owner: &'a OwnerId,
        session_id: Uuid,
    ) -> StoreFuture<'a, Option<Session>>;

    fn insert_session<'a>(
        &'a self,
        owner: &'a OwnerId,
        title: &'a str,
        created_at: DateTime<Utc>,
    ) -> StoreFuture<'a, Session>;

    fn delete_session<'a>(&'a self, owner: &'a OwnerId, session_id: Uuid) -> StoreFuture<'a, bool>;

    fn list_messages<'a>(
        &'a self,
        owner: &'a OwnerId,
        session_id: Uuid,
    ) -> StoreFuture<'a, Vec<Message>>;

    fn insert_message<'a>(&'a self, message: NewMessage) -> StoreFuture<'a, Message>;

    fn delete_messages<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, u64>;

    fn list_favorites<'a>(&'a self, owner: &'a OwnerId) -> StoreFuture<'a, Vec<Favorite>>;

    /// Returns `false` when the favorite already existed.
    fn insert_favorite<'a>(&'a self, favorite: &'a Favorite) -> StoreFuture<'a, bool>;

    fn delete_favorite<'a>(&'a self, favorite: &'a Favorite) -> StoreFuture<'a, bool>;

    /// Removes session- and message-level favorites of every owner for the session.
    fn delete_session_favorites<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, u64>;
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl ChatStore for Store {
    fn list_sessions<'a>(&'a self, owner: &'a OwnerId) -> StoreFuture<'a, Vec<Session>> {
        Box::pin(self.list_chat_sessions(owner))
    }

    fn get_session<'a>(
        &'a self,
        owner: &'a OwnerId,
        session_id: Uuid,
    ) -> StoreFuture<'a, Option<Session>> {
        Box::pin(self.get_chat_session(owner, session_id))
    }

    fn insert_session<'a>(
        &'a self,
        owner: &'a OwnerId,
        title: &'a str,
        created_at: DateTime<Utc>,
    ) -> StoreFuture<'a, Session> {
        Box::pin(self.insert_chat_session(owner, title, created_at))
    }

    fn delete_session<'a>(&'a self, owner: &'a OwnerId, session_id: Uuid) -> StoreFuture<'a, bool> {
        Box::pin(self.delete_chat_session(owner, session_id))
    }

    fn list_messages<'a>(
        &'a self,
        owner: &'a OwnerId,
        session_id: Uuid,
    ) -> StoreFuture<'a, Vec<Message>> {
        Box::pin(self.list_chat_messages(owner, session_id))
    }

    fn insert_message<'a>(&'a self, message: NewMessage) -> StoreFuture<'a, Message> {
        Box::pin(async move { self.insert_chat_message(&message).await })
    }

    fn delete_messages<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, u64> {
        Box::pin(self.delete_chat_messages(session_id))
    }

    fn list_favorites<'a>(&'a self, owner: &'a OwnerId) -> StoreFuture<'a, Vec<Favorite>> {
        Box::pin(self.list_chat_favorites(owner))
    }

    fn insert_favorite<'a>(&'a self, favorite: &'a Favorite) -> StoreFuture<'a, bool> {
        Box::pin(self.insert_chat_favorite(favorite))
    }

    fn delete_favorite<'a>(&'a self, favorite: &'a Favorite) -> StoreFuture<'a, bool> {
        Box::pin(self.delete_chat_favorite(favorite))
    }

    fn delete_session_favorites<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, u64> {
        Box::pin(self.delete_chat_session_favorites(session_id))
    }
}

fn role_from_db(value: &str) -> Result<MessageRole, StoreError> {
    match value {
        "user" => Ok(MessageRole::User),
        "assistant" => Ok(MessageRole::Assistant),
        _ => Err(StoreError::InvalidData(format!(
            "unknown message role persisted: {value}"
        ))),
    }
}
