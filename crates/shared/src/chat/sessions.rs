use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Favorite, OwnerId, Session};
use crate::repos::{ChatStore, StoreError};

use super::context::SessionContext;
use super::conversation::{Conversation, TranscriptEntry};

pub const MAX_SESSION_TITLE_CHARS: usize = 100;
const UNTITLED_SESSION: &str = "New chat";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("chat session {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(_) => "This conversation no longer exists.".to_string(),
            Self::Store(_) => "Chat history is temporarily unavailable.".to_string(),
        }
    }
}

/// Derives a session title from the opening message.
pub fn session_title(seed: &str) -> String {
    let trimmed = seed.trim();
    if trimmed.is_empty() {
        return UNTITLED_SESSION.to_string();
    }
    trimmed.chars().take(MAX_SESSION_TITLE_CHARS).collect()
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn ChatStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    pub async fn list_sessions(&self, owner: &OwnerId) -> Result<Vec<Session>, SessionError> {
        Ok(self.store.list_sessions(owner).await?)
    }

    /// Returns the context's session, creating it first if the context is unset.
    ///
    /// Concurrent callers sharing a context serialize on it: only the first
    /// inserts, the rest observe its id. On failure the context stays unset so
    /// the next call starts over.
    pub async fn create_session_if_absent(
        &self,
        context: &SessionContext,
        owner: &OwnerId,
        title_seed: &str,
    ) -> Result<Uuid, SessionError> {
        let mut current = context.claim().await;
        if let Some(session_id) = *current {
            return Ok(session_id);
        }

        let title = session_title(title_seed);
        let session = self
            .store
            .insert_session(owner, &title, Utc::now())
            .await?;
        *current = Some(session.id);

        info!(session_id = %session.id, owner = %owner, "created chat session");
        Ok(session.id)
    }

    /// Deletes messages, then favorites, then the session row.
    pub async fn delete_session(&self, owner: &OwnerId, session_id: Uuid) -> Result<(), SessionError> {
        if self.store.get_session(owner, session_id).await?.is_none() {
            return Err(SessionError::NotFound(session_id));
        }

        let messages = self.store.delete_messages(session_id).await?;
        let favorites = self.store.delete_session_favorites(session_id).await?;
        if !self.store.delete_session(owner, session_id).await? {
            warn!(session_id = %session_id, "chat session vanished during delete");
        }

        info!(
            session_id = %session_id,
            messages,
            favorites,
            "deleted chat session"
        );
        Ok(())
    }

    /// Flips the session-level favorite. Returns whether it is now favorited.
    pub async fn toggle_favorite(&self, owner: &OwnerId, session_id: Uuid) -> Result<bool, SessionError> {
        self.require_session(owner, session_id).await?;
        self.flip(Favorite::session(owner.clone(), session_id)).await
    }

    /// Flips a message-level favorite. Returns whether it is now favorited.
    pub async fn toggle_message_favorite(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
        message_id: Uuid,
    ) -> Result<bool, SessionError> {
        self.require_session(owner, session_id).await?;
        self.flip(Favorite::message(owner.clone(), session_id, message_id))
            .await
    }

    /// Favorited sessions that still exist, newest first.
    pub async fn favorite_sessions(&self, owner: &OwnerId) -> Result<Vec<Session>, SessionError> {
        let favorite_ids: HashSet<Uuid> = self
            .store
            .list_favorites(owner)
            .await?
            .into_iter()
            .filter(|favorite| favorite.message_id.is_none())
            .map(|favorite| favorite.session_id)
            .collect();
        if favorite_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sessions = self.store.list_sessions(owner).await?;
        Ok(sessions
            .into_iter()
            .filter(|session| favorite_ids.contains(&session.id))
            .collect())
    }

    pub async fn message_favorites(
        &self,
        owner: &OwnerId,
        session_id: Uuid,
    ) -> Result<Vec<Uuid>, SessionError> {
        Ok(self
            .store
            .list_favorites(owner)
            .await?
            .into_iter()
            .filter(|favorite| favorite.session_id == session_id)
            .filter_map(|favorite| favorite.message_id)
            .collect())
    }

    /// Points the conversation at an existing session and loads its history.
    pub async fn select_session(
        &self,
        conversation: &Conversation,
        session_id: Uuid,
    ) -> Result<Session, SessionError> {
        let owner = conversation.owner();
        let session = self
            .store
            .get_session(owner, session_id)
            .await?
            .ok_or(SessionError::NotFound(session_id))?;
        let messages = self.store.list_messages(owner, session_id).await?;

        conversation.context().bind(session_id).await;
        conversation.replace_transcript(messages.into_iter().map(TranscriptEntry::from).collect());
        Ok(session)
    }

    /// Detaches the conversation so its next send opens a fresh session.
    pub async fn start_new_chat(&self, conversation: &Conversation) {
        conversation.context().reset().await;
        conversation.replace_transcript(Vec::new());
    }

    async fn require_session(&self, owner: &OwnerId, session_id: Uuid) -> Result<(), SessionError> {
        match self.store.get_session(owner, session_id).await? {
            Some(_) => Ok(()),
            None => Err(SessionError::NotFound(session_id)),
        }
    }

    async fn flip(&self, favorite: Favorite) -> Result<bool, SessionError> {
        if self.store.delete_favorite(&favorite).await? {
            return Ok(false);
        }
        self.store.insert_favorite(&favorite).await?;
        Ok(true)
    }
}
