use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Favorite, Message, NewMessage, OwnerId, Session};

use super::{ChatStore, StoreError, StoreFuture};

/// In-process `ChatStore` for tests that do not need Postgres. Every call
/// yields once so callers observe the same suspension points.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
    fail_message_writes: AtomicBool,
    session_inserts: AtomicUsize,
}

#[derive(Default)]
struct MemoryState {
    sessions: Vec<Session>,
    messages: Vec<Message>,
    favorites: Vec<Favorite>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes only message inserts fail; sessions and favorites keep working.
    pub fn set_fail_message_writes(&self, fail: bool) {
        self.inner.fail_message_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful session inserts since construction.
    pub fn session_insert_count(&self) -> usize {
        self.inner.session_inserts.load(Ordering::SeqCst)
    }

    pub fn all_messages(&self) -> Vec<Message> {
        self.lock_state().messages.clone()
    }

    pub fn all_favorites(&self) -> Vec<Favorite> {
        self.lock_state().favorites.clone()
    }

    /// Inserts a favorite row without checking that the session exists.
    pub fn insert_orphan_favorite(&self, favorite: Favorite) {
        self.lock_state().favorites.push(favorite);
    }

    fn lock_state(&self) -> MutexGuard<'_, MemoryState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn enter(&self) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl ChatStore for MemoryStore {
    fn list_sessions<'a>(&'a self, owner: &'a OwnerId) -> StoreFuture<'a, Vec<Session>> {
        Box::pin(async move {
            self.enter().await?;
            let mut sessions: Vec<Session> = self
                .lock_state()
                .sessions
                .iter()
                .filter(|session| &session.owner == owner)
                .cloned()
                .collect();
            sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(sessions)
        })
    }

    fn get_session<'a>(
        &'a self,
        owner: &'a OwnerId,
        session_id: Uuid,
    ) -> StoreFuture<'a, Option<Session>> {
        Box::pin(async move {
            self.enter().await?;
            Ok(self
                .lock_state()
                .sessions
                .iter()
                .find(|session| session.id == session_id && &session.owner == owner)
                .cloned())
        })
    }

    fn insert_session<'a>(
        &'a self,
        owner: &'a OwnerId,
        title: &'a str,
        created_at: DateTime<Utc>,
    ) -> StoreFuture<'a, Session> {
        Box::pin(async move {
            self.enter().await?;
            let session = Session {
                id: Uuid::new_v4(),
                owner: owner.clone(),
                title: title.to_string(),
                created_at,
            };
            self.lock_state().sessions.push(session.clone());
            self.inner.session_inserts.fetch_add(1, Ordering::SeqCst);
            Ok(session)
        })
    }

    fn delete_session<'a>(&'a self, owner: &'a OwnerId, session_id: Uuid) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.enter().await?;
            let mut state = self.lock_state();
            let before = state.sessions.len();
            state
                .sessions
                .retain(|session| !(session.id == session_id && &session.owner == owner));
            Ok(state.sessions.len() < before)
        })
    }

    fn list_messages<'a>(
        &'a self,
        owner: &'a OwnerId,
        session_id: Uuid,
    ) -> StoreFuture<'a, Vec<Message>> {
        Box::pin(async move {
            self.enter().await?;
            let mut messages: Vec<Message> = self
                .lock_state()
                .messages
                .iter()
                .filter(|message| message.session_id == session_id && &message.owner == owner)
                .cloned()
                .collect();
            // Stable sort keeps insertion order for equal timestamps.
            messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(messages)
        })
    }

    fn insert_message<'a>(&'a self, message: NewMessage) -> StoreFuture<'a, Message> {
        Box::pin(async move {
            self.enter().await?;
            if self.inner.fail_message_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable(
                    "message writes disabled".to_string(),
                ));
            }

            let mut state = self.lock_state();
            if !state
                .sessions
                .iter()
                .any(|session| session.id == message.session_id)
            {
                return Err(StoreError::NotFound(format!(
                    "session {} does not exist",
                    message.session_id
                )));
            }

            let stored = Message {
                id: Uuid::new_v4(),
                session_id: message.session_id,
                owner: message.owner,
                role: message.role,
                content: message.content,
                sources: message.sources,
                created_at: message.created_at,
            };
            state.messages.push(stored.clone());
            Ok(stored)
        })
    }

    fn delete_messages<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            self.enter().await?;
            let mut state = self.lock_state();
            let before = state.messages.len();
            state
                .messages
                .retain(|message| message.session_id != session_id);
            Ok((before - state.messages.len()) as u64)
        })
    }

    fn list_favorites<'a>(&'a self, owner: &'a OwnerId) -> StoreFuture<'a, Vec<Favorite>> {
        Box::pin(async move {
            self.enter().await?;
            Ok(self
                .lock_state()
                .favorites
                .iter()
                .filter(|favorite| &favorite.owner == owner)
                .cloned()
                .collect())
        })
    }

    fn insert_favorite<'a>(&'a self, favorite: &'a Favorite) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.enter().await?;
            let mut state = self.lock_state();
            if state.favorites.contains(favorite) {
                return Ok(false);
            }
            state.favorites.push(favorite.clone());
            Ok(true)
        })
    }

    fn delete_favorite<'a>(&'a self, favorite: &'a Favorite) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.enter().await?;
            let mut state = self.lock_state();
            let before = state.favorites.len();
            state.favorites.retain(|existing| existing != favorite);
            Ok(state.favorites.len() < before)
        })
    }

    fn delete_session_favorites<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            self.enter().await?;
            let mut state = self.lock_state();
            let before = state.favorites.len();
            state
                .favorites
                .retain(|favorite| favorite.session_id != session_id);
            Ok((before - state.favorites.len()) as u64)
        })
    }
}
