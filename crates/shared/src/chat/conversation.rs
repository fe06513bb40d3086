use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, MessageRole, OwnerId};

use super::context::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendState {
    Idle,
    Sending,
    Completed,
    Failed,
}

/// One line of the in-memory chat view. `persisted` is false for optimistic
/// entries not yet written and for synthetic error replies, which never are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub persisted: bool,
}

impl TranscriptEntry {
    pub(crate) fn pending(
        role: MessageRole,
        content: String,
        sources: Option<Vec<String>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            sources,
            created_at,
            persisted: false,
        }
    }
}

impl From<Message> for TranscriptEntry {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            role: message.role,
            content: message.content,
            sources: message.sources,
            created_at: message.created_at,
            persisted: true,
        }
    }
}

/// In-memory view of one chat: who owns it, which session it writes to, and
/// what has been shown so far. May exist before its session row does.
#[derive(Debug)]
pub struct Conversation {
    owner: OwnerId,
    context: SessionContext,
    view: Mutex<ConversationView>,
}

#[derive(Debug)]
struct ConversationView {
    transcript: Vec<TranscriptEntry>,
    state: SendState,
}

impl Conversation {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            context: SessionContext::new(),
            view: Mutex::new(ConversationView {
                transcript: Vec::new(),
                state: SendState::Idle,
            }),
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub async fn session_id(&self) -> Option<Uuid> {
        self.context.session_id().await
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.lock_view().transcript.clone()
    }

    pub fn state(&self) -> SendState {
        self.lock_view().state
    }

    pub(crate) fn set_state(&self, state: SendState) {
        self.lock_view().state = state;
    }

    pub(crate) fn push(&self, entry: TranscriptEntry) {
        self.lock_view().transcript.push(entry);
    }

    pub(crate) fn replace_transcript(&self, transcript: Vec<TranscriptEntry>) {
        let mut view = self.lock_view();
        view.transcript = transcript;
        view.state = SendState::Idle;
    }

    /// Swaps the optimistic id for the stored one and flags the entry durable.
    pub(crate) fn mark_persisted(&self, local_id: Uuid, stored_id: Uuid) {
        let mut view = self.lock_view();
        if let Some(entry) = view.transcript.iter_mut().find(|entry| entry.id == local_id) {
            entry.id = stored_id;
            entry.persisted = true;
        }
    }

    fn lock_view(&self) -> MutexGuard<'_, ConversationView> {
        match self.view.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
