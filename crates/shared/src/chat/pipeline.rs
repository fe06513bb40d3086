use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::RetrieverBackend;
use crate::models::{MessageRole, NewMessage};
use crate::repos::ChatStore;

use super::SEND_FAILURE_REPLY;
use super::conversation::{Conversation, SendState, TranscriptEntry};
use super::sessions::SessionManager;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("message is empty")]
    EmptyMessage,
}

impl SendError {
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyMessage => "Type a question before sending.".to_string(),
        }
    }
}

/// Result of one send. `reply` is the assistant entry appended to the
/// transcript, or the synthetic error reply when the send failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub state: SendState,
    pub session_id: Option<Uuid>,
    pub reply: TranscriptEntry,
}

#[derive(Clone)]
pub struct MessagePipeline {
    store: Arc<dyn ChatStore>,
    backend: Arc<dyn RetrieverBackend>,
    sessions: SessionManager,
}

impl MessagePipeline {
    pub fn new(
        store: Arc<dyn ChatStore>,
        backend: Arc<dyn RetrieverBackend>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            store,
            backend,
            sessions,
        }
    }

    /// Runs `Idle -> Sending -> Completed | Failed` for one question.
    ///
    /// The user entry is shown before any call is made. Endpoint and session
    /// failures end in a non-persisted error reply; store failures after a
    /// successful answer are logged and leave the transcript as shown.
    pub async fn send(
        &self,
        conversation: &Conversation,
        content: &str,
    ) -> Result<SendOutcome, SendError> {
        let question = content.trim();
        if question.is_empty() {
            return Err(SendError::EmptyMessage);
        }

        conversation.set_state(SendState::Sending);
        let user_entry =
            TranscriptEntry::pending(MessageRole::User, question.to_string(), None, Utc::now());
        conversation.push(user_entry.clone());

        let owner = conversation.owner();
        let session_id = match self
            .sessions
            .create_session_if_absent(conversation.context(), owner, question)
            .await
        {
            Ok(session_id) => session_id,
            Err(err) => {
                warn!(owner = %owner, error = %err, "chat session creation failed");
                return Ok(self.fail(conversation, None));
            }
        };

        let answer = match self.backend.answer(question).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "answer request failed");
                return Ok(self.fail(conversation, Some(session_id)));
            }
        };

        let assistant_entry = TranscriptEntry::pending(
            MessageRole::Assistant,
            answer.answer,
            answer.sources,
            after(user_entry.created_at),
        );
        conversation.push(assistant_entry.clone());

        let mut reply = assistant_entry.clone();
        if let Some(stored_id) = self
            .persist_pair(conversation, session_id, &user_entry, &assistant_entry)
            .await
        {
            reply.id = stored_id;
            reply.persisted = true;
        }

        conversation.set_state(SendState::Completed);
        Ok(SendOutcome {
            state: SendState::Completed,
            session_id: Some(session_id),
            reply,
        })
    }

    async fn persist_pair(
        &self,
        conversation: &Conversation,
        session_id: Uuid,
        user_entry: &TranscriptEntry,
        assistant_entry: &TranscriptEntry,
    ) -> Option<Uuid> {
        let mut stored_assistant = None;
        for entry in [user_entry, assistant_entry] {
            let message = NewMessage {
                session_id,
                owner: conversation.owner().clone(),
                role: entry.role,
                content: entry.content.clone(),
                sources: entry.sources.clone(),
                created_at: entry.created_at,
            };
            match self.store.insert_message(message).await {
                Ok(stored) => {
                    conversation.mark_persisted(entry.id, stored.id);
                    if entry.role == MessageRole::Assistant {
                        stored_assistant = Some(stored.id);
                    }
                }
                Err(err) => {
                    error!(
                        session_id = %session_id,
                        role = entry.role.as_str(),
                        error = %err,
                        "failed to persist chat message"
                    );
                    return None;
                }
            }
        }

        info!(session_id = %session_id, "persisted chat exchange");
        stored_assistant
    }

    fn fail(&self, conversation: &Conversation, session_id: Option<Uuid>) -> SendOutcome {
        let reply = TranscriptEntry::pending(
            MessageRole::Assistant,
            SEND_FAILURE_REPLY.to_string(),
            None,
            Utc::now(),
        );
        conversation.push(reply.clone());
        conversation.set_state(SendState::Failed);

        SendOutcome {
            state: SendState::Failed,
            session_id,
            reply,
        }
    }
}

fn after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}
