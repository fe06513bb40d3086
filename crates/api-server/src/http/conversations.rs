use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::chat::{Conversation, SendError};
use shared::models::{
    ConversationResponse, OkResponse, OpenConversationRequest, OwnerId, SelectSessionRequest,
    SendMessageRequest, SendMessageResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use super::AppState;
use super::errors::{
    bad_request_response, internal_error_response, json_rejection_response, not_found_response,
    session_error_response,
};

const CONVERSATION_NOT_FOUND: &str = "Conversation not found";

/// Opens a chat view. With `session_id` it resumes that session, otherwise
/// the first message creates a new one.
pub(super) async fn open_conversation(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    body: Bytes,
) -> Response {
    let request = if body.is_empty() {
        OpenConversationRequest::default()
    } else {
        match serde_json::from_slice::<OpenConversationRequest>(&body) {
            Ok(request) => request,
            Err(_) => {
                return bad_request_response("invalid_request", "Request body is not valid JSON");
            }
        }
    };

    let conversation = Conversation::new(owner.clone());
    if let Some(session_id) = request.session_id
        && let Err(err) = state.sessions.select_session(&conversation, session_id).await
    {
        return session_error_response(err);
    }

    let (conversation_id, conversation) = state.conversations.open(conversation);
    info!(conversation_id = %conversation_id, owner = %owner, "conversation opened");

    match conversation_response(&state, conversation_id, &conversation).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(response) => response,
    }
}

pub(super) async fn get_conversation(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(conversation_id): Path<String>,
) -> Response {
    let Some((conversation_id, conversation)) = lookup(&state, &owner, &conversation_id) else {
        return not_found_response(CONVERSATION_NOT_FOUND);
    };

    match conversation_response(&state, conversation_id, &conversation).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(response) => response,
    }
}

/// The send runs on its own task so the exchange is still answered and
/// persisted when the client goes away mid-request.
pub(super) async fn send_message(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(conversation_id): Path<String>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Response {
    let Some((_, conversation)) = lookup(&state, &owner, &conversation_id) else {
        return not_found_response(CONVERSATION_NOT_FOUND);
    };
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let pipeline = state.pipeline.clone();
    let sent = tokio::spawn(async move { pipeline.send(&conversation, &req.content).await }).await;

    match sent {
        Ok(Ok(outcome)) => (
            StatusCode::OK,
            Json(SendMessageResponse {
                state: outcome.state,
                session_id: outcome.session_id,
                reply: outcome.reply,
            }),
        )
            .into_response(),
        Ok(Err(err @ SendError::EmptyMessage)) => {
            bad_request_response("empty_message", &err.user_message())
        }
        Err(err) => {
            error!(conversation_id = %conversation_id, "message send task failed: {err}");
            internal_error_response()
        }
    }
}

/// Points an open conversation at another saved session.
pub(super) async fn select_conversation_session(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(conversation_id): Path<String>,
    body: Result<Json<SelectSessionRequest>, JsonRejection>,
) -> Response {
    let Some((conversation_id, conversation)) = lookup(&state, &owner, &conversation_id) else {
        return not_found_response(CONVERSATION_NOT_FOUND);
    };
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return json_rejection_response(rejection),
    };

    if let Err(err) = state
        .sessions
        .select_session(&conversation, req.session_id)
        .await
    {
        return session_error_response(err);
    }

    match conversation_response(&state, conversation_id, &conversation).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(response) => response,
    }
}

pub(super) async fn start_new_chat(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(conversation_id): Path<String>,
) -> Response {
    let Some((conversation_id, conversation)) = lookup(&state, &owner, &conversation_id) else {
        return not_found_response(CONVERSATION_NOT_FOUND);
    };

    state.sessions.start_new_chat(&conversation).await;

    match conversation_response(&state, conversation_id, &conversation).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(response) => response,
    }
}

pub(super) async fn close_conversation(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(conversation_id): Path<String>,
) -> Response {
    let Ok(conversation_id) = Uuid::parse_str(&conversation_id) else {
        return not_found_response(CONVERSATION_NOT_FOUND);
    };

    if state.conversations.close(&owner, conversation_id) {
        return (StatusCode::OK, Json(OkResponse { ok: true })).into_response();
    }

    not_found_response(CONVERSATION_NOT_FOUND)
}

fn lookup(
    state: &AppState,
    owner: &OwnerId,
    conversation_id: &str,
) -> Option<(Uuid, Arc<Conversation>)> {
    let conversation_id = Uuid::parse_str(conversation_id).ok()?;
    let conversation = state.conversations.get(owner, conversation_id)?;
    Some((conversation_id, conversation))
}

async fn conversation_response(
    state: &AppState,
    conversation_id: Uuid,
    conversation: &Conversation,
) -> Result<ConversationResponse, Response> {
    let session_id = conversation.session_id().await;
    let favorite_message_ids = match session_id {
        Some(session_id) => state
            .sessions
            .message_favorites(conversation.owner(), session_id)
            .await
            .map_err(session_error_response)?,
        None => Vec::new(),
    };

    Ok(ConversationResponse {
        conversation_id,
        session_id,
        transcript: conversation.transcript(),
        favorite_message_ids,
    })
}
