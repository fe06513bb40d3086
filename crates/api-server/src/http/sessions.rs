use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::{
    FavoriteSessionsResponse, FavoriteToggleResponse, ListSessionsResponse, OkResponse, OwnerId,
};
use uuid::Uuid;

use super::AppState;
use super::errors::{not_found_response, session_error_response};

const SESSION_NOT_FOUND: &str = "Chat session not found";

pub(super) async fn list_sessions(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Response {
    match state.sessions.list_sessions(&owner).await {
        Ok(items) => (StatusCode::OK, Json(ListSessionsResponse { items })).into_response(),
        Err(err) => session_error_response(err),
    }
}

pub(super) async fn delete_session(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(session_id): Path<String>,
) -> Response {
    let Ok(session_id) = Uuid::parse_str(&session_id) else {
        return not_found_response(SESSION_NOT_FOUND);
    };

    match state.sessions.delete_session(&owner, session_id).await {
        Ok(()) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Err(err) => session_error_response(err),
    }
}

pub(super) async fn toggle_session_favorite(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(session_id): Path<String>,
) -> Response {
    let Ok(session_id) = Uuid::parse_str(&session_id) else {
        return not_found_response(SESSION_NOT_FOUND);
    };

    match state.sessions.toggle_favorite(&owner, session_id).await {
        Ok(favorited) => (
            StatusCode::OK,
            Json(FavoriteToggleResponse {
                session_id,
                message_id: None,
                favorited,
            }),
        )
            .into_response(),
        Err(err) => session_error_response(err),
    }
}

pub(super) async fn toggle_message_favorite(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path((session_id, message_id)): Path<(String, String)>,
) -> Response {
    let (Ok(session_id), Ok(message_id)) =
        (Uuid::parse_str(&session_id), Uuid::parse_str(&message_id))
    else {
        return not_found_response("Chat message not found");
    };

    match state
        .sessions
        .toggle_message_favorite(&owner, session_id, message_id)
        .await
    {
        Ok(favorited) => (
            StatusCode::OK,
            Json(FavoriteToggleResponse {
                session_id,
                message_id: Some(message_id),
                favorited,
            }),
        )
            .into_response(),
        Err(err) => session_error_response(err),
    }
}

pub(super) async fn list_favorite_sessions(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Response {
    match state.sessions.favorite_sessions(&owner).await {
        Ok(items) => (
            StatusCode::OK,
            Json(FavoriteSessionsResponse {
                count: items.len(),
                items,
            }),
        )
            .into_response(),
        Err(err) => session_error_response(err),
    }
}
