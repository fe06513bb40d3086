use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::chat::SessionError;
use shared::crawl::CrawlError;
use shared::models::{ErrorBody, ErrorResponse};
use shared::repos::StoreError;
use tracing::{error, warn};

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }),
    )
        .into_response()
}

pub(super) fn bad_request_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

pub(super) fn json_rejection_response(rejection: JsonRejection) -> Response {
    warn!(status = %rejection.status(), "rejected request body: {rejection}");
    bad_request_response("invalid_request", &rejection.body_text())
}

pub(super) fn bad_gateway_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_GATEWAY, code, message)
}

pub(super) fn not_found_response(message: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, "not_found", message)
}

pub(super) fn unauthorized_response() -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "Missing owner identity",
    )
}

pub(super) fn internal_error_response() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "Unexpected server error",
    )
}

pub(super) fn store_error_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound(message) => not_found_response(&message),
        other => {
            error!("chat store operation failed: {other}");
            internal_error_response()
        }
    }
}

pub(super) fn session_error_response(err: SessionError) -> Response {
    match err {
        SessionError::NotFound(_) => not_found_response(&err.user_message()),
        SessionError::Store(err) => store_error_response(err),
    }
}

pub(super) fn crawl_error_response(err: CrawlError) -> Response {
    let message = err.user_message();
    match err {
        CrawlError::Validation(_) => bad_request_response("invalid_request", &message),
        CrawlError::Backend(err) => {
            warn!("retriever backend call failed: {err}");
            bad_gateway_response("backend_unavailable", &message)
        }
        CrawlError::StatusUnavailable(_) => bad_gateway_response("status_unavailable", &message),
    }
}
