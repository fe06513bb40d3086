use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use shared::models::OwnerId;
use tracing::warn;

use super::errors::unauthorized_response;

/// Header carrying the signed-in owner. Identity is established upstream;
/// the value is trusted as-is.
pub const OWNER_HEADER: &str = "x-owner-id";

pub(super) async fn owner_middleware(mut req: Request, next: Next) -> Response {
    let owner = req
        .headers()
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(OwnerId::new);

    let Some(owner) = owner else {
        warn!("missing owner header");
        return unauthorized_response();
    };

    req.extensions_mut().insert(owner);
    next.run(req).await
}
