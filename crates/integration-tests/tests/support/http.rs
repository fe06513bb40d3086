use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use api_server::http::OWNER_HEADER;

pub struct JsonResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub async fn send_json(app: &axum::Router, request: Request<Body>) -> JsonResponse {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should succeed");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should read");
    let body = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| json!({}));

    JsonResponse { status, body }
}

pub fn request(method: Method, path: &str, owner: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::ACCEPT, "application/json");

    if let Some(owner) = owner {
        builder = builder.header(OWNER_HEADER, owner);
    }

    let request_body = body
        .map(|value| {
            serde_json::to_vec(&value).expect("json body should serialize for integration request")
        })
        .unwrap_or_default();
    if !request_body.is_empty() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }

    builder
        .body(Body::from(request_body))
        .expect("integration request should build")
}

pub fn error_code(body: &Value) -> Option<&str> {
    body.get("error")?.get("code")?.as_str()
}
