use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use shared::models::{AnswerRequest, ManualCrawlRequest};

/// In-process stand-in for the retriever backend.
#[derive(Clone)]
pub struct MockBackend {
    pub base_url: String,
    pub state: MockBackendState,
    _server: Arc<tokio::task::JoinHandle<()>>,
}

#[derive(Clone, Default)]
pub struct MockBackendState {
    sites: Arc<Mutex<Vec<(String, bool)>>>,
    next_task: Arc<AtomicU32>,
    status_calls: Arc<AtomicU32>,
    fail_answers: Arc<Mutex<bool>>,
    answer_delay: Arc<Mutex<Duration>>,
}

impl MockBackendState {
    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_answers(&self, fail: bool) {
        *self.fail_answers.lock().expect("mock lock") = fail;
    }

    pub fn set_answer_delay(&self, delay: Duration) {
        *self.answer_delay.lock().expect("mock lock") = delay;
    }

    fn next_task_id(&self) -> String {
        format!("task-{}", self.next_task.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn sites_json(&self) -> serde_json::Value {
        let sites = self.sites.lock().expect("mock lock");
        let items = sites
            .iter()
            .map(|(name, enabled)| {
                json!({
                    "name": name,
                    "url": format!("https://{name}.example.edu"),
                    "description": "",
                    "enabled": enabled,
                })
            })
            .collect::<Vec<_>>();

        json!({
            "sites": items,
            "settings": {
                "max_depth": 2,
                "update_frequency": "daily",
                "last_updated": "2026-10-01T00:00:00Z",
                "total_sites": sites.len(),
            },
            "schedule": "0 3 * * *",
        })
    }
}

impl MockBackend {
    pub async fn start(sites: &[(&str, bool)]) -> Self {
        let state = MockBackendState::default();
        *state.sites.lock().expect("mock lock") = sites
            .iter()
            .map(|(name, enabled)| (name.to_string(), *enabled))
            .collect();

        let app = Router::new()
            .route("/chat", post(answer))
            .route("/crawl", post(manual_crawl))
            .route("/crawl/auto", post(auto_crawl))
            .route("/crawl/sites", get(list_sites))
            .route("/crawl/sites/{site_name}/toggle", post(toggle_site))
            .route("/db/status", get(db_status))
            .route("/db/search-url", get(search_url))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock backend listener should bind");
        let local_addr = listener
            .local_addr()
            .expect("listener should expose local address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("mock backend should run");
        });

        Self {
            base_url: format!("http://{local_addr}"),
            state,
            _server: Arc::new(server),
        }
    }
}

async fn answer(State(state): State<MockBackendState>, Json(req): Json<AnswerRequest>) -> Response {
    let delay = *state.answer_delay.lock().expect("mock lock");
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if *state.fail_answers.lock().expect("mock lock") {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "model unavailable" })),
        )
            .into_response();
    }

    Json(json!({
        "answer": format!("answer to: {}", req.question),
        "sources": ["https://docs.example.edu/guide"],
    }))
    .into_response()
}

async fn manual_crawl(
    State(state): State<MockBackendState>,
    Json(_req): Json<ManualCrawlRequest>,
) -> Response {
    Json(json!({ "task_id": state.next_task_id() })).into_response()
}

async fn auto_crawl(State(state): State<MockBackendState>) -> Response {
    let enabled = state
        .sites
        .lock()
        .expect("mock lock")
        .iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| name.clone())
        .collect::<Vec<_>>();

    if enabled.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "No enabled sites to crawl" })),
        )
            .into_response();
    }

    Json(json!({ "task_id": state.next_task_id(), "sites": enabled })).into_response()
}

async fn list_sites(State(state): State<MockBackendState>) -> Response {
    Json(state.sites_json()).into_response()
}

async fn toggle_site(
    State(state): State<MockBackendState>,
    Path(site_name): Path<String>,
) -> Response {
    let mut sites = state.sites.lock().expect("mock lock");
    let Some(site) = sites.iter_mut().find(|(name, _)| *name == site_name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": format!("Site {site_name} not found") })),
        )
            .into_response();
    };
    site.1 = !site.1;

    Json(json!({
        "site_name": site.0,
        "enabled": site.1,
        "message": "toggled",
    }))
    .into_response()
}

async fn db_status(State(state): State<MockBackendState>) -> Response {
    let calls = state.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "status": "ok",
        "total_documents": 100 + u64::from(calls),
        "collection_name": "documents",
        "last_checked": "2026-10-15T08:00:00Z",
        "recent_updates": [
            { "url": "https://docs.example.edu/guide", "updated_at": "2026-10-15T07:00:00Z" }
        ],
    }))
    .into_response()
}

#[derive(Deserialize)]
struct SearchParams {
    url: String,
}

async fn search_url(Query(params): Query<SearchParams>) -> Response {
    let matches = (0..25)
        .map(|idx| {
            json!({
                "url": format!("{}/page-{idx}", params.url),
                "updated_at": "2026-10-15T07:00:00Z",
            })
        })
        .collect::<Vec<_>>();

    Json(json!({
        "search_url": params.url,
        "found": true,
        "count": 25,
        "total_checked": 1000,
        "matching_urls": matches,
        "checked_at": "2026-10-15T08:00:00Z",
    }))
    .into_response()
}
