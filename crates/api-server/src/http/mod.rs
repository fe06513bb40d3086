use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use shared::backend::RetrieverBackend;
use shared::chat::{Conversation, MessagePipeline, SessionManager};
use shared::config::{DEFAULT_CONVERSATION_IDLE_TTL_SECS, RefreshDelays};
use shared::crawl::CrawlDashboard;
use shared::models::OwnerId;
use shared::repos::ChatStore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

mod conversations;
mod crawl;
mod errors;
mod health;
mod owner;
mod sessions;

pub use owner::OWNER_HEADER;

const BACKEND_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for retriever backend calls. Only connecting is bounded;
/// answers and crawl calls wait as long as the backend takes.
pub fn backend_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(BACKEND_CONNECT_TIMEOUT)
        .build()
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub pipeline: MessagePipeline,
    pub conversations: ConversationRegistry,
    pub dashboard: Arc<CrawlDashboard>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ChatStore>,
        backend: Arc<dyn RetrieverBackend>,
        refresh_delays: RefreshDelays,
    ) -> Self {
        let sessions = SessionManager::new(store.clone());
        Self {
            pipeline: MessagePipeline::new(store, backend.clone(), sessions.clone()),
            sessions,
            conversations: ConversationRegistry::new(Duration::from_secs(
                DEFAULT_CONVERSATION_IDLE_TTL_SECS,
            )),
            dashboard: Arc::new(CrawlDashboard::new(backend, refresh_delays)),
        }
    }

    pub fn with_conversation_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.conversations = ConversationRegistry::new(idle_ttl);
        self
    }
}

struct OpenConversation {
    conversation: Arc<Conversation>,
    last_access: Instant,
}

/// Open chat views, keyed by conversation id and visible only to their owner.
/// Views untouched for longer than the idle ttl are dropped by the sweeper.
#[derive(Clone)]
pub struct ConversationRegistry {
    inner: Arc<Mutex<HashMap<Uuid, OpenConversation>>>,
    idle_ttl: Duration,
}

impl ConversationRegistry {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl,
        }
    }

    pub fn open(&self, conversation: Conversation) -> (Uuid, Arc<Conversation>) {
        let conversation_id = Uuid::new_v4();
        let conversation = Arc::new(conversation);
        self.lock().insert(
            conversation_id,
            OpenConversation {
                conversation: conversation.clone(),
                last_access: Instant::now(),
            },
        );
        (conversation_id, conversation)
    }

    pub fn get(&self, owner: &OwnerId, conversation_id: Uuid) -> Option<Arc<Conversation>> {
        let mut conversations = self.lock();
        let open = conversations
            .get_mut(&conversation_id)
            .filter(|open| open.conversation.owner() == owner)?;
        open.last_access = Instant::now();
        Some(open.conversation.clone())
    }

    pub fn close(&self, owner: &OwnerId, conversation_id: Uuid) -> bool {
        let mut conversations = self.lock();
        let owned = conversations
            .get(&conversation_id)
            .is_some_and(|open| open.conversation.owner() == owner);
        if owned {
            conversations.remove(&conversation_id);
        }
        owned
    }

    /// Drops every view idle for longer than the ttl and returns how many went.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut conversations = self.lock();
        let before = conversations.len();
        conversations.retain(|_, open| now.duration_since(open.last_access) <= self.idle_ttl);
        before - conversations.len()
    }

    /// Runs `evict_idle` every `period` until `shutdown` is cancelled.
    pub fn spawn_idle_sweeper(
        &self,
        period: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = registry.evict_idle();
                        if evicted > 0 {
                            info!(evicted, "evicted idle conversations");
                        }
                    }
                }
            }
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, OpenConversation>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/v1/sessions/{session_id}", delete(sessions::delete_session))
        .route(
            "/v1/sessions/{session_id}/favorite",
            post(sessions::toggle_session_favorite),
        )
        .route(
            "/v1/sessions/{session_id}/messages/{message_id}/favorite",
            post(sessions::toggle_message_favorite),
        )
        .route("/v1/favorites", get(sessions::list_favorite_sessions))
        .route("/v1/conversations", post(conversations::open_conversation))
        .route(
            "/v1/conversations/{conversation_id}",
            get(conversations::get_conversation).delete(conversations::close_conversation),
        )
        .route(
            "/v1/conversations/{conversation_id}/messages",
            post(conversations::send_message),
        )
        .route(
            "/v1/conversations/{conversation_id}/session",
            post(conversations::select_conversation_session),
        )
        .route(
            "/v1/conversations/{conversation_id}/new-chat",
            post(conversations::start_new_chat),
        )
        .route("/v1/crawl", post(crawl::submit_manual_crawl))
        .route("/v1/crawl/auto", post(crawl::submit_auto_crawl))
        .route("/v1/crawl/jobs", get(crawl::list_crawl_jobs))
        .route("/v1/crawl/sites", get(crawl::list_crawl_sites))
        .route(
            "/v1/crawl/sites/{site_name}/toggle",
            post(crawl::toggle_crawl_site),
        )
        .route("/v1/db/status", get(crawl::get_db_status))
        .route("/v1/db/status/refresh", post(crawl::refresh_db_status))
        .route("/v1/db/search-url", get(crawl::search_url))
        .layer(middleware::from_fn(owner::owner_middleware))
        .with_state(app_state);

    public_routes.merge(protected_routes)
}
