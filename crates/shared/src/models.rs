use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of the signed-in owner. Never parsed or validated here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner: OwnerId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub owner: OwnerId,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub session_id: Uuid,
    pub owner: OwnerId,
    pub role: MessageRole,
    pub content: String,
    pub sources: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// A session-level favorite when `message_id` is `None`, message-level otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Favorite {
    pub owner: OwnerId,
    pub session_id: Uuid,
    #[serde(default)]
    pub message_id: Option<Uuid>,
}

impl Favorite {
    pub fn session(owner: OwnerId, session_id: Uuid) -> Self {
        Self {
            owner,
            session_id,
            message_id: None,
        }
    }

    pub fn message(owner: OwnerId, session_id: Uuid, message_id: Uuid) -> Self {
        Self {
            owner,
            session_id,
            message_id: Some(message_id),
        }
    }
}

// Crawl backend payloads.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSite {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_site_enabled")]
    pub enabled: bool,
}

fn default_site_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CrawlSettings {
    #[serde(default)]
    pub max_depth: u32,
    #[serde(default)]
    pub update_frequency: String,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub total_sites: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSites {
    pub sites: Vec<CrawlSite>,
    #[serde(default)]
    pub settings: CrawlSettings,
    #[serde(default)]
    pub schedule: String,
}

impl CrawlSites {
    pub fn enabled_sites(&self) -> impl Iterator<Item = &CrawlSite> {
        self.sites.iter().filter(|site| site.enabled)
    }

    pub fn disabled_sites(&self) -> impl Iterator<Item = &CrawlSite> {
        self.sites.iter().filter(|site| !site.enabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlJobKind {
    Manual,
    Auto,
}

/// Submitted crawl job. Recorded once and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub task_id: String,
    pub kind: CrawlJobKind,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualCrawlRequest {
    #[serde(default)]
    pub root_url: String,
    #[serde(default = "default_manual_depth")]
    pub max_depth: u32,
}

pub const DEFAULT_MAX_DEPTH: u32 = 2;

fn default_manual_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTaskResponse {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoCrawlResponse {
    pub task_id: String,
    #[serde(default)]
    pub sites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleSiteResponse {
    pub site_name: String,
    pub enabled: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub url: String,
    pub updated_at: String,
    #[serde(default)]
    pub chunk_index: u32,
    #[serde(default = "default_total_chunks")]
    pub total_chunks: u32,
}

fn default_total_chunks() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DbStatusSnapshot {
    #[serde(default)]
    pub total_documents: u64,
    #[serde(default)]
    pub last_checked: String,
    #[serde(default)]
    pub recent_updates: Vec<DocumentUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlCheckResult {
    pub search_url: String,
    pub found: bool,
    pub count: usize,
    pub total_checked: usize,
    pub matches: Vec<DocumentUpdate>,
    pub checked_at: String,
    /// Set when the server stopped scanning at its row cap.
    pub incomplete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// API server request/response bodies.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    pub items: Vec<Session>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteSessionsResponse {
    pub count: usize,
    pub items: Vec<Session>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteToggleResponse {
    pub session_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
    pub favorited: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenConversationRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectSessionRequest {
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation_id: Uuid,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub transcript: Vec<crate::chat::TranscriptEntry>,
    #[serde(default)]
    pub favorite_message_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub state: crate::chat::SendState,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub reply: crate::chat::TranscriptEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitCrawlResponse {
    pub job: CrawlJob,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sites: Vec<String>,
    pub refresh_after_ms: u64,
    /// Human-readable confirmation for auto jobs listing the reported sites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCrawlJobsResponse {
    pub items: Vec<CrawlJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleSiteOutcomeResponse {
    /// `false` when another toggle was still in flight and this one was dropped.
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggled: Option<ToggleSiteResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sites: Option<CrawlSites>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStatusResponse {
    #[serde(default)]
    pub snapshot: Option<DbStatusSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlSearchQuery {
    #[serde(default)]
    pub url: String,
}
