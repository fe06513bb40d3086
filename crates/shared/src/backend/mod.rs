mod client;

#[cfg(test)]
pub(crate) mod fake;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    AnswerResponse, AutoCrawlResponse, CrawlSites, CrawlTaskResponse, DbStatusSnapshot,
    DocumentUpdate, ManualCrawlRequest, ToggleSiteResponse,
};

pub use client::BackendClient;

pub const BACKEND_PATH_CHAT: &str = "/chat";
pub const BACKEND_PATH_CRAWL: &str = "/crawl";
pub const BACKEND_PATH_CRAWL_AUTO: &str = "/crawl/auto";
pub const BACKEND_PATH_CRAWL_SITES: &str = "/crawl/sites";
pub const BACKEND_PATH_DB_STATUS: &str = "/db/status";
pub const BACKEND_PATH_DB_SEARCH_URL: &str = "/db/search-url";

/// Cache-busting query parameter attached to status requests.
pub const CACHE_BUST_QUERY_PARAM: &str = "_t";

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("retriever backend transport unavailable: {message}")]
    Transport { message: String },
    #[error("retriever backend request failed: status={status}")]
    Status {
        status: u16,
        message: Option<String>,
    },
    #[error("retriever backend response invalid: {message}")]
    InvalidPayload { message: String },
}

impl BackendError {
    /// Text safe to show to the person who triggered the call.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { .. } => "The retriever backend could not be reached.".to_string(),
            Self::Status {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Status { status, .. } => format!("Request failed with status {status}."),
            Self::InvalidPayload { .. } => {
                "The retriever backend returned an unexpected response.".to_string()
            }
        }
    }
}

/// HTTP surface of the retriever service: answers, crawl jobs, the site
/// registry and the content store.
pub trait RetrieverBackend: Send + Sync {
    fn answer<'a>(&'a self, question: &'a str) -> BackendFuture<'a, AnswerResponse>;

    fn submit_manual_crawl<'a>(
        &'a self,
        request: &'a ManualCrawlRequest,
    ) -> BackendFuture<'a, CrawlTaskResponse>;

    fn submit_auto_crawl(&self) -> BackendFuture<'_, AutoCrawlResponse>;

    fn list_sites(&self) -> BackendFuture<'_, CrawlSites>;

    fn toggle_site<'a>(&'a self, site_name: &'a str) -> BackendFuture<'a, ToggleSiteResponse>;

    fn db_status(&self) -> BackendFuture<'_, DbStatusPayload>;

    fn search_url<'a>(&'a self, url: &'a str) -> BackendFuture<'a, UrlSearchPayload>;
}

/// Raw status body. The server answers 200 with `status: "error"` when it
/// cannot read the content store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbStatusPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_documents: u64,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub last_checked: String,
    #[serde(default)]
    pub recent_updates: Vec<DocumentUpdate>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DbStatusPayload {
    pub fn into_snapshot(self) -> Result<DbStatusSnapshot, String> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.status.as_deref() == Some("error") {
            return Err("content store reported an error status".to_string());
        }

        Ok(DbStatusSnapshot {
            total_documents: self.total_documents,
            last_checked: self.last_checked,
            recent_updates: self.recent_updates,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlSearchPayload {
    #[serde(default)]
    pub search_url: String,
    #[serde(default)]
    pub found: Option<bool>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub total_checked: usize,
    #[serde(default)]
    pub matching_urls: Vec<DocumentUpdate>,
    #[serde(default)]
    pub checked_at: String,
    #[serde(default)]
    pub error: Option<String>,
}

pub(crate) fn error_message_from_body(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    ["detail", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|field| field.as_str()))
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}
