use chrono::Utc;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use tracing::{debug, warn};
use url::Url;

use crate::config::{BackendConfig, ConfigError};
use crate::models::{
    AnswerRequest, AnswerResponse, AutoCrawlResponse, CrawlSites, CrawlTaskResponse,
    ManualCrawlRequest, ToggleSiteResponse,
};

use super::{
    BACKEND_PATH_CHAT, BACKEND_PATH_CRAWL, BACKEND_PATH_CRAWL_AUTO, BACKEND_PATH_CRAWL_SITES,
    BACKEND_PATH_DB_SEARCH_URL, BACKEND_PATH_DB_STATUS, BackendError, BackendFuture,
    CACHE_BUST_QUERY_PARAM, DbStatusPayload, RetrieverBackend, UrlSearchPayload,
    error_message_from_body,
};

#[derive(Clone)]
pub struct BackendClient {
    base_url: Url,
    http_client: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: &BackendConfig, http_client: reqwest::Client) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            ConfigError::InvalidConfiguration(format!("invalid retriever backend url: {err}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidConfiguration(
                "retriever backend url cannot be used as a base".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub async fn answer_question(&self, question: &str) -> Result<AnswerResponse, BackendError> {
        let url = self.endpoint(BACKEND_PATH_CHAT, &[])?;
        let payload = AnswerRequest {
            question: question.to_string(),
        };
        self.send(self.http_client.post(url).json(&payload)).await
    }

    pub async fn post_manual_crawl(
        &self,
        request: &ManualCrawlRequest,
    ) -> Result<CrawlTaskResponse, BackendError> {
        let url = self.endpoint(BACKEND_PATH_CRAWL, &[])?;
        self.send(self.http_client.post(url).json(request)).await
    }

    pub async fn post_auto_crawl(&self) -> Result<AutoCrawlResponse, BackendError> {
        let url = self.endpoint(BACKEND_PATH_CRAWL_AUTO, &[])?;
        self.send(self.http_client.post(url)).await
    }

    pub async fn fetch_sites(&self) -> Result<CrawlSites, BackendError> {
        let url = self.endpoint(BACKEND_PATH_CRAWL_SITES, &[])?;
        self.send(self.http_client.get(url)).await
    }

    pub async fn post_site_toggle(
        &self,
        site_name: &str,
    ) -> Result<ToggleSiteResponse, BackendError> {
        // Site names may contain spaces or slashes; each is one encoded segment.
        let url = self.endpoint(BACKEND_PATH_CRAWL_SITES, &[site_name, "toggle"])?;
        self.send(self.http_client.post(url)).await
    }

    pub async fn fetch_db_status(&self) -> Result<DbStatusPayload, BackendError> {
        let url = self.endpoint(BACKEND_PATH_DB_STATUS, &[])?;
        let request = self
            .http_client
            .get(url)
            .query(&[(CACHE_BUST_QUERY_PARAM, Utc::now().timestamp_millis().to_string())])
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache");
        self.send(request).await
    }

    pub async fn fetch_url_search(&self, search_url: &str) -> Result<UrlSearchPayload, BackendError> {
        let url = self.endpoint(BACKEND_PATH_DB_SEARCH_URL, &[])?;
        self.send(self.http_client.get(url).query(&[("url", search_url)]))
            .await
    }

    fn endpoint(&self, path: &str, extra_segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        {
            let mut segments =
                url.path_segments_mut()
                    .map_err(|_| BackendError::InvalidPayload {
                        message: "retriever backend url cannot carry a path".to_string(),
                    })?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
            segments.extend(extra_segments);
        }
        Ok(url)
    }

    async fn send<Res>(&self, request: reqwest::RequestBuilder) -> Result<Res, BackendError>
    where
        Res: serde::de::DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|err| BackendError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status().as_u16();
        let path = response.url().path().to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BackendError::Transport {
                message: format!("failed to read retriever backend response body: {err}"),
            })?;

        if (200..300).contains(&status) {
            debug!(path = %path, status, "retriever backend request succeeded");
            return serde_json::from_slice::<Res>(&bytes).map_err(|err| {
                BackendError::InvalidPayload {
                    message: format!("failed to parse retriever backend response: {err}"),
                }
            });
        }

        let message = error_message_from_body(&bytes);
        warn!(path = %path, status, message = ?message, "retriever backend request failed");
        Err(BackendError::Status { status, message })
    }
}

impl RetrieverBackend for BackendClient {
    fn answer<'a>(&'a self, question: &'a str) -> BackendFuture<'a, AnswerResponse> {
        Box::pin(self.answer_question(question))
    }

    fn submit_manual_crawl<'a>(
        &'a self,
        request: &'a ManualCrawlRequest,
    ) -> BackendFuture<'a, CrawlTaskResponse> {
        Box::pin(self.post_manual_crawl(request))
    }

    fn submit_auto_crawl(&self) -> BackendFuture<'_, AutoCrawlResponse> {
        Box::pin(self.post_auto_crawl())
    }

    fn list_sites(&self) -> BackendFuture<'_, CrawlSites> {
        Box::pin(self.fetch_sites())
    }

    fn toggle_site<'a>(&'a self, site_name: &'a str) -> BackendFuture<'a, ToggleSiteResponse> {
        Box::pin(self.post_site_toggle(site_name))
    }

    fn db_status(&self) -> BackendFuture<'_, DbStatusPayload> {
        Box::pin(self.fetch_db_status())
    }

    fn search_url<'a>(&'a self, url: &'a str) -> BackendFuture<'a, UrlSearchPayload> {
        Box::pin(self.fetch_url_search(url))
    }
}
