use std::sync::Arc;

use tracing::debug;

use crate::backend::RetrieverBackend;
use crate::models::UrlCheckResult;

use super::{CrawlError, ValidationError};

/// Rows the server scans before giving up.
pub const URL_CHECK_ROW_CAP: usize = 1000;
pub const MAX_URL_MATCHES: usize = 20;

pub struct UrlChecker {
    backend: Arc<dyn RetrieverBackend>,
}

impl UrlChecker {
    pub fn new(backend: Arc<dyn RetrieverBackend>) -> Self {
        Self { backend }
    }

    pub async fn check_url_exists(&self, url: &str) -> Result<UrlCheckResult, CrawlError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ValidationError::EmptySearchUrl.into());
        }

        let payload = self.backend.search_url(url).await?;
        let mut matches = payload.matching_urls;
        matches.truncate(MAX_URL_MATCHES);

        let incomplete = payload.total_checked >= URL_CHECK_ROW_CAP;
        let result = UrlCheckResult {
            search_url: if payload.search_url.is_empty() {
                url.to_string()
            } else {
                payload.search_url
            },
            found: payload.found.unwrap_or(!matches.is_empty()),
            count: payload.count.unwrap_or(matches.len()),
            total_checked: payload.total_checked,
            matches,
            checked_at: payload.checked_at,
            incomplete,
            error: payload.error,
        };

        debug!(
            search_url = %result.search_url,
            found = result.found,
            total_checked = result.total_checked,
            incomplete,
            "url existence check finished"
        );
        Ok(result)
    }
}
