mod dashboard;
mod registry;
mod scheduler;
mod status;
mod submitter;
mod url_check;

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::backend::BackendError;

pub use dashboard::{CrawlDashboard, DashboardView};
pub use registry::{SiteRegistry, ToggleOutcome};
pub use scheduler::RefreshScheduler;
pub use status::StatusPoller;
pub use submitter::{
    CrawlSubmitter, MAX_CRAWL_DEPTH, MIN_CRAWL_DEPTH, SubmittedCrawl, auto_submission_summary,
    validate_manual_request,
};
pub use url_check::{MAX_URL_MATCHES, URL_CHECK_ROW_CAP, UrlChecker};

/// Input rejected before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("root url is empty")]
    EmptyRootUrl,
    #[error("max depth {0} is outside the allowed range")]
    DepthOutOfRange(u32),
    #[error("search url is empty")]
    EmptySearchUrl,
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("status refresh failed: {0}")]
    StatusUnavailable(String),
}

impl CrawlError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationError::EmptyRootUrl) => "Enter a URL to crawl.".to_string(),
            Self::Validation(ValidationError::DepthOutOfRange(_)) => {
                format!("Crawl depth must be between {MIN_CRAWL_DEPTH} and {MAX_CRAWL_DEPTH}.")
            }
            Self::Validation(ValidationError::EmptySearchUrl) => {
                "Enter a URL to search for.".to_string()
            }
            Self::Backend(err) => err.user_message(),
            Self::StatusUnavailable(message) => message.clone(),
        }
    }
}
