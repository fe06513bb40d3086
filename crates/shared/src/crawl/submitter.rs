use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::info;

use crate::backend::RetrieverBackend;
use crate::models::{CrawlJob, CrawlJobKind, ManualCrawlRequest};

use super::{CrawlError, ValidationError};

pub const MIN_CRAWL_DEPTH: u32 = 1;
pub const MAX_CRAWL_DEPTH: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedCrawl {
    pub job: CrawlJob,
    /// Sites enabled when an auto job was accepted. Empty for manual jobs.
    pub sites: Vec<String>,
}

pub fn validate_manual_request(
    root_url: &str,
    max_depth: u32,
) -> Result<ManualCrawlRequest, ValidationError> {
    let root_url = root_url.trim();
    if root_url.is_empty() {
        return Err(ValidationError::EmptyRootUrl);
    }
    if !(MIN_CRAWL_DEPTH..=MAX_CRAWL_DEPTH).contains(&max_depth) {
        return Err(ValidationError::DepthOutOfRange(max_depth));
    }

    Ok(ManualCrawlRequest {
        root_url: root_url.to_string(),
        max_depth,
    })
}

pub fn auto_submission_summary(submitted: &SubmittedCrawl) -> String {
    let mut summary = format!("Auto crawl started (task {}).", submitted.job.task_id);
    if !submitted.sites.is_empty() {
        summary.push_str("\nSites:");
        for site in &submitted.sites {
            summary.push_str("\n- ");
            summary.push_str(site);
        }
    }
    summary
}

/// Fire-and-forget crawl submission with an append-only job log.
pub struct CrawlSubmitter {
    backend: Arc<dyn RetrieverBackend>,
    jobs: Mutex<Vec<CrawlJob>>,
}

impl CrawlSubmitter {
    pub fn new(backend: Arc<dyn RetrieverBackend>) -> Self {
        Self {
            backend,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub async fn submit_manual(
        &self,
        root_url: &str,
        max_depth: u32,
    ) -> Result<SubmittedCrawl, CrawlError> {
        let request = validate_manual_request(root_url, max_depth)?;
        let response = self.backend.submit_manual_crawl(&request).await?;
        let job = self.record(response.task_id, CrawlJobKind::Manual);

        info!(
            task_id = %job.task_id,
            root_url = %request.root_url,
            max_depth = request.max_depth,
            "manual crawl submitted"
        );
        Ok(SubmittedCrawl {
            job,
            sites: Vec::new(),
        })
    }

    pub async fn submit_auto(&self) -> Result<SubmittedCrawl, CrawlError> {
        let response = self.backend.submit_auto_crawl().await?;
        let job = self.record(response.task_id, CrawlJobKind::Auto);

        info!(task_id = %job.task_id, sites = response.sites.len(), "auto crawl submitted");
        Ok(SubmittedCrawl {
            job,
            sites: response.sites,
        })
    }

    /// Jobs in submission order.
    pub fn jobs(&self) -> Vec<CrawlJob> {
        self.lock_jobs().clone()
    }

    fn record(&self, task_id: String, kind: CrawlJobKind) -> CrawlJob {
        let job = CrawlJob {
            task_id,
            kind,
            submitted_at: Utc::now(),
        };
        self.lock_jobs().push(job.clone());
        job
    }

    fn lock_jobs(&self) -> MutexGuard<'_, Vec<CrawlJob>> {
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
