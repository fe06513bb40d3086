use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::RetrieverBackend;
use crate::config::RefreshDelays;
use crate::models::{CrawlJob, CrawlJobKind, CrawlSites, DbStatusSnapshot, UrlCheckResult};

use super::registry::{SiteRegistry, ToggleOutcome};
use super::scheduler::RefreshScheduler;
use super::status::StatusPoller;
use super::submitter::{CrawlSubmitter, SubmittedCrawl};
use super::url_check::UrlChecker;
use super::CrawlError;

/// State shown right after mounting. Either half is `None` if its fetch failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardView {
    pub snapshot: Option<DbStatusSnapshot>,
    pub sites: Option<CrawlSites>,
}

/// One crawl-admin view. Owns the deferred refreshes it schedules and
/// cancels them when closed or dropped.
pub struct CrawlDashboard {
    submitter: CrawlSubmitter,
    registry: SiteRegistry,
    poller: Arc<StatusPoller>,
    checker: UrlChecker,
    scheduler: RefreshScheduler,
    delays: RefreshDelays,
}

impl CrawlDashboard {
    pub fn new(backend: Arc<dyn RetrieverBackend>, delays: RefreshDelays) -> Self {
        Self::with_token(backend, delays, CancellationToken::new())
    }

    pub fn with_token(
        backend: Arc<dyn RetrieverBackend>,
        delays: RefreshDelays,
        token: CancellationToken,
    ) -> Self {
        let poller = Arc::new(StatusPoller::new(backend.clone()));
        Self {
            submitter: CrawlSubmitter::new(backend.clone()),
            registry: SiteRegistry::new(backend.clone()),
            checker: UrlChecker::new(backend),
            scheduler: RefreshScheduler::new(poller.clone(), token),
            poller,
            delays,
        }
    }

    /// Initial status refresh and site listing, run concurrently.
    pub async fn mount(&self) -> DashboardView {
        let (snapshot, sites) = tokio::join!(self.poller.refresh_status(), self.registry.list_sites());
        let sites = match sites {
            Ok(sites) => Some(sites),
            Err(err) => {
                warn!(error = %err, "initial site listing failed");
                None
            }
        };

        DashboardView {
            snapshot: snapshot.ok().or_else(|| self.poller.snapshot()),
            sites,
        }
    }

    pub fn refresh_delay(&self, kind: CrawlJobKind) -> Duration {
        match kind {
            CrawlJobKind::Manual => self.delays.manual,
            CrawlJobKind::Auto => self.delays.auto,
        }
    }

    /// Submits a manual job and schedules exactly one deferred refresh.
    pub async fn submit_manual(
        &self,
        root_url: &str,
        max_depth: u32,
    ) -> Result<(SubmittedCrawl, JoinHandle<bool>), CrawlError> {
        let submitted = self.submitter.submit_manual(root_url, max_depth).await?;
        let refresh = self.schedule(&submitted);
        Ok((submitted, refresh))
    }

    /// Submits an auto job and schedules exactly one deferred refresh.
    pub async fn submit_auto(&self) -> Result<(SubmittedCrawl, JoinHandle<bool>), CrawlError> {
        let submitted = self.submitter.submit_auto().await?;
        let refresh = self.schedule(&submitted);
        Ok((submitted, refresh))
    }

    pub fn jobs(&self) -> Vec<CrawlJob> {
        self.submitter.jobs()
    }

    pub async fn list_sites(&self) -> Result<CrawlSites, CrawlError> {
        self.registry.list_sites().await
    }

    pub async fn toggle_site(&self, site_name: &str) -> Result<ToggleOutcome, CrawlError> {
        self.registry.toggle_site(site_name).await
    }

    pub async fn refresh_status(&self) -> Result<DbStatusSnapshot, CrawlError> {
        self.poller.refresh_status().await
    }

    pub fn snapshot(&self) -> Option<DbStatusSnapshot> {
        self.poller.snapshot()
    }

    pub async fn check_url_exists(&self, url: &str) -> Result<UrlCheckResult, CrawlError> {
        self.checker.check_url_exists(url).await
    }

    pub fn pending_refreshes(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn close(&self) {
        if !self.scheduler.is_cancelled() {
            info!(pending = self.scheduler.pending(), "closing crawl dashboard");
            self.scheduler.cancel();
        }
    }

    fn schedule(&self, submitted: &SubmittedCrawl) -> JoinHandle<bool> {
        let delay = self.refresh_delay(submitted.job.kind);
        info!(
            task_id = %submitted.job.task_id,
            delay_ms = delay.as_millis() as u64,
            "status refresh scheduled"
        );
        self.scheduler.schedule_refresh(delay, submitted.job.kind)
    }
}

impl Drop for CrawlDashboard {
    fn drop(&mut self) {
        self.close();
    }
}
