use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::backend::RetrieverBackend;
use crate::models::{CrawlSites, ToggleSiteResponse};

use super::CrawlError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Another toggle was in flight; nothing was sent.
    Ignored,
    Toggled {
        response: ToggleSiteResponse,
        /// Fresh list fetched after the toggle, `None` if that fetch failed.
        sites: Option<CrawlSites>,
    },
}

/// Lists crawl sites and toggles them one at a time.
pub struct SiteRegistry {
    backend: Arc<dyn RetrieverBackend>,
    toggling: AtomicBool,
}

struct ToggleGuard<'a>(&'a AtomicBool);

impl Drop for ToggleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SiteRegistry {
    pub fn new(backend: Arc<dyn RetrieverBackend>) -> Self {
        Self {
            backend,
            toggling: AtomicBool::new(false),
        }
    }

    pub async fn list_sites(&self) -> Result<CrawlSites, CrawlError> {
        Ok(self.backend.list_sites().await?)
    }

    pub fn is_toggling(&self) -> bool {
        self.toggling.load(Ordering::Acquire)
    }

    /// Toggles `site_name` unless any toggle is already pending, in which
    /// case the call is dropped. The server's `enabled` value wins and the
    /// whole list is re-fetched afterwards.
    pub async fn toggle_site(&self, site_name: &str) -> Result<ToggleOutcome, CrawlError> {
        if self
            .toggling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(site = site_name, "toggle ignored while another is pending");
            return Ok(ToggleOutcome::Ignored);
        }
        let _guard = ToggleGuard(&self.toggling);

        let response = self.backend.toggle_site(site_name).await?;
        info!(site = %response.site_name, enabled = response.enabled, "crawl site toggled");

        let sites = match self.backend.list_sites().await {
            Ok(sites) => Some(sites),
            Err(err) => {
                warn!(site = site_name, error = %err, "site list refresh after toggle failed");
                None
            }
        };

        Ok(ToggleOutcome::Toggled { response, sites })
    }
}
