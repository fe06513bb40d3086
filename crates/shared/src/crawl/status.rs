use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::backend::RetrieverBackend;
use crate::models::DbStatusSnapshot;

use super::CrawlError;

/// Holds the latest content-store snapshot. Each successful refresh replaces
/// it whole; failed refreshes leave the previous one in place.
pub struct StatusPoller {
    backend: Arc<dyn RetrieverBackend>,
    snapshot: RwLock<Option<DbStatusSnapshot>>,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn RetrieverBackend>) -> Self {
        Self {
            backend,
            snapshot: RwLock::new(None),
        }
    }

    pub fn snapshot(&self) -> Option<DbStatusSnapshot> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn refresh_status(&self) -> Result<DbStatusSnapshot, CrawlError> {
        let payload = match self.backend.db_status().await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "status refresh failed");
                return Err(err.into());
            }
        };

        let snapshot = match payload.into_snapshot() {
            Ok(snapshot) => snapshot,
            Err(message) => {
                warn!(error = %message, "content store reported an error status");
                return Err(CrawlError::StatusUnavailable(message));
            }
        };

        debug!(
            total_documents = snapshot.total_documents,
            recent_updates = snapshot.recent_updates.len(),
            "status snapshot replaced"
        );
        let mut slot = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(snapshot.clone());
        Ok(snapshot)
    }
}
