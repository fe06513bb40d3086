use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::CrawlJobKind;

use super::status::StatusPoller;

/// One-shot deferred status refreshes tied to a view's lifetime.
///
/// Cancelling drops timers that have not fired yet. A refresh that already
/// started runs to completion.
pub struct RefreshScheduler {
    poller: Arc<StatusPoller>,
    token: CancellationToken,
    pending: Arc<AtomicUsize>,
}

impl RefreshScheduler {
    pub fn new(poller: Arc<StatusPoller>, token: CancellationToken) -> Self {
        Self {
            poller,
            token,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Spawns a refresh after `delay`. The handle resolves to `true` if the
    /// refresh ran and `false` if it was cancelled first.
    pub fn schedule_refresh(&self, delay: Duration, kind: CrawlJobKind) -> JoinHandle<bool> {
        let poller = self.poller.clone();
        let token = self.token.child_token();
        let pending = self.pending.clone();
        pending.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let fired = tokio::select! {
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            };
            pending.fetch_sub(1, Ordering::SeqCst);

            if !fired {
                debug!(kind = ?kind, "deferred status refresh cancelled");
                return false;
            }

            if let Err(err) = poller.refresh_status().await {
                warn!(kind = ?kind, error = %err, "deferred status refresh failed");
            }
            true
        })
    }

    /// Timers scheduled but not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
