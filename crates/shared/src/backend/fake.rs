use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Semaphore;

use crate::models::{
    AnswerResponse, AutoCrawlResponse, CrawlSettings, CrawlSite, CrawlSites, CrawlTaskResponse,
    ManualCrawlRequest, ToggleSiteResponse,
};

use super::{BackendError, BackendFuture, DbStatusPayload, RetrieverBackend, UrlSearchPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FakeCall {
    Answer(String),
    ManualCrawl { root_url: String, max_depth: u32 },
    AutoCrawl,
    ListSites,
    ToggleSite(String),
    DbStatus,
    SearchUrl(String),
}

type Scripted<T> = Result<T, (u16, String)>;

struct FakeState {
    calls: Vec<FakeCall>,
    answer: Scripted<AnswerResponse>,
    manual_task_ids: VecDeque<String>,
    auto_task_id: String,
    sites: CrawlSites,
    list_sites_error: Option<(u16, String)>,
    db_status: VecDeque<Scripted<DbStatusPayload>>,
    search: Scripted<UrlSearchPayload>,
}

/// Scripted retriever used by component tests. Records every call and can
/// hold site toggles until released.
pub(crate) struct FakeBackend {
    state: Mutex<FakeState>,
    toggle_gate: Mutex<Option<Arc<Semaphore>>>,
    task_counter: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                calls: Vec::new(),
                answer: Ok(AnswerResponse {
                    answer: "fake answer".to_string(),
                    sources: Some(vec!["https://example.edu/source".to_string()]),
                }),
                manual_task_ids: VecDeque::new(),
                auto_task_id: "auto-task".to_string(),
                sites: CrawlSites {
                    sites: Vec::new(),
                    settings: CrawlSettings::default(),
                    schedule: String::new(),
                },
                list_sites_error: None,
                db_status: VecDeque::new(),
                search: Ok(UrlSearchPayload::default()),
            }),
            toggle_gate: Mutex::new(None),
            task_counter: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_sites(self, sites: &[(&str, bool)]) -> Self {
        self.lock().sites.sites = sites
            .iter()
            .map(|(name, enabled)| CrawlSite {
                name: name.to_string(),
                url: format!("https://{}.example.edu", name.to_lowercase()),
                description: String::new(),
                enabled: *enabled,
            })
            .collect();
        self
    }

    pub(crate) fn set_answer(&self, answer: Scripted<AnswerResponse>) {
        self.lock().answer = answer;
    }

    pub(crate) fn push_manual_task_id(&self, task_id: &str) {
        self.lock().manual_task_ids.push_back(task_id.to_string());
    }

    pub(crate) fn set_auto_task_id(&self, task_id: &str) {
        self.lock().auto_task_id = task_id.to_string();
    }

    pub(crate) fn set_list_sites_error(&self, error: Option<(u16, String)>) {
        self.lock().list_sites_error = error;
    }

    pub(crate) fn push_db_status(&self, status: Scripted<DbStatusPayload>) {
        self.lock().db_status.push_back(status);
    }

    pub(crate) fn set_search(&self, search: Scripted<UrlSearchPayload>) {
        self.lock().search = search;
    }

    pub(crate) fn hold_toggles(&self) {
        *self.lock_gate() = Some(Arc::new(Semaphore::new(0)));
    }

    pub(crate) fn release_toggles(&self) {
        if let Some(gate) = self.lock_gate().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub(crate) fn calls(&self) -> Vec<FakeCall> {
        self.lock().calls.clone()
    }

    pub(crate) fn count_calls(&self, predicate: impl Fn(&FakeCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: FakeCall) {
        self.lock().calls.push(call);
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake backend state should not be poisoned")
    }

    fn lock_gate(&self) -> MutexGuard<'_, Option<Arc<Semaphore>>> {
        self.toggle_gate
            .lock()
            .expect("fake backend gate should not be poisoned")
    }
}

fn scripted<T: Clone>(value: &Scripted<T>) -> Result<T, BackendError> {
    value.clone().map_err(|(status, message)| BackendError::Status {
        status,
        message: Some(message),
    })
}

impl RetrieverBackend for FakeBackend {
    fn answer<'a>(&'a self, question: &'a str) -> BackendFuture<'a, AnswerResponse> {
        Box::pin(async move {
            self.record(FakeCall::Answer(question.to_string()));
            tokio::task::yield_now().await;
            scripted(&self.lock().answer)
        })
    }

    fn submit_manual_crawl<'a>(
        &'a self,
        request: &'a ManualCrawlRequest,
    ) -> BackendFuture<'a, CrawlTaskResponse> {
        Box::pin(async move {
            self.record(FakeCall::ManualCrawl {
                root_url: request.root_url.clone(),
                max_depth: request.max_depth,
            });
            tokio::task::yield_now().await;
            let next = self.task_counter.fetch_add(1, Ordering::SeqCst);
            let task_id = self
                .lock()
                .manual_task_ids
                .pop_front()
                .unwrap_or_else(|| format!("manual-task-{next}"));
            Ok(CrawlTaskResponse { task_id })
        })
    }

    fn submit_auto_crawl(&self) -> BackendFuture<'_, AutoCrawlResponse> {
        Box::pin(async move {
            self.record(FakeCall::AutoCrawl);
            tokio::task::yield_now().await;
            let state = self.lock();
            let enabled: Vec<String> = state
                .sites
                .enabled_sites()
                .map(|site| site.name.clone())
                .collect();
            if enabled.is_empty() {
                return Err(BackendError::Status {
                    status: 400,
                    message: Some("No enabled sites to crawl".to_string()),
                });
            }
            Ok(AutoCrawlResponse {
                task_id: state.auto_task_id.clone(),
                sites: enabled,
            })
        })
    }

    fn list_sites(&self) -> BackendFuture<'_, CrawlSites> {
        Box::pin(async move {
            self.record(FakeCall::ListSites);
            tokio::task::yield_now().await;
            let state = self.lock();
            if let Some((status, message)) = state.list_sites_error.clone() {
                return Err(BackendError::Status {
                    status,
                    message: Some(message),
                });
            }
            Ok(state.sites.clone())
        })
    }

    fn toggle_site<'a>(&'a self, site_name: &'a str) -> BackendFuture<'a, ToggleSiteResponse> {
        Box::pin(async move {
            self.record(FakeCall::ToggleSite(site_name.to_string()));
            let gate = self.lock_gate().clone();
            if let Some(gate) = gate {
                let permit = gate
                    .acquire()
                    .await
                    .expect("toggle gate should stay open");
                permit.forget();
            }
            tokio::task::yield_now().await;

            let mut state = self.lock();
            let Some(site) = state.sites.sites.iter_mut().find(|site| site.name == site_name)
            else {
                return Err(BackendError::Status {
                    status: 404,
                    message: Some(format!("Site '{site_name}' not found")),
                });
            };
            site.enabled = !site.enabled;
            let enabled = site.enabled;
            Ok(ToggleSiteResponse {
                site_name: site_name.to_string(),
                enabled,
                message: format!(
                    "Site '{site_name}' {}",
                    if enabled { "enabled" } else { "disabled" }
                ),
            })
        })
    }

    fn db_status(&self) -> BackendFuture<'_, DbStatusPayload> {
        Box::pin(async move {
            self.record(FakeCall::DbStatus);
            tokio::task::yield_now().await;
            let next = self
                .lock()
                .db_status
                .pop_front()
                .unwrap_or_else(|| Ok(DbStatusPayload::default()));
            scripted(&next)
        })
    }

    fn search_url<'a>(&'a self, url: &'a str) -> BackendFuture<'a, UrlSearchPayload> {
        Box::pin(async move {
            self.record(FakeCall::SearchUrl(url.to_string()));
            tokio::task::yield_now().await;
            scripted(&self.lock().search)
        })
    }
}
