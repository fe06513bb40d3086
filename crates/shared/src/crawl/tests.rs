use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::{
    CrawlDashboard, CrawlError, CrawlSubmitter, MAX_URL_MATCHES, RefreshScheduler, SiteRegistry,
    StatusPoller, ToggleOutcome, URL_CHECK_ROW_CAP, UrlChecker, ValidationError,
    auto_submission_summary,
};
use crate::backend::fake::{FakeBackend, FakeCall};
use crate::backend::{DbStatusPayload, UrlSearchPayload};
use crate::config::RefreshDelays;
use crate::models::{CrawlJobKind, DocumentUpdate};

fn update(url: &str) -> DocumentUpdate {
    DocumentUpdate {
        url: url.to_string(),
        updated_at: "2024-05-01 10:00:00".to_string(),
        chunk_index: 0,
        total_chunks: 1,
    }
}

fn status_calls(backend: &FakeBackend) -> usize {
    backend.count_calls(|call| matches!(call, FakeCall::DbStatus))
}

#[tokio::test]
async fn manual_submit_accepts_every_depth_in_range() {
    let backend = Arc::new(FakeBackend::new());
    let submitter = CrawlSubmitter::new(backend.clone());

    let mut task_ids = Vec::new();
    for depth in 1..=5 {
        let submitted = submitter
            .submit_manual("https://example.edu", depth)
            .await
            .expect("depth in range should be accepted");
        assert_eq!(submitted.job.kind, CrawlJobKind::Manual);
        assert!(!task_ids.contains(&submitted.job.task_id));
        task_ids.push(submitted.job.task_id);
    }

    assert_eq!(submitter.jobs().len(), 5);
}

#[tokio::test]
async fn manual_submit_rejects_bad_input_without_calling_backend() {
    let backend = Arc::new(FakeBackend::new());
    let submitter = CrawlSubmitter::new(backend.clone());

    for (url, depth, expected) in [
        ("https://example.edu", 0, ValidationError::DepthOutOfRange(0)),
        ("https://example.edu", 6, ValidationError::DepthOutOfRange(6)),
        ("   ", 2, ValidationError::EmptyRootUrl),
    ] {
        let err = submitter
            .submit_manual(url, depth)
            .await
            .expect_err("invalid input should be rejected");
        assert!(matches!(err, CrawlError::Validation(ref found) if *found == expected));
    }

    assert!(backend.calls().is_empty());
    assert!(submitter.jobs().is_empty());
}

#[tokio::test]
async fn manual_submit_trims_root_url() {
    let backend = Arc::new(FakeBackend::new());
    let submitter = CrawlSubmitter::new(backend.clone());

    submitter
        .submit_manual("  https://example.edu  ", 2)
        .await
        .expect("submit");

    assert_eq!(
        backend.calls(),
        vec![FakeCall::ManualCrawl {
            root_url: "https://example.edu".to_string(),
            max_depth: 2,
        }]
    );
}

#[tokio::test]
async fn auto_submit_reports_sites_enabled_at_submission() {
    let backend = Arc::new(FakeBackend::new().with_sites(&[("A", true), ("B", true), ("C", false)]));
    backend.set_auto_task_id("xyz789");
    let submitter = CrawlSubmitter::new(backend.clone());

    let submitted = submitter.submit_auto().await.expect("auto submit");

    assert_eq!(submitted.job.task_id, "xyz789");
    assert_eq!(submitted.job.kind, CrawlJobKind::Auto);
    assert_eq!(submitted.sites, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(
        auto_submission_summary(&submitted),
        "Auto crawl started (task xyz789).\nSites:\n- A\n- B"
    );
}

#[tokio::test]
async fn auto_submit_surfaces_backend_rejection() {
    let backend = Arc::new(FakeBackend::new().with_sites(&[("A", false)]));
    let submitter = CrawlSubmitter::new(backend.clone());

    let err = submitter.submit_auto().await.expect_err("no enabled sites");

    assert_eq!(err.user_message(), "No enabled sites to crawl");
    assert!(submitter.jobs().is_empty());
}

#[tokio::test]
async fn toggle_while_pending_sends_no_second_request() {
    let backend = Arc::new(FakeBackend::new().with_sites(&[("X", true)]));
    backend.hold_toggles();
    let registry = Arc::new(SiteRegistry::new(backend.clone()));

    let first = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.toggle_site("X").await })
    };
    while backend.count_calls(|call| matches!(call, FakeCall::ToggleSite(_))) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(registry.is_toggling());

    let second = registry.toggle_site("X").await.expect("second toggle");
    assert_eq!(second, ToggleOutcome::Ignored);
    let other = registry.toggle_site("Y").await.expect("other site toggle");
    assert_eq!(other, ToggleOutcome::Ignored);

    backend.release_toggles();
    let first = first
        .await
        .expect("toggle task should join")
        .expect("first toggle");

    let ToggleOutcome::Toggled { response, sites } = first else {
        panic!("first toggle should go through");
    };
    assert!(!response.enabled);
    let sites = sites.expect("list should be re-fetched");
    assert!(!sites.sites[0].enabled);

    assert_eq!(
        backend.count_calls(|call| matches!(call, FakeCall::ToggleSite(_))),
        1
    );
    assert_eq!(
        backend.calls().last(),
        Some(&FakeCall::ListSites),
        "toggle should reconcile with a full list fetch"
    );
    assert!(!registry.is_toggling());
}

#[tokio::test(start_paused = true)]
async fn toggle_guard_is_released_when_future_is_dropped() {
    let backend = Arc::new(FakeBackend::new().with_sites(&[("X", true)]));
    backend.hold_toggles();
    let registry = SiteRegistry::new(backend.clone());

    let timed_out = tokio::time::timeout(Duration::from_millis(10), registry.toggle_site("X")).await;
    assert!(timed_out.is_err());
    assert!(!registry.is_toggling());

    backend.release_toggles();
    let outcome = registry.toggle_site("X").await.expect("toggle after drop");
    assert!(matches!(outcome, ToggleOutcome::Toggled { .. }));
}

#[tokio::test]
async fn toggle_keeps_result_when_list_refresh_fails() {
    let backend = Arc::new(FakeBackend::new().with_sites(&[("X", false)]));
    backend.set_list_sites_error(Some((503, "busy".to_string())));
    let registry = SiteRegistry::new(backend.clone());

    let outcome = registry.toggle_site("X").await.expect("toggle");

    let ToggleOutcome::Toggled { response, sites } = outcome else {
        panic!("toggle should go through");
    };
    assert!(response.enabled);
    assert!(sites.is_none());
}

#[tokio::test]
async fn refresh_replaces_snapshot_wholesale() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_db_status(Ok(DbStatusPayload {
        total_documents: 10,
        recent_updates: vec![update("https://example.edu/a"), update("https://example.edu/b")],
        last_checked: "first".to_string(),
        ..DbStatusPayload::default()
    }));
    backend.push_db_status(Ok(DbStatusPayload::default()));
    let poller = StatusPoller::new(backend.clone());

    let first = poller.refresh_status().await.expect("first refresh");
    assert_eq!(first.recent_updates.len(), 2);

    poller.refresh_status().await.expect("second refresh");
    let snapshot = poller.snapshot().expect("snapshot present");
    assert!(snapshot.recent_updates.is_empty());
    assert_eq!(snapshot.total_documents, 0);
    assert_eq!(snapshot.last_checked, "");
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_db_status(Ok(DbStatusPayload {
        total_documents: 7,
        ..DbStatusPayload::default()
    }));
    backend.push_db_status(Ok(DbStatusPayload {
        status: Some("error".to_string()),
        error: Some("collection missing".to_string()),
        ..DbStatusPayload::default()
    }));
    backend.push_db_status(Err((502, "bad gateway".to_string())));
    let poller = StatusPoller::new(backend.clone());

    poller.refresh_status().await.expect("first refresh");
    let err = poller
        .refresh_status()
        .await
        .expect_err("error status payload");
    assert!(matches!(err, CrawlError::StatusUnavailable(ref message) if message == "collection missing"));
    poller
        .refresh_status()
        .await
        .expect_err("transport failure");

    assert_eq!(poller.snapshot().expect("kept").total_documents, 7);
}

#[tokio::test]
async fn url_check_flags_capped_scan_as_incomplete() {
    let backend = Arc::new(FakeBackend::new());
    let matching: Vec<DocumentUpdate> = (0..URL_CHECK_ROW_CAP)
        .map(|index| update(&format!("https://example.edu/page/{index}")))
        .collect();
    backend.set_search(Ok(UrlSearchPayload {
        search_url: "https://example.edu/page".to_string(),
        found: Some(true),
        count: Some(URL_CHECK_ROW_CAP),
        total_checked: URL_CHECK_ROW_CAP,
        matching_urls: matching,
        checked_at: "2024-05-01 10:05:00".to_string(),
        error: None,
    }));
    let checker = UrlChecker::new(backend.clone());

    let result = checker
        .check_url_exists(" https://example.edu/page ")
        .await
        .expect("check");

    assert_eq!(result.total_checked, 1000);
    assert!(result.incomplete);
    assert!(result.found);
    assert_eq!(result.count, 1000);
    assert_eq!(result.matches.len(), MAX_URL_MATCHES);
    assert_eq!(
        backend.calls(),
        vec![FakeCall::SearchUrl("https://example.edu/page".to_string())]
    );
}

#[tokio::test]
async fn url_check_fills_missing_counts_from_matches() {
    let backend = Arc::new(FakeBackend::new());
    backend.set_search(Ok(UrlSearchPayload {
        total_checked: 12,
        matching_urls: vec![update("https://example.edu/a")],
        ..UrlSearchPayload::default()
    }));
    let checker = UrlChecker::new(backend.clone());

    let result = checker
        .check_url_exists("https://example.edu/a")
        .await
        .expect("check");

    assert!(result.found);
    assert_eq!(result.count, 1);
    assert!(!result.incomplete);
    assert_eq!(result.search_url, "https://example.edu/a");
}

#[tokio::test]
async fn url_check_rejects_empty_input() {
    let backend = Arc::new(FakeBackend::new());
    let checker = UrlChecker::new(backend.clone());

    let err = checker.check_url_exists("  ").await.expect_err("empty");

    assert!(matches!(
        err,
        CrawlError::Validation(ValidationError::EmptySearchUrl)
    ));
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn manual_submission_fires_one_refresh_after_manual_delay() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_manual_task_id("abc123");
    let dashboard = CrawlDashboard::new(backend.clone(), RefreshDelays::default());

    let (submitted, refresh) = dashboard
        .submit_manual("https://example.edu", 2)
        .await
        .expect("submit");
    assert_eq!(submitted.job.task_id, "abc123");
    assert_eq!(dashboard.pending_refreshes(), 1);

    sleep(Duration::from_secs(29)).await;
    assert_eq!(status_calls(&backend), 0);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(status_calls(&backend), 1);
    assert!(refresh.await.expect("refresh task"));
    assert_eq!(dashboard.pending_refreshes(), 0);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(status_calls(&backend), 1);
}

#[tokio::test(start_paused = true)]
async fn auto_submission_waits_the_longer_delay() {
    let backend = Arc::new(FakeBackend::new().with_sites(&[("A", true), ("B", true)]));
    backend.set_auto_task_id("xyz789");
    let dashboard = CrawlDashboard::new(backend.clone(), RefreshDelays::default());

    let (submitted, refresh) = dashboard.submit_auto().await.expect("submit");
    assert_eq!(submitted.sites, vec!["A".to_string(), "B".to_string()]);

    sleep(Duration::from_secs(59)).await;
    assert_eq!(status_calls(&backend), 0);

    assert!(refresh.await.expect("refresh task"));
    assert_eq!(status_calls(&backend), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_dashboard_cancels_pending_refreshes() {
    let backend = Arc::new(FakeBackend::new());
    let dashboard = CrawlDashboard::new(backend.clone(), RefreshDelays::default());

    let (_, refresh) = dashboard
        .submit_manual("https://example.edu", 2)
        .await
        .expect("submit");
    drop(dashboard);

    assert!(!refresh.await.expect("refresh task"));
    sleep(Duration::from_secs(120)).await;
    assert_eq!(status_calls(&backend), 0);
}

#[tokio::test(start_paused = true)]
async fn mount_refreshes_status_and_lists_sites() {
    let backend = Arc::new(FakeBackend::new().with_sites(&[("A", true), ("B", false)]));
    backend.push_db_status(Ok(DbStatusPayload {
        total_documents: 3,
        ..DbStatusPayload::default()
    }));
    let dashboard = CrawlDashboard::new(backend.clone(), RefreshDelays::default());

    let view = dashboard.mount().await;

    assert_eq!(view.snapshot.expect("snapshot").total_documents, 3);
    let sites = view.sites.expect("sites");
    assert_eq!(sites.sites.len(), 2);
    let enabled: Vec<_> = sites.enabled_sites().map(|site| site.name.as_str()).collect();
    let disabled: Vec<_> = sites.disabled_sites().map(|site| site.name.as_str()).collect();
    assert_eq!(enabled, vec!["A"]);
    assert_eq!(disabled, vec!["B"]);
    assert_eq!(status_calls(&backend), 1);
    assert_eq!(dashboard.pending_refreshes(), 0);
}

#[tokio::test(start_paused = true)]
async fn parent_token_cancellation_reaches_scheduled_refreshes() {
    let backend = Arc::new(FakeBackend::new());
    let poller = Arc::new(StatusPoller::new(backend.clone()));
    let parent = CancellationToken::new();
    let scheduler = RefreshScheduler::new(poller, parent.child_token());

    let refresh = scheduler.schedule_refresh(Duration::from_secs(30), CrawlJobKind::Manual);
    parent.cancel();

    assert!(!refresh.await.expect("refresh task"));
    assert!(scheduler.is_cancelled());
    assert_eq!(status_calls(&backend), 0);
}
