use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::crawl::{SubmittedCrawl, ToggleOutcome, auto_submission_summary};
use shared::models::{
    CrawlJobKind, DbStatusResponse, ListCrawlJobsResponse, ManualCrawlRequest, SubmitCrawlResponse,
    ToggleSiteOutcomeResponse, UrlSearchQuery,
};

use super::AppState;
use super::errors::{crawl_error_response, json_rejection_response};

pub(super) async fn submit_manual_crawl(
    State(state): State<AppState>,
    body: Result<Json<ManualCrawlRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return json_rejection_response(rejection),
    };

    match state
        .dashboard
        .submit_manual(&req.root_url, req.max_depth)
        .await
    {
        // The refresh task runs detached; dropping its handle does not cancel it.
        Ok((submitted, _refresh)) => submitted_response(&state, submitted),
        Err(err) => crawl_error_response(err),
    }
}

pub(super) async fn submit_auto_crawl(State(state): State<AppState>) -> Response {
    match state.dashboard.submit_auto().await {
        Ok((submitted, _refresh)) => submitted_response(&state, submitted),
        Err(err) => crawl_error_response(err),
    }
}

pub(super) async fn list_crawl_jobs(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(ListCrawlJobsResponse {
            items: state.dashboard.jobs(),
        }),
    )
        .into_response()
}

pub(super) async fn list_crawl_sites(State(state): State<AppState>) -> Response {
    match state.dashboard.list_sites().await {
        Ok(sites) => (StatusCode::OK, Json(sites)).into_response(),
        Err(err) => crawl_error_response(err),
    }
}

pub(super) async fn toggle_crawl_site(
    State(state): State<AppState>,
    Path(site_name): Path<String>,
) -> Response {
    let response = match state.dashboard.toggle_site(&site_name).await {
        Ok(ToggleOutcome::Ignored) => ToggleSiteOutcomeResponse {
            accepted: false,
            toggled: None,
            sites: None,
        },
        Ok(ToggleOutcome::Toggled { response, sites }) => ToggleSiteOutcomeResponse {
            accepted: true,
            toggled: Some(response),
            sites,
        },
        Err(err) => return crawl_error_response(err),
    };

    (StatusCode::OK, Json(response)).into_response()
}

pub(super) async fn get_db_status(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(DbStatusResponse {
            snapshot: state.dashboard.snapshot(),
        }),
    )
        .into_response()
}

pub(super) async fn refresh_db_status(State(state): State<AppState>) -> Response {
    match state.dashboard.refresh_status().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(DbStatusResponse {
                snapshot: Some(snapshot),
            }),
        )
            .into_response(),
        Err(err) => crawl_error_response(err),
    }
}

pub(super) async fn search_url(
    State(state): State<AppState>,
    Query(query): Query<UrlSearchQuery>,
) -> Response {
    match state.dashboard.check_url_exists(&query.url).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => crawl_error_response(err),
    }
}

fn submitted_response(state: &AppState, submitted: SubmittedCrawl) -> Response {
    let refresh_after_ms = state.dashboard.refresh_delay(submitted.job.kind).as_millis() as u64;
    let summary = (submitted.job.kind == CrawlJobKind::Auto)
        .then(|| auto_submission_summary(&submitted));
    (
        StatusCode::ACCEPTED,
        Json(SubmitCrawlResponse {
            job: submitted.job,
            sites: submitted.sites,
            refresh_after_ms,
            summary,
        }),
    )
        .into_response()
}
