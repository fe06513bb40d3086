use std::sync::Arc;
use std::time::Duration;

use api_server::http::{AppState, backend_http_client, build_router};
use shared::backend::BackendClient;
use shared::config::{BackendConfig, RefreshDelays};
use shared::repos::ChatStore;

pub const TEST_REFRESH_DELAYS: RefreshDelays = RefreshDelays {
    manual: Duration::from_millis(50),
    auto: Duration::from_millis(100),
};

pub fn build_test_router(store: Arc<dyn ChatStore>, backend_base_url: &str) -> axum::Router {
    let http_client = backend_http_client().expect("http client should initialize");
    let backend_config =
        BackendConfig::new(backend_base_url).expect("mock backend url should be valid");
    let backend =
        BackendClient::new(&backend_config, http_client).expect("backend client should build");

    build_router(AppState::new(
        store,
        Arc::new(backend),
        TEST_REFRESH_DELAYS,
    ))
}
