use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api_server::http;
use shared::backend::BackendClient;
use shared::config::{ApiConfig, load_dotenv};
use shared::repos::Store;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const CONVERSATION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "api_server=debug,shared=debug,axum=info".to_string());
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = match ApiConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    let store = match Store::connect(&config.database_url, config.database_max_connections).await
    {
        Ok(store) => store,
        Err(err) => {
            error!("failed to connect to postgres: {err}");
            std::process::exit(1);
        }
    };

    let migrator = match sqlx::migrate::Migrator::new(config.migrations_dir.clone()).await {
        Ok(migrator) => migrator,
        Err(err) => {
            error!("failed to load migrations: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = migrator.run(store.pool()).await {
        error!("failed to run migrations: {err}");
        std::process::exit(1);
    }

    let http_client = match http::backend_http_client() {
        Ok(client) => client,
        Err(err) => {
            error!("failed to build http client: {err}");
            std::process::exit(1);
        }
    };

    let backend = match BackendClient::new(&config.backend, http_client) {
        Ok(backend) => backend,
        Err(err) => {
            error!("invalid retriever backend config: {err}");
            std::process::exit(1);
        }
    };

    let state = http::AppState::new(
        Arc::new(store),
        Arc::new(backend),
        config.refresh_delays,
    )
    .with_conversation_idle_ttl(config.conversation_idle_ttl);
    let dashboard = state.dashboard.clone();

    let shutdown = CancellationToken::new();
    let sweeper = state
        .conversations
        .spawn_idle_sweeper(CONVERSATION_SWEEP_INTERVAL, shutdown.clone());

    let view = dashboard.mount().await;
    match (&view.snapshot, &view.sites) {
        (Some(snapshot), Some(sites)) => info!(
            total_documents = snapshot.total_documents,
            sites = sites.sites.len(),
            "crawl dashboard loaded"
        ),
        _ => warn!("crawl dashboard loaded without full backend state"),
    }

    let app = http::build_router(state);

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!("invalid API_BIND_ADDR {}: {err}", config.bind_addr);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    info!(
        "api server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {err}");
            }
            info!("shutdown signal received");
        })
        .await;

    dashboard.close();
    shutdown.cancel();
    if let Err(err) = sweeper.await {
        warn!("conversation sweeper ended abnormally: {err}");
    }

    if let Err(err) = served {
        error!("server error: {err}");
        std::process::exit(1);
    }
}
