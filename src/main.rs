mod admin;
mod availability;
mod balance;
mod block;
mod common;
mod engine;
mod gateway;
mod http_client;
mod model;
mod proxy_selector;
mod registry;
mod selector;
mod upstream;

use std::sync::Arc;

use axum::Router;
use clap::Parser;

use admin::{AdminService, AdminState, create_admin_router};
use engine::Engine;
use gateway::router::create_gateway_router;
use model::arg::Args;
use model::config::Config;
use proxy_selector::ProxyClientCache;
use registry::Store;
use selector::KeySelector;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().with_args(args.port, args.state_file);

    tracing::info!("loading state from {}", config.state_file);
    let store = Arc::new(Store::load(&config.state_file));
    let selector = Arc::new(KeySelector::new());

    let direct_client = http_client::build_client(None, config.upstream_timeout).unwrap_or_else(|e| {
        tracing::error!("failed to build upstream HTTP client: {}", e);
        std::process::exit(1);
    });
    let proxy_clients = Arc::new(ProxyClientCache::new());

    let engine = Arc::new(Engine::new(
        store.clone(),
        selector.clone(),
        direct_client,
        proxy_clients,
        config.clone(),
    ));

    // Purges expired upstream block records every 5 minutes, independent of
    // the request path.
    tokio::spawn(block::run_purge_loop(store.clone()));

    let gateway_app = create_gateway_router(engine.clone(), config.clone());

    let app = if config.auth_enabled() {
        let admin_service = AdminService::new(engine.clone());
        let admin_state = AdminState::new(config.admin_password.clone(), admin_service);
        let admin_app = create_admin_router(admin_state);
        tracing::info!("admin API enabled at /api/admin");
        Router::new()
            .nest("/api/proxy", gateway_app)
            .nest("/api/admin", admin_app)
    } else {
        tracing::warn!("ADMIN_PASSWORD is empty; client and admin endpoints are unauthenticated");
        Router::new().nest("/api/proxy", gateway_app)
    };

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting reverse proxy on {}", addr);
    tracing::info!("  POST /api/proxy/chat/completions");
    tracing::info!("  GET  /api/proxy/health");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        tracing::error!("failed to bind {}: {}", addr, e);
        std::process::exit(1);
    });
    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    });
}
