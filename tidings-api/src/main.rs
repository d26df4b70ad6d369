//! Tidings API Server Entry Point
//!
//! Runs the feed over in-memory stores: one scope per name listed in
//! `TIDINGS_SCOPES` (default `default`), with a background task purging
//! expired records. `TIDINGS_OPEN_OPERATIONS` lists feed operations that need
//! no caller permission.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tidings_api::telemetry::{init_tracing, TelemetryConfig};
use tidings_api::{
    create_router, ApiError, ApiResult, AppState, FeedScope, NotificationService,
    PermissionTable, ScopeRegistry,
};
use tidings_core::{Clock, FeedConfig, SystemClock};
use tidings_storage::{InMemoryRangeStore, InMemorySubscriptionStore};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let config = FeedConfig::from_env();
    config.validate()?;

    let permissions = PermissionTable::with_open_operations(
        &std::env::var("TIDINGS_OPEN_OPERATIONS").unwrap_or_default(),
    )?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(ScopeRegistry::new());
    let mut stores = Vec::new();
    for name in scope_names() {
        let store = Arc::new(InMemoryRangeStore::new(clock.clone()));
        let scope = FeedScope::new(
            name,
            store.clone(),
            Arc::new(InMemorySubscriptionStore::new()),
            clock.clone(),
            &config,
        )
        .with_permissions(permissions.clone());
        registry.register(scope)?;
        stores.push(store);
    }

    tokio::spawn(purge_expired(stores));

    let service = Arc::new(NotificationService::new(registry, clock, config));
    let app = create_router(AppState::new(service));

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Tidings API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn scope_names() -> Vec<String> {
    let names: Vec<String> = std::env::var("TIDINGS_SCOPES")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        vec!["default".to_string()]
    } else {
        names
    }
}

async fn purge_expired(stores: Vec<Arc<InMemoryRangeStore>>) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        for store in &stores {
            match store.purge_expired() {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "Purged expired notifications"),
                Err(e) => tracing::error!(error = %e, "Failed to purge expired notifications"),
            }
        }
    }
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("TIDINGS_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("TIDINGS_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
