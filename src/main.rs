//! RailGuard Operator Console
//!
//! Main entry point: wires the synchronization core together and serves
//! the media gateway.

use railguard_console::{
    api_client::ApiClient,
    emergency::EmergencyMonitor,
    hierarchy_store::HierarchyStore,
    live_connection::LiveConnectionManager,
    media_gateway,
    selection::SelectionController,
    state::{AppConfig, AppState},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "railguard_console=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting RailGuard operator console v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        api_base_url = %config.api_base_url,
        ws_url = %config.ws_url,
        media_dir = %config.media_dir.display(),
        initial_role = %config.initial_role.as_str(),
        "Configuration loaded"
    );

    // Initialize components
    let api = Arc::new(ApiClient::new(config.api_base_url.clone()));
    let emergency = Arc::new(EmergencyMonitor::new());
    let hierarchy = Arc::new(HierarchyStore::new(api.clone()));
    let selection = Arc::new(SelectionController::new());
    let live = Arc::new(LiveConnectionManager::new(
        api.clone(),
        emergency.clone(),
        config.ws_url.clone(),
        config.reconnect_delay,
        config.status_poll_interval,
        config.history_limit,
    ));
    tracing::info!("Components initialized");

    // Initial hierarchy load. A failure keeps the console up with an
    // empty tree and a recorded error; a later role switch retries.
    match hierarchy.load_for_role(config.initial_role).await {
        Ok(default_selection) => selection.set(default_selection).await,
        Err(e) => tracing::warn!(error = %e, "Initial hierarchy load failed"),
    }

    live.start().await;

    // Create application state
    let state = AppState {
        config: config.clone(),
        api,
        hierarchy,
        selection: selection.clone(),
        live: live.clone(),
        emergency,
    };

    let app = media_gateway::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Teardown: stop the stream, the poll timer and any pending
    // reconnect before exiting.
    live.close().await;
    selection.clear().await;
    tracing::info!("Console stopped");

    Ok(())
}
