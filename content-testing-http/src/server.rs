use axum::{routing::get, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use content_testing::optimization::collaborators::Collaborators;
use content_testing::{ListingSettings, PowerAnalysisEstimator, SnapshotCatalog, TestListing};

use crate::handlers::{health, list_active_tests, AppState};

pub struct ServeConfig {
    pub data_dir: PathBuf,
    pub bind_addr: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let health_route = Router::new()
        .route("/health", get(health))
        .with_state(state.clone());

    let listing_routes = Router::new()
        .route("/optimization/tests/active", get(list_active_tests))
        .with_state(state);

    Router::new()
        .merge(health_route)
        .merge(listing_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive().max_age(std::time::Duration::from_secs(86400)))
}

/// Build the listing over the snapshot catalog in `data_dir`. A catalog that
/// fails to load leaves the listing unavailable instead of aborting startup.
pub fn build_listing(data_dir: &std::path::Path) -> Option<Arc<TestListing>> {
    let settings = ListingSettings::load_or_default(data_dir);
    let catalog = match SnapshotCatalog::new(data_dir) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            tracing::error!(data_dir = %data_dir.display(), "Failed to load content-test catalog: {}", e);
            return None;
        }
    };
    let estimator = Arc::new(PowerAnalysisEstimator::new(
        settings.estimator.clone(),
        catalog.clone(),
    ));
    Some(Arc::new(TestListing::new(
        Collaborators::from_backend(catalog, estimator),
        settings,
    )))
}

pub async fn serve(config: ServeConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    std::fs::create_dir_all(&config.data_dir)?;
    let listing = build_listing(&config.data_dir);
    let app = router(Arc::new(AppState::new(listing)));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        data_dir = %config.data_dir.display(),
        "content-testing server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
