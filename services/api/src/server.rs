use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes;
use axum_prometheus::PrometheusMetricLayer;
use perm_tracker::config::AppConfig;
use perm_tracker::error::AppError;
use perm_tracker::processing::{
    DolScraper, ProcessingTimeSource, ProcessingTimeStore, RefreshScheduler, SqliteStore,
};
use perm_tracker::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();

    let store: Arc<dyn ProcessingTimeStore> =
        Arc::new(SqliteStore::connect(&config.store.database_url).await?);
    let source: Arc<dyn ProcessingTimeSource> = Arc::new(DolScraper::new()?);

    let readiness = Arc::new(AtomicBool::new(false));
    let state = AppState {
        store: store.clone(),
        source: source.clone(),
        source_url: config.scraper.source_url.as_str().into(),
        readiness: readiness.clone(),
        metrics: Some(Arc::new(prometheus_handle)),
    };

    let scheduler = RefreshScheduler::spawn(
        source,
        store,
        config.scraper.source_url.clone(),
        config.scraper.refresh_interval,
    );

    let app = routes::router(state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        source_url = %config.scraper.source_url,
        "perm processing time tracker ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}
