use crate::cli::ServeArgs;
use crate::infra::{build_service, load_listings, AppState};
use crate::routes::with_scoring_routes;
use auction_scoring::config::AppConfig;
use auction_scoring::error::AppError;
use auction_scoring::telemetry;
use auction_scoring::workflows::auction::SystemClock;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let records = match args.listings.as_deref() {
        Some(path) => load_listings(path)?,
        None => Vec::new(),
    };
    let scoring_service = Arc::new(build_service(
        &config.engine,
        records,
        Arc::new(SystemClock),
    )?);

    let app = with_scoring_routes(scoring_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "auction scoring service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
