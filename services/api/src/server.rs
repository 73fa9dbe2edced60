use crate::cli::ServeArgs;
use crate::infra::{demo_catalog, demo_question_bank, AppState};
use crate::routes::with_placement_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use placement::config::AppConfig;
use placement::error::AppError;
use placement::telemetry;
use placement::workflows::memory::MemoryRecordStore;
use placement::workflows::Placement;
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

    let placement = Placement::new(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(demo_catalog()),
        Arc::new(demo_question_bank()),
        config.assessment.clone(),
        config.counters,
    );

    let app = with_placement_routes(&placement)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        assessment_secs = config.assessment.duration.as_secs(),
        max_warnings = config.assessment.max_warnings,
        "placement service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
