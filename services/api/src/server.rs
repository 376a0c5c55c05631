use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryBlacklistRepository, InMemoryDepositRepository};
use crate::routes::with_rental_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rental_guard::config::AppConfig;
use rental_guard::error::AppError;
use rental_guard::rental::blacklist::{NoBookingHistory, RiskRegistryService};
use rental_guard::rental::deposits::DepositLedger;
use rental_guard::telemetry;
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

    let registry = Arc::new(RiskRegistryService::new(
        Arc::new(InMemoryBlacklistRepository::default()),
        Arc::new(NoBookingHistory),
        config.policy.registry_policy(),
    ));
    let ledger = Arc::new(DepositLedger::new(
        Arc::new(InMemoryDepositRepository::default()),
        config.policy.deposit_policy(),
    ));

    let app = with_rental_routes(registry, ledger)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        release_window_hours = config.policy.deposit_release_hours,
        recent_incident_days = config.policy.recent_incident_days,
        "rental guard ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
