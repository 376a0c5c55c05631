use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use rental_guard::rental::blacklist::{
    blacklist_router, BlacklistRepository, BookingHistory, RiskRegistryService,
};
use rental_guard::rental::deposits::{deposit_router, DepositLedger, DepositRepository};
use serde_json::json;
use std::sync::Arc;

/// Registry and ledger APIs plus the operational endpoints.
pub(crate) fn with_rental_routes<R, H, D>(
    registry: Arc<RiskRegistryService<R, H>>,
    ledger: Arc<DepositLedger<D>>,
) -> axum::Router
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
    D: DepositRepository + 'static,
{
    blacklist_router(registry)
        .merge(deposit_router(ledger))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{InMemoryBlacklistRepository, InMemoryDepositRepository};
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use rental_guard::rental::blacklist::{NoBookingHistory, RegistryPolicy};
    use rental_guard::rental::deposits::DepositPolicy;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let registry = Arc::new(RiskRegistryService::new(
            Arc::new(InMemoryBlacklistRepository::default()),
            Arc::new(NoBookingHistory),
            RegistryPolicy::default(),
        ));
        let ledger = Arc::new(DepositLedger::new(
            Arc::new(InMemoryDepositRepository::default()),
            DepositPolicy::default(),
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_rental_routes(registry, ledger).layer(Extension(state))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_flag() {
        let response = app(false).oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app(true).oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn both_apis_are_mounted() {
        let router = app(true);

        let reasons = router
            .clone()
            .oneshot(get("/api/v1/blacklist/reasons"))
            .await
            .unwrap();
        assert_eq!(reasons.status(), StatusCode::OK);

        let stats = router
            .oneshot(get("/api/v1/deposits/statistics"))
            .await
            .unwrap();
        assert_eq!(stats.status(), StatusCode::OK);
    }
}
