use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::domain::{
    BlacklistReason, ClearanceRequest, CustomerLookup, EntryFilter, EntryId, EntryUpdate,
    NewBlacklistEntry,
};
use super::repository::{BlacklistRepository, BookingHistory};
use super::service::{RegistryError, RiskRegistryService};
use crate::rental::http::error_response;

/// Router exposing the admin console and booking-gate endpoints.
pub fn blacklist_router<R, H>(service: Arc<RiskRegistryService<R, H>>) -> Router
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    Router::new()
        .route(
            "/api/v1/blacklist/entries",
            post(add_entry_handler::<R, H>).get(list_entries_handler::<R, H>),
        )
        .route(
            "/api/v1/blacklist/entries/:entry_id",
            get(get_entry_handler::<R, H>)
                .patch(update_entry_handler::<R, H>)
                .delete(remove_entry_handler::<R, H>),
        )
        .route(
            "/api/v1/blacklist/entries/:entry_id/clear",
            post(clear_entry_handler::<R, H>),
        )
        .route("/api/v1/blacklist/reviews", get(review_queue_handler::<R, H>))
        .route("/api/v1/blacklist/check", post(check_handler::<R, H>))
        .route(
            "/api/v1/blacklist/statistics",
            get(statistics_handler::<R, H>),
        )
        .route("/api/v1/blacklist/reasons", get(reasons_handler))
        .with_state(service)
}

fn registry_error(error: RegistryError) -> Response {
    error_response(error.kind(), error.to_string())
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, RegistryError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => registry_error(error),
    }
}

pub(crate) async fn add_entry_handler<R, H>(
    State(service): State<Arc<RiskRegistryService<R, H>>>,
    Json(entry): Json<NewBlacklistEntry>,
) -> Response
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    respond(StatusCode::CREATED, service.add_entry(entry))
}

pub(crate) async fn list_entries_handler<R, H>(
    State(service): State<Arc<RiskRegistryService<R, H>>>,
    Query(filter): Query<EntryFilter>,
) -> Response
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    respond(StatusCode::OK, service.list_entries(&filter))
}

pub(crate) async fn get_entry_handler<R, H>(
    State(service): State<Arc<RiskRegistryService<R, H>>>,
    Path(entry_id): Path<String>,
) -> Response
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    respond(StatusCode::OK, service.get_entry(&EntryId(entry_id)))
}

pub(crate) async fn update_entry_handler<R, H>(
    State(service): State<Arc<RiskRegistryService<R, H>>>,
    Path(entry_id): Path<String>,
    Json(update): Json<EntryUpdate>,
) -> Response
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    respond(
        StatusCode::OK,
        service.update_entry(&EntryId(entry_id), update),
    )
}

pub(crate) async fn remove_entry_handler<R, H>(
    State(service): State<Arc<RiskRegistryService<R, H>>>,
    Path(entry_id): Path<String>,
) -> Response
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    match service.remove_entry(&EntryId(entry_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => registry_error(error),
    }
}

pub(crate) async fn clear_entry_handler<R, H>(
    State(service): State<Arc<RiskRegistryService<R, H>>>,
    Path(entry_id): Path<String>,
    Json(request): Json<ClearanceRequest>,
) -> Response
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    respond(
        StatusCode::OK,
        service.clear_status(&EntryId(entry_id), request),
    )
}

pub(crate) async fn review_queue_handler<R, H>(
    State(service): State<Arc<RiskRegistryService<R, H>>>,
) -> Response
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    respond(StatusCode::OK, service.entries_requiring_review())
}

pub(crate) async fn check_handler<R, H>(
    State(service): State<Arc<RiskRegistryService<R, H>>>,
    Json(lookup): Json<CustomerLookup>,
) -> Response
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    respond(StatusCode::OK, service.check_customer(&lookup))
}

pub(crate) async fn statistics_handler<R, H>(
    State(service): State<Arc<RiskRegistryService<R, H>>>,
) -> Response
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    respond(StatusCode::OK, service.compute_statistics())
}

#[derive(Debug, Serialize)]
pub(crate) struct ReasonView {
    pub code: BlacklistReason,
    pub label: &'static str,
    pub severity: u32,
}

pub(crate) async fn reasons_handler() -> Json<Vec<ReasonView>> {
    Json(
        BlacklistReason::ALL
            .iter()
            .map(|reason| ReasonView {
                code: *reason,
                label: reason.label(),
                severity: reason.severity(),
            })
            .collect(),
    )
}
