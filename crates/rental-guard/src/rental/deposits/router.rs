use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::debug;

use super::domain::{
    DeductionId, DeductionProposal, DepositFilter, DepositId, HoldRequest, InspectionRequest,
    ReleaseRequest, ResolutionRequest, SecurityDeposit,
};
use super::repository::DepositRepository;
use super::service::{DepositLedger, LedgerError};
use crate::rental::http::error_response;

/// Router exposing the deposit ledger.
pub fn deposit_router<R>(ledger: Arc<DepositLedger<R>>) -> Router
where
    R: DepositRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/deposits",
            post(hold_handler::<R>).get(list_handler::<R>),
        )
        .route("/api/v1/deposits/statistics", get(statistics_handler::<R>))
        .route("/api/v1/deposits/:deposit_id", get(get_handler::<R>))
        .route(
            "/api/v1/deposits/:deposit_id/deductions",
            post(propose_handler::<R>),
        )
        .route(
            "/api/v1/deposits/:deposit_id/deductions/:deduction_id/resolve",
            post(resolve_handler::<R>),
        )
        .route(
            "/api/v1/deposits/:deposit_id/release",
            post(release_handler::<R>),
        )
        .route(
            "/api/v1/deposits/:deposit_id/inspections",
            post(inspection_handler::<R>),
        )
        .with_state(ledger)
}

/// Runs a read-modify-write once more when the first attempt lost a race.
/// Every ledger mutation re-reads the record, so the retry sees fresh state.
pub(crate) fn retry_on_conflict<T>(
    mut operation: impl FnMut() -> Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    match operation() {
        Err(LedgerError::Conflict(id)) => {
            debug!(deposit_id = %id, "retrying after revision conflict");
            operation()
        }
        other => other,
    }
}

fn ledger_error(error: LedgerError) -> Response {
    error_response(error.kind(), error.to_string())
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, LedgerError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => ledger_error(error),
    }
}

fn respond_deposit(status: StatusCode, result: Result<SecurityDeposit, LedgerError>) -> Response {
    respond(status, result.map(|deposit| deposit.view()))
}

pub(crate) async fn hold_handler<R>(
    State(ledger): State<Arc<DepositLedger<R>>>,
    Json(request): Json<HoldRequest>,
) -> Response
where
    R: DepositRepository + 'static,
{
    respond_deposit(StatusCode::CREATED, ledger.hold_deposit(request))
}

pub(crate) async fn list_handler<R>(
    State(ledger): State<Arc<DepositLedger<R>>>,
    Query(filter): Query<DepositFilter>,
) -> Response
where
    R: DepositRepository + 'static,
{
    let result = ledger
        .list_deposits(&filter)
        .map(|deposits| deposits.iter().map(SecurityDeposit::view).collect::<Vec<_>>());
    respond(StatusCode::OK, result)
}

pub(crate) async fn statistics_handler<R>(State(ledger): State<Arc<DepositLedger<R>>>) -> Response
where
    R: DepositRepository + 'static,
{
    respond(StatusCode::OK, ledger.statistics())
}

pub(crate) async fn get_handler<R>(
    State(ledger): State<Arc<DepositLedger<R>>>,
    Path(deposit_id): Path<String>,
) -> Response
where
    R: DepositRepository + 'static,
{
    respond_deposit(StatusCode::OK, ledger.get_deposit(&DepositId(deposit_id)))
}

pub(crate) async fn propose_handler<R>(
    State(ledger): State<Arc<DepositLedger<R>>>,
    Path(deposit_id): Path<String>,
    Json(proposal): Json<DeductionProposal>,
) -> Response
where
    R: DepositRepository + 'static,
{
    let id = DepositId(deposit_id);
    let result = retry_on_conflict(|| ledger.propose_deduction(&id, proposal.clone()));
    respond_deposit(StatusCode::OK, result)
}

pub(crate) async fn resolve_handler<R>(
    State(ledger): State<Arc<DepositLedger<R>>>,
    Path((deposit_id, deduction_id)): Path<(String, String)>,
    Json(request): Json<ResolutionRequest>,
) -> Response
where
    R: DepositRepository + 'static,
{
    let id = DepositId(deposit_id);
    let deduction_id = DeductionId(deduction_id);
    let result = retry_on_conflict(|| ledger.apply_resolution(&id, &deduction_id, &request));
    respond_deposit(StatusCode::OK, result)
}

pub(crate) async fn release_handler<R>(
    State(ledger): State<Arc<DepositLedger<R>>>,
    Path(deposit_id): Path<String>,
    request: Option<Json<ReleaseRequest>>,
) -> Response
where
    R: DepositRepository + 'static,
{
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let id = DepositId(deposit_id);
    let result = retry_on_conflict(|| ledger.release_deposit(&id, &request.actor));
    respond_deposit(StatusCode::OK, result)
}

pub(crate) async fn inspection_handler<R>(
    State(ledger): State<Arc<DepositLedger<R>>>,
    Path(deposit_id): Path<String>,
    Json(request): Json<InspectionRequest>,
) -> Response
where
    R: DepositRepository + 'static,
{
    let id = DepositId(deposit_id);
    let result = retry_on_conflict(|| ledger.record_inspection(&id, request.clone()));
    respond_deposit(StatusCode::OK, result)
}
