use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::clock::FixedClock;
use crate::money::Money;
use crate::rental::blacklist::CustomerId;
use crate::rental::deposits::domain::{
    BookingDates, DeductionProposal, DepositId, HoldRequest, SecurityDeposit,
};
use crate::rental::deposits::repository::DepositRepository;
use crate::rental::deposits::{deposit_router, DepositLedger, DepositPolicy};
use crate::rental::store::RepositoryError;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn booking_dates() -> BookingDates {
    BookingDates {
        start: now() + Duration::days(1),
        end: now() + Duration::days(4),
    }
}

pub(super) fn hold_request(booking: &str, amount: u32) -> HoldRequest {
    HoldRequest {
        booking_id: booking.to_string(),
        vehicle_id: "veh-7".to_string(),
        customer_id: CustomerId("c1".to_string()),
        amount: Money::from_units(amount),
        booking_dates: booking_dates(),
        actor: "system".to_string(),
    }
}

pub(super) fn proposal(reason: &str, amount: u32) -> DeductionProposal {
    DeductionProposal {
        reason: reason.to_string(),
        amount: Money::from_units(amount),
        evidence: vec!["photo-1.jpg".to_string()],
        actor: "owner-1".to_string(),
    }
}

pub(super) type TestLedger = DepositLedger<MemoryDepositRepository>;

pub(super) fn build_ledger() -> (TestLedger, Arc<MemoryDepositRepository>, Arc<FixedClock>) {
    let repository = Arc::new(MemoryDepositRepository::default());
    let clock = Arc::new(FixedClock::new(now()));
    let ledger =
        DepositLedger::with_clock(repository.clone(), DepositPolicy::default(), clock.clone());
    (ledger, repository, clock)
}

#[derive(Default, Clone)]
pub(super) struct MemoryDepositRepository {
    pub(super) records: Arc<Mutex<HashMap<DepositId, SecurityDeposit>>>,
}

impl MemoryDepositRepository {
    /// Simulates another writer touching the record.
    pub(super) fn bump_revision(&self, id: &DepositId) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if let Some(record) = guard.get_mut(id) {
            record.revision += 1;
        }
    }
}

impl DepositRepository for MemoryDepositRepository {
    fn insert(&self, deposit: SecurityDeposit) -> Result<SecurityDeposit, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&deposit.id)
            || guard
                .values()
                .any(|stored| stored.booking_id == deposit.booking_id)
        {
            return Err(RepositoryError::Duplicate);
        }
        guard.insert(deposit.id.clone(), deposit.clone());
        Ok(deposit)
    }

    fn fetch(&self, id: &DepositId) -> Result<Option<SecurityDeposit>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn replace(
        &self,
        mut deposit: SecurityDeposit,
        expected_revision: u64,
    ) -> Result<SecurityDeposit, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard.get_mut(&deposit.id).ok_or(RepositoryError::NotFound)?;
        if stored.revision != expected_revision {
            return Err(RepositoryError::StaleRevision {
                expected: expected_revision,
                found: stored.revision,
            });
        }
        deposit.revision = expected_revision + 1;
        *stored = deposit.clone();
        Ok(deposit)
    }

    fn all(&self) -> Result<Vec<SecurityDeposit>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

/// Loses the compare-and-swap race a fixed number of times before behaving.
#[derive(Default)]
pub(super) struct RacingRepository {
    pub(super) inner: MemoryDepositRepository,
    pub(super) races_remaining: AtomicUsize,
}

impl RacingRepository {
    pub(super) fn losing(races: usize) -> Self {
        Self {
            inner: MemoryDepositRepository::default(),
            races_remaining: AtomicUsize::new(races),
        }
    }
}

impl DepositRepository for RacingRepository {
    fn insert(&self, deposit: SecurityDeposit) -> Result<SecurityDeposit, RepositoryError> {
        self.inner.insert(deposit)
    }

    fn fetch(&self, id: &DepositId) -> Result<Option<SecurityDeposit>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn replace(
        &self,
        deposit: SecurityDeposit,
        expected_revision: u64,
    ) -> Result<SecurityDeposit, RepositoryError> {
        let lose = self
            .races_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lose {
            self.inner.bump_revision(&deposit.id);
        }
        self.inner.replace(deposit, expected_revision)
    }

    fn all(&self) -> Result<Vec<SecurityDeposit>, RepositoryError> {
        self.inner.all()
    }
}

pub(super) struct UnavailableRepository;

impl DepositRepository for UnavailableRepository {
    fn insert(&self, _deposit: SecurityDeposit) -> Result<SecurityDeposit, RepositoryError> {
        Err(RepositoryError::Unavailable("ledger offline".to_string()))
    }

    fn fetch(&self, _id: &DepositId) -> Result<Option<SecurityDeposit>, RepositoryError> {
        Err(RepositoryError::Unavailable("ledger offline".to_string()))
    }

    fn replace(
        &self,
        _deposit: SecurityDeposit,
        _expected_revision: u64,
    ) -> Result<SecurityDeposit, RepositoryError> {
        Err(RepositoryError::Unavailable("ledger offline".to_string()))
    }

    fn all(&self) -> Result<Vec<SecurityDeposit>, RepositoryError> {
        Err(RepositoryError::Unavailable("ledger offline".to_string()))
    }
}

pub(super) fn router_with_ledger<R>(ledger: DepositLedger<R>) -> axum::Router
where
    R: DepositRepository + 'static,
{
    deposit_router(Arc::new(ledger))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
