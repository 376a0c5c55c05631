use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::clock::FixedClock;
use crate::money::Money;
use crate::rental::blacklist::domain::{
    BlacklistEntry, BlacklistReason, BlacklistStatus, CustomerId, EntryId, NewBlacklistEntry,
};
use crate::rental::blacklist::repository::{BlacklistRepository, BookingHistory, BookingSummary};
use crate::rental::blacklist::{blacklist_router, RegistryPolicy, RiskRegistryService};
use crate::rental::store::RepositoryError;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn new_entry(
    customer: &str,
    status: BlacklistStatus,
    reason: BlacklistReason,
) -> NewBlacklistEntry {
    NewBlacklistEntry {
        customer_id: CustomerId(customer.to_string()),
        customer_name: format!("Customer {customer}"),
        customer_email: format!("{customer}@example.com"),
        customer_phone: None,
        status,
        reason,
        reason_details: "Reported by vehicle owner".to_string(),
        incident_date: None,
        incident_booking_id: None,
        incident_booking_reference: None,
        vehicle_id: Some("veh-1".to_string()),
        vehicle_name: None,
        owner_id: Some("owner-1".to_string()),
        owner_name: None,
        outstanding_amount: None,
        damage_amount: None,
        evidence_urls: Vec::new(),
        notes: None,
        review_required: false,
        expires_at: None,
        added_by: "admin-1".to_string(),
        added_by_name: None,
    }
}

pub(super) type TestService = RiskRegistryService<MemoryRepository, StaticHistory>;

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<FixedClock>) {
    build_service_with_history(StaticHistory::default())
}

pub(super) fn build_service_with_history(
    history: StaticHistory,
) -> (TestService, Arc<MemoryRepository>, Arc<FixedClock>) {
    let repository = Arc::new(MemoryRepository::default());
    let clock = Arc::new(FixedClock::new(now()));
    let service = RiskRegistryService::with_clock(
        repository.clone(),
        Arc::new(history),
        RegistryPolicy::default(),
        clock.clone(),
    );
    (service, repository, clock)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<EntryId, BlacklistEntry>>>,
}

impl BlacklistRepository for MemoryRepository {
    fn insert(&self, entry: BlacklistEntry) -> Result<BlacklistEntry, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&entry.id) {
            return Err(RepositoryError::Duplicate);
        }
        guard.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    fn update(&self, entry: BlacklistEntry) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.get_mut(&entry.id) {
            Some(slot) => {
                *slot = entry;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &EntryId) -> Result<Option<BlacklistEntry>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &EntryId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn all(&self) -> Result<Vec<BlacklistEntry>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

pub(super) struct UnavailableRepository;

impl BlacklistRepository for UnavailableRepository {
    fn insert(&self, _entry: BlacklistEntry) -> Result<BlacklistEntry, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _entry: BlacklistEntry) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &EntryId) -> Result<Option<BlacklistEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &EntryId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<BlacklistEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Booking history returning the same summary for every customer.
#[derive(Default, Clone, Copy)]
pub(super) struct StaticHistory {
    pub(super) summary: BookingSummary,
}

impl StaticHistory {
    pub(super) fn with_bookings(total: u32, completed: u32, cancelled: u32, spent: u32) -> Self {
        Self {
            summary: BookingSummary {
                total_bookings: total,
                completed_bookings: completed,
                cancelled_bookings: cancelled,
                total_spent: Money::from_units(spent),
            },
        }
    }
}

impl BookingHistory for StaticHistory {
    fn summary(&self, _customer_id: &CustomerId) -> Result<BookingSummary, RepositoryError> {
        Ok(self.summary)
    }
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    blacklist_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
