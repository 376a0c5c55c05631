use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    BlacklistEntry, BlacklistStatus, ClearanceRequest, CustomerId, CustomerLookup, EntryFilter,
    EntryId, EntryUpdate, NewBlacklistEntry,
};
use super::repository::{BlacklistRepository, BookingHistory};
use super::risk::{gate_decision, CustomerRiskProfile, RiskAssessor};
use super::statistics::{sort_newest_first, BlacklistStatistics};
use crate::clock::{Clock, SystemClock};
use crate::money::Money;
use crate::rental::store::{ErrorKind, RepositoryError};

/// Registry dials that are not part of the data itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryPolicy {
    recent_window_days: i64,
}

impl RegistryPolicy {
    pub const DEFAULT_RECENT_WINDOW_DAYS: i64 = 30;

    pub fn new(recent_window_days: i64) -> Self {
        let sanitized = if recent_window_days > 0 {
            recent_window_days
        } else {
            Self::DEFAULT_RECENT_WINDOW_DAYS
        };
        Self {
            recent_window_days: sanitized,
        }
    }

    pub fn recent_window_days(&self) -> i64 {
        self.recent_window_days
    }
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RECENT_WINDOW_DAYS)
    }
}

/// Gate verdict returned to the booking flow and the admin console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistCheckResult {
    pub is_blacklisted: bool,
    pub is_flagged: bool,
    pub has_warnings: bool,
    pub can_book: bool,
    /// Highest-severity active status, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction: Option<BlacklistStatus>,
    pub message: String,
    pub entries: Vec<BlacklistEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_profile: Option<CustomerRiskProfile>,
}

/// Service owning the blacklist entries and the booking gate built on them.
pub struct RiskRegistryService<R, H> {
    repository: Arc<R>,
    history: Arc<H>,
    clock: Arc<dyn Clock>,
    policy: RegistryPolicy,
    assessor: RiskAssessor,
    sequence: AtomicU64,
}

impl<R, H> RiskRegistryService<R, H>
where
    R: BlacklistRepository + 'static,
    H: BookingHistory + 'static,
{
    pub fn new(repository: Arc<R>, history: Arc<H>, policy: RegistryPolicy) -> Self {
        Self::with_clock(repository, history, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        history: Arc<H>,
        policy: RegistryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            history,
            clock,
            policy,
            assessor: RiskAssessor,
            sequence: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    fn next_entry_id(&self) -> EntryId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        EntryId(format!("bl-{id:06}"))
    }

    /// Record a new restriction. History is intentionally kept: a customer
    /// may accumulate several entries.
    pub fn add_entry(&self, new: NewBlacklistEntry) -> Result<BlacklistEntry, RegistryError> {
        require("customer_id", &new.customer_id.0)?;
        require("customer_name", &new.customer_name)?;
        require("reason_details", &new.reason_details)?;

        let now = self.clock.now();
        let entry = BlacklistEntry {
            id: self.next_entry_id(),
            customer_id: CustomerId(new.customer_id.0.trim().to_string()),
            customer_name: new.customer_name.trim().to_string(),
            customer_email: new.customer_email.trim().to_string(),
            customer_phone: new.customer_phone.filter(|phone| !phone.trim().is_empty()),
            status: new.status,
            reason: new.reason,
            reason_details: new.reason_details,
            incident_date: new.incident_date,
            incident_booking_id: new.incident_booking_id,
            incident_booking_reference: new.incident_booking_reference,
            vehicle_id: new.vehicle_id,
            vehicle_name: new.vehicle_name,
            owner_id: new.owner_id,
            owner_name: new.owner_name,
            outstanding_amount: new.outstanding_amount.unwrap_or(Money::ZERO),
            damage_amount: new.damage_amount.unwrap_or(Money::ZERO),
            evidence_urls: new.evidence_urls,
            notes: new.notes,
            review_required: new.review_required,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            expires_at: new.expires_at,
            added_by: new.added_by,
            added_by_name: new.added_by_name,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert(entry)?;
        info!(
            entry_id = %stored.id,
            customer_id = %stored.customer_id,
            status = stored.status.label(),
            reason = stored.reason.code(),
            "blacklist entry recorded"
        );
        Ok(stored)
    }

    /// Edit descriptive fields of an entry.
    pub fn update_entry(
        &self,
        id: &EntryId,
        update: EntryUpdate,
    ) -> Result<BlacklistEntry, RegistryError> {
        let mut entry = self.get_entry(id)?;

        if update.status == Some(BlacklistStatus::Cleared) {
            warn!(entry_id = %id, "status update to cleared rejected; use clear action");
            return Err(RegistryError::ClearViaUpdate);
        }
        if let Some(name) = &update.customer_name {
            require("customer_name", name)?;
        }
        if let Some(details) = &update.reason_details {
            require("reason_details", details)?;
        }

        if let Some(status) = update.status {
            if entry.status == BlacklistStatus::Cleared {
                // Reopened entries go back through review.
                entry.reviewed_at = None;
                entry.reviewed_by = None;
                entry.review_notes = None;
            }
            entry.status = status;
        }
        if let Some(reason) = update.reason {
            entry.reason = reason;
        }
        if let Some(details) = update.reason_details {
            entry.reason_details = details;
        }
        if let Some(name) = update.customer_name {
            entry.customer_name = name.trim().to_string();
        }
        if let Some(email) = update.customer_email {
            entry.customer_email = email.trim().to_string();
        }
        if let Some(phone) = update.customer_phone {
            entry.customer_phone = Some(phone).filter(|phone| !phone.trim().is_empty());
        }
        if let Some(amount) = update.outstanding_amount {
            entry.outstanding_amount = amount;
        }
        if let Some(amount) = update.damage_amount {
            entry.damage_amount = amount;
        }
        if let Some(evidence) = update.evidence_urls {
            entry.evidence_urls = evidence;
        }
        if let Some(notes) = update.notes {
            entry.notes = Some(notes);
        }
        if let Some(review_required) = update.review_required {
            entry.review_required = review_required;
        }
        if update.clear_expiry {
            entry.expires_at = None;
        } else if let Some(expires_at) = update.expires_at {
            entry.expires_at = Some(expires_at);
        }
        entry.updated_at = self.clock.now();

        self.persist(&entry)?;
        info!(entry_id = %entry.id, status = entry.status.label(), "blacklist entry updated");
        Ok(entry)
    }

    /// Close an entry after review, keeping it as history.
    pub fn clear_status(
        &self,
        id: &EntryId,
        request: ClearanceRequest,
    ) -> Result<BlacklistEntry, RegistryError> {
        require("reviewer_id", &request.reviewer_id)?;
        let mut entry = self.get_entry(id)?;

        if entry.status == BlacklistStatus::Cleared && !request.override_cleared {
            warn!(entry_id = %id, "entry already cleared");
            return Err(RegistryError::AlreadyCleared(id.clone()));
        }

        let now = self.clock.now();
        entry.status = BlacklistStatus::Cleared;
        entry.reviewed_at = Some(now);
        entry.reviewed_by = Some(request.reviewer_id);
        entry.review_notes = Some(request.notes);
        entry.updated_at = now;

        self.persist(&entry)?;
        info!(
            entry_id = %entry.id,
            customer_id = %entry.customer_id,
            reviewer = entry.reviewed_by.as_deref().unwrap_or_default(),
            "blacklist entry cleared"
        );
        Ok(entry)
    }

    /// Hard delete for data-entry mistakes; normal resolution is `clear_status`.
    pub fn remove_entry(&self, id: &EntryId) -> Result<(), RegistryError> {
        self.repository.remove(id).map_err(|err| not_found_as(err, id))?;
        info!(entry_id = %id, "blacklist entry removed");
        Ok(())
    }

    pub fn get_entry(&self, id: &EntryId) -> Result<BlacklistEntry, RegistryError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Full history for one customer, newest first.
    pub fn customer_entries(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<BlacklistEntry>, RegistryError> {
        let mut entries = self.repository.by_customer(customer_id)?;
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    pub fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<BlacklistEntry>, RegistryError> {
        let mut entries: Vec<_> = self
            .repository
            .all()?
            .into_iter()
            .filter(|entry| filter.matches(entry))
            .collect();
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    /// Admin triage queue.
    pub fn entries_requiring_review(&self) -> Result<Vec<BlacklistEntry>, RegistryError> {
        self.list_entries(&EntryFilter {
            review_pending: Some(true),
            ..EntryFilter::default()
        })
    }

    /// Booking gate. Pure read: matches entries by id, e-mail, or phone and
    /// evaluates only the active ones.
    pub fn check_customer(
        &self,
        lookup: &CustomerLookup,
    ) -> Result<BlacklistCheckResult, RegistryError> {
        let customer_key = lookup.customer_key();
        let email_key = lookup.email_key();
        if customer_key.is_none() && email_key.is_none() {
            return Err(RegistryError::EmptyLookup);
        }

        let history = self.matching_entries(lookup)?;
        let now = self.clock.now();

        let mut active: Vec<BlacklistEntry> = history
            .iter()
            .filter(|entry| entry.is_active(now))
            .cloned()
            .collect();
        sort_newest_first(&mut active);

        let has = |status: BlacklistStatus| active.iter().any(|entry| entry.status == status);
        let is_blacklisted = has(BlacklistStatus::Blacklisted);
        let is_flagged = has(BlacklistStatus::Flagged);
        let has_warnings = has(BlacklistStatus::Warning);
        let restriction = active
            .iter()
            .map(|entry| entry.status)
            .max_by_key(|status| status.severity());

        let decision = gate_decision(restriction);

        // Entries matched through a shared e-mail or phone gate the booking
        // but never feed another customer's profile.
        let profile_customer = customer_key
            .map(|key| CustomerId(key.to_string()))
            .or_else(|| history.first().map(|entry| entry.customer_id.clone()));
        let risk_profile = match profile_customer {
            Some(customer_id) => Some(self.risk_profile(&customer_id)?),
            None => None,
        };

        if !decision.can_book {
            warn!(
                customer = customer_key.or(email_key).unwrap_or_default(),
                active_entries = active.len(),
                "booking gate refused customer"
            );
        }

        Ok(BlacklistCheckResult {
            is_blacklisted,
            is_flagged,
            has_warnings,
            can_book: decision.can_book,
            restriction,
            message: decision.message.to_string(),
            entries: active,
            risk_profile,
        })
    }

    pub fn is_blacklisted(&self, customer_id: &CustomerId) -> Result<bool, RegistryError> {
        let lookup = CustomerLookup {
            customer_id: Some(customer_id.clone()),
            ..CustomerLookup::default()
        };
        Ok(self.check_customer(&lookup)?.is_blacklisted)
    }

    pub fn risk_profile(
        &self,
        customer_id: &CustomerId,
    ) -> Result<CustomerRiskProfile, RegistryError> {
        let entries = self.repository.by_customer(customer_id)?;
        self.project_profile(customer_id, &entries)
    }

    pub fn compute_statistics(&self) -> Result<BlacklistStatistics, RegistryError> {
        let entries = self.repository.all()?;
        Ok(BlacklistStatistics::compute(
            &entries,
            self.clock.now(),
            &self.policy,
        ))
    }

    fn project_profile(
        &self,
        customer_id: &CustomerId,
        entries: &[BlacklistEntry],
    ) -> Result<CustomerRiskProfile, RegistryError> {
        let bookings = self.history.summary(customer_id)?;
        Ok(self
            .assessor
            .assess(customer_id, entries, &bookings, self.clock.now()))
    }

    fn matching_entries(
        &self,
        lookup: &CustomerLookup,
    ) -> Result<Vec<BlacklistEntry>, RegistryError> {
        let mut seen = BTreeSet::new();
        let mut entries = Vec::new();
        let mut absorb = |batch: Vec<BlacklistEntry>| {
            for entry in batch {
                if seen.insert(entry.id.clone()) {
                    entries.push(entry);
                }
            }
        };

        if let Some(customer_id) = lookup.customer_key() {
            absorb(
                self.repository
                    .by_customer(&CustomerId(customer_id.to_string()))?,
            );
        }
        if let Some(email) = lookup.email_key() {
            absorb(self.repository.by_email(email)?);
        }
        if let Some(phone) = lookup.phone_key() {
            absorb(self.repository.by_phone(phone)?);
        }

        sort_newest_first(&mut entries);
        Ok(entries)
    }

    fn persist(&self, entry: &BlacklistEntry) -> Result<(), RegistryError> {
        self.repository
            .update(entry.clone())
            .map_err(|err| not_found_as(err, &entry.id))
    }
}

fn require(field: &'static str, value: &str) -> Result<(), RegistryError> {
    if value.trim().is_empty() {
        Err(RegistryError::MissingField(field))
    } else {
        Ok(())
    }
}

fn not_found_as(err: RepositoryError, id: &EntryId) -> RegistryError {
    match err {
        RepositoryError::NotFound => RegistryError::NotFound(id.clone()),
        other => RegistryError::Repository(other),
    }
}

/// Error raised by the registry service.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("customer lookup requires a customer id or e-mail")]
    EmptyLookup,
    #[error("blacklist entry {0} not found")]
    NotFound(EntryId),
    #[error("blacklist entry {0} is already cleared")]
    AlreadyCleared(EntryId),
    #[error("entries are cleared through the clear action, not by editing the status")]
    ClearViaUpdate,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::MissingField(_) | RegistryError::EmptyLookup => ErrorKind::Validation,
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::AlreadyCleared(_) | RegistryError::ClearViaUpdate => {
                ErrorKind::InvalidStateTransition
            }
            RegistryError::Repository(err) => err.kind(),
        }
    }
}
