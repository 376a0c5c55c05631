use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

/// Identifier wrapper for registry entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub String);

/// Customer key shared with bookings and deposits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Restriction recorded against a customer, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistStatus {
    /// Cannot book.
    Blacklisted,
    /// Review required before confirming.
    Flagged,
    /// Can book; surfaced to staff.
    Warning,
    /// No restriction.
    Cleared,
}

impl BlacklistStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BlacklistStatus::Blacklisted => "blacklisted",
            BlacklistStatus::Flagged => "flagged",
            BlacklistStatus::Warning => "warning",
            BlacklistStatus::Cleared => "cleared",
        }
    }

    pub const fn severity(self) -> u8 {
        match self {
            BlacklistStatus::Blacklisted => 3,
            BlacklistStatus::Flagged => 2,
            BlacklistStatus::Warning => 1,
            BlacklistStatus::Cleared => 0,
        }
    }

    pub const fn blocks_booking(self) -> bool {
        matches!(self, BlacklistStatus::Blacklisted)
    }
}

/// Incident taxonomy shared between the registry, statistics, and admin views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistReason {
    NoShow,
    LateReturn,
    VehicleDamage,
    PaymentIssues,
    RuleViolation,
    FraudAttempt,
    AbusiveBehavior,
    DocumentIssues,
    ExcessiveCancellations,
    Other,
}

impl BlacklistReason {
    pub const ALL: [BlacklistReason; 10] = [
        BlacklistReason::NoShow,
        BlacklistReason::LateReturn,
        BlacklistReason::VehicleDamage,
        BlacklistReason::PaymentIssues,
        BlacklistReason::RuleViolation,
        BlacklistReason::FraudAttempt,
        BlacklistReason::AbusiveBehavior,
        BlacklistReason::DocumentIssues,
        BlacklistReason::ExcessiveCancellations,
        BlacklistReason::Other,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            BlacklistReason::NoShow => "no_show",
            BlacklistReason::LateReturn => "late_return",
            BlacklistReason::VehicleDamage => "vehicle_damage",
            BlacklistReason::PaymentIssues => "payment_issues",
            BlacklistReason::RuleViolation => "rule_violation",
            BlacklistReason::FraudAttempt => "fraud_attempt",
            BlacklistReason::AbusiveBehavior => "abusive_behavior",
            BlacklistReason::DocumentIssues => "document_issues",
            BlacklistReason::ExcessiveCancellations => "excessive_cancellations",
            BlacklistReason::Other => "other",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            BlacklistReason::NoShow => "No Show",
            BlacklistReason::LateReturn => "Late Return",
            BlacklistReason::VehicleDamage => "Vehicle Damage",
            BlacklistReason::PaymentIssues => "Payment Issues",
            BlacklistReason::RuleViolation => "Rule Violation",
            BlacklistReason::FraudAttempt => "Fraud Attempt",
            BlacklistReason::AbusiveBehavior => "Abusive Behavior",
            BlacklistReason::DocumentIssues => "Document Issues",
            BlacklistReason::ExcessiveCancellations => "Excessive Cancellations",
            BlacklistReason::Other => "Other",
        }
    }

    /// Weight fed into the risk score.
    pub const fn severity(self) -> u32 {
        match self {
            BlacklistReason::FraudAttempt => 100,
            BlacklistReason::AbusiveBehavior => 90,
            BlacklistReason::VehicleDamage => 80,
            BlacklistReason::PaymentIssues => 70,
            BlacklistReason::NoShow => 60,
            BlacklistReason::LateReturn => 50,
            BlacklistReason::RuleViolation => 40,
            BlacklistReason::DocumentIssues => 30,
            BlacklistReason::ExcessiveCancellations => 20,
            BlacklistReason::Other => 10,
        }
    }
}

/// One recorded restriction or incident against a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub id: EntryId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,

    pub status: BlacklistStatus,
    pub reason: BlacklistReason,
    pub reason_details: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_booking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_booking_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,

    pub outstanding_amount: Money,
    pub damage_amount: Money,

    pub evidence_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub review_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    pub added_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlacklistEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|expires| expires < now).unwrap_or(false)
    }

    /// Not cleared and not past its expiry; only active entries restrict bookings.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status != BlacklistStatus::Cleared && !self.is_expired(now)
    }

    pub fn awaiting_review(&self) -> bool {
        self.review_required
            && self.reviewed_at.is_none()
            && self.status != BlacklistStatus::Cleared
    }

    pub(crate) fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.customer_name.to_lowercase().contains(&needle)
            || self.customer_email.to_lowercase().contains(&needle)
            || self.customer_id.0.to_lowercase().contains(&needle)
    }
}

/// Admin submission for a new entry; `id` and timestamps are assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBlacklistEntry {
    pub customer_id: CustomerId,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub status: BlacklistStatus,
    pub reason: BlacklistReason,
    pub reason_details: String,
    #[serde(default)]
    pub incident_date: Option<NaiveDate>,
    #[serde(default)]
    pub incident_booking_id: Option<String>,
    #[serde(default)]
    pub incident_booking_reference: Option<String>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub vehicle_name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub outstanding_amount: Option<Money>,
    #[serde(default)]
    pub damage_amount: Option<Money>,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub review_required: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub added_by: String,
    #[serde(default)]
    pub added_by_name: Option<String>,
}

/// Partial edit of an existing entry. Clearing goes through `clear_status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryUpdate {
    #[serde(default)]
    pub status: Option<BlacklistStatus>,
    #[serde(default)]
    pub reason: Option<BlacklistReason>,
    #[serde(default)]
    pub reason_details: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub outstanding_amount: Option<Money>,
    #[serde(default)]
    pub damage_amount: Option<Money>,
    #[serde(default)]
    pub evidence_urls: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub review_required: Option<bool>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Drops an existing expiry, making the restriction open-ended.
    #[serde(default)]
    pub clear_expiry: bool,
}

/// Reviewer decision closing an entry. `notes` is mandatory but may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearanceRequest {
    pub reviewer_id: String,
    pub notes: String,
    /// Explicit override to re-clear an entry that is already cleared.
    #[serde(default)]
    pub override_cleared: bool,
}

/// Identity keys the booking flow passes to the gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerLookup {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl CustomerLookup {
    pub fn by_id(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: Some(CustomerId(customer_id.into())),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub(crate) fn customer_key(&self) -> Option<&str> {
        self.customer_id
            .as_ref()
            .map(|id| id.0.trim())
            .filter(|id| !id.is_empty())
    }

    pub(crate) fn email_key(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    pub(crate) fn phone_key(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
    }
}

/// Admin listing filter; every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    #[serde(default)]
    pub status: Option<BlacklistStatus>,
    #[serde(default)]
    pub reason: Option<BlacklistReason>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub review_pending: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &BlacklistEntry) -> bool {
        if let Some(status) = self.status {
            if entry.status != status {
                return false;
            }
        }
        if let Some(reason) = self.reason {
            if entry.reason != reason {
                return false;
            }
        }
        if let Some(owner) = &self.owner_id {
            if entry.owner_id.as_deref() != Some(owner.as_str()) {
                return false;
            }
        }
        if let Some(pending) = self.review_pending {
            if entry.awaiting_review() != pending {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => entry.matches_search(needle),
            _ => true,
        }
    }
}
