use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::rental::blacklist::CustomerId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepositId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeductionId(pub String);

impl fmt::Display for DepositId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DeductionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deposit lifecycle. The last three states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Held,
    UnderReview,
    Released,
    PartiallyDeducted,
    FullyDeducted,
}

impl DepositStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DepositStatus::Held => "held",
            DepositStatus::UnderReview => "under_review",
            DepositStatus::Released => "released",
            DepositStatus::PartiallyDeducted => "partially_deducted",
            DepositStatus::FullyDeducted => "fully_deducted",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            DepositStatus::Released
                | DepositStatus::PartiallyDeducted
                | DepositStatus::FullyDeducted
        )
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionStatus {
    Pending,
    Approved,
    Disputed,
}

impl DeductionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DeductionStatus::Pending => "pending",
            DeductionStatus::Approved => "approved",
            DeductionStatus::Disputed => "disputed",
        }
    }
}

/// Owner-submitted claim against a deposit (damage, cleaning, fuel, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub id: DeductionId,
    pub reason: String,
    pub amount: Money,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub proposed_by: String,
    pub status: DeductionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDates {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Odometer/fuel snapshot taken at pickup or return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInspection {
    pub mileage: u32,
    /// Tank level in percent.
    pub fuel_level: u8,
    pub inspection_date: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_rental: Option<VehicleInspection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_rental: Option<VehicleInspection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStage {
    PreRental,
    PostRental,
}

impl InspectionStage {
    pub const fn timeline_action(self) -> &'static str {
        match self {
            InspectionStage::PreRental => "Pre-Rental Inspection",
            InspectionStage::PostRental => "Post-Rental Inspection",
        }
    }
}

/// Audit line; the timeline is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub action: String,
    pub date: DateTime<Utc>,
    pub details: String,
    pub actor: String,
}

/// Security deposit held against one booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityDeposit {
    pub id: DepositId,
    pub booking_id: String,
    pub vehicle_id: String,
    pub customer_id: CustomerId,
    /// Fixed at hold time.
    pub amount: Money,
    pub status: DepositStatus,
    pub hold_date: DateTime<Utc>,
    pub expected_release_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,
    pub deductions: Vec<Deduction>,
    pub booking_dates: BookingDates,
    #[serde(default)]
    pub vehicle_condition: VehicleCondition,
    pub timeline: Vec<TimelineEvent>,
    /// Storage revision used for optimistic concurrency.
    #[serde(default)]
    pub revision: u64,
}

impl SecurityDeposit {
    pub fn approved_total(&self) -> Money {
        self.deductions
            .iter()
            .filter(|deduction| deduction.status == DeductionStatus::Approved)
            .map(|deduction| deduction.amount)
            .sum()
    }

    /// What can still be claimed: original amount minus approved deductions.
    pub fn remaining_balance(&self) -> Money {
        self.amount.saturating_sub(self.approved_total())
    }

    /// Amount returned to the customer. Always derived, never stored.
    pub fn net_amount(&self) -> Money {
        self.remaining_balance()
    }

    pub fn pending_deductions(&self) -> impl Iterator<Item = &Deduction> {
        self.deductions
            .iter()
            .filter(|deduction| deduction.status == DeductionStatus::Pending)
    }

    pub fn has_pending_deductions(&self) -> bool {
        self.pending_deductions().next().is_some()
    }

    pub fn pending_total(&self) -> Money {
        self.pending_deductions().map(|deduction| deduction.amount).sum()
    }

    /// Room left for a new proposal: pending claims reserve their amount
    /// until they are approved or disputed.
    pub fn claimable_balance(&self) -> Money {
        self.remaining_balance().saturating_sub(self.pending_total())
    }

    pub fn deduction(&self, id: &DeductionId) -> Option<&Deduction> {
        self.deductions.iter().find(|deduction| &deduction.id == id)
    }

    pub(crate) fn deduction_mut(&mut self, id: &DeductionId) -> Option<&mut Deduction> {
        self.deductions
            .iter_mut()
            .find(|deduction| &deduction.id == id)
    }

    /// Terminal status a release would produce right now.
    pub fn settlement_status(&self) -> DepositStatus {
        let approved = self.approved_total();
        if approved.is_zero() {
            DepositStatus::Released
        } else if approved >= self.amount {
            DepositStatus::FullyDeducted
        } else {
            DepositStatus::PartiallyDeducted
        }
    }

    pub(crate) fn record(
        &mut self,
        action: impl Into<String>,
        date: DateTime<Utc>,
        details: impl Into<String>,
        actor: &str,
    ) {
        self.timeline.push(TimelineEvent {
            action: action.into(),
            date,
            details: details.into(),
            actor: actor.to_string(),
        });
    }

    pub(crate) fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.booking_id.to_lowercase().contains(&needle)
            || self.vehicle_id.to_lowercase().contains(&needle)
            || self.customer_id.as_str().to_lowercase().contains(&needle)
            || self.id.0.to_lowercase().contains(&needle)
    }

    pub fn view(&self) -> DepositView {
        DepositView {
            approved_deductions: self.approved_total(),
            net_amount: self.net_amount(),
            pending_deductions: self.pending_deductions().count(),
            deposit: self.clone(),
        }
    }
}

/// Deposit plus its derived figures, as returned by the HTTP surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositView {
    #[serde(flatten)]
    pub deposit: SecurityDeposit,
    pub approved_deductions: Money,
    pub net_amount: Money,
    pub pending_deductions: usize,
}

fn system_actor() -> String {
    "system".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldRequest {
    pub booking_id: String,
    pub vehicle_id: String,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub booking_dates: BookingDates,
    #[serde(default = "system_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionProposal {
    pub reason: String,
    pub amount: Money,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default = "system_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionDecision {
    Approve,
    Dispute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub decision: DeductionDecision,
    #[serde(default = "system_actor")]
    pub actor: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    #[serde(default = "system_actor")]
    pub actor: String,
}

impl Default for ReleaseRequest {
    fn default() -> Self {
        Self {
            actor: system_actor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRequest {
    pub stage: InspectionStage,
    pub inspection: VehicleInspection,
    #[serde(default = "system_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositFilter {
    #[serde(default)]
    pub status: Option<DepositStatus>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

impl DepositFilter {
    pub fn matches(&self, deposit: &SecurityDeposit) -> bool {
        if let Some(status) = self.status {
            if deposit.status != status {
                return false;
            }
        }
        if let Some(customer) = &self.customer_id {
            if deposit.customer_id.0 != *customer {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => deposit.matches_search(needle),
            _ => true,
        }
    }
}
