//! Customer risk projection.
//!
//! Profiles are recomputed from the entry history and the booking history on
//! every request and never stored.

mod policy;
mod rules;

pub use policy::{gate_decision, GateDecision, RiskLevel};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{BlacklistEntry, CustomerId};
use super::repository::BookingSummary;
use crate::money::Money;

/// Derived view of a customer's history used for gating and triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRiskProfile {
    pub customer_id: CustomerId,
    pub risk_score: u8,
    pub risk_level: RiskLevel,

    pub total_bookings: u32,
    pub completed_bookings: u32,
    pub cancelled_bookings: u32,
    pub no_shows: u32,
    pub late_returns: u32,
    pub damage_incidents: u32,
    pub payment_issues: u32,

    pub total_spent: Money,
    pub outstanding_balance: Money,

    pub blacklist_history: u32,
    pub warning_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_incident: Option<NaiveDate>,

    pub cancellation_rate: f64,
    pub completion_rate: f64,
}

/// Stateless projector turning histories into a `CustomerRiskProfile`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RiskAssessor;

impl RiskAssessor {
    pub fn assess(
        &self,
        customer_id: &CustomerId,
        entries: &[BlacklistEntry],
        bookings: &BookingSummary,
        now: DateTime<Utc>,
    ) -> CustomerRiskProfile {
        let tally = rules::tally_history(entries);
        let risk_score = rules::risk_score(entries, now);

        let (completion_rate, cancellation_rate) = if bookings.total_bookings == 0 {
            (0.0, 0.0)
        } else {
            let total = f64::from(bookings.total_bookings);
            (
                f64::from(bookings.completed_bookings) / total,
                f64::from(bookings.cancelled_bookings) / total,
            )
        };

        CustomerRiskProfile {
            customer_id: customer_id.clone(),
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            total_bookings: bookings.total_bookings,
            completed_bookings: bookings.completed_bookings,
            cancelled_bookings: bookings.cancelled_bookings,
            no_shows: tally.no_shows,
            late_returns: tally.late_returns,
            damage_incidents: tally.damage_incidents,
            payment_issues: tally.payment_issues,
            total_spent: bookings.total_spent,
            outstanding_balance: tally.outstanding_balance,
            blacklist_history: tally.blacklisted,
            warning_count: tally.warnings,
            last_incident: tally.last_incident,
            cancellation_rate,
            completion_rate,
        }
    }
}
