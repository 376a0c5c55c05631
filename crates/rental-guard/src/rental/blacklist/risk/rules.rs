use chrono::{DateTime, NaiveDate, Utc};

use super::super::domain::{BlacklistEntry, BlacklistReason, BlacklistStatus};
use crate::money::Money;

const MAX_RISK_SCORE: u32 = 100;

#[derive(Debug, Default)]
pub(crate) struct HistoryTally {
    pub no_shows: u32,
    pub late_returns: u32,
    pub damage_incidents: u32,
    pub payment_issues: u32,
    pub blacklisted: u32,
    pub warnings: u32,
    pub outstanding_balance: Money,
    pub last_incident: Option<NaiveDate>,
}

/// Counts over the full history; cleared entries still count as incidents,
/// but only open ones carry an outstanding balance.
pub(crate) fn tally_history(entries: &[BlacklistEntry]) -> HistoryTally {
    let mut tally = HistoryTally::default();

    for entry in entries {
        match entry.reason {
            BlacklistReason::NoShow => tally.no_shows += 1,
            BlacklistReason::LateReturn => tally.late_returns += 1,
            BlacklistReason::VehicleDamage => tally.damage_incidents += 1,
            BlacklistReason::PaymentIssues => tally.payment_issues += 1,
            _ => {}
        }

        match entry.status {
            BlacklistStatus::Blacklisted => tally.blacklisted += 1,
            BlacklistStatus::Warning => tally.warnings += 1,
            _ => {}
        }

        let incident = entry
            .incident_date
            .unwrap_or_else(|| entry.created_at.date_naive());
        if tally.last_incident.map(|last| incident > last).unwrap_or(true) {
            tally.last_incident = Some(incident);
        }
    }

    tally.outstanding_balance = entries
        .iter()
        .filter(|entry| entry.status != BlacklistStatus::Cleared)
        .map(|entry| entry.outstanding_amount)
        .sum();
    tally
}

/// Score in tenths so the 1.5x flagged multiplier stays integral.
fn status_multiplier_tenths(status: BlacklistStatus) -> u32 {
    match status {
        BlacklistStatus::Blacklisted => 20,
        BlacklistStatus::Flagged => 15,
        BlacklistStatus::Warning => 10,
        BlacklistStatus::Cleared => 0,
    }
}

/// Sum of `severity x status multiplier` over active entries, capped at 100.
pub(crate) fn risk_score(entries: &[BlacklistEntry], now: DateTime<Utc>) -> u8 {
    let tenths: u32 = entries
        .iter()
        .filter(|entry| entry.is_active(now))
        .map(|entry| entry.reason.severity() * status_multiplier_tenths(entry.status))
        .sum();

    (tenths / 10).min(MAX_RISK_SCORE) as u8
}
