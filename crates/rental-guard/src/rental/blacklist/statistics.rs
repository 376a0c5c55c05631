use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{BlacklistEntry, BlacklistReason, BlacklistStatus};
use super::service::RegistryPolicy;
use crate::money::Money;

/// Admin console roll-up across every registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistStatistics {
    pub total_blacklisted: usize,
    pub total_flagged: usize,
    pub total_warnings: usize,
    pub by_reason: BTreeMap<BlacklistReason, usize>,
    pub pending_reviews: usize,
    pub total_outstanding: Money,
    pub recent_incidents: Vec<BlacklistEntry>,
}

impl BlacklistStatistics {
    /// Status, reason, review and balance figures cover open (non-cleared)
    /// entries; `recent_incidents` covers everything created inside the window.
    pub fn compute(
        entries: &[BlacklistEntry],
        now: DateTime<Utc>,
        policy: &RegistryPolicy,
    ) -> Self {
        let mut by_reason: BTreeMap<BlacklistReason, usize> = BlacklistReason::ALL
            .iter()
            .map(|reason| (*reason, 0))
            .collect();

        let mut total_blacklisted = 0;
        let mut total_flagged = 0;
        let mut total_warnings = 0;
        let mut pending_reviews = 0;

        for entry in entries
            .iter()
            .filter(|entry| entry.status != BlacklistStatus::Cleared)
        {
            match entry.status {
                BlacklistStatus::Blacklisted => total_blacklisted += 1,
                BlacklistStatus::Flagged => total_flagged += 1,
                BlacklistStatus::Warning => total_warnings += 1,
                BlacklistStatus::Cleared => {}
            }

            *by_reason.entry(entry.reason).or_insert(0) += 1;

            if entry.awaiting_review() {
                pending_reviews += 1;
            }
        }

        let total_outstanding: Money = entries
            .iter()
            .filter(|entry| entry.status != BlacklistStatus::Cleared)
            .map(|entry| entry.outstanding_amount)
            .sum();

        let cutoff = now - Duration::days(policy.recent_window_days());
        let mut recent_incidents: Vec<BlacklistEntry> = entries
            .iter()
            .filter(|entry| entry.created_at >= cutoff)
            .cloned()
            .collect();
        sort_newest_first(&mut recent_incidents);

        Self {
            total_blacklisted,
            total_flagged,
            total_warnings,
            by_reason,
            pending_reviews,
            total_outstanding,
            recent_incidents,
        }
    }

    /// Reasons with at least one open entry, most frequent first.
    pub fn top_reasons(&self) -> Vec<(BlacklistReason, usize)> {
        let mut reasons: Vec<_> = self
            .by_reason
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(reason, count)| (*reason, *count))
            .collect();
        reasons.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        reasons
    }
}

/// Newest first with the id as a tiebreaker so listings are stable.
pub(crate) fn sort_newest_first(entries: &mut [BlacklistEntry]) {
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
