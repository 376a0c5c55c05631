use serde::{Deserialize, Serialize};

use super::domain::{DepositStatus, SecurityDeposit};
use crate::money::Money;

/// Dashboard figures for the deposit ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositStatistics {
    /// Amount still held across open (held or under review) deposits.
    pub total_held: Money,
    /// Net amount paid back to customers across finalized deposits.
    pub total_released: Money,
    /// Sum of approved deductions.
    pub total_deducted: Money,
    /// Deposits currently under review.
    pub pending_review: usize,
    /// Mean hours from booking end to release, over finalized deposits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_release_hours: Option<f64>,
}

impl DepositStatistics {
    pub fn compute(deposits: &[SecurityDeposit]) -> Self {
        let total_held = deposits
            .iter()
            .filter(|deposit| !deposit.status.is_terminal())
            .map(|deposit| deposit.amount)
            .sum();
        let total_released = deposits
            .iter()
            .filter(|deposit| deposit.status.is_terminal())
            .map(SecurityDeposit::net_amount)
            .sum();
        let total_deducted = deposits.iter().map(SecurityDeposit::approved_total).sum();
        let pending_review = deposits
            .iter()
            .filter(|deposit| deposit.status == DepositStatus::UnderReview)
            .count();

        let release_hours: Vec<f64> = deposits
            .iter()
            .filter(|deposit| deposit.status.is_terminal())
            .filter_map(|deposit| {
                let released = deposit.release_date?;
                let elapsed = released - deposit.booking_dates.end;
                Some(elapsed.num_minutes() as f64 / 60.0)
            })
            .collect();
        let average_release_hours = if release_hours.is_empty() {
            None
        } else {
            Some(release_hours.iter().sum::<f64>() / release_hours.len() as f64)
        };

        Self {
            total_held,
            total_released,
            total_deducted,
            pending_review,
            average_release_hours,
        }
    }
}
