use serde::{Deserialize, Serialize};

use crate::rental::blacklist::domain::BlacklistStatus;

/// Monotone bucketing of the 0..=100 risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

const CRITICAL_THRESHOLD: u8 = 80;
const HIGH_THRESHOLD: u8 = 50;
const MEDIUM_THRESHOLD: u8 = 25;

impl RiskLevel {
    pub const fn from_score(score: u8) -> Self {
        if score >= CRITICAL_THRESHOLD {
            RiskLevel::Critical
        } else if score >= HIGH_THRESHOLD {
            RiskLevel::High
        } else if score >= MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Booking gate verdict derived from the active restriction flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub can_book: bool,
    pub message: &'static str,
}

/// Verdict for the most severe active status. Only a blacklisting blocks;
/// flags and warnings are advisory.
pub fn gate_decision(restriction: Option<BlacklistStatus>) -> GateDecision {
    match restriction {
        Some(status) if status.blocks_booking() => GateDecision {
            can_book: false,
            message: "Customer is blacklisted and cannot make bookings",
        },
        Some(BlacklistStatus::Flagged) => GateDecision {
            can_book: true,
            message: "Customer is flagged - review recommended before confirming",
        },
        Some(BlacklistStatus::Warning) => GateDecision {
            can_book: true,
            message: "Customer has warnings on file",
        },
        _ => GateDecision {
            can_book: true,
            message: "Customer is in good standing",
        },
    }
}
