//! Customer risk registry: blacklist, flag, and warning entries plus the
//! booking gate and risk profile derived from them.

pub mod domain;
pub mod repository;
pub mod risk;
pub mod router;
pub mod service;
pub mod statistics;

#[cfg(test)]
mod tests;

pub use domain::{
    BlacklistEntry, BlacklistReason, BlacklistStatus, ClearanceRequest, CustomerId,
    CustomerLookup, EntryFilter, EntryId, EntryUpdate, NewBlacklistEntry,
};
pub use repository::{BlacklistRepository, BookingHistory, BookingSummary, NoBookingHistory};
pub use risk::{CustomerRiskProfile, RiskAssessor, RiskLevel};
pub use router::blacklist_router;
pub use service::{BlacklistCheckResult, RegistryError, RegistryPolicy, RiskRegistryService};
pub use statistics::BlacklistStatistics;
