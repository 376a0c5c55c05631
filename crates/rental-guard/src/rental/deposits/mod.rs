//! Security deposit ledger: hold at booking, owner deductions under review,
//! and release with a derived net amount.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod statistics;

#[cfg(test)]
mod tests;

pub use domain::{
    BookingDates, Deduction, DeductionDecision, DeductionId, DeductionProposal, DeductionStatus,
    DepositFilter, DepositId, DepositStatus, DepositView, HoldRequest, InspectionRequest,
    InspectionStage, ReleaseRequest, ResolutionRequest, SecurityDeposit, TimelineEvent,
    VehicleCondition, VehicleInspection,
};
pub use repository::DepositRepository;
pub use router::deposit_router;
pub use service::{DepositLedger, DepositPolicy, LedgerError};
pub use statistics::DepositStatistics;
