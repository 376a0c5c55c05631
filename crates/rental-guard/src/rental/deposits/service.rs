use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::domain::{
    Deduction, DeductionDecision, DeductionId, DeductionProposal, DeductionStatus, DepositFilter,
    DepositId, DepositStatus, HoldRequest, InspectionRequest, InspectionStage, ResolutionRequest,
    SecurityDeposit, VehicleCondition,
};
use super::repository::DepositRepository;
use super::statistics::DepositStatistics;
use crate::clock::{Clock, SystemClock};
use crate::money::Money;
use crate::rental::store::{ErrorKind, RepositoryError};

/// Release window applied after the rental ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositPolicy {
    release_window_hours: i64,
}

impl DepositPolicy {
    pub const DEFAULT_RELEASE_WINDOW_HOURS: i64 = 72;

    pub fn new(release_window_hours: i64) -> Self {
        let sanitized = if release_window_hours > 0 {
            release_window_hours
        } else {
            Self::DEFAULT_RELEASE_WINDOW_HOURS
        };
        Self {
            release_window_hours: sanitized,
        }
    }

    pub fn release_window_hours(&self) -> i64 {
        self.release_window_hours
    }

    pub fn expected_release(&self, booking_end: DateTime<Utc>) -> DateTime<Utc> {
        booking_end + Duration::hours(self.release_window_hours)
    }
}

impl Default for DepositPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RELEASE_WINDOW_HOURS)
    }
}

/// Ledger service owning every deposit state transition.
///
/// Mutations read the record, apply the change, and write it back against
/// the revision that was read. A concurrent writer turns into
/// [`LedgerError::Conflict`]; nothing is partially applied.
pub struct DepositLedger<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    policy: DepositPolicy,
    deposit_sequence: AtomicU64,
    deduction_sequence: AtomicU64,
}

impl<R> DepositLedger<R>
where
    R: DepositRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: DepositPolicy) -> Self {
        Self::with_clock(repository, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: Arc<R>, policy: DepositPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            policy,
            deposit_sequence: AtomicU64::new(1),
            deduction_sequence: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &DepositPolicy {
        &self.policy
    }

    fn next_deposit_id(&self) -> DepositId {
        let id = self.deposit_sequence.fetch_add(1, Ordering::Relaxed);
        DepositId(format!("dep-{id:06}"))
    }

    fn next_deduction_id(&self) -> DeductionId {
        let id = self.deduction_sequence.fetch_add(1, Ordering::Relaxed);
        DeductionId(format!("ded-{id:06}"))
    }

    pub fn hold_deposit(&self, request: HoldRequest) -> Result<SecurityDeposit, LedgerError> {
        require("booking_id", &request.booking_id)?;
        require("vehicle_id", &request.vehicle_id)?;
        require("customer_id", &request.customer_id.0)?;
        if request.amount.is_zero() {
            return Err(LedgerError::NonPositiveAmount);
        }
        if request.booking_dates.end < request.booking_dates.start {
            return Err(LedgerError::InvalidBookingDates);
        }

        let booking_id = request.booking_id.trim().to_string();
        let now = self.clock.now();
        let mut deposit = SecurityDeposit {
            id: self.next_deposit_id(),
            booking_id: booking_id.clone(),
            vehicle_id: request.vehicle_id.trim().to_string(),
            customer_id: request.customer_id,
            amount: request.amount,
            status: DepositStatus::Held,
            hold_date: now,
            expected_release_date: self.policy.expected_release(request.booking_dates.end),
            release_date: None,
            deductions: Vec::new(),
            booking_dates: request.booking_dates,
            vehicle_condition: VehicleCondition::default(),
            timeline: Vec::new(),
            revision: 0,
        };
        deposit.record(
            "Deposit Held",
            now,
            format!("Security deposit of {} held", deposit.amount),
            &request.actor,
        );

        let stored = self.repository.insert(deposit).map_err(|err| match err {
            RepositoryError::Duplicate => {
                warn!(booking_id = %booking_id, "deposit already held for booking");
                LedgerError::BookingAlreadyHeld(booking_id.clone())
            }
            other => LedgerError::Repository(other),
        })?;
        info!(
            deposit_id = %stored.id,
            booking_id = %stored.booking_id,
            amount = %stored.amount,
            "deposit held"
        );
        Ok(stored)
    }

    pub fn propose_deduction(
        &self,
        id: &DepositId,
        proposal: DeductionProposal,
    ) -> Result<SecurityDeposit, LedgerError> {
        require("reason", &proposal.reason)?;
        let mut deposit = self.open_deposit(id)?;
        let expected = deposit.revision;

        let remaining = deposit.claimable_balance();
        if proposal.amount.is_zero() || proposal.amount > remaining {
            return Err(LedgerError::InvalidAmount {
                proposed: proposal.amount,
                remaining,
            });
        }

        let now = self.clock.now();
        let deduction = Deduction {
            id: self.next_deduction_id(),
            reason: proposal.reason.trim().to_string(),
            amount: proposal.amount,
            evidence: proposal.evidence,
            created_at: now,
            proposed_by: proposal.actor.clone(),
            status: DeductionStatus::Pending,
            resolved_at: None,
            resolved_by: None,
        };
        let details = format!("{} proposed for {}", deduction.amount, deduction.reason);
        let deduction_id = deduction.id.clone();
        deposit.deductions.push(deduction);
        deposit.status = DepositStatus::UnderReview;
        deposit.record("Deduction Proposed", now, details, &proposal.actor);

        let stored = self.persist(deposit, expected)?;
        info!(
            deposit_id = %stored.id,
            deduction_id = %deduction_id,
            amount = %proposal.amount,
            "deduction proposed"
        );
        Ok(stored)
    }

    /// Approve or dispute a pending deduction. The deposit stays under
    /// review either way; only `release_deposit` finalizes it.
    pub fn resolve_deduction(
        &self,
        id: &DepositId,
        deduction_id: &DeductionId,
        decision: DeductionDecision,
        actor: &str,
    ) -> Result<SecurityDeposit, LedgerError> {
        self.apply_resolution(
            id,
            deduction_id,
            &ResolutionRequest {
                decision,
                actor: actor.to_string(),
                notes: None,
            },
        )
    }

    /// Same as [`Self::resolve_deduction`], recording reviewer notes on the
    /// timeline.
    pub fn apply_resolution(
        &self,
        id: &DepositId,
        deduction_id: &DeductionId,
        request: &ResolutionRequest,
    ) -> Result<SecurityDeposit, LedgerError> {
        let decision = request.decision;
        let actor = request.actor.as_str();
        let mut deposit = self.open_deposit(id)?;
        let expected = deposit.revision;

        let remaining = deposit.remaining_balance();
        let deduction = deposit
            .deduction(deduction_id)
            .ok_or_else(|| LedgerError::DeductionNotFound {
                deposit: id.clone(),
                deduction: deduction_id.clone(),
            })?;
        if deduction.status != DeductionStatus::Pending {
            return Err(LedgerError::DeductionNotPending {
                deduction: deduction_id.clone(),
                status: deduction.status,
            });
        }
        if decision == DeductionDecision::Approve && deduction.amount > remaining {
            return Err(LedgerError::InvalidAmount {
                proposed: deduction.amount,
                remaining,
            });
        }

        let now = self.clock.now();
        let (status, action) = match decision {
            DeductionDecision::Approve => (DeductionStatus::Approved, "Deduction Approved"),
            DeductionDecision::Dispute => (DeductionStatus::Disputed, "Deduction Disputed"),
        };
        let details = match deposit.deduction_mut(deduction_id) {
            Some(deduction) => {
                deduction.status = status;
                deduction.resolved_at = Some(now);
                deduction.resolved_by = Some(actor.to_string());
                let summary = format!("{} for {}", deduction.amount, deduction.reason);
                match request.notes.as_deref().map(str::trim) {
                    Some(notes) if !notes.is_empty() => format!("{summary} - {notes}"),
                    _ => summary,
                }
            }
            None => {
                return Err(LedgerError::DeductionNotFound {
                    deposit: id.clone(),
                    deduction: deduction_id.clone(),
                })
            }
        };
        deposit.record(action, now, details, actor);

        let stored = self.persist(deposit, expected)?;
        info!(
            deposit_id = %stored.id,
            deduction_id = %deduction_id,
            decision = status.label(),
            net_amount = %stored.net_amount(),
            "deduction resolved"
        );
        Ok(stored)
    }

    /// Finalize the deposit. Refused while any deduction is still pending.
    pub fn release_deposit(&self, id: &DepositId, actor: &str) -> Result<SecurityDeposit, LedgerError> {
        let mut deposit = self.open_deposit(id)?;
        let expected = deposit.revision;

        if deposit.has_pending_deductions() {
            let pending = deposit.pending_deductions().count();
            warn!(deposit_id = %id, pending, "release refused with pending deductions");
            return Err(LedgerError::PendingDeductions {
                deposit: id.clone(),
                pending,
            });
        }

        let now = self.clock.now();
        let status = deposit.settlement_status();
        let net = deposit.net_amount();
        let approved = deposit.approved_total();
        let (action, details) = match status {
            DepositStatus::Released => ("Deposit Released", format!("Full amount {net} returned")),
            DepositStatus::FullyDeducted => (
                "Deposit Fully Deducted",
                format!("Entire deposit of {} retained", deposit.amount),
            ),
            _ => (
                "Partial Release",
                format!("{net} returned after {approved} in deductions"),
            ),
        };
        deposit.status = status;
        deposit.release_date = Some(now);
        deposit.record(action, now, details, actor);

        let stored = self.persist(deposit, expected)?;
        info!(
            deposit_id = %stored.id,
            status = stored.status.label(),
            net_amount = %net,
            "deposit finalized"
        );
        Ok(stored)
    }

    pub fn record_inspection(
        &self,
        id: &DepositId,
        request: InspectionRequest,
    ) -> Result<SecurityDeposit, LedgerError> {
        if request.inspection.fuel_level > 100 {
            return Err(LedgerError::InvalidFuelLevel(request.inspection.fuel_level));
        }
        let mut deposit = self.open_deposit(id)?;
        let expected = deposit.revision;

        let now = self.clock.now();
        let details = format!(
            "Mileage {}, fuel {}%",
            request.inspection.mileage, request.inspection.fuel_level
        );
        match request.stage {
            InspectionStage::PreRental => {
                deposit.vehicle_condition.pre_rental = Some(request.inspection)
            }
            InspectionStage::PostRental => {
                deposit.vehicle_condition.post_rental = Some(request.inspection)
            }
        }
        deposit.record(request.stage.timeline_action(), now, details, &request.actor);

        let stored = self.persist(deposit, expected)?;
        info!(deposit_id = %stored.id, stage = ?request.stage, "inspection recorded");
        Ok(stored)
    }

    pub fn get_deposit(&self, id: &DepositId) -> Result<SecurityDeposit, LedgerError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    /// Newest hold first.
    pub fn list_deposits(&self, filter: &DepositFilter) -> Result<Vec<SecurityDeposit>, LedgerError> {
        let mut deposits: Vec<_> = self
            .repository
            .all()?
            .into_iter()
            .filter(|deposit| filter.matches(deposit))
            .collect();
        deposits.sort_by(|a, b| b.hold_date.cmp(&a.hold_date).then_with(|| b.id.cmp(&a.id)));
        Ok(deposits)
    }

    /// Held deposits without deductions whose release window has passed.
    /// Acting on them is left to the caller.
    pub fn due_for_auto_release(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SecurityDeposit>, LedgerError> {
        let mut due: Vec<_> = self
            .repository
            .all()?
            .into_iter()
            .filter(|deposit| {
                deposit.status == DepositStatus::Held
                    && deposit.deductions.is_empty()
                    && deposit.expected_release_date <= now
            })
            .collect();
        due.sort_by(|a, b| a.expected_release_date.cmp(&b.expected_release_date));
        Ok(due)
    }

    pub fn statistics(&self) -> Result<DepositStatistics, LedgerError> {
        Ok(DepositStatistics::compute(&self.repository.all()?))
    }

    fn open_deposit(&self, id: &DepositId) -> Result<SecurityDeposit, LedgerError> {
        let deposit = self.get_deposit(id)?;
        if deposit.status.is_terminal() {
            warn!(deposit_id = %id, status = deposit.status.label(), "mutation on finalized deposit");
            return Err(LedgerError::Finalized {
                deposit: id.clone(),
                status: deposit.status,
            });
        }
        Ok(deposit)
    }

    fn persist(
        &self,
        deposit: SecurityDeposit,
        expected_revision: u64,
    ) -> Result<SecurityDeposit, LedgerError> {
        let id = deposit.id.clone();
        self.repository
            .replace(deposit, expected_revision)
            .map_err(|err| match err {
                RepositoryError::StaleRevision { .. } => {
                    warn!(deposit_id = %id, "concurrent deposit update detected");
                    LedgerError::Conflict(id)
                }
                RepositoryError::NotFound => LedgerError::NotFound(id),
                other => LedgerError::Repository(other),
            })
    }
}

fn require(field: &'static str, value: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        Err(LedgerError::MissingField(field))
    } else {
        Ok(())
    }
}

/// Error raised by the deposit ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("deposit amount must be greater than zero")]
    NonPositiveAmount,
    #[error("booking end must not be before booking start")]
    InvalidBookingDates,
    #[error("fuel level {0}% is out of range")]
    InvalidFuelLevel(u8),
    #[error("deduction of {proposed} is not within the remaining balance of {remaining}")]
    InvalidAmount { proposed: Money, remaining: Money },
    #[error("deposit {0} not found")]
    NotFound(DepositId),
    #[error("deduction {deduction} not found on deposit {deposit}")]
    DeductionNotFound {
        deposit: DepositId,
        deduction: DeductionId,
    },
    #[error("deduction {deduction} is already {}", .status.label())]
    DeductionNotPending {
        deduction: DeductionId,
        status: DeductionStatus,
    },
    #[error("deposit {deposit} has {pending} pending deduction(s)")]
    PendingDeductions { deposit: DepositId, pending: usize },
    #[error("deposit {deposit} is already {status}")]
    Finalized {
        deposit: DepositId,
        status: DepositStatus,
    },
    #[error("a deposit is already held for booking {0}")]
    BookingAlreadyHeld(String),
    #[error("deposit {0} was modified concurrently; re-read and retry")]
    Conflict(DepositId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::MissingField(_)
            | LedgerError::NonPositiveAmount
            | LedgerError::InvalidBookingDates
            | LedgerError::InvalidFuelLevel(_)
            | LedgerError::InvalidAmount { .. } => ErrorKind::Validation,
            LedgerError::NotFound(_) | LedgerError::DeductionNotFound { .. } => {
                ErrorKind::NotFound
            }
            LedgerError::DeductionNotPending { .. }
            | LedgerError::PendingDeductions { .. }
            | LedgerError::Finalized { .. }
            | LedgerError::BookingAlreadyHeld(_) => ErrorKind::InvalidStateTransition,
            LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::Repository(err) => err.kind(),
        }
    }
}
