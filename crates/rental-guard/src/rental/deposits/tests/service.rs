use super::common::*;
use chrono::Duration;
use std::sync::Arc;

use crate::money::Money;
use crate::rental::deposits::domain::{
    DeductionDecision, DeductionId, DeductionStatus, DepositFilter, DepositId, DepositStatus,
    InspectionRequest, InspectionStage, SecurityDeposit, VehicleInspection,
};
use crate::rental::deposits::repository::DepositRepository;
use crate::rental::deposits::{DepositLedger, DepositPolicy, LedgerError};
use crate::rental::store::ErrorKind;

fn assert_net_invariant(deposit: &SecurityDeposit) {
    let approved: Money = deposit
        .deductions
        .iter()
        .filter(|deduction| deduction.status == DeductionStatus::Approved)
        .map(|deduction| deduction.amount)
        .sum();
    assert_eq!(
        deposit.net_amount().checked_add(approved),
        Some(deposit.amount)
    );
}

fn timeline_actions(deposit: &SecurityDeposit) -> Vec<&str> {
    deposit
        .timeline
        .iter()
        .map(|event| event.action.as_str())
        .collect()
}

#[test]
fn hold_sets_release_window_after_booking_end() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-1", 200))
        .expect("hold succeeds");

    assert_eq!(deposit.id.0, "dep-000001");
    assert_eq!(deposit.status, DepositStatus::Held);
    assert_eq!(deposit.hold_date, now());
    assert_eq!(
        deposit.expected_release_date,
        booking_dates().end + Duration::hours(72)
    );
    assert_eq!(deposit.net_amount(), Money::from_units(200));
    assert_eq!(timeline_actions(&deposit), vec!["Deposit Held"]);
}

#[test]
fn hold_uses_configured_window() {
    let repository = Arc::new(MemoryDepositRepository::default());
    let ledger = DepositLedger::new(repository, DepositPolicy::new(24));
    let deposit = ledger
        .hold_deposit(hold_request("bk-1", 100))
        .expect("hold succeeds");
    assert_eq!(
        deposit.expected_release_date,
        booking_dates().end + Duration::hours(24)
    );
}

#[test]
fn hold_validates_request() {
    let (ledger, _, _) = build_ledger();

    let zero = ledger
        .hold_deposit(hold_request("bk-1", 0))
        .expect_err("zero amount rejected");
    assert!(matches!(zero, LedgerError::NonPositiveAmount));

    let mut reversed = hold_request("bk-1", 100);
    reversed.booking_dates.end = reversed.booking_dates.start - Duration::hours(1);
    assert!(matches!(
        ledger.hold_deposit(reversed),
        Err(LedgerError::InvalidBookingDates)
    ));

    let blank = ledger
        .hold_deposit(hold_request(" ", 100))
        .expect_err("booking id required");
    assert!(matches!(blank, LedgerError::MissingField("booking_id")));
    assert_eq!(blank.kind(), ErrorKind::Validation);
}

#[test]
fn one_deposit_per_booking() {
    let (ledger, _, _) = build_ledger();
    ledger
        .hold_deposit(hold_request("bk-1", 100))
        .expect("first hold");
    let err = ledger
        .hold_deposit(hold_request("bk-1", 100))
        .expect_err("second hold rejected");
    assert!(matches!(err, LedgerError::BookingAlreadyHeld(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[test]
fn concurrent_holds_for_one_booking_admit_a_single_deposit() {
    let (ledger, repository, _) = build_ledger();
    let ledger = Arc::new(ledger);
    let barrier = Arc::new(std::sync::Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                ledger.hold_deposit(hold_request("bk-race", 100))
            })
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("hold thread"))
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, LedgerError::BookingAlreadyHeld(_))));
    assert_eq!(repository.all().expect("all").len(), 1);
}

#[test]
fn partial_deduction_settles_as_partially_deducted() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-1", 200))
        .expect("hold");

    let proposed = ledger
        .propose_deduction(&deposit.id, proposal("Scratched bumper", 50))
        .expect("proposal");
    assert_eq!(proposed.status, DepositStatus::UnderReview);
    let deduction_id = proposed.deductions[0].id.clone();

    let approved = ledger
        .resolve_deduction(
            &deposit.id,
            &deduction_id,
            DeductionDecision::Approve,
            "admin-1",
        )
        .expect("approval");
    assert_eq!(approved.status, DepositStatus::UnderReview);
    assert_net_invariant(&approved);

    let released = ledger
        .release_deposit(&deposit.id, "admin-1")
        .expect("release");
    assert_eq!(released.status, DepositStatus::PartiallyDeducted);
    assert_eq!(released.net_amount(), Money::from_units(150));
    assert_eq!(released.release_date, Some(now()));
    assert_net_invariant(&released);
    assert_eq!(
        timeline_actions(&released),
        vec![
            "Deposit Held",
            "Deduction Proposed",
            "Deduction Approved",
            "Partial Release"
        ]
    );
}

#[test]
fn full_deduction_settles_as_fully_deducted() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-2", 100))
        .expect("hold");
    let proposed = ledger
        .propose_deduction(&deposit.id, proposal("Total cleaning", 100))
        .expect("proposal");
    ledger
        .resolve_deduction(
            &deposit.id,
            &proposed.deductions[0].id,
            DeductionDecision::Approve,
            "admin-1",
        )
        .expect("approval");

    let released = ledger
        .release_deposit(&deposit.id, "admin-1")
        .expect("release");
    assert_eq!(released.status, DepositStatus::FullyDeducted);
    assert_eq!(released.net_amount(), Money::ZERO);
    assert_eq!(
        released.timeline.last().map(|event| event.action.as_str()),
        Some("Deposit Fully Deducted")
    );
}

#[test]
fn clean_return_releases_everything() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-3", 150))
        .expect("hold");

    let released = ledger
        .release_deposit(&deposit.id, "system")
        .expect("release");
    assert_eq!(released.status, DepositStatus::Released);
    assert_eq!(released.net_amount(), Money::from_units(150));
    assert_eq!(
        released.timeline.last().map(|event| event.action.as_str()),
        Some("Deposit Released")
    );
}

#[test]
fn proposal_cannot_exceed_remaining_after_approval() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-4", 100))
        .expect("hold");
    let first = ledger
        .propose_deduction(&deposit.id, proposal("Dent", 60))
        .expect("first proposal");
    ledger
        .resolve_deduction(
            &deposit.id,
            &first.deductions[0].id,
            DeductionDecision::Approve,
            "admin-1",
        )
        .expect("approval");

    let err = ledger
        .propose_deduction(&deposit.id, proposal("Second dent", 60))
        .expect_err("exceeds remaining");
    match &err {
        LedgerError::InvalidAmount {
            proposed,
            remaining,
        } => {
            assert_eq!(*proposed, Money::from_units(60));
            assert_eq!(*remaining, Money::from_units(40));
        }
        other => panic!("expected invalid amount, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stored = ledger.get_deposit(&deposit.id).expect("deposit");
    assert_eq!(stored.deductions.len(), 1);
    assert_net_invariant(&stored);
}

#[test]
fn zero_proposal_is_rejected() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-5", 100))
        .expect("hold");
    assert!(matches!(
        ledger.propose_deduction(&deposit.id, proposal("Nothing", 0)),
        Err(LedgerError::InvalidAmount { .. })
    ));
}

#[test]
fn pending_proposals_reserve_the_balance() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-6", 100))
        .expect("hold");
    let first = ledger
        .propose_deduction(&deposit.id, proposal("Dent", 60))
        .expect("first proposal");

    let err = ledger
        .propose_deduction(&deposit.id, proposal("Second dent", 60))
        .expect_err("second proposal would overdraw");
    match &err {
        LedgerError::InvalidAmount {
            proposed,
            remaining,
        } => {
            assert_eq!(*proposed, Money::from_units(60));
            assert_eq!(*remaining, Money::from_units(40));
        }
        other => panic!("expected invalid amount, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stored = ledger.get_deposit(&deposit.id).expect("deposit");
    assert_eq!(stored.deductions.len(), 1);
    assert_eq!(stored.pending_total(), Money::from_units(60));
    assert_eq!(stored.claimable_balance(), Money::from_units(40));

    ledger
        .propose_deduction(&deposit.id, proposal("Cleaning", 40))
        .expect("exact remainder fits");
    ledger
        .resolve_deduction(
            &deposit.id,
            &first.deductions[0].id,
            DeductionDecision::Dispute,
            "admin-1",
        )
        .expect("dispute");
    let reopened = ledger
        .propose_deduction(&deposit.id, proposal("Second dent", 60))
        .expect("disputed claim frees its share");
    assert_eq!(reopened.deductions.len(), 3);
    assert_eq!(reopened.claimable_balance(), Money::ZERO);
}

#[test]
fn approval_rechecks_remaining_balance() {
    let (ledger, repository, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-16", 100))
        .expect("hold");
    let proposed = ledger
        .propose_deduction(&deposit.id, proposal("Fuel", 70))
        .expect("first");

    // A record written by an older ledger can carry claims beyond the deposit.
    let mut overdrawn = proposed.clone();
    let mut second = proposed.deductions[0].clone();
    second.id = DeductionId("ded-legacy".to_string());
    second.reason = "Cleaning".to_string();
    overdrawn.deductions.push(second);
    repository
        .replace(overdrawn, proposed.revision)
        .expect("seed legacy record");

    ledger
        .resolve_deduction(
            &deposit.id,
            &proposed.deductions[0].id,
            DeductionDecision::Approve,
            "admin-1",
        )
        .expect("first approval");
    let err = ledger
        .resolve_deduction(
            &deposit.id,
            &DeductionId("ded-legacy".to_string()),
            DeductionDecision::Approve,
            "admin-1",
        )
        .expect_err("second approval would overdraw");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let disputed = ledger
        .resolve_deduction(
            &deposit.id,
            &DeductionId("ded-legacy".to_string()),
            DeductionDecision::Dispute,
            "admin-1",
        )
        .expect("dispute is still possible");
    assert_eq!(disputed.deductions[1].status, DeductionStatus::Disputed);
    assert_eq!(disputed.net_amount(), Money::from_units(30));
    assert_net_invariant(&disputed);
}

#[test]
fn release_waits_for_pending_deductions() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-7", 100))
        .expect("hold");
    let proposed = ledger
        .propose_deduction(&deposit.id, proposal("Smoke smell", 25))
        .expect("proposal");

    let err = ledger
        .release_deposit(&deposit.id, "admin-1")
        .expect_err("pending deduction blocks release");
    assert!(matches!(
        err,
        LedgerError::PendingDeductions { pending: 1, .. }
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    ledger
        .resolve_deduction(
            &deposit.id,
            &proposed.deductions[0].id,
            DeductionDecision::Dispute,
            "admin-1",
        )
        .expect("dispute");
    let released = ledger
        .release_deposit(&deposit.id, "admin-1")
        .expect("release after dispute");
    assert_eq!(released.status, DepositStatus::Released);
    assert_eq!(released.net_amount(), Money::from_units(100));
}

#[test]
fn resolved_deduction_cannot_be_resolved_again() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-8", 100))
        .expect("hold");
    let proposed = ledger
        .propose_deduction(&deposit.id, proposal("Tolls", 10))
        .expect("proposal");
    let deduction_id = proposed.deductions[0].id.clone();
    ledger
        .resolve_deduction(&deposit.id, &deduction_id, DeductionDecision::Dispute, "a")
        .expect("dispute");

    let err = ledger
        .resolve_deduction(&deposit.id, &deduction_id, DeductionDecision::Approve, "a")
        .expect_err("already disputed");
    assert!(matches!(err, LedgerError::DeductionNotPending { .. }));
}

#[test]
fn unknown_ids_are_not_found() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-9", 100))
        .expect("hold");

    let missing_deposit = ledger
        .release_deposit(&DepositId("dep-404".to_string()), "a")
        .expect_err("missing deposit");
    assert_eq!(missing_deposit.kind(), ErrorKind::NotFound);

    let missing_deduction = ledger
        .resolve_deduction(
            &deposit.id,
            &crate::rental::deposits::DeductionId("ded-404".to_string()),
            DeductionDecision::Approve,
            "a",
        )
        .expect_err("missing deduction");
    assert!(matches!(
        missing_deduction,
        LedgerError::DeductionNotFound { .. }
    ));
}

#[test]
fn finalized_deposits_reject_mutation() {
    let (ledger, _, _) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-10", 100))
        .expect("hold");
    ledger
        .release_deposit(&deposit.id, "admin-1")
        .expect("release");

    for err in [
        ledger
            .propose_deduction(&deposit.id, proposal("Late claim", 10))
            .expect_err("proposal after release"),
        ledger
            .release_deposit(&deposit.id, "admin-1")
            .expect_err("double release"),
    ] {
        assert!(matches!(err, LedgerError::Finalized { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    }
}

#[test]
fn inspections_are_recorded_on_open_deposits() {
    let (ledger, _, clock) = build_ledger();
    let deposit = ledger
        .hold_deposit(hold_request("bk-11", 100))
        .expect("hold");

    clock.advance(Duration::days(1));
    let inspected = ledger
        .record_inspection(
            &deposit.id,
            InspectionRequest {
                stage: InspectionStage::PreRental,
                inspection: VehicleInspection {
                    mileage: 42_150,
                    fuel_level: 100,
                    inspection_date: now() + Duration::days(1),
                    notes: "Clean".to_string(),
                    photos: Vec::new(),
                },
                actor: "owner-1".to_string(),
            },
        )
        .expect("inspection");

    let pre = inspected
        .vehicle_condition
        .pre_rental
        .as_ref()
        .expect("pre-rental stored");
    assert_eq!(pre.mileage, 42_150);
    assert!(inspected.vehicle_condition.post_rental.is_none());
    let last = inspected.timeline.last().expect("timeline event");
    assert_eq!(last.action, "Pre-Rental Inspection");
    assert_eq!(last.date, now() + Duration::days(1));

    let err = ledger
        .record_inspection(
            &deposit.id,
            InspectionRequest {
                stage: InspectionStage::PostRental,
                inspection: VehicleInspection {
                    mileage: 42_600,
                    fuel_level: 140,
                    inspection_date: now() + Duration::days(4),
                    notes: String::new(),
                    photos: Vec::new(),
                },
                actor: "owner-1".to_string(),
            },
        )
        .expect_err("fuel above 100% rejected");
    assert!(matches!(err, LedgerError::InvalidFuelLevel(140)));
}

#[test]
fn stale_write_surfaces_as_retryable_conflict() {
    let repository = Arc::new(RacingRepository::losing(1));
    let ledger = DepositLedger::new(repository.clone(), DepositPolicy::default());
    let deposit = ledger
        .hold_deposit(hold_request("bk-12", 100))
        .expect("hold");

    let err = ledger
        .propose_deduction(&deposit.id, proposal("Chip", 10))
        .expect_err("lost race");
    assert!(matches!(err, LedgerError::Conflict(_)));
    assert!(err.kind().is_retryable());

    let stored = repository
        .fetch(&deposit.id)
        .expect("fetch")
        .expect("present");
    assert!(stored.deductions.is_empty());
    assert_eq!(stored.status, DepositStatus::Held);

    let retried = ledger
        .propose_deduction(&deposit.id, proposal("Chip", 10))
        .expect("retry succeeds");
    assert_eq!(retried.deductions.len(), 1);
}

#[test]
fn list_filters_and_orders_by_hold_date() {
    let (ledger, _, clock) = build_ledger();
    let first = ledger
        .hold_deposit(hold_request("bk-a", 100))
        .expect("hold");
    clock.advance(Duration::hours(2));
    let second = ledger
        .hold_deposit(hold_request("bk-b", 100))
        .expect("hold");
    ledger
        .propose_deduction(&second.id, proposal("Fuel", 20))
        .expect("proposal");

    let all = ledger
        .list_deposits(&DepositFilter::default())
        .expect("list");
    let ids: Vec<_> = all.iter().map(|deposit| deposit.id.clone()).collect();
    assert_eq!(ids, vec![second.id.clone(), first.id.clone()]);

    let review = ledger
        .list_deposits(&DepositFilter {
            status: Some(DepositStatus::UnderReview),
            ..DepositFilter::default()
        })
        .expect("list");
    assert_eq!(review.len(), 1);
    assert_eq!(review[0].id, second.id);

    let searched = ledger
        .list_deposits(&DepositFilter {
            search: Some("BK-A".to_string()),
            ..DepositFilter::default()
        })
        .expect("search");
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].id, first.id);
}

#[test]
fn auto_release_candidates_are_untouched_held_deposits() {
    let (ledger, _, _) = build_ledger();
    let untouched = ledger
        .hold_deposit(hold_request("bk-x", 100))
        .expect("hold");
    let claimed = ledger
        .hold_deposit(hold_request("bk-y", 100))
        .expect("hold");
    ledger
        .propose_deduction(&claimed.id, proposal("Damage", 40))
        .expect("proposal");

    let deadline = booking_dates().end + Duration::hours(72);
    assert!(ledger
        .due_for_auto_release(deadline - Duration::minutes(1))
        .expect("due")
        .is_empty());

    let due = ledger.due_for_auto_release(deadline).expect("due");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, untouched.id);
}

#[test]
fn outage_is_reported_as_unavailable() {
    let ledger = DepositLedger::new(Arc::new(UnavailableRepository), DepositPolicy::default());
    let err = ledger
        .hold_deposit(hold_request("bk-1", 100))
        .expect_err("outage");
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}
