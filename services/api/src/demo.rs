use crate::infra::{InMemoryBlacklistRepository, InMemoryDepositRepository};
use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Args;
use rental_guard::clock::FixedClock;
use rental_guard::error::AppError;
use rental_guard::money::Money;
use rental_guard::rental::blacklist::{
    BlacklistReason, BlacklistStatistics, BlacklistStatus, CustomerId, CustomerLookup,
    NewBlacklistEntry, NoBookingHistory, RegistryPolicy, RiskRegistryService,
};
use rental_guard::rental::deposits::{
    BookingDates, DeductionDecision, DeductionProposal, DepositLedger, DepositPolicy,
    DepositStatistics, DepositStatus, HoldRequest,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the demo report as JSON instead of text.
    #[arg(long)]
    pub(crate) json: bool,
    /// Release window applied after each rental ends (hours).
    #[arg(long)]
    pub(crate) release_window_hours: Option<i64>,
}

type DemoRegistry = RiskRegistryService<InMemoryBlacklistRepository, NoBookingHistory>;
type DemoLedger = DepositLedger<InMemoryDepositRepository>;

#[derive(Debug, Serialize)]
struct GateOutcome {
    scenario: &'static str,
    customer_id: String,
    can_book: bool,
    message: String,
    risk_score: Option<u8>,
    risk_level: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct DepositOutcome {
    scenario: &'static str,
    amount: Money,
    status: DepositStatus,
    net_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection: Option<String>,
}

#[derive(Debug, Serialize)]
struct DemoReport {
    gate: Vec<GateOutcome>,
    deposits: Vec<DepositOutcome>,
    registry: BlacklistStatistics,
    ledger: DepositStatistics,
    auto_release_due: usize,
}

fn demo_err(err: impl Display) -> AppError {
    AppError::Demo(err.to_string())
}

fn demo_start() -> Result<DateTime<Utc>, AppError> {
    Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0)
        .single()
        .ok_or_else(|| demo_err("invalid demo start"))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let start = demo_start()?;
    let clock = Arc::new(FixedClock::new(start));
    let registry = RiskRegistryService::with_clock(
        Arc::new(InMemoryBlacklistRepository::default()),
        Arc::new(NoBookingHistory),
        RegistryPolicy::default(),
        clock.clone(),
    );
    let policy = args
        .release_window_hours
        .map(DepositPolicy::new)
        .unwrap_or_default();
    let ledger = DepositLedger::with_clock(
        Arc::new(InMemoryDepositRepository::default()),
        policy,
        clock.clone(),
    );

    let gate = run_gate_scenarios(&registry, &clock, start)?;
    clock.set(start);
    let deposits = run_deposit_scenarios(&ledger, start)?;

    let booking_end = start + Duration::days(4);
    let auto_release_due = ledger
        .due_for_auto_release(policy.expected_release(booking_end))
        .map_err(demo_err)?
        .len();

    let report = DemoReport {
        gate,
        deposits,
        registry: registry.compute_statistics().map_err(demo_err)?,
        ledger: ledger.statistics().map_err(demo_err)?,
        auto_release_due,
    };

    if args.json {
        let rendered = serde_json::to_string_pretty(&report).map_err(demo_err)?;
        println!("{rendered}");
    } else {
        render_report(&report, policy);
    }
    Ok(())
}

fn entry(
    customer: &str,
    status: BlacklistStatus,
    reason: BlacklistReason,
    details: &str,
) -> NewBlacklistEntry {
    NewBlacklistEntry {
        customer_id: CustomerId(customer.to_string()),
        customer_name: format!("Demo customer {customer}"),
        customer_email: format!("{customer}@example.com"),
        customer_phone: None,
        status,
        reason,
        reason_details: details.to_string(),
        incident_date: None,
        incident_booking_id: None,
        incident_booking_reference: None,
        vehicle_id: None,
        vehicle_name: None,
        owner_id: Some("owner-demo".to_string()),
        owner_name: None,
        outstanding_amount: None,
        damage_amount: None,
        evidence_urls: Vec::new(),
        notes: None,
        review_required: false,
        expires_at: None,
        added_by: "admin-demo".to_string(),
        added_by_name: None,
    }
}

fn run_gate_scenarios(
    registry: &DemoRegistry,
    clock: &FixedClock,
    start: DateTime<Utc>,
) -> Result<Vec<GateOutcome>, AppError> {
    let mut fraud = entry(
        "c1",
        BlacklistStatus::Blacklisted,
        BlacklistReason::FraudAttempt,
        "Stolen card used for booking",
    );
    fraud.outstanding_amount = Some(Money::new(Decimal::new(12050, 2)).map_err(demo_err)?);
    registry.add_entry(fraud).map_err(demo_err)?;

    let mut expiring = entry(
        "c2",
        BlacklistStatus::Blacklisted,
        BlacklistReason::NoShow,
        "Two consecutive no-shows",
    );
    expiring.expires_at = Some(start + Duration::days(1));
    registry.add_entry(expiring).map_err(demo_err)?;

    let mut flagged = entry(
        "c3",
        BlacklistStatus::Flagged,
        BlacklistReason::LateReturn,
        "Returned six hours late",
    );
    flagged.review_required = true;
    registry.add_entry(flagged).map_err(demo_err)?;

    registry
        .add_entry(entry(
            "c4",
            BlacklistStatus::Warning,
            BlacklistReason::DocumentIssues,
            "Licence photo unreadable",
        ))
        .map_err(demo_err)?;

    let scenarios = [
        ("blacklisted customer", "c1", Duration::zero()),
        ("expired blacklisting", "c2", Duration::days(2)),
        ("flagged customer", "c3", Duration::days(2)),
        ("warned customer", "c4", Duration::days(2)),
    ];

    let mut outcomes = Vec::with_capacity(scenarios.len());
    for (scenario, customer, offset) in scenarios {
        clock.set(start + offset);
        let result = registry
            .check_customer(&CustomerLookup::by_id(customer))
            .map_err(demo_err)?;
        outcomes.push(GateOutcome {
            scenario,
            customer_id: customer.to_string(),
            can_book: result.can_book,
            message: result.message,
            risk_score: result.risk_profile.as_ref().map(|profile| profile.risk_score),
            risk_level: result
                .risk_profile
                .as_ref()
                .map(|profile| profile.risk_level.label()),
        });
    }
    Ok(outcomes)
}

fn hold(
    ledger: &DemoLedger,
    booking: &str,
    amount: u32,
    start: DateTime<Utc>,
) -> Result<rental_guard::rental::deposits::SecurityDeposit, AppError> {
    ledger
        .hold_deposit(HoldRequest {
            booking_id: booking.to_string(),
            vehicle_id: "veh-demo".to_string(),
            customer_id: CustomerId("c9".to_string()),
            amount: Money::from_units(amount),
            booking_dates: BookingDates {
                start,
                end: start + Duration::days(4),
            },
            actor: "system".to_string(),
        })
        .map_err(demo_err)
}

fn claim(reason: &str, amount: u32) -> DeductionProposal {
    DeductionProposal {
        reason: reason.to_string(),
        amount: Money::from_units(amount),
        evidence: Vec::new(),
        actor: "owner-demo".to_string(),
    }
}

fn propose_and_approve(
    ledger: &DemoLedger,
    deposit: &rental_guard::rental::deposits::DepositId,
    reason: &str,
    amount: u32,
) -> Result<(), AppError> {
    let proposed = ledger
        .propose_deduction(deposit, claim(reason, amount))
        .map_err(demo_err)?;
    let deduction = proposed
        .deductions
        .last()
        .ok_or_else(|| demo_err("proposal was not recorded"))?;
    ledger
        .resolve_deduction(deposit, &deduction.id, DeductionDecision::Approve, "admin-demo")
        .map_err(demo_err)?;
    Ok(())
}

fn run_deposit_scenarios(
    ledger: &DemoLedger,
    start: DateTime<Utc>,
) -> Result<Vec<DepositOutcome>, AppError> {
    let mut outcomes = Vec::new();

    let partial = hold(ledger, "bk-partial", 200, start)?;
    propose_and_approve(ledger, &partial.id, "Scratched bumper", 50)?;
    let partial = ledger
        .release_deposit(&partial.id, "admin-demo")
        .map_err(demo_err)?;
    outcomes.push(DepositOutcome {
        scenario: "partial deduction",
        amount: partial.amount,
        status: partial.status,
        net_amount: partial.net_amount(),
        rejection: None,
    });

    let full = hold(ledger, "bk-full", 100, start)?;
    propose_and_approve(ledger, &full.id, "Interior replacement", 100)?;
    let full = ledger
        .release_deposit(&full.id, "admin-demo")
        .map_err(demo_err)?;
    outcomes.push(DepositOutcome {
        scenario: "full deduction",
        amount: full.amount,
        status: full.status,
        net_amount: full.net_amount(),
        rejection: None,
    });

    let clean = hold(ledger, "bk-clean", 150, start)?;
    let clean = ledger
        .release_deposit(&clean.id, "system")
        .map_err(demo_err)?;
    outcomes.push(DepositOutcome {
        scenario: "clean return",
        amount: clean.amount,
        status: clean.status,
        net_amount: clean.net_amount(),
        rejection: None,
    });

    let over = hold(ledger, "bk-over", 100, start)?;
    ledger
        .propose_deduction(&over.id, claim("Dent", 60))
        .map_err(demo_err)?;
    let rejection = ledger
        .propose_deduction(&over.id, claim("Second dent", 60))
        .err()
        .map(|err| err.to_string());
    let over = ledger.get_deposit(&over.id).map_err(demo_err)?;
    outcomes.push(DepositOutcome {
        scenario: "over-claim",
        amount: over.amount,
        status: over.status,
        net_amount: over.net_amount(),
        rejection,
    });

    hold(ledger, "bk-idle", 80, start)?;

    Ok(outcomes)
}

fn render_report(report: &DemoReport, policy: DepositPolicy) {
    println!("Rental guard demo");
    println!("\nBooking gate");
    for outcome in &report.gate {
        let verdict = if outcome.can_book { "allowed" } else { "refused" };
        let risk = match (outcome.risk_score, outcome.risk_level) {
            (Some(score), Some(level)) => format!("risk {score} ({level})"),
            _ => "no profile".to_string(),
        };
        println!(
            "- {} [{}]: {} | {} | {}",
            outcome.scenario, outcome.customer_id, verdict, risk, outcome.message
        );
    }

    println!(
        "\nDeposits (release window {}h)",
        policy.release_window_hours()
    );
    for outcome in &report.deposits {
        println!(
            "- {}: {} held -> {} | net {}",
            outcome.scenario, outcome.amount, outcome.status, outcome.net_amount
        );
        if let Some(rejection) = &outcome.rejection {
            println!("  rejected: {rejection}");
        }
    }

    let registry = &report.registry;
    println!("\nRegistry statistics");
    println!(
        "- {} blacklisted | {} flagged | {} warnings | {} pending review",
        registry.total_blacklisted,
        registry.total_flagged,
        registry.total_warnings,
        registry.pending_reviews
    );
    println!("- outstanding balance {}", registry.total_outstanding);
    for (reason, count) in registry.top_reasons() {
        println!("  - {}: {}", reason.label(), count);
    }

    let ledger = &report.ledger;
    println!("\nLedger statistics");
    println!(
        "- held {} | released {} | deducted {} | {} under review",
        ledger.total_held, ledger.total_released, ledger.total_deducted, ledger.pending_review
    );
    match ledger.average_release_hours {
        Some(hours) => println!("- average release {hours:.1}h after rental end"),
        None => println!("- no finalized deposits yet"),
    }
    println!(
        "- {} deposit(s) due for automatic release",
        report.auto_release_due
    );
}
