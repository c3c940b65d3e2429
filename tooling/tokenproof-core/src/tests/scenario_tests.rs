use std::collections::BTreeSet;

use alloy_primitives::U256;

use super::support::{deploy, Quirk};
use crate::scenarios::{find, run_scenario, run_scenarios, Level, ScenarioStatus, SCENARIOS};
use crate::substrate::{Substrate, TokenQuery};

fn status_of(quirk: Quirk, name: &str) -> ScenarioStatus {
    let (mut chain, token) = deploy(quirk);
    let scenario = find(name).unwrap();
    run_scenario(&mut chain, token, scenario, true).unwrap().status
}

#[test]
fn test_scenario_names_are_unique() {
    let names: BTreeSet<_> = SCENARIOS.iter().map(|s| s.name).collect();
    assert_eq!(names.len(), SCENARIOS.len());
    for level in Level::ALL {
        assert!(
            SCENARIOS.iter().any(|s| s.level == level),
            "no scenario at level {level}"
        );
    }
}

#[test]
fn test_conforming_token_runs_clean() {
    let (mut chain, token) = deploy(Quirk::None);
    let report = run_scenarios(&mut chain, token, SCENARIOS, true).unwrap();

    let failed: Vec<_> = report
        .results
        .iter()
        .filter(|r| matches!(r.status, ScenarioStatus::Failed(_)))
        .map(|r| (r.name, r.status.clone()))
        .collect();
    assert!(failed.is_empty(), "unexpected failures: {failed:?}");
    assert_eq!(report.results.len(), SCENARIOS.len());
    assert!(report.is_clean());

    // Every scenario ran in its own snapshot.
    assert_eq!(chain.snapshot_depth(), 0);
    assert_eq!(chain.read(token, &TokenQuery::TotalSupply).unwrap(), U256::ZERO);
}

#[test]
fn test_expected_failures_are_classified() {
    assert!(matches!(
        status_of(Quirk::None, "reverts_on_infinite_approval"),
        ScenarioStatus::XFailed(_)
    ));
    assert_eq!(
        status_of(Quirk::None, "can_approve_more_than_balance"),
        ScenarioStatus::XPassed
    );
    // The conforming token keeps MAX allowances, so only the sticky variant holds.
    assert_eq!(
        status_of(Quirk::None, "infinite_approval_constant"),
        ScenarioStatus::XPassed
    );
    assert!(matches!(
        status_of(Quirk::None, "infinite_approval_not_constant"),
        ScenarioStatus::XFailed(_)
    ));
}

#[test]
fn test_unspent_allowance_fails_minimal_checks() {
    assert!(matches!(
        status_of(Quirk::SkipAllowanceDecrement, "positive_approve_allows_positive_transfer_from"),
        ScenarioStatus::Failed(_)
    ));
    assert!(matches!(
        status_of(Quirk::SkipAllowanceDecrement, "transfer_from_decreases_allowance"),
        ScenarioStatus::Failed(_)
    ));
}

#[test]
fn test_fee_on_transfer_fails_desirable_checks() {
    assert!(matches!(
        status_of(Quirk::FeeOnTransfer, "no_fee_on_transfer"),
        ScenarioStatus::Failed(_)
    ));
}

#[test]
fn test_missing_approval_event_fails() {
    match status_of(Quirk::NoApprovalEvent, "positive_approval_event_emission") {
        ScenarioStatus::Failed(message) => assert!(message.contains("Approval")),
        other => panic!("expected a failure, got {other:?}"),
    }
}

#[test]
fn test_null_receiver_acceptance_is_an_expected_failure() {
    assert!(matches!(
        status_of(Quirk::AcceptNullReceiver, "positive_transfer_to_null_reverts"),
        ScenarioStatus::XFailed(_)
    ));
}

#[test]
fn test_scenario_warnings_are_collected() {
    let (mut chain, token) = deploy(Quirk::NoReturn);
    let scenario = find("positive_transfer_event_emission").unwrap();
    let result = run_scenario(&mut chain, token, scenario, true).unwrap();

    assert_eq!(result.status, ScenarioStatus::Passed);
    assert!(!result.warnings.is_empty());
}

#[test]
fn test_level_parsing() {
    assert_eq!("minimal".parse::<Level>().unwrap(), Level::Minimal);
    assert_eq!("Fingerprint".parse::<Level>().unwrap(), Level::Fingerprint);
    assert!("mandatory".parse::<Level>().is_err());
    assert_eq!(Level::Desirable.to_string(), "desirable");
}
