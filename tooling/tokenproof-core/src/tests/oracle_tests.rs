use alloy_primitives::{Address, U256};

use super::support::{accounts, deploy, oracle, u, Quirk};
use crate::chain::MemoryChain;
use crate::oracle::DifferentialOracle;
use crate::substrate::{Substrate, TokenCall};
use crate::verdict::{Verdict, ViolationKind, WarningKind};

fn violation_kind(verdict: &Verdict) -> Option<ViolationKind> {
    verdict.violation().map(|v| v.kind)
}

fn warning_kinds(verdict: &Verdict) -> Vec<WarningKind> {
    verdict.warnings().iter().map(|w| w.kind).collect()
}

#[test]
fn test_conforming_approve_passes() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);

    assert!(oracle.assert_approve(acc[0], acc[1], u(100), false).is_pass());
    assert!(oracle.assert_approve(acc[0], acc[1], U256::ZERO, false).is_pass());
    assert!(oracle.assert_allowances_match_expected().is_pass());
    assert_eq!(oracle.model().allowance(acc[0], acc[1]), U256::ZERO);
}

#[test]
fn test_conforming_transfer_moves_balances() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(100)).unwrap();

    assert!(oracle.assert_transfer(acc[0], acc[1], u(60)).is_pass());
    assert!(oracle.assert_balances_match_expected().is_pass());
    assert!(oracle.assert_total_supply_matches_expected().is_pass());
    assert_eq!(oracle.balance_of(acc[1]).unwrap(), u(60));
}

#[test]
fn test_overdraft_is_expected_to_revert() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(10)).unwrap();

    assert!(oracle.assert_transfer(acc[0], acc[1], u(11)).is_pass());
    assert!(oracle.assert_invariants().is_pass());
}

#[test]
fn test_return_false_on_failure_is_a_warning() {
    let (mut chain, token) = deploy(Quirk::ReturnFalse);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);

    let verdict = oracle.assert_transfer(acc[0], acc[1], u(1));
    assert_eq!(
        warning_kinds(&verdict),
        vec![WarningKind::ReturnFalseInsteadOfRevert]
    );
}

#[test]
fn test_missing_return_value_is_a_warning() {
    let (mut chain, token) = deploy(Quirk::NoReturn);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(5)).unwrap();

    let verdict = oracle.assert_transfer(acc[0], acc[1], u(5));
    assert_eq!(warning_kinds(&verdict), vec![WarningKind::FalsyReturnOnSuccess]);
    assert!(oracle.assert_balances_match_expected().is_pass());
}

#[test]
fn test_missing_approval_event_fails() {
    let (mut chain, token) = deploy(Quirk::NoApprovalEvent);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);

    let verdict = oracle.assert_approve(acc[0], acc[1], u(1), false);
    assert_eq!(
        violation_kind(&verdict),
        Some(ViolationKind::MissingNotification)
    );
}

#[test]
fn test_unspent_allowance_is_detected() {
    let (mut chain, token) = deploy(Quirk::SkipAllowanceDecrement);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(100)).unwrap();
    assert!(oracle.assert_approve(acc[0], acc[1], u(50), false).is_pass());

    // The call itself looks fine; only the state check sees the difference.
    assert!(oracle
        .assert_transfer_from(acc[0], acc[1], acc[2], u(50))
        .is_pass());
    assert_eq!(
        violation_kind(&oracle.assert_allowances_match_expected()),
        Some(ViolationKind::AllowanceMismatch)
    );

    let verdict = oracle.assert_transfer_from(acc[0], acc[1], acc[2], u(50));
    assert_eq!(
        violation_kind(&verdict),
        Some(ViolationKind::NeitherRevertedNorFalse)
    );
}

#[test]
fn test_spender_pays_itself_then_allowance_is_exhausted() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(100)).unwrap();
    assert!(oracle.assert_approve(acc[0], acc[1], u(50), false).is_pass());

    assert!(oracle
        .assert_transfer_from(acc[0], acc[1], acc[1], u(50))
        .is_pass());
    assert_eq!(oracle.balance_of(acc[0]).unwrap(), u(50));
    assert_eq!(oracle.balance_of(acc[1]).unwrap(), u(50));
    assert_eq!(oracle.allowance(acc[0], acc[1]).unwrap(), U256::ZERO);

    assert!(oracle
        .assert_transfer_from_reverts(acc[0], acc[1], acc[1], u(50))
        .is_pass());
    assert!(oracle.assert_allowances_match_expected().is_pass());
    assert!(oracle.assert_balances_match_expected().is_pass());
}

#[test]
fn test_fee_on_transfer_breaks_balances() {
    let (mut chain, token) = deploy(Quirk::FeeOnTransfer);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(100)).unwrap();

    assert!(oracle.assert_transfer(acc[0], acc[1], u(10)).is_pass());
    assert_eq!(
        violation_kind(&oracle.assert_balances_match_expected()),
        Some(ViolationKind::BalanceMismatch)
    );
    assert_eq!(
        violation_kind(&oracle.assert_total_supply_matches_expected()),
        Some(ViolationKind::TotalSupplyMismatch)
    );
}

#[test]
fn test_rejected_transfer_to_null_passes() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(100)).unwrap();

    assert!(oracle.assert_transfer(acc[0], Address::ZERO, u(10)).is_pass());
    assert!(oracle.assert_invariants().is_pass());
}

#[test]
fn test_accepted_transfer_to_null_warns() {
    let (mut chain, token) = deploy(Quirk::AcceptNullReceiver);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(100)).unwrap();

    let verdict = oracle.assert_transfer(acc[0], Address::ZERO, u(10));
    assert_eq!(warning_kinds(&verdict), vec![WarningKind::NullAccountAccepted]);
    assert_eq!(oracle.model().balance_of(Address::ZERO), u(10));

    let custody = oracle.check_null_account_custody();
    assert_eq!(
        warning_kinds(&custody),
        vec![WarningKind::NullAccountHoldsBalance]
    );
    assert!(oracle.assert_balances_match_expected().is_pass());
}

#[test]
fn test_null_spender_rejection_passes() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);

    assert!(oracle.assert_approve(acc[0], Address::ZERO, u(5), false).is_pass());
    assert!(oracle
        .assert_approve_zero_spender_valid(acc[0], u(5), true)
        .is_pass());
}

#[test]
fn test_null_spender_acceptance() {
    let (mut chain, token) = deploy(Quirk::AcceptNullSpender);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);

    let strict = oracle.assert_approve_zero_spender_valid(acc[0], u(5), true);
    assert_eq!(
        violation_kind(&strict),
        Some(ViolationKind::NullSpenderApproved)
    );

    let lenient = oracle.assert_approve(acc[0], Address::ZERO, u(5), false);
    assert_eq!(warning_kinds(&lenient), vec![WarningKind::NullAccountAccepted]);
    assert_eq!(oracle.model().allowance(acc[0], Address::ZERO), u(5));
}

fn observed_state<S: Substrate>(
    oracle: &DifferentialOracle<S>,
    accounts: &[Address],
) -> (Vec<U256>, Vec<U256>) {
    let holders = accounts.iter().copied().chain([Address::ZERO]);
    let balances = holders.map(|a| oracle.balance_of(a).unwrap()).collect();
    let allowances = accounts
        .iter()
        .flat_map(|&owner| accounts.iter().map(move |&spender| (owner, spender)))
        .map(|(owner, spender)| oracle.allowance(owner, spender).unwrap())
        .collect();
    (balances, allowances)
}

#[test]
fn test_probes_leave_no_trace() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(30)).unwrap();
    oracle.mint(acc[3], u(12)).unwrap();
    assert!(oracle.assert_approve(acc[3], acc[1], u(4), false).is_pass());
    let before = observed_state(&oracle, &acc);

    assert!(oracle.try_transfer_and_restore(acc[0], acc[1], u(30)).unwrap());
    assert_eq!(observed_state(&oracle, &acc), before);
    assert!(!oracle.try_transfer_and_restore(acc[0], acc[1], u(31)).unwrap());
    assert_eq!(observed_state(&oracle, &acc), before);
    assert!(oracle.try_approve_and_restore(acc[0], acc[1], u(7)).unwrap());
    assert_eq!(observed_state(&oracle, &acc), before);
    assert!(!oracle
        .try_transfer_from_and_restore(acc[0], acc[1], acc[2], u(1))
        .unwrap());
    assert_eq!(observed_state(&oracle, &acc), before);
    assert!(oracle
        .try_transfer_from_and_restore(acc[3], acc[1], acc[2], u(4))
        .unwrap());
    assert_eq!(observed_state(&oracle, &acc), before);

    assert_eq!(oracle.substrate().snapshot_depth(), 0);
}

#[test]
fn test_approve_that_returns_false_still_counts() {
    let (mut chain, token) = deploy(Quirk::SilentApprove);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);

    assert!(oracle
        .try_approve_and_restore(acc[0], Address::ZERO, u(100))
        .unwrap());

    let strict = oracle.assert_approve(acc[0], Address::ZERO, u(100), true);
    assert_eq!(
        violation_kind(&strict),
        Some(ViolationKind::NullSpenderApproved)
    );

    let lenient = oracle.assert_approve(acc[0], Address::ZERO, u(100), false);
    assert_eq!(
        warning_kinds(&lenient),
        vec![
            WarningKind::FalsyReturnOnSuccess,
            WarningKind::NullAccountAccepted
        ]
    );
    assert_eq!(oracle.model().allowance(acc[0], Address::ZERO), u(100));
    assert!(oracle.assert_allowances_match_expected().is_pass());
}

#[test]
fn test_unchanged_allowance_is_judged_by_event() {
    // Rejected with `false`: allowance stays zero and nothing is emitted.
    let (mut chain, token) = deploy(Quirk::ReturnFalse);
    let acc = accounts(&chain);
    let mut rejecting = oracle(&mut chain, token);
    assert!(!rejecting
        .try_approve_and_restore(acc[0], Address::ZERO, U256::ZERO)
        .unwrap());
    assert!(rejecting
        .assert_approve(acc[0], Address::ZERO, U256::ZERO, true)
        .is_pass());

    let (mut chain, token) = deploy(Quirk::AcceptNullSpender);
    let mut accepting = oracle(&mut chain, token);
    assert!(accepting
        .try_approve_and_restore(acc[0], Address::ZERO, U256::ZERO)
        .unwrap());
}

#[test]
fn test_sticky_max_allowance() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(100)).unwrap();
    assert!(oracle.assert_approve(acc[0], acc[1], U256::MAX, false).is_pass());

    assert!(oracle
        .assert_transfer_from(acc[0], acc[1], acc[2], u(10))
        .is_pass());
    assert!(oracle.assert_allowances_match_expected().is_pass());
    assert_eq!(oracle.model().allowance(acc[0], acc[1]), U256::MAX);
}

#[test]
fn test_spent_max_allowance_disagrees_with_sticky_model() {
    let (mut chain, token) = deploy(Quirk::FiniteMaxAllowance);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(100)).unwrap();
    assert!(oracle.assert_approve(acc[0], acc[1], U256::MAX, false).is_pass());
    assert!(oracle
        .assert_transfer_from(acc[0], acc[1], acc[2], u(10))
        .is_pass());

    assert_eq!(
        violation_kind(&oracle.assert_allowances_match_expected()),
        Some(ViolationKind::AllowanceMismatch)
    );
}

#[test]
fn test_self_transfer_keeps_balance() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);
    oracle.mint(acc[0], u(100)).unwrap();

    assert!(oracle.assert_transfer(acc[0], acc[0], u(100)).is_pass());
    assert!(oracle.assert_balances_match_expected().is_pass());
    assert_eq!(oracle.model().balance_of(acc[0]), u(100));
}

#[test]
fn test_zero_transfer_from_without_allowance() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);

    assert!(oracle
        .assert_transfer_from(acc[0], acc[1], acc[2], U256::ZERO)
        .is_pass());
    assert!(oracle
        .assert_transfer_from_reverts(acc[0], acc[1], acc[2], u(1))
        .is_pass());
}

#[test]
fn test_forced_expectation_against_reality() {
    let (mut chain, token) = deploy(Quirk::None);
    let acc = accounts(&chain);
    let mut oracle = oracle(&mut chain, token);

    // Nothing minted, so the forced success must fail on the model side.
    assert!(oracle.assert_transfer_succeeds(acc[0], acc[1], u(1)).is_fail());

    oracle.mint(acc[0], u(1)).unwrap();
    let verdict = oracle.assert_transfer_reverts(acc[0], acc[1], u(1));
    assert_eq!(
        violation_kind(&verdict),
        Some(ViolationKind::NeitherRevertedNorFalse)
    );
}

#[test]
fn test_observe_reads_existing_state() {
    let mut chain = MemoryChain::new(4);
    let token = chain.deploy(Box::new(super::support::QuirkToken::new(Quirk::None)));
    let acc = chain.accounts();
    chain.mint(token, acc[0], u(500)).unwrap();
    chain
        .call(
            token,
            acc[0],
            &TokenCall::Approve {
                spender: acc[3],
                amount: u(42),
            },
        )
        .unwrap();

    let oracle = DifferentialOracle::observe(&mut chain, token, true).unwrap();
    assert_eq!(oracle.model().total_supply(), u(500));
    assert_eq!(oracle.model().balance_of(acc[0]), u(500));
    assert_eq!(oracle.model().allowance(acc[0], acc[3]), u(42));
    assert!(oracle.assert_invariants().is_pass());
}
