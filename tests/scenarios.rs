use vpledger::common::*;
use vpledger::delegation::DelegationMode;
use vpledger::error::{ErrorKind, LedgerError};
use vpledger::{LedgerConfig, VotePowerLedger};
use vpledger_tools::Token;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ledger() -> VotePowerLedger {
    init();
    VotePowerLedger::new(LedgerConfig {
        check_conservation: true,
        ..Default::default()
    })
}

fn w(v: u64) -> Wei {
    v.into()
}

fn addrs() -> (Addr, Addr, Addr) {
    (1u64.into(), 2u64.into(), 3u64.into())
}

#[test]
fn test_half_delegated_by_percent() {
    let mut l = ledger();
    let (a, b, _) = addrs();
    l.on_balance_changed(&a, &w(1000), 1).unwrap();
    l.on_balance_changed(&b, &w(70), 1).unwrap();
    l.delegate_by_percent(&a, &b, 5000).unwrap();
    assert_eq!(l.vote_power_of(&a).unwrap(), w(500));
    assert_eq!(l.vote_power_of(&b).unwrap(), w(570));
    assert_eq!(l.undelegated_vote_power_of(&a).unwrap(), w(500));
    assert_eq!(l.vote_power_from_to(&a, &b).unwrap(), w(500));
    assert_eq!(l.delegation_mode_of(&a), DelegationMode::Percentage);
    // percentage delegation follows the balance
    l.on_balance_changed(&a, &w(2000), 2).unwrap();
    assert_eq!(l.vote_power_of(&b).unwrap(), w(1070));
    assert_eq!(l.vote_power_of_at(&b, 1).unwrap(), w(570));
}

#[test]
fn test_percent_then_amount_is_wrong_mode() {
    let mut l = ledger();
    let (a, b, c) = addrs();
    l.on_balance_changed(&a, &w(1000), 1).unwrap();
    l.delegate_by_percent(&a, &b, 3000).unwrap();
    assert_eq!(
        l.delegate_by_amount(&a, &c, &w(100)),
        Err(LedgerError::WrongMode)
    );
    assert_eq!(l.vote_power_of(&c).unwrap(), w(0));
    l.undelegate_all(&a).unwrap();
    assert_eq!(l.delegation_mode_of(&a), DelegationMode::None);
    l.delegate_by_amount(&a, &c, &w(100)).unwrap();
    assert_eq!(l.delegation_mode_of(&a), DelegationMode::Amount);
    assert_eq!(l.vote_power_of(&c).unwrap(), w(100));
}

#[test]
fn test_revocation_at_checkpoint() {
    let mut l = ledger();
    let (a, b, c) = addrs();
    l.on_balance_changed(&a, &w(1000), 10).unwrap();
    l.on_balance_changed(&c, &w(10), 10).unwrap();
    l.delegate_by_percent(&a, &b, 10000).unwrap();
    l.advance_to(15).unwrap();
    l.advance_to(20).unwrap();
    assert_eq!(l.vote_power_of_at(&b, 15).unwrap(), w(1000));
    assert_eq!(l.revoke_delegation_at(&a, &b, 15).unwrap(), w(1000));
    l.advance_to(25).unwrap();
    assert_eq!(l.vote_power_from_to_at(&a, &b, 25).unwrap(), w(0));
    assert_eq!(l.vote_power_of_at(&a, 25).unwrap(), w(1000));
    assert_eq!(l.vote_power_from_to_at(&a, &b, 12).unwrap(), w(1000));
    // the cached pre-revocation value was dropped
    assert_eq!(l.vote_power_of_at(&b, 15).unwrap(), w(0));
    assert_eq!(l.vote_power_of_at(&b, 14).unwrap(), w(1000));
    // undelegated vote power does not get the revoked amount back
    assert_eq!(l.undelegated_vote_power_of_at(&a, 25).unwrap(), w(0));
    assert_eq!(l.revoked_from_at(&a, 25).unwrap(), w(1000));
    assert_eq!(l.revoked_from_at(&a, 14).unwrap(), w(0));
    // revocation leaves the balance and other accounts alone
    assert_eq!(l.balance_of_at(&a, 25).unwrap(), w(1000));
    assert_eq!(l.vote_power_of_at(&c, 25).unwrap(), w(10));
    assert_eq!(
        l.revoke_delegation_at(&a, &b, 18),
        Err(LedgerError::AlreadyRevoked)
    );
    l.verify_conservation_at(25).unwrap();
    l.verify_conservation_at(12).unwrap();
}

#[test]
fn test_cleanup_boundary_keeps_later_values() {
    let mut l = ledger();
    let (a, _, _) = addrs();
    l.on_balance_changed(&a, &w(1), 10).unwrap();
    l.on_balance_changed(&a, &w(3), 30).unwrap();
    l.on_balance_changed(&a, &w(6), 60).unwrap();
    l.advance_to(70).unwrap();
    let before = l.balance_of_at(&a, 55).unwrap();
    l.set_cleanup_boundary(50).unwrap();
    assert_eq!(l.balance_of_at(&a, 20), Err(LedgerError::PrunedHistory));
    assert_eq!(l.vote_power_of_at(&a, 49), Err(LedgerError::PrunedHistory));
    assert_eq!(l.balance_of_at(&a, 55).unwrap(), before);
    assert_eq!(before, w(3));
    assert_eq!(l.balance_of_at(&a, 60).unwrap(), w(6));
    assert_eq!(l.total_supply_at(50).unwrap(), w(3));
}

#[test]
fn test_mutual_percent_delegation_conserves() {
    let mut l = ledger();
    let (a, b, _) = addrs();
    l.on_balance_changed(&a, &w(100), 1).unwrap();
    l.on_balance_changed(&b, &w(200), 1).unwrap();
    l.delegate_by_percent(&a, &b, 1000).unwrap();
    l.delegate_by_percent(&b, &a, 1000).unwrap();
    let vp_a = l.vote_power_of(&a).unwrap();
    let vp_b = l.vote_power_of(&b).unwrap();
    assert_eq!(vp_a, w(110));
    assert_eq!(vp_b, w(190));
    assert_eq!(vp_a.checked_add(&vp_b).unwrap(), w(300));
    assert_eq!(l.total_vote_power(), w(300));
}

#[test]
fn test_validation_errors() {
    let mut l = ledger();
    let (a, b, c) = addrs();
    let d: Addr = 4u64.into();
    l.on_balance_changed(&a, &w(100), 1).unwrap();
    l.on_balance_changed(&b, &w(100), 1).unwrap();
    assert_eq!(l.delegate_by_percent(&a, &a, 1), Err(LedgerError::SelfDelegation));
    assert_eq!(
        l.delegate_by_amount(&a, Addr::zero(), &w(1)),
        Err(LedgerError::ZeroTargetDelegation)
    );
    assert_eq!(
        l.delegate_by_percent(&a, &b, 10001),
        Err(LedgerError::PercentBoundExceeded)
    );
    l.delegate_by_percent(&a, &b, 1).unwrap();
    l.delegate_by_percent(&a, &c, 1).unwrap();
    assert_eq!(l.delegate_by_percent(&a, &d, 1), Err(LedgerError::TooManyDelegates));
    assert_eq!(
        l.delegate_by_amount(&b, &c, &w(101)),
        Err(LedgerError::AmountBoundExceeded)
    );
    l.delegate_by_amount(&b, &c, &w(60)).unwrap();
    assert_eq!(
        l.on_balance_changed(&b, &w(59), 2),
        Err(LedgerError::AmountBoundExceeded)
    );
    assert_eq!(l.on_balance_changed(&b, &w(59), 0), Err(LedgerError::OrdinalRegression));
    assert_eq!(l.set_cleanup_boundary(1), Err(LedgerError::BoundaryInvalid));
    assert_eq!(l.vote_power_of_at(&a, 2), Err(LedgerError::UnknownCheckpoint));
    for e in [
        LedgerError::SelfDelegation,
        LedgerError::TooManyDelegates,
        LedgerError::BoundaryInvalid,
        LedgerError::OrdinalRegression,
    ] {
        assert_eq!(e.kind(), ErrorKind::Validation);
    }
    // nothing was written by the rejected calls
    assert_eq!(l.balance_of(&b), w(100));
    assert_eq!(l.delegates_of(&a).len(), 2);
    assert_eq!(l.vote_power_of(&c).unwrap(), w(60));
}

#[test]
fn test_idempotency_markers() {
    let mut l = ledger();
    let (a, b, c) = addrs();
    l.on_balance_changed(&a, &w(100), 1).unwrap();
    assert_eq!(l.undelegate_all(&a), Err(LedgerError::NoSuchDelegate));
    assert_eq!(
        l.undelegate_all_explicit(&a, &[b]),
        Err(LedgerError::NoSuchDelegate)
    );
    assert_eq!(l.delegate_by_percent(&a, &b, 0), Err(LedgerError::NoSuchDelegate));
    assert_eq!(l.undelegate_governance(&a), Err(LedgerError::NoSuchDelegate));
    l.delegate_by_amount(&a, &b, &w(10)).unwrap();
    l.delegate_by_amount(&a, &c, &w(20)).unwrap();
    assert_eq!(l.undelegate_all(&a), Err(LedgerError::WrongMode));
    assert_eq!(l.undelegate_all_explicit(&a, &[b]).unwrap(), w(20));
    assert_eq!(
        l.undelegate_all_explicit(&a, &[b]),
        Err(LedgerError::NoSuchDelegate)
    );
    l.advance_to(3).unwrap();
    assert_eq!(l.revoke_delegation_at(&a, &b, 2), Err(LedgerError::AlreadyRevoked));
    assert_eq!(LedgerError::AlreadyRevoked.kind(), ErrorKind::Idempotent);
}

#[test]
fn test_governance_delegation() {
    let mut l = ledger();
    let (a, b, c) = addrs();
    let mut token = Token::new(&mut l);
    token.mint(&a, &w(100), 1).unwrap();
    token.mint(&b, &w(50), 1).unwrap();
    token.mint(&c, &w(25), 1).unwrap();
    l.delegate_governance(&a, &b).unwrap();
    l.delegate_governance(&c, &b).unwrap();
    assert_eq!(l.gov_vote_power_of(&b).unwrap(), w(175));
    assert_eq!(l.gov_vote_power_of(&a).unwrap(), w(0));
    // governance and vote-power delegation are independent
    assert_eq!(l.vote_power_of(&a).unwrap(), w(100));
    Token::new(&mut l).transfer(&a, &c, &w(40), 2).unwrap();
    assert_eq!(l.gov_vote_power_of(&b).unwrap(), w(175));
    l.delegate_governance(&a, &c).unwrap();
    assert_eq!(l.governance_delegate_of(&a), Some(c));
    assert_eq!(l.gov_vote_power_of(&b).unwrap(), w(115));
    assert_eq!(l.gov_vote_power_of(&c).unwrap(), w(60));
    l.undelegate_governance(&a).unwrap();
    assert_eq!(l.gov_vote_power_of(&a).unwrap(), w(60));
    assert_eq!(l.gov_vote_power_of_at(&b, 1).unwrap(), w(175));
    assert_eq!(l.delegate_governance(&a, &a), Err(LedgerError::SelfDelegation));
}

#[test]
fn test_token_transfer_respects_amount_delegation() {
    let mut l = ledger();
    let (a, b, c) = addrs();
    let mut token = Token::new(&mut l);
    token.mint(&a, &w(100), 1).unwrap();
    drop(token);
    l.delegate_by_amount(&a, &b, &w(80)).unwrap();
    let mut token = Token::new(&mut l);
    assert_eq!(
        token.transfer(&a, &c, &w(30), 2),
        Err(LedgerError::AmountBoundExceeded)
    );
    token.transfer(&a, &c, &w(20), 2).unwrap();
    assert_eq!(token.burn(&c, &w(21), 3), Err(LedgerError::AmountBoundExceeded));
    assert_eq!(l.balance_of(&a), w(80));
    assert_eq!(l.balance_of(&c), w(20));
    assert_eq!(l.vote_power_of(&b).unwrap(), w(80));
    assert_eq!(l.total_supply(), w(100));
}

#[test]
fn test_state_error_is_reported() {
    init();
    let mut l = VotePowerLedger::new(LedgerConfig {
        abort_on_state_error: false,
        ..Default::default()
    });
    let (a, b, _) = addrs();
    l.on_balance_changed(&a, &U256::MAX.into(), 1).unwrap();
    l.delegate_by_percent(&a, &b, 10000).unwrap();
    let err = l.vote_power_of(&b).unwrap_err();
    assert_eq!(err, LedgerError::ArithmeticOverflow);
    assert!(err.is_state_error());
}

#[test]
#[should_panic(expected = "ledger state error")]
fn test_state_error_aborts_when_configured() {
    init();
    let mut l = VotePowerLedger::new(LedgerConfig {
        abort_on_state_error: true,
        ..Default::default()
    });
    let (a, b, _) = addrs();
    l.on_balance_changed(&a, &U256::MAX.into(), 1).unwrap();
    l.delegate_by_percent(&a, &b, 10000).unwrap();
    let _ = l.vote_power_of(&b);
}

#[test]
fn test_percent_delegation_of_large_balance() {
    let mut l = ledger();
    let (a, b, _) = addrs();
    let half: Wei = (U256::MAX / 2).into();
    l.on_balance_changed(&a, &half, 1).unwrap();
    l.delegate_by_percent(&a, &b, 5000).unwrap();
    let quarter: Wei = (U256::MAX / 4).into();
    assert_eq!(l.vote_power_of(&b).unwrap(), quarter);
    assert_eq!(
        l.vote_power_of(&a).unwrap(),
        half.checked_sub(&quarter).unwrap()
    );
}
