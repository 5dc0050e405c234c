use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vpledger::common::*;
use vpledger::delegation::VpBook;
use vpledger::error::LedgerError;
use vpledger::{LedgerConfig, VotePowerLedger};
use vpledger_tools::fuzz::{coin_flip, linear_falling_int, random_choice, weighted_choice};
use vpledger_tools::{ModelLedger, Token};

const ACCOUNTS: u64 = 6;
const MAX_DELEGATES_BY_PERCENT: usize = 2;
const MAX_DELEGATES_BY_AMOUNT: usize = 3;

#[derive(Clone, Copy, Debug)]
enum Action {
    Mint,
    Burn,
    Transfer,
    Advance,
    DelegatePercent,
    DelegateAmount,
    UndelegateAll,
    UndelegateExplicit,
    Revoke,
    DelegateGovernance,
    UndelegateGovernance,
    CachedRead,
    Cleanup,
    ReplaceBook,
    ReplaceWriteBook,
    SwitchRead,
}

const ACTIONS: [(Action, u32); 16] = [
    (Action::Mint, 12),
    (Action::Burn, 3),
    (Action::Transfer, 12),
    (Action::Advance, 6),
    (Action::DelegatePercent, 12),
    (Action::DelegateAmount, 10),
    (Action::UndelegateAll, 3),
    (Action::UndelegateExplicit, 3),
    (Action::Revoke, 6),
    (Action::DelegateGovernance, 5),
    (Action::UndelegateGovernance, 2),
    (Action::CachedRead, 6),
    (Action::Cleanup, 1),
    (Action::ReplaceBook, 1),
    (Action::ReplaceWriteBook, 2),
    (Action::SwitchRead, 1),
];

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn w(v: u64) -> Wei {
    v.into()
}

fn add(a: Wei, b: Wei) -> Wei {
    a.checked_add(&b).unwrap()
}

fn accounts() -> Vec<Addr> {
    (1..=ACCOUNTS).map(Addr::from).collect()
}

/// Accounts plus the zero address, for exercising target validation.
fn targets() -> Vec<Addr> {
    let mut out = accounts();
    out.push(*Addr::zero());
    out
}

fn new_ledger() -> VotePowerLedger {
    VotePowerLedger::new(LedgerConfig {
        max_delegates_by_percent: MAX_DELEGATES_BY_PERCENT,
        max_delegates_by_amount: MAX_DELEGATES_BY_AMOUNT,
        abort_on_state_error: true,
        check_conservation: true,
        ..Default::default()
    })
}

/// Mirror of [Token::transfer] on the model.
fn model_transfer(
    m: &mut ModelLedger, from: &Addr, to: &Addr, amount: u64, o: Ordinal,
) -> Result<(), LedgerError> {
    let debited = m
        .balance_of(from)
        .checked_sub(amount)
        .ok_or(LedgerError::AmountBoundExceeded)?;
    if from == to {
        return m.advance_to(o)
    }
    let credited = m.balance_of(to) + amount;
    m.on_balance_changed(from, debited, o)?;
    m.on_balance_changed(to, credited, o)
}

fn next_ordinal(rng: &mut StdRng, current: Ordinal) -> Ordinal {
    if coin_flip(rng, 0.05) {
        current.saturating_sub(1)
    } else {
        current + linear_falling_int(rng, 3)
    }
}

fn step(rng: &mut StdRng, l: &mut VotePowerLedger, m: &mut ModelLedger) {
    let accounts = accounts();
    let targets = targets();
    let a = *random_choice(rng, &accounts);
    let b = *random_choice(rng, &targets);
    let action = *weighted_choice(rng, &ACTIONS);
    match action {
        Action::Mint => {
            let amount = rng.gen_range(1..500);
            let o = next_ordinal(rng, l.ordinal());
            let r = Token::new(l).mint(&a, &w(amount), o);
            let balance = m.balance_of(&a) + amount;
            assert_eq!(r, m.on_balance_changed(&a, balance, o));
        }
        Action::Burn => {
            let amount = linear_falling_int(rng, m.balance_of(&a) + 10);
            let o = next_ordinal(rng, l.ordinal());
            let r = Token::new(l).burn(&a, &w(amount), o);
            let expected = match m.balance_of(&a).checked_sub(amount) {
                Some(balance) => m.on_balance_changed(&a, balance, o),
                None => Err(LedgerError::AmountBoundExceeded),
            };
            assert_eq!(r, expected);
        }
        Action::Transfer => {
            let to = *random_choice(rng, &accounts);
            let amount = linear_falling_int(rng, m.balance_of(&a) + 10);
            let o = next_ordinal(rng, l.ordinal());
            let r = Token::new(l).transfer(&a, &to, &w(amount), o);
            assert_eq!(r, model_transfer(m, &a, &to, amount, o));
        }
        Action::Advance => {
            let o = next_ordinal(rng, l.ordinal()) + 1;
            assert_eq!(l.advance_to(o), m.advance_to(o));
        }
        Action::DelegatePercent => {
            let bips = match rng.gen_range(0..10) {
                0 => 0,
                1 => 10001,
                _ => rng.gen_range(1..6000),
            };
            assert_eq!(
                l.delegate_by_percent(&a, &b, bips),
                m.delegate_by_percent(&a, &b, bips)
            );
        }
        Action::DelegateAmount => {
            let amount = linear_falling_int(rng, m.balance_of(&a) + 20);
            assert_eq!(
                l.delegate_by_amount(&a, &b, &w(amount)),
                m.delegate_by_amount(&a, &b, amount)
            );
        }
        Action::UndelegateAll => {
            assert_eq!(l.undelegate_all(&a), m.undelegate_all(&a));
        }
        Action::UndelegateExplicit => {
            let list: Vec<Addr> = accounts
                .iter()
                .filter(|_| coin_flip(rng, 0.5))
                .copied()
                .collect();
            assert_eq!(
                l.undelegate_all_explicit(&a, &list),
                m.undelegate_all_explicit(&a, &list).map(Wei::from)
            );
        }
        Action::Revoke => {
            let at = rng.gen_range(
                l.cleanup_boundary().saturating_sub(1)..=l.ordinal(),
            );
            assert_eq!(
                l.revoke_delegation_at(&a, &b, at),
                m.revoke_delegation_at(&a, &b, at).map(Wei::from)
            );
        }
        Action::DelegateGovernance => {
            assert_eq!(l.delegate_governance(&a, &b), m.delegate_governance(&a, &b));
        }
        Action::UndelegateGovernance => {
            assert_eq!(l.undelegate_governance(&a), m.undelegate_governance(&a));
        }
        Action::CachedRead => {
            let o = rng.gen_range(l.cleanup_boundary()..=l.ordinal() + 1);
            assert_eq!(l.vote_power_of_at_cached(&a, o), m.vote_power_of_at(&a, o));
            assert_eq!(l.total_vote_power_at_cached(o), m.total_supply_at(o));
        }
        Action::Cleanup => {
            let lo = l.cleanup_boundary().saturating_sub(1);
            let b = lo + linear_falling_int(rng, l.ordinal() - lo + 1);
            assert_eq!(l.set_cleanup_boundary(b), m.set_cleanup_boundary(b));
        }
        Action::ReplaceBook => {
            let book = Box::new(VpBook::named("replacement", l.config()));
            l.replace_delegation_book(book).unwrap();
            m.replace_delegation_book();
        }
        Action::ReplaceWriteBook => {
            let window = linear_falling_int(rng, 6) + 1;
            let book = Box::new(VpBook::named("windowed", l.config()));
            l.replace_write_book(book, window).unwrap();
            m.replace_write_book(window);
        }
        Action::SwitchRead => {
            assert_eq!(l.switch_read_book(), Ok(m.switch_read_book()));
        }
    }
}

fn run(seed: u8, steps: usize) -> (VotePowerLedger, ModelLedger) {
    let mut rng = StdRng::from_seed([seed; 32]);
    let mut l = new_ledger();
    let mut m = ModelLedger::new(MAX_DELEGATES_BY_PERCENT, MAX_DELEGATES_BY_AMOUNT);
    for _ in 0..steps {
        step(&mut rng, &mut l, &mut m);
    }
    (l, m)
}

fn check_history(l: &VotePowerLedger, m: &ModelLedger) {
    let accounts = accounts();
    for o in m.cleanup_boundary()..=m.ordinal() {
        l.verify_conservation_at(o).unwrap();
        assert_eq!(l.total_supply_at(o), m.total_supply_at(o));
        for a in accounts.iter() {
            assert_eq!(l.balance_of_at(a, o), m.balance_of_at(a, o));
            let vp = l.vote_power_of_at(a, o).unwrap();
            assert_eq!(Ok(vp), m.vote_power_of_at(a, o), "vote power of {} @{}", a, o);
            let undelegated = l.undelegated_vote_power_of_at(a, o).unwrap();
            assert_eq!(Ok(undelegated), m.undelegated_vote_power_of_at(a, o));
            let revoked = l.revoked_from_at(a, o).unwrap();
            assert_eq!(Ok(revoked), m.revoked_from_at(a, o));
            assert_eq!(l.gov_vote_power_of_at(a, o), m.gov_vote_power_of_at(a, o));

            let mut incoming = *Wei::zero();
            let mut outgoing = *Wei::zero();
            for x in accounts.iter() {
                let v = l.vote_power_from_to_at(x, a, o).unwrap();
                assert_eq!(Ok(v), m.vote_power_from_to_at(x, a, o));
                incoming = add(incoming, v);
                outgoing = add(outgoing, l.vote_power_from_to_at(a, x, o).unwrap());
            }
            assert_eq!(vp, add(add(undelegated, incoming), revoked));
            let balance = l.balance_of_at(a, o).unwrap();
            assert_eq!(add(vp, outgoing), add(balance, incoming));
        }
    }
    for a in accounts.iter() {
        assert_eq!(l.delegation_mode_of(a), m.delegation_mode_of(a));
    }
}

#[test]
fn test_ledger_matches_model() {
    init();
    for seed in 0..4 {
        let (l, m) = run(seed, 400);
        assert_eq!(l.ordinal(), m.ordinal());
        assert_eq!(l.cleanup_boundary(), m.cleanup_boundary());
        check_history(&l, &m);
    }
}

#[test]
fn test_same_seed_same_digest() {
    init();
    let (a, _) = run(7, 300);
    let (b, _) = run(7, 300);
    assert_eq!(a.state_digest(), b.state_digest());
    let (c, _) = run(8, 300);
    assert_ne!(a.state_digest(), c.state_digest());
}
