use std::sync::Arc;
use std::thread;

use vpledger::common::*;
use vpledger::delegation::{DelegationMode, VpBook};
use vpledger::error::LedgerError;
use vpledger::store::LedgerImage;
use vpledger::{LedgerConfig, VotePowerLedger};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> LedgerConfig {
    LedgerConfig {
        check_conservation: true,
        ..Default::default()
    }
}

fn w(v: u64) -> Wei {
    v.into()
}

fn addr(i: u64) -> Addr {
    (i + 1).into()
}

fn snapshot(
    l: &VotePowerLedger, accounts: &[Addr], from: Ordinal, to: Ordinal,
) -> Vec<Result<Wei, LedgerError>> {
    let mut out = Vec::new();
    for o in from..=to {
        out.push(l.total_supply_at(o));
        for a in accounts.iter() {
            out.push(l.balance_of_at(a, o));
            out.push(l.vote_power_of_at(a, o));
            out.push(l.undelegated_vote_power_of_at(a, o));
            out.push(l.revoked_from_at(a, o));
            out.push(l.gov_vote_power_of_at(a, o));
            for b in accounts.iter() {
                out.push(l.vote_power_from_to_at(a, b, o));
            }
        }
    }
    out
}

/// Four accounts with percentage, amount and governance delegations, a revocation and a few
/// balance changes over ordinals 1..=30.
fn busy_ledger(config: LedgerConfig) -> (VotePowerLedger, Vec<Addr>) {
    let accounts: Vec<Addr> = (0..4).map(addr).collect();
    let (a, b, c, d) = (accounts[0], accounts[1], accounts[2], accounts[3]);
    let mut l = VotePowerLedger::new(config);
    l.on_balance_changed(&a, &w(1000), 1).unwrap();
    l.on_balance_changed(&b, &w(500), 1).unwrap();
    l.on_balance_changed(&c, &w(300), 2).unwrap();
    l.delegate_by_percent(&a, &b, 2500).unwrap();
    l.delegate_by_percent(&a, &c, 2500).unwrap();
    l.delegate_by_amount(&b, &d, &w(200)).unwrap();
    l.delegate_governance(&c, &a).unwrap();
    l.on_balance_changed(&a, &w(1200), 8).unwrap();
    l.on_balance_changed(&d, &w(50), 12).unwrap();
    l.delegate_by_percent(&d, &a, 10000).unwrap();
    l.advance_to(20).unwrap();
    l.revoke_delegation_at(&a, &c, 9).unwrap();
    l.on_balance_changed(&b, &w(400), 25).unwrap();
    l.advance_to(30).unwrap();
    (l, accounts)
}

#[test]
fn test_pruning_is_monotone() {
    init();
    let (mut l, accounts) = busy_ledger(LedgerConfig {
        cache_historical: false,
        ..config()
    });
    let before = snapshot(&l, &accounts, 10, 30);
    l.set_cleanup_boundary(10).unwrap();
    assert_eq!(snapshot(&l, &accounts, 10, 30), before);
    for o in 0..10 {
        for a in accounts.iter() {
            assert_eq!(l.balance_of_at(a, o), Err(LedgerError::PrunedHistory));
            assert_eq!(l.vote_power_of_at(a, o), Err(LedgerError::PrunedHistory));
            assert_eq!(
                l.gov_vote_power_of_at(a, o),
                Err(LedgerError::PrunedHistory)
            );
        }
    }
    // the revocation at 9 still covers the edge after pruning
    assert_eq!(
        l.vote_power_from_to_at(&accounts[0], &accounts[2], 10).unwrap(),
        w(0)
    );
    assert_eq!(
        l.revoke_delegation_at(&accounts[0], &accounts[2], 10),
        Err(LedgerError::AlreadyRevoked)
    );
    assert_eq!(
        l.revoke_delegation_at(&accounts[0], &accounts[1], 9),
        Err(LedgerError::PrunedHistory)
    );
    assert_eq!(l.set_cleanup_boundary(9), Err(LedgerError::BoundaryInvalid));
    l.set_cleanup_boundary(10).unwrap();
    l.set_cleanup_boundary(26).unwrap();
    // one supply entry plus 5 + 4 entries per account for every ordinal
    let tail = before.len() - 5 * (1 + accounts.len() * (5 + accounts.len()));
    assert_eq!(snapshot(&l, &accounts, 26, 30)[..], before[tail..]);
    assert_eq!(l.set_cleanup_boundary(30), Err(LedgerError::BoundaryInvalid));
}

#[test]
fn test_replace_book_clears_delegations() {
    init();
    let mut l = VotePowerLedger::new(config());
    let (a, b) = (addr(0), addr(1));
    l.on_balance_changed(&a, &w(1000), 5).unwrap();
    l.delegate_by_percent(&a, &b, 5000).unwrap();
    l.advance_to(10).unwrap();
    l.replace_delegation_book(Box::new(VpBook::named("v2", l.config())))
        .unwrap();
    assert_eq!(l.vote_power_of(&b).unwrap(), w(0));
    assert_eq!(l.vote_power_of_at(&b, 9).unwrap(), w(500));
    assert_eq!(l.delegation_mode_of(&a), DelegationMode::None);
    assert_eq!(l.balance_of(&a), w(1000));
    l.delegate_by_percent(&a, &b, 2000).unwrap();
    assert_eq!(l.vote_power_of(&b).unwrap(), w(200));
    // history before the swap still resolves through the old book
    l.advance_to(11).unwrap();
    assert_eq!(l.revoke_delegation_at(&a, &b, 7).unwrap(), w(500));
    assert_eq!(l.vote_power_of_at(&b, 8).unwrap(), w(0));
    assert_eq!(l.vote_power_of_at(&b, 10).unwrap(), w(200));
    l.verify_conservation_at(8).unwrap();
    l.verify_conservation_at(10).unwrap();
}

#[test]
fn test_read_window_lags_write_book() {
    init();
    let mut l = VotePowerLedger::new(config());
    let (a, b, c, d) = (addr(0), addr(1), addr(2), addr(3));
    l.on_balance_changed(&a, &w(1000), 5).unwrap();
    l.on_balance_changed(&d, &w(100), 5).unwrap();
    l.delegate_by_percent(&a, &b, 5000).unwrap();
    l.delegate_by_amount(&d, &b, &w(100)).unwrap();
    l.advance_to(10).unwrap();
    l.replace_write_book(Box::new(VpBook::named("v2", l.config())), 5)
        .unwrap();
    assert_eq!(l.lifecycle().pending_switch(), Some(15));
    l.delegate_by_percent(&a, &c, 3000).unwrap();
    // writes land in the new book, reads still come from the old one
    assert_eq!(l.delegates_of(&a), vec![(c, U256::from(3000u64))]);
    assert_eq!(l.vote_power_of(&b).unwrap(), w(600));
    assert_eq!(l.vote_power_of(&c).unwrap(), w(0));
    // the old book's explicit amounts stay covered until it retires
    assert_eq!(
        l.on_balance_changed(&d, &w(50), 12),
        Err(LedgerError::AmountBoundExceeded)
    );
    l.advance_to(14).unwrap();
    assert_eq!(l.lifecycle().read_book().name(), "vp");
    l.on_balance_changed(&d, &w(50), 15).unwrap();
    assert_eq!(l.lifecycle().read_book().name(), "v2");
    assert_eq!(l.vote_power_of(&b).unwrap(), w(0));
    assert_eq!(l.vote_power_of(&c).unwrap(), w(300));
    assert_eq!(l.vote_power_of_at(&b, 14).unwrap(), w(600));
    assert_eq!(l.vote_power_of_at(&c, 14).unwrap(), w(0));
    l.verify_conservation_at(14).unwrap();
    l.verify_conservation_at(15).unwrap();
}

#[test]
fn test_switch_read_book_early() {
    init();
    let mut l = VotePowerLedger::new(config());
    let (a, b) = (addr(0), addr(1));
    l.on_balance_changed(&a, &w(1000), 5).unwrap();
    l.delegate_by_percent(&a, &b, 5000).unwrap();
    l.replace_write_book(Box::new(VpBook::named("v2", l.config())), 100)
        .unwrap();
    l.advance_to(7).unwrap();
    assert!(l.switch_read_book().unwrap());
    assert!(!l.switch_read_book().unwrap());
    assert_eq!(l.vote_power_of(&b).unwrap(), w(0));
    assert_eq!(l.lifecycle().pending_switch(), None);
    assert_eq!(l.vote_power_of_at(&b, 6).unwrap(), w(500));
}

#[test]
fn test_shared_ledger_reads_during_swap() {
    init();
    let accounts: Vec<Addr> = (0..6).map(addr).collect();
    let mut l = VotePowerLedger::new(LedgerConfig::default());
    for (i, a) in accounts.iter().enumerate() {
        l.on_balance_changed(a, &w(100 * (i as u64 + 1)), 1).unwrap();
    }
    let shared = l.shared();
    let mut readers = Vec::new();
    for _ in 0..4 {
        let shared = Arc::clone(&shared);
        let accounts = accounts.clone();
        readers.push(thread::spawn(move || {
            for _ in 0..200 {
                let l = shared.read();
                let mut total = Wei::zero().clone();
                for a in accounts.iter() {
                    total = total.checked_add(&l.vote_power_of(a).unwrap()).unwrap();
                }
                assert_eq!(total, l.total_supply());
            }
        }));
    }
    for round in 0..50u64 {
        let mut l = shared.write();
        let ordinal = l.ordinal() + 1;
        l.advance_to(ordinal).unwrap();
        let from = &accounts[(round % 6) as usize];
        let to = &accounts[((round + 1) % 6) as usize];
        if round % 5 == 4 {
            let book = Box::new(VpBook::named("next", l.config()));
            l.replace_delegation_book(book).unwrap();
        } else {
            match l.delegate_by_percent(from, to, 4000) {
                Ok(()) | Err(LedgerError::TooManyDelegates) => (),
                Err(e) => panic!("unexpected {}", e),
            }
        }
    }
    for r in readers {
        r.join().unwrap();
    }
    let l = shared.read();
    l.verify_conservation_at(l.ordinal()).unwrap();
}

#[test]
fn test_image_restores_same_state() {
    init();
    let (mut l, accounts) = busy_ledger(config());
    l.replace_write_book(Box::new(VpBook::named("v2", l.config())), 4)
        .unwrap();
    l.delegate_by_percent(&accounts[1], &accounts[3], 100).unwrap();
    l.set_cleanup_boundary(5).unwrap();
    let image = l.image();
    let decoded: LedgerImage = rlp::decode(&rlp::encode(&image)).unwrap();
    assert_eq!(decoded, image);
    let json = image.to_json().unwrap();
    assert_eq!(LedgerImage::from_json(&json).unwrap(), image);

    let mut restored = VotePowerLedger::from_image(&decoded, config()).unwrap();
    assert_eq!(restored.state_digest(), l.state_digest());
    assert_eq!(
        snapshot(&restored, &accounts, 5, 30),
        snapshot(&l, &accounts, 5, 30)
    );
    // both continue the same way, including the pending read switch
    for ledger in [&mut l, &mut restored] {
        ledger.on_balance_changed(&accounts[2], &w(1), 40).unwrap();
        assert_eq!(ledger.lifecycle().read_book().name(), "v2");
    }
    assert_eq!(restored.state_digest(), l.state_digest());
    assert_eq!(restored.accounts().count(), accounts.len());
}

#[test]
fn test_image_with_unordered_history_is_rejected() {
    init();
    let (l, _) = busy_ledger(config());
    let image = l.image();

    let mut bad = image.clone();
    bad.total_supply.reverse();
    assert_eq!(
        VotePowerLedger::from_image(&bad, config()).err(),
        Some(LedgerError::InvariantViolation)
    );

    let mut bad = image.clone();
    let h = bad.balances.iter_mut().find(|h| h.entries.len() > 1).unwrap();
    h.entries[1].0 = h.entries[0].0;
    assert_eq!(
        VotePowerLedger::from_image(&bad, config()).err(),
        Some(LedgerError::InvariantViolation)
    );

    let mut bad = image.clone();
    let e = bad.books[0]
        .edges
        .iter_mut()
        .find(|e| !e.entries.is_empty())
        .unwrap();
    let first = e.entries[0];
    e.entries.push(first);
    assert_eq!(
        VotePowerLedger::from_image(&bad, config()).err(),
        Some(LedgerError::InvariantViolation)
    );

    assert!(VotePowerLedger::from_image(&image, config()).is_ok());
}
