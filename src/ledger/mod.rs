//! The vote-power ledger.
//!
//! [VotePowerLedger] is a single-writer state machine driven by an external ordinal (a block
//! number or any other monotonically increasing counter). Every mutation happens at the current
//! ordinal; [VotePowerLedger::on_balance_changed] and [VotePowerLedger::advance_to] move it
//! forward. Reads can target the current ordinal or any retained past ordinal. Reads at a past
//! ordinal never change afterwards, except through an explicit revocation at or before that
//! ordinal, and are memoized in a [QueryCache].
//!
//! Vote power of an account `a` at `o` is its balance, minus its outgoing edges, plus its
//! incoming edges, every edge realized at `o` and revoked edges counting as zero on both ends.
//! Undelegated vote power ignores revocations, so
//! `votePower = undelegated + Σ incoming + revokedFrom` always holds.

mod cache;
mod lifecycle;

pub use cache::{Query, QueryCache};
pub use lifecycle::LifecycleManager;

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::RwLock;

use crate::checkpoint::{CheckpointStore, Checkpoints};
use crate::common::{Addr, Hash, Ordinal, Wei, U256};
use crate::config::LedgerConfig;
use crate::delegation::{
    DelegationBook, DelegationMode, Edge, GovernanceBook, VpBook,
};
use crate::error::LedgerError;
use crate::store::{AccountHistory, LedgerImage};

/// A ledger shared between one writer and any number of readers. A book replacement happens
/// under the write lock, so readers see either the old or the new book.
pub type SharedLedger = Arc<RwLock<VotePowerLedger>>;

pub struct VotePowerLedger {
    config: LedgerConfig,
    ordinal: Ordinal,
    balances: CheckpointStore<Wei>,
    total_supply: Checkpoints<Wei>,
    governance: GovernanceBook,
    lifecycle: LifecycleManager,
    cache: QueryCache,
    known: BTreeSet<Addr>,
}

fn restore_store<T: Clone + Default>(
    histories: &[AccountHistory<T>], floor: Ordinal,
) -> Result<CheckpointStore<T>, LedgerError> {
    let accounts = histories
        .iter()
        .map(|h| {
            Ok((h.account, Checkpoints::from_entries(h.entries.clone(), floor)?))
        })
        .collect::<Result<_, LedgerError>>()?;
    Ok(CheckpointStore::restore(accounts, floor))
}

fn sum(acc: Wei, v: &Wei) -> Result<Wei, LedgerError> {
    acc.checked_add(v).ok_or(LedgerError::ArithmeticOverflow)
}

fn sub(acc: Wei, v: &Wei) -> Result<Wei, LedgerError> {
    acc.checked_sub(v).ok_or(LedgerError::ArithmeticUnderflow)
}

impl VotePowerLedger {
    pub fn new(config: LedgerConfig) -> Self {
        let genesis = Box::new(VpBook::new(&config));
        Self::with_book(config, genesis)
    }

    pub fn with_book(
        config: LedgerConfig, book: Box<dyn DelegationBook>,
    ) -> Self {
        Self {
            cache: QueryCache::with_capacity(config.cache_capacity),
            config,
            ordinal: 0,
            balances: CheckpointStore::new(),
            total_supply: Checkpoints::new(),
            governance: GovernanceBook::new(),
            lifecycle: LifecycleManager::new(book),
            known: BTreeSet::new(),
        }
    }

    /// Rebuild a ledger from a persisted image. Restored books are [VpBook]s.
    pub fn from_image(
        image: &LedgerImage, config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        let floor = image.cleanup_boundary;
        let balances = restore_store(&image.balances, floor)?;
        let targets = restore_store(&image.governance, floor)?;
        let lifecycle = LifecycleManager::from_image(image, &config)?;

        let mut known: BTreeSet<Addr> = balances.accounts().copied().collect();
        for h in image.governance.iter() {
            known.insert(h.account);
            known.extend(h.entries.iter().map(|(_, to)| *to).filter(|to| !to.is_zero()));
        }
        for b in image.books.iter() {
            for e in b.edges.iter() {
                known.insert(e.from);
                known.insert(e.to);
            }
        }
        Ok(Self {
            cache: QueryCache::with_capacity(config.cache_capacity),
            config,
            ordinal: image.ordinal,
            balances,
            total_supply: Checkpoints::from_entries(
                image.total_supply.clone(),
                floor,
            )?,
            governance: GovernanceBook::restore(targets),
            lifecycle,
            known,
        })
    }

    pub fn shared(self) -> SharedLedger {
        Arc::new(RwLock::new(self))
    }

    #[inline(always)]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The current ordinal.
    #[inline(always)]
    pub fn ordinal(&self) -> Ordinal {
        self.ordinal
    }

    #[inline(always)]
    pub fn cleanup_boundary(&self) -> Ordinal {
        self.lifecycle.cleanup_boundary()
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Every account that ever held a balance or took part in a delegation.
    pub fn accounts(&self) -> impl Iterator<Item = &Addr> {
        self.known.iter()
    }

    /// Log state errors; abort on them when configured to.
    fn escalate<T>(
        &self, r: Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        if let Err(e) = &r {
            if e.is_state_error() {
                error!("ledger state error at {}: {}", self.ordinal, e);
                if self.config.abort_on_state_error {
                    panic!("ledger state error: {}", e)
                }
            }
        }
        r
    }

    /// Result of a mutation.
    fn finish<T>(&self, r: Result<T, LedgerError>) -> Result<T, LedgerError> {
        let v = self.escalate(r)?;
        if self.config.check_conservation {
            self.verify_conservation_at(self.ordinal)?;
        }
        Ok(v)
    }

    fn check_readable(&self, ordinal: Ordinal) -> Result<(), LedgerError> {
        if ordinal > self.ordinal {
            return Err(LedgerError::UnknownCheckpoint)
        }
        if ordinal < self.lifecycle.cleanup_boundary() {
            return Err(LedgerError::PrunedHistory)
        }
        Ok(())
    }

    fn query<F>(
        &self, query: Query, ordinal: Ordinal, force_cache: bool, f: F,
    ) -> Result<Wei, LedgerError>
    where
        F: FnOnce() -> Result<Wei, LedgerError>,
    {
        self.check_readable(ordinal)?;
        let r = if ordinal < self.ordinal &&
            (force_cache || self.config.cache_historical)
        {
            self.cache.get_or_compute(query, ordinal, f)
        } else {
            f()
        };
        self.escalate(r)
    }

    // computations; the ordinal has been checked

    fn realize(
        &self, book: &dyn DelegationBook, edge: &Edge, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let balance = self.balances.read(&edge.from, ordinal)?;
        book.realize(edge, &balance)
    }

    /// `(all outgoing, revoked outgoing)`, realized at `ordinal`.
    fn delegated_from(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<(Wei, Wei), LedgerError> {
        let book = self.lifecycle.read_book_at(ordinal)?;
        let balance = self.balances.read(account, ordinal)?;
        let mut all = Wei::zero().clone();
        let mut revoked = Wei::zero().clone();
        for edge in book.outgoing_at(account, ordinal)?.iter() {
            let v = book.realize(edge, &balance)?;
            all = sum(all, &v)?;
            if edge.revoked {
                revoked = sum(revoked, &v)?;
            }
        }
        Ok((all, revoked))
    }

    fn delegated_to(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let book = self.lifecycle.read_book_at(ordinal)?;
        let mut total = Wei::zero().clone();
        for edge in book.incoming_at(account, ordinal)?.iter() {
            if !edge.revoked {
                total = sum(total, &self.realize(book, edge, ordinal)?)?;
            }
        }
        Ok(total)
    }

    fn compute_vote_power(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let balance = self.balances.read(account, ordinal)?;
        let (out, revoked) = self.delegated_from(account, ordinal)?;
        let active = sub(out, &revoked)?;
        sum(sub(balance, &active)?, &self.delegated_to(account, ordinal)?)
    }

    fn compute_undelegated(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let balance = self.balances.read(account, ordinal)?;
        sub(balance, &self.delegated_from(account, ordinal)?.0)
    }

    fn compute_from_to(
        &self, from: &Addr, to: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let book = self.lifecycle.read_book_at(ordinal)?;
        match book.edge_at(from, to, ordinal)? {
            Some(edge) if !edge.revoked => self.realize(book, &edge, ordinal),
            _ => Ok(Wei::zero().clone()),
        }
    }

    // balances

    pub fn balance_of(&self, account: &Addr) -> Wei {
        self.balances.read_latest(account)
    }

    pub fn balance_of_at(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        self.query(Query::Balance(*account), ordinal, false, || {
            self.balances.read(account, ordinal)
        })
    }

    pub fn total_supply(&self) -> Wei {
        self.total_supply.latest()
    }

    pub fn total_supply_at(&self, ordinal: Ordinal) -> Result<Wei, LedgerError> {
        self.query(Query::TotalSupply, ordinal, false, || {
            self.total_supply.read(ordinal)
        })
    }

    // vote power

    pub fn vote_power_of(&self, account: &Addr) -> Result<Wei, LedgerError> {
        self.vote_power_of_at(account, self.ordinal)
    }

    pub fn vote_power_of_at(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        self.query(Query::VotePower(*account), ordinal, false, || {
            self.compute_vote_power(account, ordinal)
        })
    }

    /// Like [Self::vote_power_of_at], memoized regardless of `cache_historical`. Only past
    /// ordinals are memoized.
    pub fn vote_power_of_at_cached(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        self.query(Query::VotePower(*account), ordinal, true, || {
            self.compute_vote_power(account, ordinal)
        })
    }

    pub fn undelegated_vote_power_of(
        &self, account: &Addr,
    ) -> Result<Wei, LedgerError> {
        self.undelegated_vote_power_of_at(account, self.ordinal)
    }

    pub fn undelegated_vote_power_of_at(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        self.query(Query::Undelegated(*account), ordinal, false, || {
            self.compute_undelegated(account, ordinal)
        })
    }

    pub fn vote_power_from_to(
        &self, from: &Addr, to: &Addr,
    ) -> Result<Wei, LedgerError> {
        self.vote_power_from_to_at(from, to, self.ordinal)
    }

    pub fn vote_power_from_to_at(
        &self, from: &Addr, to: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        self.query(Query::FromTo(*from, *to), ordinal, false, || {
            self.compute_from_to(from, to, ordinal)
        })
    }

    /// Sum of the outgoing edges of `account` that are revoked at `ordinal`, realized at
    /// `ordinal`.
    pub fn revoked_from_at(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        self.query(Query::RevokedFrom(*account), ordinal, false, || {
            Ok(self.delegated_from(account, ordinal)?.1)
        })
    }

    /// Vote power is conserved, so the total equals the total supply.
    pub fn total_vote_power(&self) -> Wei {
        self.total_supply()
    }

    pub fn total_vote_power_at(
        &self, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        self.total_supply_at(ordinal)
    }

    pub fn total_vote_power_at_cached(
        &self, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        self.query(Query::TotalSupply, ordinal, true, || {
            self.total_supply.read(ordinal)
        })
    }

    pub fn gov_vote_power_of(&self, account: &Addr) -> Result<Wei, LedgerError> {
        self.gov_vote_power_of_at(account, self.ordinal)
    }

    pub fn gov_vote_power_of_at(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        self.query(Query::GovVotePower(*account), ordinal, false, || {
            self.governance.vote_power_at(account, &self.balances, ordinal)
        })
    }

    pub fn governance_delegate_of(&self, account: &Addr) -> Option<Addr> {
        self.governance.delegate_of(account)
    }

    // introspection (write book)

    pub fn delegation_mode_of(&self, account: &Addr) -> DelegationMode {
        self.lifecycle.write_book().mode_of(account)
    }

    /// Active targets of `account` with their raw weights (bips or amounts).
    pub fn delegates_of(&self, account: &Addr) -> Vec<(Addr, U256)> {
        self.lifecycle.write_book().delegates_of(account)
    }

    pub fn delegators_of(&self, account: &Addr) -> Vec<Addr> {
        self.lifecycle.write_book().delegators_of(account)
    }

    // mutations

    /// Move the clock forward without any other change.
    pub fn advance_to(&mut self, ordinal: Ordinal) -> Result<(), LedgerError> {
        let r = self.advance(ordinal);
        self.escalate(r)
    }

    fn advance(&mut self, ordinal: Ordinal) -> Result<(), LedgerError> {
        if ordinal < self.ordinal {
            return Err(LedgerError::OrdinalRegression)
        }
        if ordinal > self.ordinal {
            self.lifecycle.on_advance(ordinal)?;
            self.ordinal = ordinal;
        }
        Ok(())
    }

    /// Record the balance of `account` after a mint, burn or transfer at `ordinal`.
    pub fn on_balance_changed(
        &mut self, account: &Addr, balance: &Wei, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        let r = self.apply_balance(account, balance, ordinal);
        self.finish(r)
    }

    fn apply_balance(
        &mut self, account: &Addr, balance: &Wei, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        if ordinal < self.ordinal {
            return Err(LedgerError::OrdinalRegression)
        }
        for book in self.lifecycle.bound_books(ordinal) {
            if book.amount_delegated_by(account)? > *balance {
                warn!(
                    "balance of {} cannot drop to {} below its delegated amount",
                    account, balance
                );
                return Err(LedgerError::AmountBoundExceeded)
            }
        }
        let old = self.balances.read_latest(account);
        let supply = sum(sub(self.total_supply.latest(), &old)?, balance)?;
        self.advance(ordinal)?;
        self.balances.write(account, ordinal, *balance)?;
        self.total_supply.write(ordinal, supply)?;
        self.known.insert(*account);
        debug!("balance of {} is {} @{}", account, balance, ordinal);
        Ok(())
    }

    pub fn delegate_by_percent(
        &mut self, from: &Addr, to: &Addr, bips: u16,
    ) -> Result<(), LedgerError> {
        let ordinal = self.ordinal;
        let r = self
            .lifecycle
            .write_book_mut()
            .delegate_by_percent(from, to, bips, ordinal);
        if r.is_ok() {
            self.known.insert(*from);
            self.known.insert(*to);
        }
        self.finish(r)
    }

    pub fn delegate_by_amount(
        &mut self, from: &Addr, to: &Addr, amount: &Wei,
    ) -> Result<(), LedgerError> {
        let ordinal = self.ordinal;
        let balance = self.balances.read_latest(from);
        let r = self
            .lifecycle
            .write_book_mut()
            .delegate_by_amount(from, to, amount, &balance, ordinal);
        if r.is_ok() {
            self.known.insert(*from);
            self.known.insert(*to);
        }
        self.finish(r)
    }

    /// Remove every percentage delegation of `from`.
    pub fn undelegate_all(&mut self, from: &Addr) -> Result<(), LedgerError> {
        let ordinal = self.ordinal;
        let r = self.lifecycle.write_book_mut().undelegate_all(from, ordinal);
        self.finish(r)
    }

    /// Remove the listed explicit delegations of `from`; returns the amount that stays
    /// delegated.
    pub fn undelegate_all_explicit(
        &mut self, from: &Addr, targets: &[Addr],
    ) -> Result<Wei, LedgerError> {
        let ordinal = self.ordinal;
        let r = self
            .lifecycle
            .write_book_mut()
            .undelegate_all_explicit(from, targets, ordinal);
        self.finish(r)
    }

    /// Nullify the `from -> to` delegation as it stood at the past ordinal `at`, for queries at
    /// `at` and later until the edge is next written. Returns the revoked amount.
    pub fn revoke_delegation_at(
        &mut self, from: &Addr, to: &Addr, at: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let r = self.revoke(from, to, at);
        self.finish(r)
    }

    fn revoke(
        &mut self, from: &Addr, to: &Addr, at: Ordinal,
    ) -> Result<Wei, LedgerError> {
        if at >= self.ordinal {
            return Err(LedgerError::UnknownCheckpoint)
        }
        if at < self.lifecycle.cleanup_boundary() {
            return Err(LedgerError::PrunedHistory)
        }
        let book = self.lifecycle.read_book_at_mut(at)?;
        let amount = book.revoke(from, to, at, &self.balances)?;
        self.cache.invalidate_from(at);
        Ok(amount)
    }

    pub fn delegate_governance(
        &mut self, from: &Addr, to: &Addr,
    ) -> Result<(), LedgerError> {
        let r = self.governance.delegate(from, to, self.ordinal);
        if r.is_ok() {
            self.known.insert(*from);
            self.known.insert(*to);
        }
        self.finish(r)
    }

    pub fn undelegate_governance(
        &mut self, from: &Addr,
    ) -> Result<(), LedgerError> {
        let r = self.governance.undelegate(from, self.ordinal);
        self.finish(r)
    }

    /// Permanently drop history before `boundary`. The boundary never decreases and must be in
    /// the past.
    pub fn set_cleanup_boundary(
        &mut self, boundary: Ordinal,
    ) -> Result<(), LedgerError> {
        if let Err(e) =
            self.lifecycle.check_cleanup_boundary(boundary, self.ordinal)
        {
            warn!(
                "rejected cleanup boundary {} (current {}, clock {})",
                boundary,
                self.lifecycle.cleanup_boundary(),
                self.ordinal
            );
            return Err(e)
        }
        self.balances.prune_all(boundary);
        self.total_supply.prune(boundary);
        self.governance.prune(boundary);
        self.lifecycle.set_cleanup_boundary(boundary);
        self.cache.invalidate_before(boundary);
        info!("cleanup boundary moved to {}", boundary);
        Ok(())
    }

    /// Swap the delegation book for both reads and writes. Delegations start from zero in the
    /// new book; history before the swap keeps resolving through the old one.
    pub fn replace_delegation_book(
        &mut self, book: Box<dyn DelegationBook>,
    ) -> Result<(), LedgerError> {
        self.replace_write_book(book, 0)
    }

    /// Install `book` for writes now and for reads once the clock has moved `window` ordinals
    /// further (or on [Self::switch_read_book]).
    pub fn replace_write_book(
        &mut self, book: Box<dyn DelegationBook>, window: u64,
    ) -> Result<(), LedgerError> {
        let ordinal = self.ordinal;
        let r = self.lifecycle.replace_write_book(book, ordinal, window);
        self.finish(r)
    }

    /// End a pending read window now. Returns whether the read book changed.
    pub fn switch_read_book(&mut self) -> Result<bool, LedgerError> {
        let ordinal = self.ordinal;
        let r = self.lifecycle.switch_read(ordinal);
        self.finish(r)
    }

    // checks and persistence

    /// Check that vote power and governance vote power are conserved at `ordinal`.
    pub fn verify_conservation_at(
        &self, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        self.check_readable(ordinal)?;
        let r = self.conservation_at(ordinal);
        self.escalate(r)
    }

    fn conservation_at(&self, ordinal: Ordinal) -> Result<(), LedgerError> {
        let mut balances = Wei::zero().clone();
        let mut vote_power = Wei::zero().clone();
        let mut gov_vote_power = Wei::zero().clone();
        for a in self.known.iter() {
            balances = sum(balances, &self.balances.read(a, ordinal)?)?;
            vote_power = sum(vote_power, &self.compute_vote_power(a, ordinal)?)?;
            gov_vote_power = sum(
                gov_vote_power,
                &self.governance.vote_power_at(a, &self.balances, ordinal)?,
            )?;
        }
        let supply = self.total_supply.read(ordinal)?;
        if balances != supply || vote_power != supply || gov_vote_power != supply
        {
            error!(
                "conservation broken at {}: supply {} balances {} vote power {} governance {}",
                ordinal, supply, balances, vote_power, gov_vote_power
            );
            return Err(LedgerError::InvariantViolation)
        }
        Ok(())
    }

    pub fn image(&self) -> LedgerImage {
        LedgerImage {
            ordinal: self.ordinal,
            cleanup_boundary: self.lifecycle.cleanup_boundary(),
            balances: self
                .balances
                .iter()
                .map(|(a, h)| AccountHistory {
                    account: *a,
                    entries: h.entries().to_vec(),
                })
                .collect(),
            total_supply: self.total_supply.entries().to_vec(),
            governance: self
                .governance
                .histories()
                .map(|(a, h)| AccountHistory {
                    account: *a,
                    entries: h.entries().to_vec(),
                })
                .collect(),
            books: self.lifecycle.books().map(|b| b.image()).collect(),
            write_book: self.lifecycle.write_index() as u64,
            read_books: self
                .lifecycle
                .read_history()
                .iter()
                .map(|(o, idx)| (*o, *idx as u64))
                .collect(),
            pending_switch: self.lifecycle.pending_switch(),
        }
    }

    /// Keccak-256 of the RLP-encoded [LedgerImage].
    pub fn state_digest(&self) -> Hash {
        self.image().digest()
    }
}

#[cfg(test)]
fn ledger() -> VotePowerLedger {
    VotePowerLedger::new(LedgerConfig {
        abort_on_state_error: false,
        check_conservation: true,
        ..Default::default()
    })
}

#[test]
fn test_clock_rules() {
    let mut l = ledger();
    let a: Addr = 1u64.into();
    l.on_balance_changed(&a, &100u64.into(), 5).unwrap();
    assert_eq!(
        l.on_balance_changed(&a, &50u64.into(), 4),
        Err(LedgerError::OrdinalRegression)
    );
    assert_eq!(l.advance_to(3), Err(LedgerError::OrdinalRegression));
    assert_eq!(l.balance_of_at(&a, 6), Err(LedgerError::UnknownCheckpoint));
    assert_eq!(l.revoke_delegation_at(&a, &a, 5), Err(LedgerError::UnknownCheckpoint));
    l.advance_to(8).unwrap();
    assert_eq!(l.balance_of_at(&a, 6).unwrap(), 100u64.into());
    assert_eq!(l.total_supply_at(4).unwrap(), Wei::zero().clone());
    assert_eq!(l.total_supply(), 100u64.into());
}

#[test]
fn test_live_queries_are_not_cached() {
    let mut l = ledger();
    let (a, b): (Addr, Addr) = (1u64.into(), 2u64.into());
    l.on_balance_changed(&a, &100u64.into(), 1).unwrap();
    l.delegate_by_percent(&a, &b, 5000).unwrap();
    assert_eq!(l.vote_power_of(&b).unwrap(), 50u64.into());
    assert!(l.cache().is_empty());
    l.delegate_by_percent(&a, &b, 2000).unwrap();
    assert_eq!(l.vote_power_of(&b).unwrap(), 20u64.into());
    l.advance_to(2).unwrap();
    assert_eq!(l.vote_power_of_at(&b, 1).unwrap(), 20u64.into());
    assert_eq!(l.cache().len(), 1);
}

#[test]
fn test_amount_delegation_blocks_balance_drop() {
    let mut l = ledger();
    let (a, b): (Addr, Addr) = (1u64.into(), 2u64.into());
    l.on_balance_changed(&a, &100u64.into(), 1).unwrap();
    l.delegate_by_amount(&a, &b, &60u64.into()).unwrap();
    assert_eq!(
        l.on_balance_changed(&a, &59u64.into(), 2),
        Err(LedgerError::AmountBoundExceeded)
    );
    assert_eq!(l.balance_of(&a), 100u64.into());
    l.on_balance_changed(&a, &60u64.into(), 2).unwrap();
    assert_eq!(l.vote_power_of(&a).unwrap(), Wei::zero().clone());
    assert_eq!(l.vote_power_of(&b).unwrap(), 60u64.into());
}
