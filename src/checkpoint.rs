//! Point-in-time histories.
//!
//! A [Checkpoints] value is a flat, ordinal-sorted array of `(ordinal, value)` entries with at
//! most one entry per ordinal. Reading at ordinal `o` returns the value of the last entry whose
//! ordinal is `<= o` (binary search), or `T::default()` when there is none. Pruning moves a
//! `head` offset forward after turning the last entry before the boundary into a synthetic
//! entry *at* the boundary, so every read at or after the boundary keeps its value while reads
//! before it fail with [LedgerError::PrunedHistory]. Dead entries are compacted away lazily.

use std::collections::btree_map::BTreeMap;

use crate::common::{Addr, Ordinal, Wei};
use crate::error::LedgerError;
use crate::params::COMPACT_THRESHOLD;

#[derive(Clone, Debug)]
pub struct Checkpoints<T> {
    entries: Vec<(Ordinal, T)>,
    /// First live entry. Everything before it is pruned.
    head: usize,
    /// Oldest ordinal that may still be read.
    floor: Ordinal,
}

impl<T: Clone + Default> Default for Checkpoints<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default> Checkpoints<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            head: 0,
            floor: 0,
        }
    }

    /// Rebuild a pruned history from its live entries. Ordinals must be strictly increasing.
    pub fn from_entries(
        entries: Vec<(Ordinal, T)>, floor: Ordinal,
    ) -> Result<Self, LedgerError> {
        if entries.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(LedgerError::InvariantViolation)
        }
        Ok(Self {
            entries,
            head: 0,
            floor,
        })
    }

    /// Live entries, oldest first.
    #[inline(always)]
    pub fn entries(&self) -> &[(Ordinal, T)] {
        &self.entries[self.head..]
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.head == self.entries.len()
    }

    #[inline(always)]
    pub fn floor(&self) -> Ordinal {
        self.floor
    }

    /// Record `value` as valid from `ordinal` on. A write at the ordinal of the last entry
    /// overwrites it; a write before the last entry is rejected.
    pub fn write(
        &mut self, ordinal: Ordinal, value: T,
    ) -> Result<(), LedgerError> {
        if ordinal < self.floor {
            return Err(LedgerError::PrunedHistory)
        }
        match self.latest_ordinal() {
            Some(o) if o > ordinal => {
                return Err(LedgerError::OrdinalRegression)
            }
            Some(o) if o == ordinal => {
                if let Some(last) = self.entries.last_mut() {
                    last.1 = value
                }
            }
            _ => self.entries.push((ordinal, value)),
        }
        Ok(())
    }

    /// The entry that is valid at `ordinal`, if any. Does not check the floor.
    pub fn entry_at(&self, ordinal: Ordinal) -> Option<&(Ordinal, T)> {
        let live = self.entries();
        match live.partition_point(|(o, _)| *o <= ordinal) {
            0 => None,
            idx => Some(&live[idx - 1]),
        }
    }

    pub fn read(&self, ordinal: Ordinal) -> Result<T, LedgerError> {
        if ordinal < self.floor {
            return Err(LedgerError::PrunedHistory)
        }
        Ok(self
            .entry_at(ordinal)
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    }

    pub fn latest(&self) -> T {
        self.entries()
            .last()
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    pub fn latest_ordinal(&self) -> Option<Ordinal> {
        self.entries().last().map(|(o, _)| *o)
    }

    /// Discard history strictly before `before`. Pruning never moves backwards.
    pub fn prune(&mut self, before: Ordinal) {
        if before <= self.floor {
            return
        }
        let idx = self.entries().partition_point(|(o, _)| *o <= before);
        if idx > 0 {
            let at = self.head + idx - 1;
            // synthetic boundary entry carrying the value valid at `before`
            self.entries[at].0 = before;
            self.head = at;
        }
        self.floor = before;
        if self.head >= COMPACT_THRESHOLD && self.head * 2 >= self.entries.len()
        {
            self.entries.drain(..self.head);
            self.head = 0;
        }
    }
}

/// Read access to balances at any retained ordinal. Delegation books realize percentage
/// delegations through this trait, so they never own balances themselves.
pub trait BalanceSource {
    fn balance_at(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError>;
}

/// Per-account [Checkpoints] of one quantity.
#[derive(Clone, Debug)]
pub struct CheckpointStore<T> {
    accounts: BTreeMap<Addr, Checkpoints<T>>,
    floor: Ordinal,
}

impl<T: Clone + Default> Default for CheckpointStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default> CheckpointStore<T> {
    pub fn new() -> Self {
        Self {
            accounts: BTreeMap::new(),
            floor: 0,
        }
    }

    pub fn write(
        &mut self, account: &Addr, ordinal: Ordinal, value: T,
    ) -> Result<(), LedgerError> {
        if ordinal < self.floor {
            return Err(LedgerError::PrunedHistory)
        }
        let floor = self.floor;
        self.accounts
            .entry(*account)
            .or_insert_with(|| {
                let mut h = Checkpoints::new();
                h.floor = floor;
                h
            })
            .write(ordinal, value)
    }

    pub fn read(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<T, LedgerError> {
        if ordinal < self.floor {
            return Err(LedgerError::PrunedHistory)
        }
        match self.accounts.get(account) {
            Some(h) => h.read(ordinal),
            None => Ok(T::default()),
        }
    }

    pub fn read_latest(&self, account: &Addr) -> T {
        self.accounts
            .get(account)
            .map(|h| h.latest())
            .unwrap_or_default()
    }

    pub fn restore(
        accounts: BTreeMap<Addr, Checkpoints<T>>, floor: Ordinal,
    ) -> Self {
        Self { accounts, floor }
    }

    #[inline(always)]
    pub fn floor(&self) -> Ordinal {
        self.floor
    }

    pub fn history(&self, account: &Addr) -> Option<&Checkpoints<T>> {
        self.accounts.get(account)
    }

    pub fn prune_all(&mut self, before: Ordinal) {
        if before <= self.floor {
            return
        }
        for h in self.accounts.values_mut() {
            h.prune(before)
        }
        self.floor = before;
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Addr> {
        self.accounts.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Addr, &Checkpoints<T>)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl BalanceSource for CheckpointStore<Wei> {
    fn balance_at(
        &self, account: &Addr, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        self.read(account, ordinal)
    }
}

#[test]
fn test_read_last_entry_before() {
    let mut h = Checkpoints::<u64>::new();
    h.write(10, 1).unwrap();
    h.write(30, 3).unwrap();
    h.write(60, 6).unwrap();
    assert_eq!(h.read(0).unwrap(), 0);
    assert_eq!(h.read(9).unwrap(), 0);
    assert_eq!(h.read(10).unwrap(), 1);
    assert_eq!(h.read(29).unwrap(), 1);
    assert_eq!(h.read(55).unwrap(), 3);
    assert_eq!(h.read(u64::MAX).unwrap(), 6);
    assert_eq!(h.latest(), 6);
}

#[test]
fn test_same_ordinal_overwrites() {
    let mut h = Checkpoints::<u64>::new();
    h.write(5, 1).unwrap();
    h.write(5, 2).unwrap();
    assert_eq!(h.entries().len(), 1);
    assert_eq!(h.read(5).unwrap(), 2);
    assert_eq!(h.write(4, 7), Err(LedgerError::OrdinalRegression));
    assert_eq!(h.read(5).unwrap(), 2);
}

#[test]
fn test_prune_keeps_boundary_value() {
    let mut h = Checkpoints::<u64>::new();
    h.write(10, 1).unwrap();
    h.write(30, 3).unwrap();
    h.write(60, 6).unwrap();
    h.prune(50);
    assert_eq!(h.read(20), Err(LedgerError::PrunedHistory));
    assert_eq!(h.read(49), Err(LedgerError::PrunedHistory));
    assert_eq!(h.read(50).unwrap(), 3);
    assert_eq!(h.read(55).unwrap(), 3);
    assert_eq!(h.read(60).unwrap(), 6);
    assert_eq!(h.entries(), &[(50, 3), (60, 6)]);
    // pruning backwards is a no-op
    h.prune(40);
    assert_eq!(h.floor(), 50);
    assert_eq!(h.write(45, 9), Err(LedgerError::PrunedHistory));
}

#[test]
fn test_prune_compacts_long_history() {
    let mut h = Checkpoints::<u64>::new();
    for i in 0..1000u64 {
        h.write(i * 2, i).unwrap();
    }
    for i in 0..1000u64 {
        assert_eq!(h.read(i * 2 + 1).unwrap(), i);
    }
    h.prune(1501);
    assert_eq!(h.head, 0);
    assert_eq!(h.entries().first(), Some(&(1501, 750)));
    assert_eq!(h.read(1501).unwrap(), 750);
    assert_eq!(h.read(1998).unwrap(), 999);
}

#[test]
fn test_restore_rejects_unordered_entries() {
    assert_eq!(
        Checkpoints::<u64>::from_entries(vec![(5, 1), (3, 2)], 0).err(),
        Some(LedgerError::InvariantViolation)
    );
    assert_eq!(
        Checkpoints::<u64>::from_entries(vec![(5, 1), (5, 2)], 0).err(),
        Some(LedgerError::InvariantViolation)
    );
    let h = Checkpoints::<u64>::from_entries(vec![(5, 1), (9, 2)], 5).unwrap();
    assert_eq!(h.read(4), Err(LedgerError::PrunedHistory));
    assert_eq!(h.read(8).unwrap(), 1);
    assert_eq!(h.read(9).unwrap(), 2);
}

#[test]
fn test_store_floor_applies_to_unknown_accounts() {
    let mut s = CheckpointStore::<Wei>::new();
    let a: Addr = 1u64.into();
    let b: Addr = 2u64.into();
    s.write(&a, 3, 100u64.into()).unwrap();
    s.prune_all(5);
    assert_eq!(s.read(&b, 4), Err(LedgerError::PrunedHistory));
    assert_eq!(s.read(&b, 5).unwrap(), Wei::zero().clone());
    assert_eq!(s.balance_at(&a, 7).unwrap(), 100u64.into());
    assert_eq!(s.write(&b, 4, 1u64.into()), Err(LedgerError::PrunedHistory));
    s.write(&b, 6, 1u64.into()).unwrap();
    assert_eq!(s.history(&b).unwrap().floor(), 5);
}
