use std::collections::btree_map::BTreeMap;
use std::collections::BTreeSet;

use log::debug;

use crate::checkpoint::{BalanceSource, CheckpointStore, Checkpoints};
use crate::common::{Addr, Ordinal, Wei};
use crate::error::LedgerError;

/// Governance delegation: every account hands all of its governance vote power to at most one
/// other account. The zero address as a target means "not delegated". Unaffected by
/// delegation book replacement.
#[derive(Clone, Debug, Default)]
pub struct GovernanceBook {
    targets: CheckpointStore<Addr>,
    /// target -> every account that ever delegated to it
    delegators: BTreeMap<Addr, BTreeSet<Addr>>,
}

impl GovernanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(targets: CheckpointStore<Addr>) -> Self {
        let mut delegators: BTreeMap<Addr, BTreeSet<Addr>> = BTreeMap::new();
        for (from, h) in targets.iter() {
            for (_, to) in h.entries() {
                if !to.is_zero() {
                    delegators.entry(*to).or_default().insert(*from);
                }
            }
        }
        Self {
            targets,
            delegators,
        }
    }

    /// The current target of `from`.
    pub fn delegate_of(&self, from: &Addr) -> Option<Addr> {
        Some(self.targets.read_latest(from)).filter(|to| !to.is_zero())
    }

    pub fn delegate_of_at(
        &self, from: &Addr, ordinal: Ordinal,
    ) -> Result<Option<Addr>, LedgerError> {
        Ok(Some(self.targets.read(from, ordinal)?).filter(|to| !to.is_zero()))
    }

    /// Point `from` at `to`, replacing any previous target.
    pub fn delegate(
        &mut self, from: &Addr, to: &Addr, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        if from == to {
            return Err(LedgerError::SelfDelegation)
        }
        if to.is_zero() {
            return Err(LedgerError::ZeroTargetDelegation)
        }
        self.targets.write(from, ordinal, *to)?;
        self.delegators.entry(*to).or_default().insert(*from);
        debug!("governance: {} -> {} @{}", from, to, ordinal);
        Ok(())
    }

    pub fn undelegate(
        &mut self, from: &Addr, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        if self.delegate_of(from).is_none() {
            return Err(LedgerError::NoSuchDelegate)
        }
        self.targets.write(from, ordinal, *Addr::zero())?;
        debug!("governance: {} undelegated @{}", from, ordinal);
        Ok(())
    }

    /// Own balance unless delegated away, plus the balances of everyone delegating to `account`,
    /// all read at `ordinal`.
    pub fn vote_power_at(
        &self, account: &Addr, balances: &dyn BalanceSource, ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let mut vp = match self.delegate_of_at(account, ordinal)? {
            None => balances.balance_at(account, ordinal)?,
            Some(_) => Wei::zero().clone(),
        };
        if let Some(froms) = self.delegators.get(account) {
            for from in froms.iter() {
                if self.targets.read(from, ordinal)? == *account {
                    vp = vp
                        .checked_add(&balances.balance_at(from, ordinal)?)
                        .ok_or(LedgerError::ArithmeticOverflow)?;
                }
            }
        }
        Ok(vp)
    }

    pub fn histories(&self) -> impl Iterator<Item = (&Addr, &Checkpoints<Addr>)> {
        self.targets.iter()
    }

    pub fn prune(&mut self, before: Ordinal) {
        self.targets.prune_all(before);
        let targets = &self.targets;
        for (to, froms) in self.delegators.iter_mut() {
            froms.retain(|from| {
                targets
                    .history(from)
                    .map_or(false, |h| h.entries().iter().any(|(_, t)| t == to))
            })
        }
        self.delegators.retain(|_, froms| !froms.is_empty());
    }
}

#[test]
fn test_governance_vote_power() {
    let mut balances = CheckpointStore::<Wei>::new();
    let mut g = GovernanceBook::new();
    let (a, b, c): (Addr, Addr, Addr) = (1u64.into(), 2u64.into(), 3u64.into());
    balances.write(&a, 1, 100u64.into()).unwrap();
    balances.write(&b, 1, 200u64.into()).unwrap();
    balances.write(&c, 1, 300u64.into()).unwrap();
    assert_eq!(g.delegate(&a, &a, 2), Err(LedgerError::SelfDelegation));
    assert_eq!(g.delegate(&a, Addr::zero(), 2), Err(LedgerError::ZeroTargetDelegation));
    assert_eq!(g.undelegate(&a, 2), Err(LedgerError::NoSuchDelegate));
    g.delegate(&a, &b, 2).unwrap();
    g.delegate(&c, &b, 2).unwrap();
    assert_eq!(g.vote_power_at(&a, &balances, 2).unwrap(), Wei::zero().clone());
    assert_eq!(g.vote_power_at(&b, &balances, 2).unwrap(), 600u64.into());
    // switching targets moves everything at once
    g.delegate(&a, &c, 3).unwrap();
    assert_eq!(g.vote_power_at(&b, &balances, 3).unwrap(), 500u64.into());
    assert_eq!(g.vote_power_at(&c, &balances, 3).unwrap(), 100u64.into());
    assert_eq!(g.vote_power_at(&b, &balances, 2).unwrap(), 600u64.into());
    g.undelegate(&a, 4).unwrap();
    assert_eq!(g.delegate_of(&a), None);
    assert_eq!(g.delegate_of_at(&a, 3).unwrap(), Some(c));
    assert_eq!(g.vote_power_at(&a, &balances, 4).unwrap(), 100u64.into());
}

#[test]
fn test_governance_prune() {
    let balances = CheckpointStore::<Wei>::new();
    let mut g = GovernanceBook::new();
    let (a, b, c): (Addr, Addr, Addr) = (1u64.into(), 2u64.into(), 3u64.into());
    g.delegate(&a, &b, 2).unwrap();
    g.delegate(&a, &c, 5).unwrap();
    g.prune(6);
    assert!(g.delegators.get(&b).is_none());
    assert_eq!(g.delegate_of_at(&a, 6).unwrap(), Some(c));
    assert_eq!(g.vote_power_at(&b, &balances, 5), Err(LedgerError::PrunedHistory));
}
