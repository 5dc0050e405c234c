use std::collections::btree_map::BTreeMap;
use std::collections::BTreeSet;

use crate::checkpoint::Checkpoints;
use crate::common::{Addr, Ordinal, Wei, U256};
use crate::error::LedgerError;

/// Storage shared by both delegation modes: a weight history per `(from, to)` edge, a reverse
/// index from every target to every account that ever wrote an edge towards it, and the
/// revocations recorded against each edge.
#[derive(Clone, Debug, Default)]
pub struct EdgeTable {
    edges: BTreeMap<Addr, BTreeMap<Addr, Checkpoints<U256>>>,
    sources: BTreeMap<Addr, BTreeSet<Addr>>,
    /// `(from, to) -> revocation ordinal -> amount realized at that ordinal`
    revocations: BTreeMap<(Addr, Addr), BTreeMap<Ordinal, Wei>>,
    floor: Ordinal,
}

/// An edge entry valid at some ordinal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EdgeEntry {
    /// Ordinal the entry was written at (or the pruning boundary for a synthetic entry).
    pub since: Ordinal,
    pub weight: U256,
    pub revoked: bool,
}

impl EdgeTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn floor(&self) -> Ordinal {
        self.floor
    }

    /// Latest weight of `from -> to`.
    pub fn weight(&self, from: &Addr, to: &Addr) -> U256 {
        self.edges
            .get(from)
            .and_then(|m| m.get(to))
            .map(|h| h.latest())
            .unwrap_or_default()
    }

    /// Targets with a non-zero latest weight.
    pub fn active(&self, from: &Addr) -> Vec<(Addr, U256)> {
        match self.edges.get(from) {
            Some(m) => m
                .iter()
                .map(|(to, h)| (*to, h.latest()))
                .filter(|(_, w)| !w.is_zero())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn active_count(&self, from: &Addr) -> usize {
        self.edges.get(from).map_or(0, |m| {
            m.values().filter(|h| !h.latest().is_zero()).count()
        })
    }

    /// Sum of the latest weights of `from`, optionally pretending `to` carries `replacing`.
    pub fn total_with(
        &self, from: &Addr, to: &Addr, replacing: &U256,
    ) -> Result<U256, LedgerError> {
        let mut total = *replacing;
        for (t, w) in self.active(from) {
            if t == *to {
                continue
            }
            total = total
                .checked_add(w)
                .ok_or(LedgerError::ArithmeticOverflow)?;
        }
        Ok(total)
    }

    pub fn total(&self, from: &Addr) -> Result<U256, LedgerError> {
        self.active(from).iter().try_fold(U256::zero(), |acc, (_, w)| {
            acc.checked_add(*w).ok_or(LedgerError::ArithmeticOverflow)
        })
    }

    /// Accounts holding a non-zero latest edge towards `to`.
    pub fn active_sources(&self, to: &Addr) -> Vec<Addr> {
        match self.sources.get(to) {
            Some(s) => s
                .iter()
                .filter(|from| !self.weight(from, to).is_zero())
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn set(
        &mut self, from: &Addr, to: &Addr, weight: U256, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        if ordinal < self.floor {
            return Err(LedgerError::PrunedHistory)
        }
        let floor = self.floor;
        let h = self.edges.entry(*from).or_default().entry(*to).or_insert_with(
            || {
                let mut h = Checkpoints::new();
                h.prune(floor);
                h
            },
        );
        h.write(ordinal, weight)?;
        self.sources.entry(*to).or_default().insert(*from);
        Ok(())
    }

    /// Zero every active edge of `from`. Returns the targets that were cleared.
    pub fn clear(
        &mut self, from: &Addr, ordinal: Ordinal,
    ) -> Result<Vec<Addr>, LedgerError> {
        let targets: Vec<Addr> =
            self.active(from).into_iter().map(|(to, _)| to).collect();
        for to in targets.iter() {
            self.set(from, to, U256::zero(), ordinal)?;
        }
        Ok(targets)
    }

    pub fn clear_all(&mut self, ordinal: Ordinal) -> Result<(), LedgerError> {
        let delegators: Vec<Addr> = self.edges.keys().copied().collect();
        for from in delegators.iter() {
            self.clear(from, ordinal)?;
        }
        Ok(())
    }

    fn revoked_between(
        &self, from: &Addr, to: &Addr, since: Ordinal, ordinal: Ordinal,
    ) -> bool {
        self.revocations
            .get(&(*from, *to))
            .map_or(false, |r| r.range(since..=ordinal).next().is_some())
    }

    /// The entry of `from -> to` valid at `ordinal`, if the edge has one.
    pub fn entry_at(
        &self, from: &Addr, to: &Addr, ordinal: Ordinal,
    ) -> Result<Option<EdgeEntry>, LedgerError> {
        if ordinal < self.floor {
            return Err(LedgerError::PrunedHistory)
        }
        let h = match self.edges.get(from).and_then(|m| m.get(to)) {
            Some(h) => h,
            None => return Ok(None),
        };
        Ok(h.entry_at(ordinal).map(|(since, weight)| EdgeEntry {
            since: *since,
            weight: *weight,
            revoked: self.revoked_between(from, to, *since, ordinal),
        }))
    }

    /// Non-zero edges leaving `from` at `ordinal`.
    pub fn outgoing_at(
        &self, from: &Addr, ordinal: Ordinal,
    ) -> Result<Vec<(Addr, EdgeEntry)>, LedgerError> {
        if ordinal < self.floor {
            return Err(LedgerError::PrunedHistory)
        }
        let mut out = Vec::new();
        if let Some(m) = self.edges.get(from) {
            for to in m.keys() {
                if let Some(e) = self.entry_at(from, to, ordinal)? {
                    if !e.weight.is_zero() {
                        out.push((*to, e))
                    }
                }
            }
        }
        Ok(out)
    }

    /// Non-zero edges arriving at `to` at `ordinal`.
    pub fn incoming_at(
        &self, to: &Addr, ordinal: Ordinal,
    ) -> Result<Vec<(Addr, EdgeEntry)>, LedgerError> {
        if ordinal < self.floor {
            return Err(LedgerError::PrunedHistory)
        }
        let mut out = Vec::new();
        if let Some(s) = self.sources.get(to) {
            for from in s.iter() {
                if let Some(e) = self.entry_at(from, to, ordinal)? {
                    if !e.weight.is_zero() {
                        out.push((*from, e))
                    }
                }
            }
        }
        Ok(out)
    }

    /// Record a revocation of the entry valid at `ordinal`. The caller has checked that the entry
    /// is non-zero and not yet revoked.
    pub fn revoke(
        &mut self, from: &Addr, to: &Addr, ordinal: Ordinal, amount: Wei,
    ) -> Result<(), LedgerError> {
        if ordinal < self.floor {
            return Err(LedgerError::PrunedHistory)
        }
        self.revocations
            .entry((*from, *to))
            .or_default()
            .insert(ordinal, amount);
        Ok(())
    }

    pub fn revocations(
        &self,
    ) -> impl Iterator<Item = (&(Addr, Addr), &BTreeMap<Ordinal, Wei>)> {
        self.revocations.iter()
    }

    pub fn histories(
        &self,
    ) -> impl Iterator<Item = (&Addr, &Addr, &Checkpoints<U256>)> {
        self.edges
            .iter()
            .flat_map(|(from, m)| m.iter().map(move |(to, h)| (from, to, h)))
    }

    /// Discard everything strictly before `before`. A revocation that still covers the entry
    /// valid at `before` is moved onto the boundary; older ones are dropped.
    pub fn prune(&mut self, before: Ordinal) {
        if before <= self.floor {
            return
        }
        for ((from, to), revs) in self.revocations.iter_mut() {
            let since = self
                .edges
                .get(from)
                .and_then(|m| m.get(to))
                .and_then(|h| h.entry_at(before))
                .map(|(o, _)| *o);
            let kept = revs.split_off(&before);
            let carried = match since {
                Some(since) => revs.range(since..).next().map(|(_, a)| *a),
                None => None,
            };
            *revs = kept;
            if let Some(amount) = carried {
                revs.entry(before).or_insert(amount);
            }
        }
        self.revocations.retain(|_, r| !r.is_empty());

        for m in self.edges.values_mut() {
            for h in m.values_mut() {
                h.prune(before)
            }
            // a history that reads zero everywhere from the boundary on carries no information
            m.retain(|_, h| h.entries().iter().any(|(_, w)| !w.is_zero()));
        }
        self.edges.retain(|_, m| !m.is_empty());
        let edges = &self.edges;
        for (to, s) in self.sources.iter_mut() {
            s.retain(|from| edges.get(from).map_or(false, |m| m.contains_key(to)))
        }
        self.sources.retain(|_, s| !s.is_empty());
        self.floor = before;
    }

    /// Rebuild a table from persisted parts.
    pub fn restore(
        edges: Vec<(Addr, Addr, Checkpoints<U256>)>,
        revocations: Vec<(Addr, Addr, Ordinal, Wei)>, floor: Ordinal,
    ) -> Self {
        let mut t = Self {
            floor,
            ..Default::default()
        };
        for (from, to, h) in edges.into_iter() {
            t.sources.entry(to).or_default().insert(from);
            t.edges.entry(from).or_default().insert(to, h);
        }
        for (from, to, ordinal, amount) in revocations.into_iter() {
            t.revocations
                .entry((from, to))
                .or_default()
                .insert(ordinal, amount);
        }
        t
    }
}

#[test]
fn test_entry_and_revocation_window() {
    let mut t = EdgeTable::new();
    let a: Addr = 1u64.into();
    let b: Addr = 2u64.into();
    t.set(&a, &b, 5000u64.into(), 10).unwrap();
    t.revoke(&a, &b, 15, 500u64.into()).unwrap();
    let e = t.entry_at(&a, &b, 12).unwrap().unwrap();
    assert!(!e.revoked);
    assert!(t.entry_at(&a, &b, 15).unwrap().unwrap().revoked);
    assert!(t.entry_at(&a, &b, 99).unwrap().unwrap().revoked);
    // a new write ends the revoked entry
    t.set(&a, &b, 4000u64.into(), 30).unwrap();
    let e = t.entry_at(&a, &b, 30).unwrap().unwrap();
    assert_eq!((e.since, e.revoked), (30, false));
    assert_eq!(t.incoming_at(&b, 20).unwrap().len(), 1);
    assert_eq!(t.active_sources(&b), vec![a]);
}

#[test]
fn test_prune_carries_revocation_to_boundary() {
    let mut t = EdgeTable::new();
    let a: Addr = 1u64.into();
    let b: Addr = 2u64.into();
    let c: Addr = 3u64.into();
    t.set(&a, &b, 100u64.into(), 10).unwrap();
    t.revoke(&a, &b, 15, 100u64.into()).unwrap();
    t.set(&a, &c, 50u64.into(), 10).unwrap();
    t.revoke(&a, &c, 12, 50u64.into()).unwrap();
    t.set(&a, &c, 60u64.into(), 20).unwrap();
    t.prune(40);
    assert_eq!(t.entry_at(&a, &b, 39), Err(LedgerError::PrunedHistory));
    assert!(t.entry_at(&a, &b, 40).unwrap().unwrap().revoked);
    assert!(!t.entry_at(&a, &c, 40).unwrap().unwrap().revoked);
    let kept: Vec<_> = t.revocations().map(|(k, _)| *k).collect();
    assert_eq!(kept, vec![(a, b)]);
}

#[test]
fn test_prune_drops_dead_edges() {
    let mut t = EdgeTable::new();
    let a: Addr = 1u64.into();
    let b: Addr = 2u64.into();
    t.set(&a, &b, 100u64.into(), 10).unwrap();
    t.clear(&a, 20).unwrap();
    t.prune(30);
    assert_eq!(t.histories().count(), 0);
    assert!(t.incoming_at(&b, 30).unwrap().is_empty());
    assert_eq!(t.set(&a, &b, 1u64.into(), 29), Err(LedgerError::PrunedHistory));
}
