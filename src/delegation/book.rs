use std::collections::BTreeSet;

use log::debug;

use super::{
    AmountBook, DelegationBook, DelegationMode, Edge, EdgeBook, EdgeEntry,
    EdgeTable, PercentBook,
};
use crate::checkpoint::{BalanceSource, Checkpoints};
use crate::common::{Addr, Ordinal, Wei, U256};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::store::{BookImage, EdgeHistory, RevocationRecord};

/// The default [DelegationBook]. Holds one [EdgeBook] per delegation mode and routes every call
/// to the book of the mode involved.
pub struct VpBook {
    name: String,
    percent: PercentBook,
    amount: AmountBook,
}

impl VpBook {
    pub fn new(config: &LedgerConfig) -> Self {
        Self::named("vp", config)
    }

    pub fn named(name: &str, config: &LedgerConfig) -> Self {
        Self {
            name: name.to_string(),
            percent: PercentBook::new(config.max_delegates_by_percent),
            amount: AmountBook::new(config.max_delegates_by_amount),
        }
    }

    /// Rebuild a book from its persisted image. Unordered histories are rejected.
    pub fn from_image(
        image: &BookImage, config: &LedgerConfig,
    ) -> Result<Self, LedgerError> {
        let mut edges = (Vec::new(), Vec::new());
        for e in image.edges.iter() {
            let h = Checkpoints::from_entries(
                e.entries.iter().map(|(o, w)| (*o, *w.as_u256())).collect(),
                image.floor,
            )?;
            match e.mode {
                DelegationMode::Amount => edges.1.push((e.from, e.to, h)),
                _ => edges.0.push((e.from, e.to, h)),
            }
        }
        let mut revocations = (Vec::new(), Vec::new());
        for r in image.revocations.iter() {
            let rec = (r.from, r.to, r.ordinal, r.amount);
            match r.mode {
                DelegationMode::Amount => revocations.1.push(rec),
                _ => revocations.0.push(rec),
            }
        }
        Ok(Self {
            name: image.name.clone(),
            percent: PercentBook::with_table(
                EdgeTable::restore(edges.0, revocations.0, image.floor),
                config.max_delegates_by_percent,
            ),
            amount: AmountBook::with_table(
                EdgeTable::restore(edges.1, revocations.1, image.floor),
                config.max_delegates_by_amount,
            ),
        })
    }

    #[inline(always)]
    fn books(&self) -> [&dyn EdgeBook; 2] {
        [&self.percent as &dyn EdgeBook, &self.amount]
    }

    fn edge_book_mut(
        &mut self, mode: DelegationMode,
    ) -> Result<&mut dyn EdgeBook, LedgerError> {
        match mode {
            DelegationMode::Percentage => Ok(&mut self.percent),
            DelegationMode::Amount => Ok(&mut self.amount),
            DelegationMode::None => Err(LedgerError::WrongMode),
        }
    }

    fn set_edge(
        &mut self, mode: DelegationMode, from: &Addr, to: &Addr, weight: U256,
        balance: &Wei, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        if from == to {
            return Err(LedgerError::SelfDelegation)
        }
        if to.is_zero() {
            return Err(LedgerError::ZeroTargetDelegation)
        }
        let current = self.mode_of(from);
        if current != DelegationMode::None && current != mode {
            return Err(LedgerError::WrongMode)
        }
        let book = self.edge_book_mut(mode)?;
        let existing = book.table().weight(from, to);
        if weight.is_zero() {
            if existing.is_zero() {
                return Err(LedgerError::NoSuchDelegate)
            }
        } else {
            if existing.is_zero() &&
                book.table().active_count(from) >= book.max_delegates()
            {
                return Err(LedgerError::TooManyDelegates)
            }
            let total = book.table().total_with(from, to, &weight)?;
            book.check_total(&total, balance)?;
        }
        book.table_mut().set(from, to, weight, ordinal)
    }
}

fn to_edges(
    mode: DelegationMode, anchor: &Addr, pairs: Vec<(Addr, EdgeEntry)>,
    outgoing: bool,
) -> impl Iterator<Item = Edge> {
    let anchor = *anchor;
    pairs.into_iter().map(move |(other, e)| {
        let (from, to) = if outgoing {
            (anchor, other)
        } else {
            (other, anchor)
        };
        Edge {
            from,
            to,
            mode,
            weight: e.weight,
            revoked: e.revoked,
        }
    })
}

impl DelegationBook for VpBook {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode_of(&self, from: &Addr) -> DelegationMode {
        for b in self.books() {
            if b.table().active_count(from) > 0 {
                return b.mode()
            }
        }
        DelegationMode::None
    }

    fn delegates_of(&self, from: &Addr) -> Vec<(Addr, U256)> {
        let mut out = self.percent.table().active(from);
        out.extend(self.amount.table().active(from));
        out
    }

    fn delegators_of(&self, to: &Addr) -> Vec<Addr> {
        let mut out = BTreeSet::new();
        for b in self.books() {
            out.extend(b.table().active_sources(to))
        }
        out.into_iter().collect()
    }

    fn amount_delegated_by(&self, from: &Addr) -> Result<Wei, LedgerError> {
        Ok(self.amount.table().total(from)?.into())
    }

    fn delegate_by_percent(
        &mut self, from: &Addr, to: &Addr, bips: u16, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        self.set_edge(
            DelegationMode::Percentage,
            from,
            to,
            bips.into(),
            Wei::zero(),
            ordinal,
        )?;
        debug!("{}: {} -> {} {} bips @{}", self.name, from, to, bips, ordinal);
        Ok(())
    }

    fn delegate_by_amount(
        &mut self, from: &Addr, to: &Addr, amount: &Wei, balance: &Wei,
        ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        self.set_edge(
            DelegationMode::Amount,
            from,
            to,
            *amount.as_u256(),
            balance,
            ordinal,
        )?;
        debug!("{}: {} -> {} amount {} @{}", self.name, from, to, amount, ordinal);
        Ok(())
    }

    fn undelegate_all(
        &mut self, from: &Addr, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        match self.mode_of(from) {
            DelegationMode::Percentage => (),
            DelegationMode::Amount => return Err(LedgerError::WrongMode),
            DelegationMode::None => return Err(LedgerError::NoSuchDelegate),
        }
        let cleared = self.percent.table_mut().clear(from, ordinal)?;
        debug!("{}: {} cleared {} delegates", self.name, from, cleared.len());
        Ok(())
    }

    fn undelegate_all_explicit(
        &mut self, from: &Addr, targets: &[Addr], ordinal: Ordinal,
    ) -> Result<Wei, LedgerError> {
        match self.mode_of(from) {
            DelegationMode::Amount => (),
            DelegationMode::Percentage => return Err(LedgerError::WrongMode),
            DelegationMode::None => return Err(LedgerError::NoSuchDelegate),
        }
        let table = self.amount.table_mut();
        let clear: BTreeSet<Addr> = targets
            .iter()
            .filter(|to| !table.weight(from, to).is_zero())
            .copied()
            .collect();
        if clear.is_empty() {
            return Err(LedgerError::NoSuchDelegate)
        }
        for to in clear.iter() {
            table.set(from, to, U256::zero(), ordinal)?;
        }
        Ok(table.total(from)?.into())
    }

    fn revoke(
        &mut self, from: &Addr, to: &Addr, at: Ordinal,
        balances: &dyn BalanceSource,
    ) -> Result<Wei, LedgerError> {
        let mut found = None;
        for b in self.books() {
            match b.table().entry_at(from, to, at)? {
                Some(e) if !e.weight.is_zero() => {
                    found = Some((b.mode(), e));
                    break
                }
                _ => (),
            }
        }
        let (mode, entry) = match found {
            Some((_, e)) if e.revoked => {
                return Err(LedgerError::AlreadyRevoked)
            }
            Some(f) => f,
            None => return Err(LedgerError::AlreadyRevoked),
        };
        let balance = balances.balance_at(from, at)?;
        let book = self.edge_book_mut(mode)?;
        let amount = book.realize(&entry.weight, &balance)?;
        book.table_mut().revoke(from, to, at, amount)?;
        debug!("{}: revoked {} -> {} @{} ({})", self.name, from, to, at, amount);
        Ok(amount)
    }

    fn outgoing_at(
        &self, from: &Addr, ordinal: Ordinal,
    ) -> Result<Vec<Edge>, LedgerError> {
        let mut out = Vec::new();
        for b in self.books() {
            let pairs = b.table().outgoing_at(from, ordinal)?;
            out.extend(to_edges(b.mode(), from, pairs, true));
        }
        Ok(out)
    }

    fn incoming_at(
        &self, to: &Addr, ordinal: Ordinal,
    ) -> Result<Vec<Edge>, LedgerError> {
        let mut out = Vec::new();
        for b in self.books() {
            let pairs = b.table().incoming_at(to, ordinal)?;
            out.extend(to_edges(b.mode(), to, pairs, false));
        }
        Ok(out)
    }

    fn edge_at(
        &self, from: &Addr, to: &Addr, ordinal: Ordinal,
    ) -> Result<Option<Edge>, LedgerError> {
        for b in self.books() {
            match b.table().entry_at(from, to, ordinal)? {
                Some(e) if !e.weight.is_zero() => {
                    return Ok(Some(Edge {
                        from: *from,
                        to: *to,
                        mode: b.mode(),
                        weight: e.weight,
                        revoked: e.revoked,
                    }))
                }
                _ => (),
            }
        }
        Ok(None)
    }

    fn realize(&self, edge: &Edge, balance: &Wei) -> Result<Wei, LedgerError> {
        match edge.mode {
            DelegationMode::Percentage => self.percent.realize(&edge.weight, balance),
            DelegationMode::Amount => self.amount.realize(&edge.weight, balance),
            DelegationMode::None => Ok(Wei::zero().clone()),
        }
    }

    fn clear_all(&mut self, ordinal: Ordinal) -> Result<(), LedgerError> {
        self.percent.table_mut().clear_all(ordinal)?;
        self.amount.table_mut().clear_all(ordinal)
    }

    fn prune(&mut self, before: Ordinal) {
        self.percent.table_mut().prune(before);
        self.amount.table_mut().prune(before);
    }

    fn image(&self) -> BookImage {
        let mut edges = Vec::new();
        let mut revocations = Vec::new();
        for b in self.books() {
            for (from, to, h) in b.table().histories() {
                edges.push(EdgeHistory {
                    from: *from,
                    to: *to,
                    mode: b.mode(),
                    entries: h
                        .entries()
                        .iter()
                        .map(|(o, w)| (*o, (*w).into()))
                        .collect(),
                })
            }
            for ((from, to), revs) in b.table().revocations() {
                for (ordinal, amount) in revs.iter() {
                    revocations.push(RevocationRecord {
                        from: *from,
                        to: *to,
                        mode: b.mode(),
                        ordinal: *ordinal,
                        amount: *amount,
                    })
                }
            }
        }
        BookImage {
            name: self.name.clone(),
            floor: self.percent.table().floor(),
            edges,
            revocations,
        }
    }
}

#[cfg(test)]
fn book() -> VpBook {
    VpBook::new(&LedgerConfig::default())
}

#[test]
fn test_mode_exclusivity() {
    let mut b = book();
    let (a, x, y) = (1u64.into(), 2u64.into(), 3u64.into());
    let bal: Wei = 1000u64.into();
    b.delegate_by_percent(&a, &x, 3000, 1).unwrap();
    assert_eq!(b.mode_of(&a), DelegationMode::Percentage);
    assert_eq!(
        b.delegate_by_amount(&a, &y, &100u64.into(), &bal, 2),
        Err(LedgerError::WrongMode)
    );
    assert_eq!(b.undelegate_all_explicit(&a, &[x], 2), Err(LedgerError::WrongMode));
    b.undelegate_all(&a, 3).unwrap();
    assert_eq!(b.mode_of(&a), DelegationMode::None);
    assert_eq!(b.undelegate_all(&a, 3), Err(LedgerError::NoSuchDelegate));
    b.delegate_by_amount(&a, &y, &100u64.into(), &bal, 4).unwrap();
    assert_eq!(b.mode_of(&a), DelegationMode::Amount);
    assert_eq!(b.undelegate_all(&a, 4), Err(LedgerError::WrongMode));
    assert_eq!(b.delegate_by_percent(&a, &x, 1, 5), Err(LedgerError::WrongMode));
}

#[test]
fn test_delegate_validation() {
    let mut b = book();
    let (a, x, y, z) =
        (1u64.into(), 2u64.into(), 3u64.into(), 4u64.into());
    assert_eq!(b.delegate_by_percent(&a, &a, 10, 1), Err(LedgerError::SelfDelegation));
    assert_eq!(
        b.delegate_by_percent(&a, Addr::zero(), 10, 1),
        Err(LedgerError::ZeroTargetDelegation)
    );
    assert_eq!(b.delegate_by_percent(&a, &x, 0, 1), Err(LedgerError::NoSuchDelegate));
    b.delegate_by_percent(&a, &x, 6000, 1).unwrap();
    assert_eq!(
        b.delegate_by_percent(&a, &y, 4001, 1),
        Err(LedgerError::PercentBoundExceeded)
    );
    b.delegate_by_percent(&a, &y, 4000, 1).unwrap();
    assert_eq!(b.delegate_by_percent(&a, &z, 1, 1), Err(LedgerError::TooManyDelegates));
    // re-weighting an existing target is not a new delegate
    b.delegate_by_percent(&a, &x, 1000, 2).unwrap();
    b.delegate_by_percent(&a, &x, 0, 3).unwrap();
    assert_eq!(b.delegates_of(&a), vec![(y, 4000u64.into())]);
    assert_eq!(b.delegators_of(&y), vec![a]);
    assert!(b.delegators_of(&x).is_empty());
    // the removed edge stays visible in history
    assert_eq!(b.edge_at(&a, &x, 2).unwrap().unwrap().weight, 1000u64.into());
    assert_eq!(b.edge_at(&a, &x, 3).unwrap(), None);
}

#[test]
fn test_undelegate_explicit_returns_remaining() {
    let mut b = book();
    let (a, x, y, z) =
        (1u64.into(), 2u64.into(), 3u64.into(), 4u64.into());
    let bal: Wei = 100u64.into();
    b.delegate_by_amount(&a, &x, &30u64.into(), &bal, 1).unwrap();
    b.delegate_by_amount(&a, &y, &50u64.into(), &bal, 1).unwrap();
    assert_eq!(
        b.delegate_by_amount(&a, &z, &21u64.into(), &bal, 1),
        Err(LedgerError::AmountBoundExceeded)
    );
    assert_eq!(b.amount_delegated_by(&a).unwrap(), 80u64.into());
    assert_eq!(
        b.undelegate_all_explicit(&a, &[z], 2),
        Err(LedgerError::NoSuchDelegate)
    );
    assert_eq!(b.undelegate_all_explicit(&a, &[x, z], 2).unwrap(), 50u64.into());
    assert_eq!(b.undelegate_all_explicit(&a, &[y], 3).unwrap(), Wei::zero().clone());
    assert_eq!(b.mode_of(&a), DelegationMode::None);
}

#[test]
fn test_revoke_once() {
    use crate::checkpoint::CheckpointStore;
    let mut balances = CheckpointStore::<Wei>::new();
    let mut b = book();
    let (a, x): (Addr, Addr) = (1u64.into(), 2u64.into());
    balances.write(&a, 1, 1000u64.into()).unwrap();
    b.delegate_by_percent(&a, &x, 2500, 5).unwrap();
    assert_eq!(b.revoke(&a, &x, 4, &balances), Err(LedgerError::AlreadyRevoked));
    assert_eq!(b.revoke(&a, &x, 7, &balances).unwrap(), 250u64.into());
    assert_eq!(b.revoke(&a, &x, 7, &balances), Err(LedgerError::AlreadyRevoked));
    assert_eq!(b.revoke(&a, &x, 9, &balances), Err(LedgerError::AlreadyRevoked));
    assert!(!b.edge_at(&a, &x, 6).unwrap().unwrap().revoked);
    assert!(b.edge_at(&a, &x, 8).unwrap().unwrap().revoked);
    let out = b.outgoing_at(&a, 8).unwrap();
    assert_eq!(out.len(), 1);
    assert!(out[0].revoked);
    assert_eq!(b.incoming_at(&x, 8).unwrap(), out);
}

#[test]
fn test_clear_all_keeps_history() {
    let mut b = book();
    let (a, x): (Addr, Addr) = (1u64.into(), 2u64.into());
    b.delegate_by_percent(&a, &x, 2500, 5).unwrap();
    b.clear_all(9).unwrap();
    assert_eq!(b.mode_of(&a), DelegationMode::None);
    assert!(b.edge_at(&a, &x, 8).unwrap().is_some());
    assert!(b.edge_at(&a, &x, 9).unwrap().is_none());
    let image = b.image();
    assert_eq!(image.edges.len(), 1);
    assert_eq!(image.edges[0].entries.len(), 2);
}
