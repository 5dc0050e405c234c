use std::collections::btree_map::BTreeMap;

use log::info;

use vpledger::common::{Addr, Ordinal, Wei};
use vpledger::delegation::DelegationMode;
use vpledger::error::LedgerError;
use vpledger::params::MAX_BIPS;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ModelEdge {
    mode: DelegationMode,
    weight: u64,
    written_at: Ordinal,
    revoked: bool,
}

type Edges = BTreeMap<(Addr, Addr), ModelEdge>;

fn outgoing<'a>(
    edges: &'a Edges, a: &Addr,
) -> impl Iterator<Item = (&'a Addr, &'a ModelEdge)> {
    let a = *a;
    edges
        .iter()
        .filter(move |((from, _), _)| *from == a)
        .map(|((_, to), e)| (to, e))
}

fn mode_of(edges: &Edges, a: &Addr) -> DelegationMode {
    outgoing(edges, a)
        .next()
        .map(|(_, e)| e.mode)
        .unwrap_or(DelegationMode::None)
}

fn amount_delegated(edges: &Edges, a: &Addr) -> u64 {
    outgoing(edges, a)
        .filter(|(_, e)| e.mode == DelegationMode::Amount)
        .map(|(_, e)| e.weight)
        .sum()
}

#[derive(Clone, Default)]
struct ModelState {
    balances: BTreeMap<Addr, u64>,
    /// Non-zero edges of the book that answers reads.
    edges: Edges,
    read_book: usize,
    /// Edges of a newer book taking writes while reads still lag behind.
    lagging: Option<Edges>,
    governance: BTreeMap<Addr, Addr>,
}

impl ModelState {
    fn balance(&self, a: &Addr) -> u64 {
        self.balances.get(a).copied().unwrap_or(0)
    }

    fn write_edges(&self) -> &Edges {
        self.lagging.as_ref().unwrap_or(&self.edges)
    }

    fn write_edges_mut(&mut self) -> &mut Edges {
        self.lagging.as_mut().unwrap_or(&mut self.edges)
    }

    fn outgoing(&self, a: &Addr) -> impl Iterator<Item = (&Addr, &ModelEdge)> {
        outgoing(&self.edges, a)
    }

    fn incoming(&self, a: &Addr) -> impl Iterator<Item = (&Addr, &ModelEdge)> {
        let a = *a;
        self.edges
            .iter()
            .filter(move |((_, to), _)| *to == a)
            .map(|((from, _), e)| (from, e))
    }

    fn realize(&self, from: &Addr, e: &ModelEdge) -> u64 {
        match e.mode {
            DelegationMode::Percentage => {
                (e.weight as u128 * self.balance(from) as u128 /
                    MAX_BIPS as u128) as u64
            }
            _ => e.weight,
        }
    }
}

/// Plain-map mirror of a [VotePowerLedger](vpledger::VotePowerLedger) that keeps a full copy of
/// the state for every ordinal that saw a change. Slow and simple on purpose; balances are
/// `u64`.
///
/// Book replacement is modeled by book ids only: a replaced book starts empty, and while a read
/// window is open the state carries the edges of both books.
pub struct ModelLedger {
    max_delegates_by_percent: usize,
    max_delegates_by_amount: usize,
    ordinal: Ordinal,
    boundary: Ordinal,
    state: ModelState,
    history: BTreeMap<Ordinal, ModelState>,
    write_book: usize,
    pending_switch: Option<Ordinal>,
}

impl ModelLedger {
    pub fn new(
        max_delegates_by_percent: usize, max_delegates_by_amount: usize,
    ) -> Self {
        let mut history = BTreeMap::new();
        history.insert(0, ModelState::default());
        Self {
            max_delegates_by_percent,
            max_delegates_by_amount,
            ordinal: 0,
            boundary: 0,
            state: ModelState::default(),
            history,
            write_book: 0,
            pending_switch: None,
        }
    }

    pub fn ordinal(&self) -> Ordinal {
        self.ordinal
    }

    pub fn cleanup_boundary(&self) -> Ordinal {
        self.boundary
    }

    /// Ordinals at which some change was recorded, from the cleanup boundary on.
    pub fn checkpoints(&self) -> Vec<Ordinal> {
        let mut out = vec![self.boundary];
        out.extend(self.history.range(self.boundary + 1..).map(|(o, _)| *o));
        out
    }

    pub fn accounts(&self) -> Vec<Addr> {
        let mut out: Vec<Addr> = Vec::new();
        for s in self.history.values().chain(std::iter::once(&self.state)) {
            out.extend(s.balances.keys());
            for (from, to) in s.edges.keys().chain(s.lagging.iter().flat_map(|e| e.keys())) {
                out.push(*from);
                out.push(*to);
            }
            for (from, to) in s.governance.iter() {
                out.push(*from);
                out.push(*to);
            }
        }
        out.sort();
        out.dedup();
        out
    }

    fn commit(&mut self) {
        self.history.insert(self.ordinal, self.state.clone());
    }

    fn state_at(&self, o: Ordinal) -> Result<&ModelState, LedgerError> {
        if o > self.ordinal {
            return Err(LedgerError::UnknownCheckpoint)
        }
        if o < self.boundary {
            return Err(LedgerError::PrunedHistory)
        }
        Ok(self
            .history
            .range(..=o)
            .next_back()
            .map(|(_, s)| s)
            .unwrap_or(&self.state))
    }

    /// Move the clock, completing a read switch that falls due on the way.
    fn advance(&mut self, o: Ordinal) {
        if o <= self.ordinal {
            return
        }
        if let Some(at) = self.pending_switch {
            if at <= o {
                self.ordinal = at;
                self.switch_read();
            }
        }
        self.ordinal = o;
    }

    fn switch_read(&mut self) -> bool {
        self.pending_switch = None;
        match self.state.lagging.take() {
            Some(edges) => {
                self.state.edges = edges;
                self.state.read_book = self.write_book;
                self.commit();
                true
            }
            None => false,
        }
    }

    pub fn advance_to(&mut self, o: Ordinal) -> Result<(), LedgerError> {
        info!("advance_to({})", o);
        if o < self.ordinal {
            return Err(LedgerError::OrdinalRegression)
        }
        self.advance(o);
        Ok(())
    }

    pub fn on_balance_changed(
        &mut self, a: &Addr, balance: u64, o: Ordinal,
    ) -> Result<(), LedgerError> {
        info!("on_balance_changed({}, {}, {})", a, balance, o);
        if o < self.ordinal {
            return Err(LedgerError::OrdinalRegression)
        }
        if amount_delegated(self.state.write_edges(), a) > balance {
            return Err(LedgerError::AmountBoundExceeded)
        }
        let retiring = self.pending_switch.map_or(false, |at| at <= o);
        if self.state.lagging.is_some() &&
            !retiring &&
            amount_delegated(&self.state.edges, a) > balance
        {
            return Err(LedgerError::AmountBoundExceeded)
        }
        self.advance(o);
        self.state.balances.insert(*a, balance);
        self.commit();
        Ok(())
    }

    fn delegate(
        &mut self, mode: DelegationMode, from: &Addr, to: &Addr, weight: u64,
    ) -> Result<(), LedgerError> {
        if from == to {
            return Err(LedgerError::SelfDelegation)
        }
        if to.is_zero() {
            return Err(LedgerError::ZeroTargetDelegation)
        }
        let current = mode_of(self.state.write_edges(), from);
        if current != DelegationMode::None && current != mode {
            return Err(LedgerError::WrongMode)
        }
        let key = (*from, *to);
        let existing = self.state.write_edges().get(&key).map_or(0, |e| e.weight);
        if weight == 0 {
            if existing == 0 {
                return Err(LedgerError::NoSuchDelegate)
            }
            self.state.write_edges_mut().remove(&key);
        } else {
            let (max, bound, err) = match mode {
                DelegationMode::Percentage => (
                    self.max_delegates_by_percent,
                    MAX_BIPS as u64,
                    LedgerError::PercentBoundExceeded,
                ),
                _ => (
                    self.max_delegates_by_amount,
                    self.state.balance(from),
                    LedgerError::AmountBoundExceeded,
                ),
            };
            let count = outgoing(self.state.write_edges(), from).count();
            if existing == 0 && count >= max {
                return Err(LedgerError::TooManyDelegates)
            }
            let others: u64 = outgoing(self.state.write_edges(), from)
                .filter(|(t, _)| *t != to)
                .map(|(_, e)| e.weight)
                .sum();
            if others + weight > bound {
                return Err(err)
            }
            let ordinal = self.ordinal;
            self.state.write_edges_mut().insert(
                key,
                ModelEdge {
                    mode,
                    weight,
                    written_at: ordinal,
                    revoked: false,
                },
            );
        }
        self.commit();
        Ok(())
    }

    pub fn delegate_by_percent(
        &mut self, from: &Addr, to: &Addr, bips: u16,
    ) -> Result<(), LedgerError> {
        info!("delegate_by_percent({}, {}, {})", from, to, bips);
        self.delegate(DelegationMode::Percentage, from, to, bips as u64)
    }

    pub fn delegate_by_amount(
        &mut self, from: &Addr, to: &Addr, amount: u64,
    ) -> Result<(), LedgerError> {
        info!("delegate_by_amount({}, {}, {})", from, to, amount);
        self.delegate(DelegationMode::Amount, from, to, amount)
    }

    pub fn undelegate_all(&mut self, from: &Addr) -> Result<(), LedgerError> {
        info!("undelegate_all({})", from);
        match mode_of(self.state.write_edges(), from) {
            DelegationMode::Percentage => (),
            DelegationMode::Amount => return Err(LedgerError::WrongMode),
            DelegationMode::None => return Err(LedgerError::NoSuchDelegate),
        }
        self.state.write_edges_mut().retain(|(f, _), _| f != from);
        self.commit();
        Ok(())
    }

    pub fn undelegate_all_explicit(
        &mut self, from: &Addr, targets: &[Addr],
    ) -> Result<u64, LedgerError> {
        info!("undelegate_all_explicit({}, {:?})", from, targets);
        match mode_of(self.state.write_edges(), from) {
            DelegationMode::Amount => (),
            DelegationMode::Percentage => return Err(LedgerError::WrongMode),
            DelegationMode::None => return Err(LedgerError::NoSuchDelegate),
        }
        let mut cleared = false;
        for to in targets.iter() {
            cleared |= self.state.write_edges_mut().remove(&(*from, *to)).is_some();
        }
        if !cleared {
            return Err(LedgerError::NoSuchDelegate)
        }
        self.commit();
        Ok(amount_delegated(self.state.write_edges(), from))
    }

    pub fn revoke_delegation_at(
        &mut self, from: &Addr, to: &Addr, at: Ordinal,
    ) -> Result<u64, LedgerError> {
        info!("revoke_delegation_at({}, {}, {})", from, to, at);
        if at >= self.ordinal {
            return Err(LedgerError::UnknownCheckpoint)
        }
        let s = self.state_at(at)?;
        let key = (*from, *to);
        let edge = match s.edges.get(&key) {
            Some(e) if !e.revoked => *e,
            _ => return Err(LedgerError::AlreadyRevoked),
        };
        let amount = s.realize(from, &edge);
        let book = s.read_book;
        // the state valid at `at` starts at `at` from now on
        let base = s.clone();
        self.history.entry(at).or_insert(base);
        for s in self
            .history
            .range_mut(at..)
            .map(|(_, s)| s)
            .chain(std::iter::once(&mut self.state))
            .filter(|s| s.read_book == book)
        {
            if let Some(e) = s.edges.get_mut(&key) {
                if e.written_at == edge.written_at {
                    e.revoked = true
                }
            }
        }
        Ok(amount)
    }

    pub fn delegate_governance(
        &mut self, from: &Addr, to: &Addr,
    ) -> Result<(), LedgerError> {
        info!("delegate_governance({}, {})", from, to);
        if from == to {
            return Err(LedgerError::SelfDelegation)
        }
        if to.is_zero() {
            return Err(LedgerError::ZeroTargetDelegation)
        }
        self.state.governance.insert(*from, *to);
        self.commit();
        Ok(())
    }

    pub fn undelegate_governance(
        &mut self, from: &Addr,
    ) -> Result<(), LedgerError> {
        info!("undelegate_governance({})", from);
        if self.state.governance.remove(from).is_none() {
            return Err(LedgerError::NoSuchDelegate)
        }
        self.commit();
        Ok(())
    }

    pub fn set_cleanup_boundary(
        &mut self, boundary: Ordinal,
    ) -> Result<(), LedgerError> {
        info!("set_cleanup_boundary({})", boundary);
        if boundary < self.boundary || boundary >= self.ordinal {
            return Err(LedgerError::BoundaryInvalid)
        }
        self.boundary = boundary;
        Ok(())
    }

    /// A new delegation book starts empty; history keeps the old edges.
    pub fn replace_delegation_book(&mut self) {
        info!("replace_delegation_book()");
        self.replace_write_book(0);
    }

    /// Send writes to a fresh book now and reads after `window` ordinals.
    pub fn replace_write_book(&mut self, window: u64) {
        info!("replace_write_book({})", window);
        if self.pending_switch.is_some() {
            self.switch_read();
        }
        self.write_book += 1;
        if window == 0 {
            self.state.edges.clear();
            self.state.read_book = self.write_book;
        } else {
            self.state.lagging = Some(Edges::new());
            self.pending_switch = Some(self.ordinal + window);
        }
        self.commit();
    }

    /// End an open read window now. Returns whether reads moved.
    pub fn switch_read_book(&mut self) -> bool {
        info!("switch_read_book()");
        self.switch_read()
    }

    // queries

    pub fn balance_of(&self, a: &Addr) -> u64 {
        self.state.balance(a)
    }

    pub fn balance_of_at(&self, a: &Addr, o: Ordinal) -> Result<Wei, LedgerError> {
        Ok(self.state_at(o)?.balance(a).into())
    }

    pub fn total_supply_at(&self, o: Ordinal) -> Result<Wei, LedgerError> {
        Ok(self.state_at(o)?.balances.values().sum::<u64>().into())
    }

    pub fn vote_power_of_at(
        &self, a: &Addr, o: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let s = self.state_at(o)?;
        let out: u64 = s
            .outgoing(a)
            .filter(|(_, e)| !e.revoked)
            .map(|(_, e)| s.realize(a, e))
            .sum();
        let inc: u64 = s
            .incoming(a)
            .filter(|(_, e)| !e.revoked)
            .map(|(from, e)| s.realize(from, e))
            .sum();
        Ok((s.balance(a) - out + inc).into())
    }

    pub fn undelegated_vote_power_of_at(
        &self, a: &Addr, o: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let s = self.state_at(o)?;
        let out: u64 = s.outgoing(a).map(|(_, e)| s.realize(a, e)).sum();
        Ok((s.balance(a) - out).into())
    }

    pub fn vote_power_from_to_at(
        &self, from: &Addr, to: &Addr, o: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let s = self.state_at(o)?;
        Ok(match s.edges.get(&(*from, *to)) {
            Some(e) if !e.revoked => s.realize(from, e),
            _ => 0,
        }
        .into())
    }

    pub fn revoked_from_at(
        &self, a: &Addr, o: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let s = self.state_at(o)?;
        Ok(s.outgoing(a)
            .filter(|(_, e)| e.revoked)
            .map(|(_, e)| s.realize(a, e))
            .sum::<u64>()
            .into())
    }

    pub fn gov_vote_power_of_at(
        &self, a: &Addr, o: Ordinal,
    ) -> Result<Wei, LedgerError> {
        let s = self.state_at(o)?;
        let own = if s.governance.contains_key(a) {
            0
        } else {
            s.balance(a)
        };
        let inc: u64 = s
            .governance
            .iter()
            .filter(|(_, to)| *to == a)
            .map(|(from, _)| s.balance(from))
            .sum();
        Ok((own + inc).into())
    }

    pub fn delegation_mode_of(&self, a: &Addr) -> DelegationMode {
        mode_of(self.state.write_edges(), a)
    }
}

#[test]
fn test_model_revocation_splits_history() {
    let a: Addr = 1u64.into();
    let b: Addr = 2u64.into();
    let mut m = ModelLedger::new(2, 16);
    m.on_balance_changed(&a, 1000, 10).unwrap();
    m.delegate_by_percent(&a, &b, 10000).unwrap();
    m.advance_to(20).unwrap();
    assert_eq!(m.revoke_delegation_at(&a, &b, 15).unwrap(), 1000);
    assert_eq!(m.vote_power_from_to_at(&a, &b, 12).unwrap(), 1000u64.into());
    assert_eq!(m.vote_power_from_to_at(&a, &b, 15).unwrap(), 0u64.into());
    assert_eq!(m.vote_power_of_at(&a, 20).unwrap(), 1000u64.into());
    assert_eq!(m.revoke_delegation_at(&a, &b, 17), Err(LedgerError::AlreadyRevoked));
    assert_eq!(m.checkpoints(), vec![0, 10, 15]);
}

#[test]
fn test_model_read_window() {
    let a: Addr = 1u64.into();
    let b: Addr = 2u64.into();
    let c: Addr = 3u64.into();
    let mut m = ModelLedger::new(2, 16);
    m.on_balance_changed(&a, 1000, 1).unwrap();
    m.delegate_by_amount(&a, &b, 400).unwrap();
    m.advance_to(2).unwrap();
    m.replace_write_book(3);
    m.delegate_by_percent(&a, &c, 1000).unwrap();
    assert_eq!(m.delegation_mode_of(&a), DelegationMode::Percentage);
    assert_eq!(m.vote_power_of_at(&b, 2).unwrap(), Wei::from(400u64));
    assert_eq!(m.vote_power_of_at(&c, 2).unwrap(), Wei::from(0u64));
    // the lagging book still locks its amount
    assert_eq!(m.on_balance_changed(&a, 300, 4), Err(LedgerError::AmountBoundExceeded));
    m.on_balance_changed(&a, 300, 5).unwrap();
    assert_eq!(m.vote_power_of_at(&b, 5).unwrap(), Wei::from(0u64));
    assert_eq!(m.vote_power_of_at(&c, 5).unwrap(), Wei::from(30u64));
    assert_eq!(m.checkpoints(), vec![0, 1, 2, 5]);
    assert!(!m.switch_read_book());
}
