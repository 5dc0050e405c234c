use std::collections::btree_map::BTreeMap;
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::common::{Addr, Ordinal, Wei};
use crate::error::LedgerError;
use crate::params::DEFAULT_CACHE_CAPACITY;

/// Identity of a memoizable query, without its ordinal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Query {
    Balance(Addr),
    VotePower(Addr),
    Undelegated(Addr),
    FromTo(Addr, Addr),
    RevokedFrom(Addr),
    GovVotePower(Addr),
    TotalSupply,
}

/// Memo of results at past ordinals. Behind a mutex so that `&self` queries can fill it; a racing
/// duplicate computation stores the same value twice.
///
/// Holds at most `capacity` results. When full, the oldest ordinals are evicted first; raising
/// the cleanup boundary and revocations drop entries as well.
pub struct QueryCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

#[derive(Default)]
struct CacheInner {
    by_ordinal: BTreeMap<Ordinal, HashMap<Query, Wei>>,
    len: usize,
}

impl CacheInner {
    fn recount(&mut self) {
        self.len = self.by_ordinal.values().map(|m| m.len()).sum();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity,
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, query: &Query, ordinal: Ordinal) -> Option<Wei> {
        self.inner
            .lock()
            .by_ordinal
            .get(&ordinal)
            .and_then(|m| m.get(query))
            .copied()
    }

    pub fn get_or_compute<F>(
        &self, query: Query, ordinal: Ordinal, f: F,
    ) -> Result<Wei, LedgerError>
    where
        F: FnOnce() -> Result<Wei, LedgerError>,
    {
        if let Some(v) = self.get(&query, ordinal) {
            return Ok(v)
        }
        // computed unlocked: f reads ledger state, not the cache
        let v = f()?;
        if self.capacity == 0 {
            return Ok(v)
        }
        let mut inner = self.inner.lock();
        if inner
            .by_ordinal
            .entry(ordinal)
            .or_default()
            .insert(query, v)
            .is_none()
        {
            inner.len += 1;
        }
        while inner.len > self.capacity {
            match inner.by_ordinal.pop_first() {
                Some((_, evicted)) => inner.len -= evicted.len(),
                None => break,
            }
        }
        Ok(v)
    }

    /// Drop entries at `ordinal` and later.
    pub fn invalidate_from(&self, ordinal: Ordinal) {
        let mut inner = self.inner.lock();
        inner.by_ordinal.split_off(&ordinal);
        inner.recount();
    }

    /// Drop entries before `ordinal`.
    pub fn invalidate_before(&self, ordinal: Ordinal) {
        let mut inner = self.inner.lock();
        let kept = inner.by_ordinal.split_off(&ordinal);
        inner.by_ordinal = kept;
        inner.recount();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[test]
fn test_cache_invalidation() {
    let c = QueryCache::new();
    let a: Addr = 1u64.into();
    for o in 1..=5 {
        c.get_or_compute(Query::VotePower(a), o, || Ok(o.into())).unwrap();
    }
    // hit: the closure is not run
    let v = c
        .get_or_compute(Query::VotePower(a), 3, || Err(LedgerError::InvariantViolation))
        .unwrap();
    assert_eq!(v, 3u64.into());
    c.invalidate_from(4);
    assert_eq!(c.len(), 3);
    c.invalidate_before(2);
    assert_eq!(c.len(), 2);
    assert_eq!(c.get(&Query::VotePower(a), 1), None);
    assert!(c
        .get_or_compute(Query::TotalSupply, 9, || Err(LedgerError::PrunedHistory))
        .is_err());
    assert_eq!(c.get(&Query::TotalSupply, 9), None);
}

#[test]
fn test_cache_evicts_oldest_ordinals() {
    let c = QueryCache::with_capacity(3);
    let (a, b): (Addr, Addr) = (1u64.into(), 2u64.into());
    for o in 1..=3u64 {
        c.get_or_compute(Query::VotePower(a), o, || Ok(o.into())).unwrap();
        c.get_or_compute(Query::VotePower(b), o, || Ok(o.into())).unwrap();
    }
    // whole ordinals go, oldest first
    assert_eq!(c.len(), 2);
    assert_eq!(c.get(&Query::VotePower(a), 1), None);
    assert_eq!(c.get(&Query::VotePower(b), 2), None);
    assert_eq!(c.get(&Query::VotePower(b), 3), Some(3u64.into()));
    // an evicted result is computed again
    let v = c
        .get_or_compute(Query::VotePower(a), 1, || Ok(7u64.into()))
        .unwrap();
    assert_eq!(v, 7u64.into());

    let off = QueryCache::with_capacity(0);
    off.get_or_compute(Query::TotalSupply, 1, || Ok(1u64.into())).unwrap();
    assert!(off.is_empty());
}
