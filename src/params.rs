//! Fixed parameters of the ledger arithmetic and the default limits used by
//! [LedgerConfig](../config/struct.LedgerConfig.html).

/// 100% expressed in basis points.
pub const MAX_BIPS: u16 = 10_000;

/// Default number of targets an account may delegate to by percentage.
pub const DEFAULT_MAX_DELEGATES_BY_PERCENT: usize = 2;
/// Default number of targets an account may delegate to by explicit amount.
pub const DEFAULT_MAX_DELEGATES_BY_AMOUNT: usize = 16;

/// Default number of memoized past-ordinal query results.
pub const DEFAULT_CACHE_CAPACITY: usize = 1 << 16;

/// Index of the delegation book installed by [VotePowerLedger::new](../ledger/struct.VotePowerLedger.html#method.new).
pub const GENESIS_BOOK: usize = 0;

/// Compaction of a pruned history is deferred until at least this many dead entries pile up.
pub const COMPACT_THRESHOLD: usize = 32;
