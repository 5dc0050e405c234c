use serde::Deserialize;

use crate::params::*;

/// Tunables of a [VotePowerLedger](../ledger/struct.VotePowerLedger.html). Every field has a
/// default, so a host may load a partial JSON document with [LedgerConfig::from_json].
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    pub max_delegates_by_percent: usize,
    pub max_delegates_by_amount: usize,
    /// Memoize queries at past ordinals.
    pub cache_historical: bool,
    /// Most past-ordinal results kept in memory; the oldest ordinals are evicted first.
    pub cache_capacity: usize,
    /// Panic on state errors (overflow, underflow, broken conservation) after logging them.
    pub abort_on_state_error: bool,
    /// Re-verify conservation at the live ordinal after every mutation.
    pub check_conservation: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_delegates_by_percent: DEFAULT_MAX_DELEGATES_BY_PERCENT,
            max_delegates_by_amount: DEFAULT_MAX_DELEGATES_BY_AMOUNT,
            cache_historical: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            abort_on_state_error: cfg!(debug_assertions),
            check_conservation: false,
        }
    }
}

impl LedgerConfig {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[test]
fn test_partial_config() {
    let c = LedgerConfig::from_json(
        r#"{"maxDelegatesByPercent": 5, "checkConservation": true}"#,
    )
    .unwrap();
    assert_eq!(c.max_delegates_by_percent, 5);
    assert_eq!(c.max_delegates_by_amount, DEFAULT_MAX_DELEGATES_BY_AMOUNT);
    assert!(c.check_conservation);
    assert!(c.cache_historical);
    assert_eq!(c.cache_capacity, DEFAULT_CACHE_CAPACITY);
}
