use primitive_types::U512;

use super::{DelegationMode, EdgeBook, EdgeTable};
use crate::common::{Wei, U256};
use crate::error::LedgerError;
use crate::params::MAX_BIPS;

/// Delegations expressed in basis points of the delegator's balance. An edge realizes to
/// `floor(bips * balance / 10000)` at every ordinal, so it follows the balance without being
/// rewritten.
#[derive(Clone, Debug)]
pub struct PercentBook {
    table: EdgeTable,
    max_delegates: usize,
}

impl PercentBook {
    pub fn new(max_delegates: usize) -> Self {
        Self {
            table: EdgeTable::new(),
            max_delegates,
        }
    }

    pub fn with_table(table: EdgeTable, max_delegates: usize) -> Self {
        Self {
            table,
            max_delegates,
        }
    }
}

impl EdgeBook for PercentBook {
    fn mode(&self) -> DelegationMode {
        DelegationMode::Percentage
    }

    fn table(&self) -> &EdgeTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut EdgeTable {
        &mut self.table
    }

    fn max_delegates(&self) -> usize {
        self.max_delegates
    }

    fn check_total(&self, total: &U256, _: &Wei) -> Result<(), LedgerError> {
        if *total > U256::from(MAX_BIPS) {
            return Err(LedgerError::PercentBoundExceeded)
        }
        Ok(())
    }

    /// `weight * balance / 10000` with a 512-bit product, so only a quotient that does not fit
    /// overflows.
    fn realize(&self, weight: &U256, balance: &Wei) -> Result<Wei, LedgerError> {
        let v = balance.as_u256().full_mul(*weight) / U512::from(MAX_BIPS);
        U256::try_from(v)
            .map(Wei::from)
            .map_err(|_| LedgerError::ArithmeticOverflow)
    }
}

#[test]
fn test_realize_floors() {
    let b = PercentBook::new(2);
    let bal: Wei = 999u64.into();
    assert_eq!(b.realize(&5000u64.into(), &bal).unwrap(), 499u64.into());
    assert_eq!(b.realize(&10000u64.into(), &bal).unwrap(), bal);
    assert_eq!(b.realize(&1u64.into(), &bal).unwrap(), Wei::zero().clone());
}

#[test]
fn test_realize_large_balance() {
    let b = PercentBook::new(2);
    let half: Wei = (U256::MAX / 2).into();
    assert_eq!(
        b.realize(&5000u64.into(), &half).unwrap(),
        (U256::MAX / 4).into()
    );
    let max: Wei = U256::MAX.into();
    assert_eq!(b.realize(&10000u64.into(), &max).unwrap(), max);
    // only weights above 100% can leave the range
    assert_eq!(
        b.realize(&20000u64.into(), &max),
        Err(LedgerError::ArithmeticOverflow)
    );
}

#[test]
fn test_bips_bound() {
    let b = PercentBook::new(2);
    assert!(b.check_total(&10000u64.into(), Wei::zero()).is_ok());
    assert_eq!(
        b.check_total(&10001u64.into(), Wei::zero()),
        Err(LedgerError::PercentBoundExceeded)
    );
}
