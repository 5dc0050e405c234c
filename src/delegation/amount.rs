use super::{DelegationMode, EdgeBook, EdgeTable};
use crate::common::{Wei, U256};
use crate::error::LedgerError;

/// Delegations of explicit amounts. The sum of an account's amounts never exceeds its balance;
/// the ledger refuses balance decreases that would break this.
#[derive(Clone, Debug)]
pub struct AmountBook {
    table: EdgeTable,
    max_delegates: usize,
}

impl AmountBook {
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

impl EdgeBook for AmountBook {
    fn mode(&self) -> DelegationMode {
        DelegationMode::Amount
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

    fn check_total(
        &self, total: &U256, balance: &Wei,
    ) -> Result<(), LedgerError> {
        if total > balance.as_u256() {
            return Err(LedgerError::AmountBoundExceeded)
        }
        Ok(())
    }

    fn realize(&self, weight: &U256, _: &Wei) -> Result<Wei, LedgerError> {
        Ok((*weight).into())
    }
}

#[test]
fn test_amount_bound() {
    let b = AmountBook::new(16);
    let bal: Wei = 100u64.into();
    assert!(b.check_total(&100u64.into(), &bal).is_ok());
    assert_eq!(
        b.check_total(&101u64.into(), &bal),
        Err(LedgerError::AmountBoundExceeded)
    );
    assert_eq!(b.realize(&40u64.into(), &bal).unwrap(), 40u64.into());
}
