use log::debug;

use vpledger::common::{Addr, Ordinal, Wei};
use vpledger::error::LedgerError;
use vpledger::VotePowerLedger;

/// Minimal fungible token on top of a ledger: turns mints, burns and transfers into balance
/// notifications. An amount above the sender's balance is refused with
/// [LedgerError::AmountBoundExceeded].
pub struct Token<'a> {
    ledger: &'a mut VotePowerLedger,
}

impl<'a> Token<'a> {
    pub fn new(ledger: &'a mut VotePowerLedger) -> Self {
        Self { ledger }
    }

    pub fn mint(
        &mut self, to: &Addr, amount: &Wei, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        debug!("mint {} to {} @{}", amount, to, ordinal);
        let balance = self
            .ledger
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        self.ledger.on_balance_changed(to, &balance, ordinal)
    }

    pub fn burn(
        &mut self, from: &Addr, amount: &Wei, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        debug!("burn {} from {} @{}", amount, from, ordinal);
        let balance = self
            .ledger
            .balance_of(from)
            .checked_sub(amount)
            .ok_or(LedgerError::AmountBoundExceeded)?;
        self.ledger.on_balance_changed(from, &balance, ordinal)
    }

    /// Debit first: if the sender's delegations lock the amount nothing is written.
    pub fn transfer(
        &mut self, from: &Addr, to: &Addr, amount: &Wei, ordinal: Ordinal,
    ) -> Result<(), LedgerError> {
        debug!("transfer {} from {} to {} @{}", amount, from, to, ordinal);
        let debited = self
            .ledger
            .balance_of(from)
            .checked_sub(amount)
            .ok_or(LedgerError::AmountBoundExceeded)?;
        if from == to {
            return self.ledger.advance_to(ordinal)
        }
        let credited = self
            .ledger
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        self.ledger.on_balance_changed(from, &debited, ordinal)?;
        self.ledger.on_balance_changed(to, &credited, ordinal)
    }
}
