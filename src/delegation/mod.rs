//! Delegation bookkeeping.
//!
//! A [DelegationBook] owns every outgoing delegation edge of every account together with the
//! edges' checkpoint histories and revocation records. The ledger talks to it only through
//! this trait, so a book can be replaced at runtime (see
//! [LifecycleManager](../ledger/struct.LifecycleManager.html)). [VpBook] is the default
//! implementation; it keeps percentage edges in a [PercentBook] and explicit-amount edges in
//! an [AmountBook], both of which implement the mode-specific rules of [EdgeBook] on top of a
//! shared [EdgeTable].

mod amount;
mod book;
mod governance;
mod percent;
mod table;

pub use amount::AmountBook;
pub use book::VpBook;
pub use governance::GovernanceBook;
pub use percent::PercentBook;
pub use table::{EdgeEntry, EdgeTable};

use serde::{Deserialize, Serialize};

use crate::checkpoint::BalanceSource;
use crate::common::{Addr, Ordinal, Wei, U256};
use crate::error::LedgerError;
use crate::store::BookImage;

/// How an account's outgoing delegations are expressed. An account is in at most one non-`None`
/// mode at a time; it returns to `None` once its last non-zero edge is removed.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    FromPrimitive,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DelegationMode {
    None = 0,
    Percentage = 1,
    Amount = 2,
}

/// A non-zero delegation edge as it was recorded at some ordinal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: Addr,
    pub to: Addr,
    pub mode: DelegationMode,
    /// Basis points for [DelegationMode::Percentage], the raw amount for [DelegationMode::Amount].
    pub weight: U256,
    /// The edge's entry is nullified by a revocation at or before the queried ordinal.
    pub revoked: bool,
}

/// Mode-specific rules on top of an [EdgeTable].
pub trait EdgeBook: Send + Sync {
    fn mode(&self) -> DelegationMode;
    fn table(&self) -> &EdgeTable;
    fn table_mut(&mut self) -> &mut EdgeTable;
    fn max_delegates(&self) -> usize;
    /// Check the sum of all of an account's weights against the mode's bound.
    fn check_total(
        &self, total: &U256, balance: &Wei,
    ) -> Result<(), LedgerError>;
    /// Turn a weight into vote power, given the delegator's balance at the same ordinal.
    fn realize(&self, weight: &U256, balance: &Wei) -> Result<Wei, LedgerError>;
}

/// The replaceable delegation subsystem. Mutating methods validate completely before they
/// write anything and are only ever called at the ledger's current ordinal.
pub trait DelegationBook: Send + Sync {
    /// Short human readable name for logs.
    fn name(&self) -> &str;

    fn mode_of(&self, from: &Addr) -> DelegationMode;
    /// Active (non-zero) outgoing edges with their raw weights.
    fn delegates_of(&self, from: &Addr) -> Vec<(Addr, U256)>;
    /// Accounts that currently hold a non-zero edge towards `to`.
    fn delegators_of(&self, to: &Addr) -> Vec<Addr>;
    /// Sum of the active explicit-amount edges of `from`.
    fn amount_delegated_by(&self, from: &Addr) -> Result<Wei, LedgerError>;

    fn delegate_by_percent(
        &mut self, from: &Addr, to: &Addr, bips: u16, ordinal: Ordinal,
    ) -> Result<(), LedgerError>;
    fn delegate_by_amount(
        &mut self, from: &Addr, to: &Addr, amount: &Wei, balance: &Wei,
        ordinal: Ordinal,
    ) -> Result<(), LedgerError>;
    /// Remove every percentage edge of `from`.
    fn undelegate_all(
        &mut self, from: &Addr, ordinal: Ordinal,
    ) -> Result<(), LedgerError>;
    /// Remove the listed explicit-amount edges of `from` and return what stays delegated.
    fn undelegate_all_explicit(
        &mut self, from: &Addr, targets: &[Addr], ordinal: Ordinal,
    ) -> Result<Wei, LedgerError>;
    /// Nullify the `from -> to` entry valid at the past ordinal `at`. Returns the revoked
    /// (realized) amount.
    fn revoke(
        &mut self, from: &Addr, to: &Addr, at: Ordinal,
        balances: &dyn BalanceSource,
    ) -> Result<Wei, LedgerError>;

    fn outgoing_at(
        &self, from: &Addr, ordinal: Ordinal,
    ) -> Result<Vec<Edge>, LedgerError>;
    fn incoming_at(
        &self, to: &Addr, ordinal: Ordinal,
    ) -> Result<Vec<Edge>, LedgerError>;
    fn edge_at(
        &self, from: &Addr, to: &Addr, ordinal: Ordinal,
    ) -> Result<Option<Edge>, LedgerError>;
    fn realize(&self, edge: &Edge, balance: &Wei) -> Result<Wei, LedgerError>;

    /// Zero every active edge at `ordinal`; history before it is kept.
    fn clear_all(&mut self, ordinal: Ordinal) -> Result<(), LedgerError>;
    fn prune(&mut self, before: Ordinal);
    fn image(&self) -> BookImage;
}
