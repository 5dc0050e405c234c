//! # vpledger: checkpointed vote-power delegation ledger
//!
//! - vpledger tracks token balances over time, lets every account hand a share of the vote power
//!   of its balance to other accounts, and answers exact vote power queries for the present or
//!   for any retained point in the past.
//!
//! - It is a library that sits next to a token. The token reports every balance change through
//!   [VotePowerLedger::on_balance_changed](ledger/struct.VotePowerLedger.html#method.on_balance_changed);
//!   governance, reward distribution and anything else that needs vote power reads it back.
//!
//! # Overview
//! The crate is split along the same lines as the data it manages:
//!
//! - [checkpoint]: point-in-time histories. A [Checkpoints](checkpoint/struct.Checkpoints.html)
//!   value is a flat array of `(ordinal, value)` entries searched by binary search; pruning only
//!   moves an offset.
//! - [delegation]: the replaceable delegation subsystem behind the
//!   [DelegationBook](delegation/trait.DelegationBook.html) trait. The default
//!   [VpBook](delegation/struct.VpBook.html) keeps percentage delegations (basis points of the
//!   balance, realized at every ordinal) and explicit-amount delegations in two tables, and an
//!   account may only use one of the two modes at a time. Governance delegation (all of an
//!   account's governance vote power to a single target) lives in
//!   [GovernanceBook](delegation/struct.GovernanceBook.html).
//! - [ledger]: [VotePowerLedger](ledger/struct.VotePowerLedger.html) composes the above, owns
//!   the clock and the query cache, and enforces validate-then-commit for every mutation.
//!   [LifecycleManager](ledger/struct.LifecycleManager.html) moves the cleanup boundary and
//!   swaps delegation books.
//! - [store]: the persisted layout of a ledger and its deterministic digest.
//! - [common], [config], [error], [params]: basic types, tunables and the error taxonomy.
//!
//! # Ordinals
//! Every state change is stamped with an ordinal (a block number or any other monotonically
//! increasing counter). The ledger keeps a current ordinal that only moves forward. A query at
//! the current ordinal is "live" and may still change; a query at a past ordinal is fixed, except
//! that revoking a delegation at ordinal `o` nullifies that delegation for queries at `o` and
//! later. Past results are memoized.
//!
//! ```notrust
//!   balance(a) ---------------------------.
//!                                          \
//!   outgoing edges of a  --(realize @o)-->  votePower(a, o) = balance
//!   incoming edges of a  --(realize @o)-->                  - Σ outgoing (unrevoked)
//!                                                           + Σ incoming (unrevoked)
//! ```
//!
//! Vote power is conserved: at every ordinal the vote power of all accounts sums to the sum of
//! their balances, which is the total supply.
//!
//! # Replacing the delegation book
//! [replace_delegation_book](ledger/struct.VotePowerLedger.html#method.replace_delegation_book)
//! installs a fresh book that starts from zero delegations, while history before the swap keeps
//! resolving through the old book. With
//! [replace_write_book](ledger/struct.VotePowerLedger.html#method.replace_write_book) reads keep
//! going to the old book for a bounded window while writes already go to the new one.

#[macro_use] extern crate num_derive;

pub mod checkpoint;
#[macro_use]
pub mod common;
pub mod config;
pub mod delegation;
pub mod error;
pub mod ledger;
pub mod params;
pub mod store;

pub use common::{Addr, Hash, Ordinal, Wei, U256};
pub use config::LedgerConfig;
pub use error::{ErrorKind, LedgerError};
pub use ledger::{SharedLedger, VotePowerLedger};
