//! Token Ledger
//!
//! Fixed-supply fungible token with balances, allowances and delegated
//! transfers.
//!
//! # Architecture
//!
//! - **State Machine**: [`TokenState`] validates every precondition before mutating
//! - **Single Writer**: One actor task owns the state, eliminating race conditions
//! - **Notification Log**: Append-only, hash-chained `Transfer`/`Approval` records
//! - **Explicit Callers**: Every mutation names the acting address
//!
//! # Invariants
//!
//! - Supply conservation: Σ(balances) == total_supply for all time
//! - No negative quantities: unsigned amounts, checked arithmetic
//! - Atomicity: a rejected operation changes nothing and emits nothing
//! - Linearizable: total ordering of all notifications

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod state;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use events::{EventKind, EventLog, LedgerEvent, Operation};
pub use ledger::Ledger;
pub use state::{StateSnapshot, TokenState};
pub use types::{Address, Amount, TokenMetadata};
