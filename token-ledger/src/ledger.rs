//! Main ledger orchestration layer
//!
//! This module ties together the state machine, actor and metrics
//! into a high-level API for token operations.
//!
//! # Example
//!
//! ```no_run
//! use token_ledger::{Address, Amount, Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> token_ledger::Result<()> {
//!     let deployer = Address::from_low_u64(1);
//!     let receiver = Address::from_low_u64(2);
//!     let ledger = Ledger::deploy(deployer, Config::default()).await?;
//!
//!     let amount = Amount::from_tokens(100).unwrap_or_default();
//!     let event = ledger.transfer(deployer, receiver, amount).await?;
//!     println!("{} #{}", event.kind.name(), event.sequence);
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    events::LedgerEvent,
    metrics::Metrics,
    state::{StateSnapshot, TokenState},
    types::{Address, Amount, TokenMetadata},
    Config, Error, Result,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Main ledger interface
///
/// Every mutating call names its caller explicitly: `sender` for
/// [`transfer`](Self::transfer), `owner` for [`approve`](Self::approve),
/// `spender` for [`transfer_from`](Self::transfer_from).
#[derive(Debug)]
pub struct Ledger {
    /// Actor handle for all state access
    handle: LedgerHandle,

    /// Immutable token metadata
    metadata: TokenMetadata,

    /// Metrics shared with the actor
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Deploy a new token, crediting the whole supply to `deployer`
    ///
    /// Must be called inside a Tokio runtime.
    pub async fn deploy(deployer: Address, config: Config) -> Result<Self> {
        config.validate()?;

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;

        let state = TokenState::deploy(deployer);
        let metadata = state.metadata().clone();

        tracing::info!(
            service = %config.service_name,
            deployer = %deployer,
            name = %metadata.name,
            symbol = %metadata.symbol,
            total_supply = %metadata.total_supply,
            "Token deployed"
        );

        let handle = spawn_ledger_actor(
            state,
            config.mailbox_capacity,
            config.notification_capacity,
            metrics.clone(),
        );

        Ok(Self {
            handle,
            metadata,
            metrics,
            config,
        })
    }

    /// Move `amount` from `sender` to `recipient`
    pub async fn transfer(
        &self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.handle.transfer(sender, recipient, amount).await
    }

    /// Set `spender`'s allowance over `owner`'s balance (overwrites)
    pub async fn approve(
        &self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.handle.approve(owner, spender, amount).await
    }

    /// Move `amount` from `owner` to `recipient`, drawing on `spender`'s allowance
    pub async fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.handle
            .transfer_from(spender, owner, recipient, amount)
            .await
    }

    /// Balance of `account`
    pub async fn balance_of(&self, account: Address) -> Result<Amount> {
        self.handle.balance_of(account).await
    }

    /// Remaining allowance of `spender` over `owner`'s balance
    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<Amount> {
        self.handle.allowance(owner, spender).await
    }

    /// Fixed total supply
    pub fn total_supply(&self) -> Amount {
        self.metadata.total_supply
    }

    /// Token name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Token symbol
    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    /// Decimal places
    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    /// Full metadata
    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    /// Whole notification log in commit order
    pub async fn events(&self) -> Result<Vec<LedgerEvent>> {
        self.handle.events_since(0).await
    }

    /// Notifications with `sequence > after`
    pub async fn events_since(&self, after: u64) -> Result<Vec<LedgerEvent>> {
        self.handle.events_since(after).await
    }

    /// Live notifications committed after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.handle.subscribe()
    }

    /// Live notifications as a stream
    ///
    /// A subscriber that falls more than `notification_capacity` events
    /// behind receives a lag error and can catch up with
    /// [`events_since`](Self::events_since).
    pub fn notification_stream(&self) -> BroadcastStream<LedgerEvent> {
        BroadcastStream::new(self.handle.subscribe())
    }

    /// Verify supply conservation and the notification hash chain
    pub async fn check_conservation(&self) -> Result<()> {
        self.handle.audit().await
    }

    /// Copy of metadata, balances and allowances
    pub async fn snapshot(&self) -> Result<StateSnapshot> {
        self.handle.snapshot().await
    }

    /// Accounts holding a nonzero balance
    pub fn holder_count(&self) -> usize {
        usize::try_from(self.metrics.holders.get()).unwrap_or(0)
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        tracing::info!(service = %self.config.service_name, "Shutting down ledger");
        self.handle.shutdown().await
    }
}
