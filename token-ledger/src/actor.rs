//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One task owns [`TokenState`]; nothing else can reach the tables
//! - Each request is validated and applied to completion before the next
//! - Notifications are broadcast only after their mutation is committed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ TokenState: balances, allowances, EventLog     │  │
//! │  └────────────────────────────────────────────────┘  │
//! │                       │                               │
//! │                       ▼                               │
//! │         broadcast::Sender<LedgerEvent>                │
//! │          (live notification subscribers)              │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::events::{LedgerEvent, Operation};
use crate::metrics::Metrics;
use crate::state::{StateSnapshot, TokenState};
use crate::types::{Address, Amount};
use crate::{Error, Result};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Direct transfer
    Transfer {
        sender: Address,
        recipient: Address,
        amount: Amount,
        response: oneshot::Sender<Result<LedgerEvent>>,
    },

    /// Allowance grant
    Approve {
        owner: Address,
        spender: Address,
        amount: Amount,
        response: oneshot::Sender<Result<LedgerEvent>>,
    },

    /// Delegated transfer
    TransferFrom {
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: Amount,
        response: oneshot::Sender<Result<LedgerEvent>>,
    },

    /// Read a balance
    BalanceOf {
        account: Address,
        response: oneshot::Sender<Amount>,
    },

    /// Read an allowance
    Allowance {
        owner: Address,
        spender: Address,
        response: oneshot::Sender<Amount>,
    },

    /// Read notifications with `sequence > after`
    Events {
        after: u64,
        response: oneshot::Sender<Vec<LedgerEvent>>,
    },

    /// Recompute supply conservation and the log hash chain
    Audit {
        response: oneshot::Sender<Result<()>>,
    },

    /// Copy metadata and tables
    Snapshot {
        response: oneshot::Sender<StateSnapshot>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    /// Ledger state (exclusively owned)
    state: TokenState,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Live notification fan-out
    notifications: broadcast::Sender<LedgerEvent>,

    /// Metrics
    metrics: Metrics,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        state: TokenState,
        mailbox: mpsc::Receiver<LedgerMessage>,
        notifications: broadcast::Sender<LedgerEvent>,
        metrics: Metrics,
    ) -> Self {
        metrics.update_holders(state.holder_count());
        Self {
            state,
            mailbox,
            notifications,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let LedgerMessage::Shutdown = msg {
                tracing::info!(
                    events = self.state.log().len(),
                    "Ledger actor shutting down"
                );
                break;
            }
            self.handle_message(msg);
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Transfer {
                sender,
                recipient,
                amount,
                response,
            } => {
                let started = Instant::now();
                let result = self
                    .state
                    .transfer(sender, recipient, amount)
                    .cloned();
                let result = self.commit(Operation::Transfer, started, result);
                let _ = response.send(result);
            }

            LedgerMessage::Approve {
                owner,
                spender,
                amount,
                response,
            } => {
                let started = Instant::now();
                let result = self
                    .state
                    .approve(owner, spender, amount)
                    .cloned();
                let result = self.commit(Operation::Approve, started, result);
                let _ = response.send(result);
            }

            LedgerMessage::TransferFrom {
                spender,
                owner,
                recipient,
                amount,
                response,
            } => {
                let started = Instant::now();
                let result = self
                    .state
                    .transfer_from(spender, owner, recipient, amount)
                    .cloned();
                let result = self.commit(Operation::TransferFrom, started, result);
                let _ = response.send(result);
            }

            LedgerMessage::BalanceOf { account, response } => {
                let _ = response.send(self.state.balance_of(account));
            }

            LedgerMessage::Allowance {
                owner,
                spender,
                response,
            } => {
                let _ = response.send(self.state.allowance(owner, spender));
            }

            LedgerMessage::Events { after, response } => {
                let _ = response.send(self.state.log().since(after).to_vec());
            }

            LedgerMessage::Audit { response } => {
                let result = self
                    .state
                    .check_conservation()
                    .and_then(|_| self.state.log().verify_chain());
                if let Err(ref e) = result {
                    tracing::error!("Ledger audit failed: {}", e);
                }
                let _ = response.send(result);
            }

            LedgerMessage::Snapshot { response } => {
                let _ = response.send(self.state.snapshot());
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Publish an accepted mutation, or account for a rejected one
    fn commit(
        &self,
        operation: Operation,
        started: Instant,
        result: Result<LedgerEvent>,
    ) -> Result<LedgerEvent> {
        match result {
            Ok(event) => {
                self.metrics
                    .record_operation(operation.as_str(), started.elapsed().as_secs_f64());
                self.metrics.update_holders(self.state.holder_count());
                tracing::debug!(
                    sequence = event.sequence,
                    operation = %operation,
                    event = event.kind.name(),
                    "Mutation committed"
                );
                // No subscribers is fine; the log already holds the event.
                let _ = self.notifications.send(event.clone());
                Ok(event)
            }
            Err(e) => {
                self.metrics.record_rejection(e.reason());
                tracing::warn!(
                    operation = %operation,
                    reason = e.reason(),
                    "Mutation rejected: {}",
                    e
                );
                Err(e)
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
    notifications: broadcast::Sender<LedgerEvent>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(
        sender: mpsc::Sender<LedgerMessage>,
        notifications: broadcast::Sender<LedgerEvent>,
    ) -> Self {
        Self {
            sender,
            notifications,
        }
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(message(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Direct transfer
    pub async fn transfer(
        &self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.request(|response| LedgerMessage::Transfer {
            sender,
            recipient,
            amount,
            response,
        })
        .await?
    }

    /// Allowance grant
    pub async fn approve(
        &self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.request(|response| LedgerMessage::Approve {
            owner,
            spender,
            amount,
            response,
        })
        .await?
    }

    /// Delegated transfer
    pub async fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.request(|response| LedgerMessage::TransferFrom {
            spender,
            owner,
            recipient,
            amount,
            response,
        })
        .await?
    }

    /// Read a balance
    pub async fn balance_of(&self, account: Address) -> Result<Amount> {
        self.request(|response| LedgerMessage::BalanceOf { account, response })
            .await
    }

    /// Read an allowance
    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<Amount> {
        self.request(|response| LedgerMessage::Allowance {
            owner,
            spender,
            response,
        })
        .await
    }

    /// Read notifications with `sequence > after`
    pub async fn events_since(&self, after: u64) -> Result<Vec<LedgerEvent>> {
        self.request(|response| LedgerMessage::Events { after, response })
            .await
    }

    /// Audit conservation and the log hash chain
    pub async fn audit(&self) -> Result<()> {
        self.request(|response| LedgerMessage::Audit { response })
            .await?
    }

    /// Copy metadata and tables
    pub async fn snapshot(&self) -> Result<StateSnapshot> {
        self.request(|response| LedgerMessage::Snapshot { response })
            .await
    }

    /// Subscribe to notifications committed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.notifications.subscribe()
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    state: TokenState,
    mailbox_capacity: usize,
    notification_capacity: usize,
    metrics: Metrics,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let (notifications, _) = broadcast::channel(notification_capacity);
    let actor = LedgerActor::new(state, rx, notifications.clone(), metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx, notifications)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(n: u128) -> Amount {
        Amount::from_tokens(n).unwrap()
    }

    fn spawn(deployer: Address) -> (LedgerHandle, Metrics) {
        let metrics = Metrics::new().unwrap();
        let handle = spawn_ledger_actor(TokenState::deploy(deployer), 16, 16, metrics.clone());
        (handle, metrics)
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (handle, _) = spawn(Address::from_low_u64(1));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_transfer_and_read() {
        let deployer = Address::from_low_u64(1);
        let receiver = Address::from_low_u64(2);
        let (handle, metrics) = spawn(deployer);

        let event = handle.transfer(deployer, receiver, tokens(100)).await.unwrap();
        assert_eq!(event.sequence, 1);

        assert_eq!(handle.balance_of(receiver).await.unwrap(), tokens(100));
        assert_eq!(handle.events_since(0).await.unwrap(), vec![event]);
        assert_eq!(
            metrics.operations_total.with_label_values(&["transfer"]).get(),
            1
        );
        assert_eq!(metrics.holders.get(), 2);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_rejection_is_counted() {
        let deployer = Address::from_low_u64(1);
        let (handle, metrics) = spawn(deployer);

        let err = handle
            .transfer(deployer, Address::ZERO, tokens(1))
            .await
            .unwrap_err();
        assert_eq!(err, Error::InvalidRecipient(Address::ZERO));
        assert_eq!(
            metrics
                .rejections_total
                .with_label_values(&["invalid_recipient"])
                .get(),
            1
        );
        assert!(handle.events_since(0).await.unwrap().is_empty());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_sees_committed_events_only() {
        let deployer = Address::from_low_u64(1);
        let exchange = Address::from_low_u64(3);
        let (handle, _) = spawn(deployer);
        let mut notifications = handle.subscribe();

        handle
            .approve(deployer, Address::ZERO, tokens(1))
            .await
            .unwrap_err();
        let committed = handle.approve(deployer, exchange, tokens(1)).await.unwrap();

        let received = notifications.recv().await.unwrap();
        assert_eq!(received, committed);
        assert!(notifications.try_recv().is_err());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_fail() {
        let (handle, _) = spawn(Address::from_low_u64(1));
        handle.shutdown().await.unwrap();

        // Give the actor a chance to drop its mailbox
        tokio::task::yield_now().await;
        for _ in 0..100 {
            if handle.balance_of(Address::ZERO).await.is_err() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("actor kept answering after shutdown");
    }
}
