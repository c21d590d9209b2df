//! Actor-based concurrency for the ledger
//!
//! One tokio task owns the [`Ledger`]; every caller talks to it through a
//! cloneable [`LedgerHandle`]. Commands are processed one at a time, so a
//! submission's validate → debit/credit → buffer → seal sequence is never
//! interleaved with another submission.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                   │
//! │   builds + signs transactions on the caller's task   │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)               │
//! │   Ledger::submit_signed / seal_pending / reads       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Private keys never cross the channel: [`LedgerHandle::submit`] signs
//! locally and sends the signed transaction.

use crate::block::Block;
use crate::crypto::{Address, KeyPair};
use crate::ledger::{AuditFinding, Ledger, Submission};
use crate::transaction::Transaction;
use crate::{Error, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::ops::ControlFlow;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Admit a signed transaction
    SubmitSigned {
        /// Transaction to admit
        tx: Transaction,
        /// Reply channel
        response: oneshot::Sender<Result<Submission>>,
    },

    /// Seal the pending batch
    SealPending {
        /// Block timestamp (ms)
        timestamp: u64,
        /// Reply channel
        response: oneshot::Sender<Result<Block>>,
    },

    /// Balance of one address
    GetBalance {
        /// Address to look up
        address: Address,
        /// Reply channel
        response: oneshot::Sender<Decimal>,
    },

    /// Snapshot of all balances
    GetBalances {
        /// Reply channel
        response: oneshot::Sender<Option<HashMap<Address, Decimal>>>,
    },

    /// Most recent block
    GetLastBlock {
        /// Reply channel
        response: oneshot::Sender<Block>,
    },

    /// Blocks from `start` height onwards
    GetBlocks {
        /// First height to return
        start: usize,
        /// Reply channel
        response: oneshot::Sender<Vec<Block>>,
    },

    /// Pending batch length
    GetPendingLen {
        /// Reply channel
        response: oneshot::Sender<usize>,
    },

    /// Run a chain audit
    Audit {
        /// Reply channel
        response: oneshot::Sender<Vec<AuditFinding>>,
    },

    /// Whether the ledger is configured
    IsValid {
        /// Reply channel
        response: oneshot::Sender<bool>,
    },

    /// Stop the actor and hand the ledger back
    Shutdown {
        /// Reply channel
        response: oneshot::Sender<Ledger>,
    },
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    /// Owned ledger
    ledger: Ledger,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(ledger: Ledger, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let ControlFlow::Break(response) = self.handle_message(msg) {
                tracing::info!(
                    height = self.ledger.height(),
                    pending = self.ledger.pending().len(),
                    "Ledger actor shutting down"
                );
                let _ = response.send(self.ledger);
                return;
            }
        }

        tracing::debug!("Ledger mailbox closed");
    }

    /// Handle a single message; breaks with the reply channel on shutdown
    fn handle_message(&mut self, msg: LedgerMessage) -> ControlFlow<oneshot::Sender<Ledger>> {
        match msg {
            LedgerMessage::SubmitSigned { tx, response } => {
                let _ = response.send(self.ledger.submit_signed(tx));
            }

            LedgerMessage::SealPending { timestamp, response } => {
                let result = self.ledger.seal_pending(timestamp).map(Block::clone);
                let _ = response.send(result);
            }

            LedgerMessage::GetBalance { address, response } => {
                let _ = response.send(self.ledger.balance_of(&address));
            }

            LedgerMessage::GetBalances { response } => {
                let _ = response.send(self.ledger.balances().cloned());
            }

            LedgerMessage::GetLastBlock { response } => {
                let _ = response.send(self.ledger.last_block().clone());
            }

            LedgerMessage::GetBlocks { start, response } => {
                let blocks = self.ledger.blocks();
                let _ = response.send(blocks[start.min(blocks.len())..].to_vec());
            }

            LedgerMessage::GetPendingLen { response } => {
                let _ = response.send(self.ledger.pending().len());
            }

            LedgerMessage::Audit { response } => {
                let _ = response.send(self.ledger.audit());
            }

            LedgerMessage::IsValid { response } => {
                let _ = response.send(self.ledger.is_valid());
            }

            LedgerMessage::Shutdown { response } => return ControlFlow::Break(response),
        }

        ControlFlow::Continue(())
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Build and sign a transfer locally, then admit it
    pub async fn submit(
        &self,
        sender_key: &KeyPair,
        receiver: Address,
        amount: Decimal,
        message: impl Into<String>,
    ) -> Result<Submission> {
        let mut tx = Transaction::new(sender_key.address(), receiver, amount, message)?;
        tx.sign(sender_key)?;
        self.submit_signed(tx).await
    }

    /// Admit a signed transaction
    pub async fn submit_signed(&self, tx: Transaction) -> Result<Submission> {
        self.request(|response| LedgerMessage::SubmitSigned { tx, response })
            .await?
    }

    /// Seal the pending batch at `timestamp`
    pub async fn seal_pending(&self, timestamp: u64) -> Result<Block> {
        self.request(|response| LedgerMessage::SealPending { timestamp, response })
            .await?
    }

    /// Balance of `address`
    pub async fn balance_of(&self, address: Address) -> Result<Decimal> {
        self.request(|response| LedgerMessage::GetBalance { address, response })
            .await
    }

    /// Snapshot of all balances
    pub async fn balances(&self) -> Result<Option<HashMap<Address, Decimal>>> {
        self.request(|response| LedgerMessage::GetBalances { response })
            .await
    }

    /// Most recent block
    pub async fn last_block(&self) -> Result<Block> {
        self.request(|response| LedgerMessage::GetLastBlock { response })
            .await
    }

    /// Blocks from height `start` onwards
    pub async fn blocks_from(&self, start: usize) -> Result<Vec<Block>> {
        self.request(|response| LedgerMessage::GetBlocks { start, response })
            .await
    }

    /// Pending batch length
    pub async fn pending_len(&self) -> Result<usize> {
        self.request(|response| LedgerMessage::GetPendingLen { response })
            .await
    }

    /// Run a chain audit
    pub async fn audit(&self) -> Result<Vec<AuditFinding>> {
        self.request(|response| LedgerMessage::Audit { response })
            .await
    }

    /// Whether the ledger is configured
    pub async fn is_valid(&self) -> Result<bool> {
        self.request(|response| LedgerMessage::IsValid { response })
            .await
    }

    /// Stop the actor and take the ledger back
    pub async fn shutdown(&self) -> Result<Ledger> {
        self.request(|response| LedgerMessage::Shutdown { response })
            .await
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
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(ledger: Ledger, mailbox_capacity: usize) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1)); // Bounded channel for backpressure
    let actor = LedgerActor::new(ledger, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn funded_ledger(keys: &[&KeyPair], batch_limit: usize) -> Ledger {
        let balances = keys
            .iter()
            .map(|key| (key.address(), Decimal::from(100)))
            .collect();
        Ledger::new(0, balances)
            .unwrap()
            .with_batch_limit(batch_limit)
            .unwrap()
            .with_clock(ManualClock::new(1))
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let handle = spawn_ledger_actor(Ledger::unconfigured(0), 16);

        assert!(!handle.is_valid().await.unwrap());
        let ledger = handle.shutdown().await.unwrap();
        assert_eq!(ledger.height(), 0);

        // Mailbox is gone after shutdown
        assert!(matches!(handle.pending_len().await, Err(Error::Concurrency(_))));
    }

    #[tokio::test]
    async fn test_shutdown_from_clone_returns_current_state() {
        let alice = KeyPair::from_seed(&[1u8; 32]);
        let handle = spawn_ledger_actor(funded_ledger(&[&alice], 10), 16);
        let other = handle.clone();

        handle
            .submit(&alice, Address::new("bob"), Decimal::from(10), "")
            .await
            .unwrap();

        let ledger = other.shutdown().await.unwrap();
        assert_eq!(ledger.pending().len(), 1);
        assert_eq!(ledger.balance_of(&Address::new("bob")), Decimal::from(10));
        assert!(matches!(handle.is_valid().await, Err(Error::Concurrency(_))));
    }

    #[tokio::test]
    async fn test_actor_submit_and_seal() {
        let alice = KeyPair::from_seed(&[1u8; 32]);
        let handle = spawn_ledger_actor(funded_ledger(&[&alice], 2), 16);

        let first = handle
            .submit(&alice, Address::new("bob"), Decimal::from(10), "")
            .await
            .unwrap();
        assert!(first.sealed.is_none());
        assert_eq!(handle.pending_len().await.unwrap(), 1);

        let second = handle
            .submit(&alice, Address::new("bob"), Decimal::from(10), "")
            .await
            .unwrap();
        let last = handle.last_block().await.unwrap();
        assert_eq!(second.sealed, Some(last.hash()));
        assert_eq!(handle.pending_len().await.unwrap(), 0);

        assert_eq!(handle.balance_of(alice.address()).await.unwrap(), Decimal::from(80));
        assert_eq!(handle.balance_of(Address::new("bob")).await.unwrap(), Decimal::from(20));
        assert_eq!(handle.blocks_from(0).await.unwrap().len(), 2);
        assert_eq!(handle.blocks_from(5).await.unwrap().len(), 0);
        assert!(handle.audit().await.unwrap().is_empty());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_manual_seal_and_errors() {
        let alice = KeyPair::from_seed(&[1u8; 32]);
        let handle = spawn_ledger_actor(funded_ledger(&[&alice], 10), 16);

        assert!(matches!(handle.seal_pending(5).await, Err(Error::EmptyBatch)));
        assert!(matches!(
            handle.submit(&alice, Address::new("bob"), Decimal::from(1000), "").await,
            Err(Error::InvalidTransaction(_))
        ));

        handle
            .submit(&alice, Address::new("bob"), Decimal::from(1), "")
            .await
            .unwrap();
        let block = handle.seal_pending(5).await.unwrap();
        assert_eq!(block.tx_count(), 1);

        let ledger = handle.shutdown().await.unwrap();
        assert_eq!(ledger.blocks().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_never_overdraw() {
        let alice = KeyPair::from_seed(&[1u8; 32]);
        let handle = spawn_ledger_actor(funded_ledger(&[&alice], 7), 64);

        // 50 concurrent transfers of 3 against a balance of 100: exactly 33 fit
        let mut tasks = Vec::new();
        for i in 0..50 {
            let handle = handle.clone();
            let key = KeyPair::from_seed(&[1u8; 32]);
            tasks.push(tokio::spawn(async move {
                handle
                    .submit(&key, Address::new(format!("r{}", i)), Decimal::from(3), "")
                    .await
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 33);
        assert_eq!(handle.balance_of(alice.address()).await.unwrap(), Decimal::from(1));

        let ledger = handle.shutdown().await.unwrap();
        let sealed: usize = ledger.blocks().iter().map(Block::tx_count).sum();
        assert_eq!(sealed + ledger.pending().len(), 33);
        assert_eq!(ledger.blocks().len(), 1 + 33 / 7);
        assert!(ledger.audit().is_empty());
    }
}
