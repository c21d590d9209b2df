//! Ledger state machine
//!
//! The ledger owns the chain of sealed blocks, the pending batch and the
//! balance map. Every mutation goes through `&mut self`; see [`crate::actor`]
//! for sharing one ledger between many callers.
//!
//! # Example
//!
//! ```
//! use chain_core::{Address, KeyPair, Ledger};
//! use rust_decimal::Decimal;
//! use std::collections::HashMap;
//!
//! let alice = KeyPair::from_seed(&[1u8; 32]);
//! let balances = HashMap::from([(alice.address(), Decimal::from(100))]);
//! let mut ledger = Ledger::new(0, balances)?;
//!
//! ledger.submit(&alice, Address::new("bob"), Decimal::from(30), "")?;
//! assert_eq!(ledger.balance_of(&alice.address()), Decimal::from(70));
//! assert_eq!(ledger.pending().len(), 1);
//! # Ok::<(), chain_core::Error>(())
//! ```

use crate::block::{aggregate_root, Block};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, DEFAULT_BATCH_LIMIT};
use crate::crypto::{Address, AddressKeyVerifier, KeyPair, SignatureVerifier};
use crate::hasher::Digest;
use crate::metrics::Metrics;
use crate::transaction::Transaction;
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Outcome of an accepted submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Id hash of the admitted transaction
    pub transaction_id: Digest,
    /// Hash of the block sealed by this submission, if it completed a batch
    pub sealed: Option<Digest>,
}

/// Structural problem found by [`audit_chain`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditFinding {
    /// Block 0 is not a well-formed genesis block
    MalformedGenesis,
    /// Stored header hash does not match the header fields
    HeaderHashMismatch {
        /// Block index
        height: u64,
    },
    /// Root hash does not match the block's transactions
    RootMismatch {
        /// Block index
        height: u64,
    },
    /// `prev_hash` differs from the parent's header hash
    BrokenLink {
        /// Block index
        height: u64,
    },
    /// Timestamp earlier than the parent's
    TimestampRegression {
        /// Block index
        height: u64,
    },
}

impl fmt::Display for AuditFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditFinding::MalformedGenesis => write!(f, "malformed genesis block"),
            AuditFinding::HeaderHashMismatch { height } => {
                write!(f, "block {}: header hash mismatch", height)
            }
            AuditFinding::RootMismatch { height } => write!(f, "block {}: root hash mismatch", height),
            AuditFinding::BrokenLink { height } => write!(f, "block {}: broken prev_hash link", height),
            AuditFinding::TimestampRegression { height } => {
                write!(f, "block {}: timestamp earlier than parent", height)
            }
        }
    }
}

/// Single-writer, in-memory ledger
#[derive(Debug)]
pub struct Ledger {
    /// Sealed blocks, genesis first; append-only
    blocks: Vec<Block>,

    /// Admitted transactions awaiting sealing
    pending: Vec<Transaction>,

    /// `None` until configured; an unconfigured ledger rejects all writes
    balances: Option<HashMap<Address, Decimal>>,

    /// Pending length that triggers a seal
    batch_limit: usize,

    /// Resolves sender keys
    verifier: Box<dyn SignatureVerifier>,

    /// Timestamp source for automatic seals
    clock: Box<dyn Clock>,

    /// Metrics
    metrics: Metrics,
}

impl Ledger {
    /// Create a ledger with a genesis block and initial balances
    pub fn new(genesis_timestamp: u64, balances: HashMap<Address, Decimal>) -> Result<Self> {
        if let Some((address, amount)) = balances.iter().find(|(_, amount)| **amount < Decimal::ZERO) {
            return Err(Error::Config(format!(
                "Initial balance for {} is negative: {}",
                address, amount
            )));
        }

        let mut ledger = Self::unconfigured(genesis_timestamp);
        ledger.balances = Some(balances);
        Ok(ledger)
    }

    /// Create a ledger without balances; it is permanently invalid
    pub fn unconfigured(genesis_timestamp: u64) -> Self {
        Self {
            blocks: vec![Block::genesis(genesis_timestamp)],
            pending: Vec::with_capacity(DEFAULT_BATCH_LIMIT),
            balances: None,
            batch_limit: DEFAULT_BATCH_LIMIT,
            verifier: Box::new(AddressKeyVerifier),
            clock: Box::new(SystemClock),
            metrics: Metrics::default(),
        }
    }

    /// Create from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let ledger = match config.genesis.balance_map() {
            Some(balances) => Self::new(config.genesis.timestamp_ms, balances)?,
            None => Self::unconfigured(config.genesis.timestamp_ms),
        };
        ledger.with_batch_limit(config.batching.batch_limit)
    }

    /// Set the batch limit (must be at least 1)
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Result<Self> {
        if batch_limit == 0 {
            return Err(Error::Config("batch_limit must be at least 1".to_string()));
        }
        self.batch_limit = batch_limit;
        self.pending = Vec::with_capacity(batch_limit);
        Ok(self)
    }

    /// Replace the sender key resolver
    pub fn with_verifier(mut self, verifier: impl SignatureVerifier + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    /// Replace the timestamp source
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the metrics collector
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Whether the ledger was configured with balances
    pub fn is_valid(&self) -> bool {
        self.balances.is_some()
    }

    /// Whether `tx` is authentic and its sender can cover the amount
    ///
    /// Unknown senders count as insufficient funds.
    pub fn validate_transaction(&self, tx: &Transaction) -> bool {
        self.check_transaction(tx).is_ok()
    }

    /// Build, sign and admit a transfer from the key holder's address
    pub fn submit(
        &mut self,
        sender_key: &KeyPair,
        receiver: Address,
        amount: Decimal,
        message: impl Into<String>,
    ) -> Result<Submission> {
        if !self.is_valid() {
            return Err(Error::UninitializedLedger);
        }

        let mut tx = Transaction::new(sender_key.address(), receiver, amount, message)?;
        tx.sign(sender_key)?;
        self.admit(tx)
    }

    /// Admit a transaction built and signed elsewhere
    pub fn submit_signed(&mut self, tx: Transaction) -> Result<Submission> {
        if !self.is_valid() {
            return Err(Error::UninitializedLedger);
        }
        self.admit(tx)
    }

    /// Seal the pending batch into a new block at `timestamp`
    ///
    /// Fails with [`Error::EmptyBatch`] when nothing is pending and with
    /// [`Error::BlockLinkViolation`] when `timestamp` precedes the last
    /// block's; the ledger is unchanged on failure.
    pub fn seal_pending(&mut self, timestamp: u64) -> Result<&Block> {
        if !self.is_valid() {
            return Err(Error::UninitializedLedger);
        }
        if self.pending.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let root_hash = aggregate_root(&self.pending)?;
        let parent_hash = self.last_block().hash();
        let transactions = std::mem::take(&mut self.pending);
        let block = Block::seal(parent_hash, root_hash, timestamp, 0, transactions);

        let parent = self.last_block();
        if !Self::validate_block_link(&block, parent) {
            let parent_timestamp = parent.header().timestamp();
            self.pending = block.into_transactions();
            return Err(Error::BlockLinkViolation(format!(
                "Block timestamp {} precedes parent timestamp {}",
                timestamp, parent_timestamp
            )));
        }

        tracing::info!(
            height = self.blocks.len(),
            block_hash = %block.hash(),
            root_hash = %root_hash,
            tx_count = block.tx_count(),
            "Sealed block"
        );
        self.metrics.record_sealed(block.tx_count());
        self.pending = Vec::with_capacity(self.batch_limit);
        self.blocks.push(block);

        Ok(self.last_block())
    }

    /// Structural link check: hash pointer and non-decreasing timestamp
    pub fn validate_block_link(block: &Block, parent: &Block) -> bool {
        block.header().prev_hash() == parent.hash()
            && block.header().timestamp() >= parent.header().timestamp()
    }

    /// Audit the whole chain; empty when every block checks out
    pub fn audit(&self) -> Vec<AuditFinding> {
        audit_chain(&self.blocks)
    }

    /// Most recent block (genesis when nothing has been sealed)
    pub fn last_block(&self) -> &Block {
        // blocks always holds at least genesis
        &self.blocks[self.blocks.len() - 1]
    }

    /// All sealed blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Pending batch in admission order
    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// Balance map, `None` for an unconfigured ledger
    pub fn balances(&self) -> Option<&HashMap<Address, Decimal>> {
        self.balances.as_ref()
    }

    /// Balance of `address` (zero if absent)
    pub fn balance_of(&self, address: &Address) -> Decimal {
        self.balances
            .as_ref()
            .and_then(|balances| balances.get(address).copied())
            .unwrap_or(Decimal::ZERO)
    }

    /// Index of the last block
    pub fn height(&self) -> u64 {
        (self.blocks.len() - 1) as u64
    }

    /// Pending length that triggers a seal
    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn check_transaction(&self, tx: &Transaction) -> std::result::Result<Digest, String> {
        let balances = self.balances.as_ref().ok_or("Ledger has no configured balances")?;

        let id = tx.id_hash().ok_or("Transaction is unsigned")?;
        if !tx.verify_integrity() {
            return Err("Stored hashes do not match transaction fields".to_string());
        }

        let sender_key = self
            .verifier
            .lookup_public_key(tx.sender())
            .ok_or_else(|| format!("No public key for sender {}", tx.sender()))?;
        if !tx.is_authentic(&sender_key) {
            return Err(format!("Signature does not match sender {}", tx.sender()));
        }

        let available = balances.get(tx.sender()).copied().unwrap_or(Decimal::ZERO);
        if available < tx.amount() {
            return Err(format!(
                "Insufficient funds: {} has {}, needs {}",
                tx.sender(),
                available,
                tx.amount()
            ));
        }

        Ok(id)
    }

    fn admit(&mut self, tx: Transaction) -> Result<Submission> {
        let transaction_id = match self.check_transaction(&tx) {
            Ok(id) => id,
            Err(reason) => {
                tracing::warn!(sender = %tx.sender(), amount = %tx.amount(), %reason, "Rejected transaction");
                self.metrics.record_rejected();
                return Err(Error::InvalidTransaction(reason));
            }
        };

        let undo = self.apply_transfer(&tx)?;
        tracing::debug!(
            id = %transaction_id,
            sender = %tx.sender(),
            receiver = %tx.receiver(),
            amount = %tx.amount(),
            "Admitted transaction"
        );
        self.pending.push(tx);

        let sealed = if self.pending.len() == self.batch_limit {
            let timestamp = self.next_timestamp();
            match self.seal_pending(timestamp).map(|block| block.hash()) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    // seal_pending leaves pending intact on failure
                    self.pending.pop();
                    self.undo_transfer(undo);
                    tracing::error!(error = %e, "Seal failed, admission rolled back");
                    return Err(e);
                }
            }
        } else {
            None
        };
        self.metrics.record_accepted(self.pending.len());

        Ok(Submission {
            transaction_id,
            sealed,
        })
    }

    /// Debit sender and credit receiver; returns the prior entries
    fn apply_transfer(&mut self, tx: &Transaction) -> Result<BalanceUndo> {
        let balances = self.balances.as_mut().ok_or(Error::UninitializedLedger)?;
        let amount = tx.amount();

        // Compute both new balances before touching the map
        let sender_prior = balances.get(tx.sender()).copied();
        let receiver_prior = balances.get(tx.receiver()).copied();
        let debited = sender_prior
            .unwrap_or(Decimal::ZERO)
            .checked_sub(amount)
            .ok_or_else(|| Error::InvalidTransaction("Debit overflow".to_string()))?;
        let receiver_base = if tx.receiver() == tx.sender() {
            debited
        } else {
            receiver_prior.unwrap_or(Decimal::ZERO)
        };
        let credited = receiver_base
            .checked_add(amount)
            .ok_or_else(|| Error::InvalidTransaction("Credit overflow".to_string()))?;

        balances.insert(tx.sender().clone(), debited);
        balances.insert(tx.receiver().clone(), credited);

        Ok(BalanceUndo {
            entries: [
                (tx.sender().clone(), sender_prior),
                (tx.receiver().clone(), receiver_prior),
            ],
        })
    }

    /// Restore the entries captured by [`Ledger::apply_transfer`]
    fn undo_transfer(&mut self, undo: BalanceUndo) {
        let Some(balances) = self.balances.as_mut() else {
            return;
        };
        // Reverse order so a self-transfer ends on the sender's prior entry
        for (address, prior) in undo.entries.into_iter().rev() {
            match prior {
                Some(amount) => balances.insert(address, amount),
                None => balances.remove(&address),
            };
        }
    }

    /// Clock reading, never earlier than the last block
    fn next_timestamp(&self) -> u64 {
        self.clock
            .now_millis()
            .max(self.last_block().header().timestamp())
    }
}

/// Balance entries as they were before a transfer (`None` = absent)
#[derive(Debug)]
struct BalanceUndo {
    entries: [(Address, Option<Decimal>); 2],
}

/// Audit a chain built here or received from elsewhere
///
/// Read-only; reports every finding instead of stopping at the first.
pub fn audit_chain(blocks: &[Block]) -> Vec<AuditFinding> {
    let mut findings = Vec::new();

    let Some(genesis) = blocks.first() else {
        findings.push(AuditFinding::MalformedGenesis);
        return findings;
    };
    if genesis.header().prev_hash() != Digest::ZERO || genesis.tx_count() != 0 {
        findings.push(AuditFinding::MalformedGenesis);
    }

    for (height, block) in blocks.iter().enumerate() {
        let height = height as u64;
        if !block.header().verify_hash() {
            findings.push(AuditFinding::HeaderHashMismatch { height });
        }
        if !block.verify_root() {
            findings.push(AuditFinding::RootMismatch { height });
        }
    }

    for (index, pair) in blocks.windows(2).enumerate() {
        let (parent, block) = (&pair[0], &pair[1]);
        let height = index as u64 + 1;
        if block.header().prev_hash() != parent.hash() {
            findings.push(AuditFinding::BrokenLink { height });
        }
        if block.header().timestamp() < parent.header().timestamp() {
            findings.push(AuditFinding::TimestampRegression { height });
        }
    }

    findings
}
