//! Block headers and sealed blocks

use crate::hasher::{CanonicalHasher, Digest};
use crate::merkle::{MerkleProof, MerkleTree};
use crate::transaction::Transaction;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Chain-link metadata of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    prev_hash: Digest,
    root_hash: Digest,
    timestamp: u64,
    nonce: u64,
    header_hash: Digest,
}

impl BlockHeader {
    /// Build header; `header_hash` is computed here and never again
    pub fn new(prev_hash: Digest, root_hash: Digest, timestamp: u64, nonce: u64) -> Self {
        let header_hash = header_hash(&prev_hash, &root_hash, timestamp, nonce);
        Self {
            prev_hash,
            root_hash,
            timestamp,
            nonce,
            header_hash,
        }
    }

    /// Hash of the previous block ([`Digest::ZERO`] for genesis)
    pub fn prev_hash(&self) -> Digest {
        self.prev_hash
    }

    /// Root over the block's transaction ids
    pub fn root_hash(&self) -> Digest {
        self.root_hash
    }

    /// Milliseconds since Unix epoch
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Placeholder, always 0 without proof-of-work
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Digest over (prev_hash, root_hash, timestamp, nonce)
    pub fn header_hash(&self) -> Digest {
        self.header_hash
    }

    /// Whether the stored header hash matches the fields
    pub fn verify_hash(&self) -> bool {
        self.header_hash == header_hash(&self.prev_hash, &self.root_hash, self.timestamp, self.nonce)
    }
}

fn header_hash(prev_hash: &Digest, root_hash: &Digest, timestamp: u64, nonce: u64) -> Digest {
    CanonicalHasher::new()
        .write_digest(prev_hash)
        .write_digest(root_hash)
        .write_uint(timestamp as u128)
        .write_uint(nonce as u128)
        .finish()
}

/// Sealed block: header plus its transactions in admission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble a block; no validation against chain state
    pub fn seal(
        prev_hash: Digest,
        root_hash: Digest,
        timestamp: u64,
        nonce: u64,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            header: BlockHeader::new(prev_hash, root_hash, timestamp, nonce),
            transactions,
        }
    }

    /// Block 0: no transactions, zero prev and root hashes
    pub fn genesis(timestamp: u64) -> Self {
        Self::seal(Digest::ZERO, Digest::ZERO, timestamp, 0, Vec::new())
    }

    /// Header
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Transactions in admission order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Take the transactions back out of the block
    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    /// Number of transactions
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Shorthand for `header().header_hash()`
    pub fn hash(&self) -> Digest {
        self.header.header_hash
    }

    /// Recompute the root from the transactions and compare with the header
    ///
    /// Read-only; an empty block is consistent only with [`Digest::ZERO`].
    pub fn verify_root(&self) -> bool {
        if self.transactions.is_empty() {
            return self.header.root_hash == Digest::ZERO;
        }
        aggregate_root(&self.transactions)
            .map(|root| root == self.header.root_hash)
            .unwrap_or(false)
    }

    /// Inclusion proof for the transaction at `index`
    pub fn inclusion_proof(&self, index: usize) -> Option<MerkleProof> {
        let tree = MerkleTree::from_leaves(transaction_ids(&self.transactions).ok()?).ok()?;
        tree.generate_proof(index)
    }

    /// Encode with bincode
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode with bincode
    ///
    /// Rejects blocks whose header hash or transaction hashes do not match
    /// their fields. The root commitment is left to [`Block::verify_root`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let block: Block = bincode::deserialize(bytes)?;
        if !block.header.verify_hash() {
            return Err(Error::BlockLinkViolation(
                "Stored header hash does not match header fields".to_string(),
            ));
        }
        if let Some(index) = block.transactions.iter().position(|tx| !tx.verify_integrity()) {
            return Err(Error::InvalidTransaction(format!(
                "Transaction {} in block {} fails integrity check",
                index,
                block.hash()
            )));
        }
        Ok(block)
    }
}

/// Aggregate the id-hashes of `transactions` into one root
///
/// Balanced Merkle tree, see [`crate::merkle`]. Fails with
/// [`Error::EmptyBatch`] for zero transactions and
/// [`Error::InvalidTransaction`] if any transaction is unsigned.
pub fn aggregate_root(transactions: &[Transaction]) -> Result<Digest> {
    MerkleTree::from_leaves(transaction_ids(transactions)?).map(|tree| tree.root())
}

fn transaction_ids(transactions: &[Transaction]) -> Result<Vec<Digest>> {
    transactions
        .iter()
        .map(|tx| {
            tx.id_hash()
                .ok_or_else(|| Error::InvalidTransaction("Unsigned transaction in batch".to_string()))
        })
        .collect()
}
