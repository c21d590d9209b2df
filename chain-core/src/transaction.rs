//! Signed value-transfer transactions
//!
//! A transaction carries two identities:
//! - `content_hash` over (sender, receiver, amount, message), fixed at
//!   construction and the message that gets signed
//! - `id_hash` over (sender, receiver, amount, signature, message), fixed
//!   exactly once when the transaction is signed
//!
//! Neither hash is ever recomputed in place.

use crate::crypto::{Address, KeyPair, PublicKey, Signature};
use crate::hasher::{CanonicalHasher, Digest};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Value transfer between two addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    sender: Address,
    receiver: Address,
    amount: Decimal,
    #[serde(default)]
    message: String,
    signature: Option<Signature>,
    content_hash: Digest,
    id_hash: Option<Digest>,
}

impl Transaction {
    /// Build an unsigned transaction
    pub fn new(
        sender: Address,
        receiver: Address,
        amount: Decimal,
        message: impl Into<String>,
    ) -> Result<Self> {
        if amount < Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }

        let message = message.into();
        let content_hash = content_hash(&sender, &receiver, &amount, &message);

        Ok(Self {
            sender,
            receiver,
            amount,
            message,
            signature: None,
            content_hash,
            id_hash: None,
        })
    }

    /// Sign with `keypair`
    ///
    /// Fails with [`Error::AlreadySigned`] if a signature is already present;
    /// the transaction is left untouched in that case.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<()> {
        if self.signature.is_some() {
            return Err(Error::AlreadySigned);
        }

        let signature = keypair.sign(self.content_hash.as_bytes());
        self.id_hash = Some(id_hash(
            &self.sender,
            &self.receiver,
            &self.amount,
            &signature,
            &self.message,
        ));
        self.signature = Some(signature);

        Ok(())
    }

    /// Whether a signature is present
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Check the signature against the sender's public key
    ///
    /// Returns `false` for unsigned transactions, for fields that no longer
    /// match the stored hashes and for any verification failure; never errors.
    pub fn is_authentic(&self, sender_key: &PublicKey) -> bool {
        match &self.signature {
            Some(signature) if self.verify_integrity() => {
                sender_key.verify(self.content_hash.as_bytes(), signature)
            }
            _ => false,
        }
    }

    /// Recompute both hashes from the fields and compare with the stored ones
    pub fn verify_integrity(&self) -> bool {
        let content = content_hash(&self.sender, &self.receiver, &self.amount, &self.message);
        if content != self.content_hash {
            return false;
        }

        match (&self.signature, &self.id_hash) {
            (None, None) => true,
            (Some(signature), Some(stored)) => {
                *stored == id_hash(&self.sender, &self.receiver, &self.amount, signature, &self.message)
            }
            _ => false,
        }
    }

    /// Encode with bincode
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode with bincode, rejecting tampered hashes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let tx: Transaction = bincode::deserialize(bytes)?;
        if !tx.verify_integrity() {
            return Err(Error::InvalidTransaction(
                "Stored hashes do not match transaction fields".to_string(),
            ));
        }
        Ok(tx)
    }

    /// Sender address
    pub fn sender(&self) -> &Address {
        &self.sender
    }

    /// Receiver address
    pub fn receiver(&self) -> &Address {
        &self.receiver
    }

    /// Transfer amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Annotation (empty by default)
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Signature, once signed
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Digest over the unsigned content
    pub fn content_hash(&self) -> Digest {
        self.content_hash
    }

    /// Canonical identity, once signed
    pub fn id_hash(&self) -> Option<Digest> {
        self.id_hash
    }
}

fn content_hash(sender: &Address, receiver: &Address, amount: &Decimal, message: &str) -> Digest {
    CanonicalHasher::new()
        .write_str(sender.as_str())
        .write_str(receiver.as_str())
        .write_decimal(amount)
        .write_str(message)
        .finish()
}

fn id_hash(
    sender: &Address,
    receiver: &Address,
    amount: &Decimal,
    signature: &Signature,
    message: &str,
) -> Digest {
    CanonicalHasher::new()
        .write_str(sender.as_str())
        .write_str(receiver.as_str())
        .write_decimal(amount)
        .write_bytes(signature.as_bytes())
        .write_str(message)
        .finish()
}
