//! Cryptographic operations for the chain
//!
//! This module provides:
//! - Ed25519 key pair generation and signing
//! - Addresses derived from public keys (lowercase hex)
//! - The [`SignatureVerifier`] seam the ledger uses to resolve sender keys

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Ed25519 signature length in bytes
pub const SIGNATURE_LENGTH: usize = 64;

/// Participant identifier
///
/// For key-holding participants this is the hex encoding of the public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Create address from any identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive address from a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(hex::encode(public_key.to_bytes()))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the public key this address encodes, if it encodes one
    pub fn public_key(&self) -> Option<PublicKey> {
        let bytes: [u8; 32] = hex::decode(&self.0).ok()?.try_into().ok()?;
        PublicKey::from_bytes(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Ed25519 public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parse from raw bytes; `None` if the bytes are not a valid point
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        VerifyingKey::from_bytes(bytes).ok().map(Self)
    }

    /// Raw key bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Verify a signature over `message`. Never panics or errors.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature.as_bytes()) else {
            return false;
        };
        let dalek_sig = DalekSignature::from_bytes(&bytes);
        self.0.verify(message, &dalek_sig).is_ok()
    }
}

/// Detached signature bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "serde_bytes")] Vec<u8>);

impl Signature {
    /// Create from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Ed25519 key pair for signing
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let public_key = PublicKey(signing_key.verifying_key());

        Self {
            signing_key,
            public_key,
        }
    }

    /// Public half
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Address derived from the public key
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Resolves the public key that must have signed for a sender address
pub trait SignatureVerifier: Send + Sync + fmt::Debug {
    /// Public key for `address`, or `None` if it cannot sign
    fn lookup_public_key(&self, address: &Address) -> Option<PublicKey>;
}

/// Treats every address as the hex encoding of its own public key
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressKeyVerifier;

impl SignatureVerifier for AddressKeyVerifier {
    fn lookup_public_key(&self, address: &Address) -> Option<PublicKey> {
        address.public_key()
    }
}

/// Explicit address → key registry, for labelled (non-hex) addresses
///
/// Addresses without an entry fall back to hex decoding.
#[derive(Debug, Clone, Default)]
pub struct KeyDirectory {
    keys: HashMap<Address, PublicKey>,
}

impl KeyDirectory {
    /// Create empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `address` to `public_key`, replacing any previous binding
    pub fn register(&mut self, address: impl Into<Address>, public_key: PublicKey) {
        self.keys.insert(address.into(), public_key);
    }

    /// Number of registered bindings
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if directory is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl SignatureVerifier for KeyDirectory {
    fn lookup_public_key(&self, address: &Address) -> Option<PublicKey> {
        self.keys
            .get(address)
            .copied()
            .or_else(|| address.public_key())
    }
}
