//! Canonical hashing for chain identities
//!
//! Every transaction and block identity is a SHA-256 digest over an ordered
//! sequence of typed fields. The byte layout of each field is fixed:
//!
//! | field   | tag    | body                                      |
//! |---------|--------|-------------------------------------------|
//! | string  | `0x01` | u64 BE length, UTF-8 bytes                |
//! | integer | `0x02` | 32 bytes big-endian (u128, zero-padded)   |
//! | bytes   | `0x03` | u64 BE length, raw bytes                  |
//!
//! Tags and length prefixes keep the encoding injective, so hashing
//! `(a, b)` differs from `(b, a)` and `("ab", "c")` differs from `("a", "bc")`.

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Width of an encoded integer field, in bytes.
pub const INT_WIDTH: usize = 32;

const TAG_STR: u8 = 0x01;
const TAG_UINT: u8 = 0x02;
const TAG_BYTES: u8 = 0x03;

/// 32-byte SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Genesis sentinel (all zeroes)
    pub const ZERO: Digest = Digest([0u8; 32]);

    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

/// A single hashable field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// UTF-8 string
    Str(String),
    /// Unsigned integer, encoded at [`INT_WIDTH`] bytes
    Uint(u128),
    /// Raw byte string
    Bytes(Vec<u8>),
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Str(s.to_string())
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Field::Str(s)
    }
}

impl From<u64> for Field {
    fn from(n: u64) -> Self {
        Field::Uint(n as u128)
    }
}

impl From<u128> for Field {
    fn from(n: u128) -> Self {
        Field::Uint(n)
    }
}

impl From<Vec<u8>> for Field {
    fn from(bytes: Vec<u8>) -> Self {
        Field::Bytes(bytes)
    }
}

impl TryFrom<&serde_json::Value> for Field {
    type Error = Error;

    fn try_from(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        match value {
            Value::String(s) => Ok(Field::Str(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .map(Field::from)
                .ok_or_else(|| Error::UnsupportedFieldType(format!("number {}", n))),
            Value::Null => Err(Error::UnsupportedFieldType("null".to_string())),
            Value::Bool(_) => Err(Error::UnsupportedFieldType("bool".to_string())),
            Value::Array(_) => Err(Error::UnsupportedFieldType("array".to_string())),
            Value::Object(_) => Err(Error::UnsupportedFieldType("object".to_string())),
        }
    }
}

/// Incremental canonical hasher
#[derive(Clone)]
pub struct CanonicalHasher {
    inner: Sha256,
}

impl CanonicalHasher {
    /// Create new hasher
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Write string field
    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write_tagged(TAG_STR, s.as_bytes())
    }

    /// Write integer field
    pub fn write_uint(&mut self, n: u128) -> &mut Self {
        let mut body = [0u8; INT_WIDTH];
        body[INT_WIDTH - 16..].copy_from_slice(&n.to_be_bytes());
        self.inner.update([TAG_UINT]);
        self.inner.update(body);
        self
    }

    /// Write byte-string field
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_tagged(TAG_BYTES, bytes)
    }

    /// Write a decimal amount as its normalized string form
    pub fn write_decimal(&mut self, d: &Decimal) -> &mut Self {
        self.write_str(&d.normalize().to_string())
    }

    /// Write a precomputed digest as a byte-string field
    pub fn write_digest(&mut self, digest: &Digest) -> &mut Self {
        self.write_bytes(digest.as_bytes())
    }

    /// Write any field
    pub fn write_field(&mut self, field: &Field) -> &mut Self {
        match field {
            Field::Str(s) => self.write_str(s),
            Field::Uint(n) => self.write_uint(*n),
            Field::Bytes(b) => self.write_bytes(b),
        }
    }

    fn write_tagged(&mut self, tag: u8, body: &[u8]) -> &mut Self {
        self.inner.update([tag]);
        self.inner.update((body.len() as u64).to_be_bytes());
        self.inner.update(body);
        self
    }

    /// Finalize into a digest
    pub fn finish(&self) -> Digest {
        Digest(self.inner.clone().finalize().into())
    }
}

impl fmt::Debug for CanonicalHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalHasher").finish_non_exhaustive()
    }
}

impl Default for CanonicalHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash an ordered sequence of fields
pub fn hash_fields(fields: &[Field]) -> Digest {
    let mut hasher = CanonicalHasher::new();
    for field in fields {
        hasher.write_field(field);
    }
    hasher.finish()
}

/// Hash an ordered sequence of dynamically typed values
///
/// Only strings and non-negative integers are accepted; anything else
/// fails with [`Error::UnsupportedFieldType`].
pub fn hash_values(values: &[serde_json::Value]) -> Result<Digest> {
    let fields = values
        .iter()
        .map(Field::try_from)
        .collect::<Result<Vec<_>>>()?;
    Ok(hash_fields(&fields))
}

/// Hash two digests as an interior tree node (`0x01 || left || right`)
pub fn hash_node(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deterministic() {
        let fields = vec![Field::from("alice"), Field::from(42u64), Field::from(vec![1, 2, 3])];
        assert_eq!(hash_fields(&fields), hash_fields(&fields));
    }

    #[test]
    fn test_order_sensitive() {
        let ab = hash_fields(&[Field::from("a"), Field::from("b")]);
        let ba = hash_fields(&[Field::from("b"), Field::from("a")]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_boundaries_are_unambiguous() {
        let left = hash_fields(&[Field::from("ab"), Field::from("c")]);
        let right = hash_fields(&[Field::from("a"), Field::from("bc")]);
        assert_ne!(left, right);
    }

    #[test]
    fn test_types_are_distinguished() {
        let as_str = hash_fields(&[Field::from("7")]);
        let as_int = hash_fields(&[Field::from(7u64)]);
        let as_bytes = hash_fields(&[Field::from(b"7".to_vec())]);
        assert_ne!(as_str, as_int);
        assert_ne!(as_str, as_bytes);
        assert_ne!(as_int, as_bytes);
    }

    #[test]
    fn test_integer_width_is_fixed() {
        // u64 and u128 constructors of the same value encode identically
        assert_eq!(
            hash_fields(&[Field::from(5u64)]),
            hash_fields(&[Field::from(5u128)])
        );
    }

    #[test]
    fn test_decimal_is_normalized() {
        let mut a = CanonicalHasher::new();
        a.write_decimal(&Decimal::new(1000, 2));
        let mut b = CanonicalHasher::new();
        b.write_decimal(&Decimal::from(10));
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_hash_values_supported() {
        let digest = hash_values(&[json!("alice"), json!(10)]).unwrap();
        assert_eq!(digest, hash_fields(&[Field::from("alice"), Field::from(10u64)]));
    }

    #[test]
    fn test_hash_values_unsupported() {
        for value in [json!(1.5), json!(-3), json!(null), json!(true), json!([1]), json!({"a": 1})] {
            let err = hash_values(&[json!("ok"), value]).unwrap_err();
            assert!(matches!(err, Error::UnsupportedFieldType(_)));
        }
    }

    #[test]
    fn test_digest_hex_display() {
        let digest = Digest::from_bytes([0xab; 32]);
        assert_eq!(digest.to_string(), "ab".repeat(32));
        assert_eq!(Digest::ZERO.to_hex(), "00".repeat(32));
    }

    #[test]
    fn test_hash_node_is_ordered() {
        let a = hash_fields(&[Field::from("a")]);
        let b = hash_fields(&[Field::from("b")]);
        assert_ne!(hash_node(&a, &b), hash_node(&b, &a));
    }
}
