use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{OracleError, Result};
use crate::sponge::{keccak256, Digest};

/// Key type tags carried in byte 0 of every preimage key
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyType {
    Local = 1,
    Keccak256 = 2,
}

impl KeyType {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            1 => Some(KeyType::Local),
            2 => Some(KeyType::Keccak256),
            _ => None,
        }
    }

    /// Content-addressed keys are checked against the digest of their value.
    pub fn is_content_addressed(self) -> bool {
        matches!(self, KeyType::Keccak256)
    }
}

/// A 32-byte type-prefixed preimage key
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreimageKey([u8; 32]);

impl PreimageKey {
    /// Builds a key from a digest, overwriting byte 0 with the type tag.
    pub fn new(mut digest: Digest, key_type: KeyType) -> Self {
        digest[0] = key_type as u8;
        Self(digest)
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Content-addressed key of `value`.
    pub fn keccak256(value: &[u8]) -> Self {
        Self::new(keccak256(value), KeyType::Keccak256)
    }

    /// Local-index key, the index stored big-endian in the trailing eight bytes.
    pub fn local(index: u64) -> Self {
        let mut out = [0u8; 32];
        out[24..].copy_from_slice(&index.to_be_bytes());
        Self::new(out, KeyType::Local)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn tag(&self) -> u8 {
        self.0[0]
    }

    pub fn key_type(&self) -> Result<KeyType> {
        KeyType::from_u8(self.0[0]).ok_or(OracleError::InvalidKeyType(self.0[0]))
    }
}

impl From<[u8; 32]> for PreimageKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for PreimageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PreimageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PreimageKey({self})")
    }
}

/// Bytes received from a transport that have not yet been checked against their key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnverifiedPreimage(Vec<u8>);

impl UnverifiedPreimage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks the bytes against `key`, hashing them natively.
    pub fn verify(self, key: PreimageKey) -> Result<Preimage> {
        if key.key_type()?.is_content_addressed() {
            let digest = keccak256(&self.0);
            self.verify_digest(key, digest)
        } else {
            Ok(Preimage(self.0.into()))
        }
    }

    /// Checks the bytes against `key` using a digest already computed over them.
    pub fn verify_digest(self, key: PreimageKey, digest: Digest) -> Result<Preimage> {
        let key_type = key.key_type()?;
        if key_type.is_content_addressed() {
            let computed = PreimageKey::new(digest, key_type);
            if computed != key {
                tracing::error!(%key, %computed, "preimage failed integrity check");
                return Err(OracleError::Integrity { key, computed });
            }
        }
        Ok(Preimage(self.0.into()))
    }
}

/// A preimage whose bytes have been checked against the key it was requested with.
#[derive(Clone, PartialEq, Eq)]
pub struct Preimage(Arc<[u8]>);

impl Preimage {
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Deref for Preimage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Preimage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Preimage(0x{})", hex::encode(&self.0))
    }
}
