//! Host-side preimage sources.

use byteorder::{BigEndian, WriteBytesExt};
use std::collections::HashMap;
use std::io::{self, Write};

use crate::error::{OracleError, Result};
use crate::key::PreimageKey;

/// Supplies the value for a requested key. Storage behind it is up to the host.
pub trait PreimageGetter {
    fn get_preimage(&mut self, key: PreimageKey) -> Result<Vec<u8>>;
}

impl<F> PreimageGetter for F
where
    F: FnMut(PreimageKey) -> Result<Vec<u8>>,
{
    fn get_preimage(&mut self, key: PreimageKey) -> Result<Vec<u8>> {
        self(key)
    }
}

/// In-memory preimage store
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    preimages: HashMap<PreimageKey, Vec<u8>>,
}

impl MemoryStore {
    /// Stores a content-addressed value and returns its key.
    pub fn insert(&mut self, value: Vec<u8>) -> PreimageKey {
        let key = PreimageKey::keccak256(&value);
        self.preimages.insert(key, value);
        key
    }

    /// Stores a value in a local bootstrap slot.
    pub fn insert_local(&mut self, index: u64, value: Vec<u8>) -> PreimageKey {
        let key = PreimageKey::local(index);
        self.preimages.insert(key, value);
        key
    }

    pub fn len(&self) -> usize {
        self.preimages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preimages.is_empty()
    }
}

impl PreimageGetter for MemoryStore {
    fn get_preimage(&mut self, key: PreimageKey) -> Result<Vec<u8>> {
        self.preimages
            .get(&key)
            .cloned()
            .ok_or(OracleError::NotFound(key))
    }
}

/// Wraps a getter and keeps every preimage it serves, in serving order.
#[derive(Debug)]
pub struct RecordingGetter<G> {
    inner: G,
    served: Vec<(PreimageKey, Vec<u8>)>,
}

impl<G> RecordingGetter<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            served: Vec::new(),
        }
    }

    pub fn served(&self) -> &[(PreimageKey, Vec<u8>)] {
        &self.served
    }

    pub fn into_inner(self) -> G {
        self.inner
    }

    /// Served preimages as a `{"0x<key>": "0x<value>"}` object.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .served
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    serde_json::Value::String(format!("0x{}", hex::encode(value))),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }

    /// Writes the word-stream witness: per preimage a big-endian u64 length,
    /// then the bytes zero-padded to a multiple of eight.
    pub fn write_witness<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for (_, value) in &self.served {
            w.write_u64::<BigEndian>(value.len() as u64)?;
            w.write_all(value)?;
            let tail = value.len() % 8;
            if tail != 0 {
                w.write_all(&[0u8; 8][..8 - tail])?;
            }
        }
        w.flush()
    }
}

impl<G: PreimageGetter> PreimageGetter for RecordingGetter<G> {
    fn get_preimage(&mut self, key: PreimageKey) -> Result<Vec<u8>> {
        let value = self.inner.get_preimage(key)?;
        self.served.push((key, value.clone()));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_lookup() {
        let mut store = MemoryStore::default();
        let key = store.insert(b"foobaraa".to_vec());
        let slot = store.insert_local(7, b"{}".to_vec());
        assert_eq!(store.len(), 2);

        assert_eq!(store.get_preimage(key).unwrap(), b"foobaraa");
        assert_eq!(store.get_preimage(slot).unwrap(), b"{}");
        assert!(matches!(
            store.get_preimage(PreimageKey::local(8)),
            Err(OracleError::NotFound(_))
        ));
    }

    #[test]
    fn test_closure_getter() {
        let mut calls = 0;
        let mut getter = |_key: PreimageKey| {
            calls += 1;
            Ok::<_, OracleError>(vec![1u8])
        };
        assert_eq!(getter.get_preimage(PreimageKey::local(1)).unwrap(), vec![1]);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_recording_exports() {
        let mut store = MemoryStore::default();
        let a = store.insert(vec![0xab; 3]);
        let b = store.insert(vec![0xcd; 8]);

        let mut recorder = RecordingGetter::new(store);
        recorder.get_preimage(a).unwrap();
        recorder.get_preimage(b).unwrap();
        assert!(recorder.get_preimage(PreimageKey::local(9)).is_err());
        assert_eq!(recorder.served().len(), 2);

        let json = recorder.to_json();
        assert_eq!(json[a.to_string()], "0xababab");

        let mut witness = Vec::new();
        recorder.write_witness(&mut witness).unwrap();
        let mut expected = 3u64.to_be_bytes().to_vec();
        expected.extend_from_slice(&[0xab, 0xab, 0xab, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(&8u64.to_be_bytes());
        expected.extend_from_slice(&[0xcd; 8]);
        assert_eq!(witness, expected);
    }
}
