//! Preimage oracle protocol: a verification client fetches key-addressed
//! values from an untrusted host and checks every byte before use.

use std::sync::Arc;

pub mod boot;
pub mod cache;
pub mod config;
pub mod error;
pub mod hint;
pub mod host;
pub mod key;
pub mod sponge;
pub mod wire;
pub mod word;

pub use boot::BootInfo;
pub use cache::CachingOracle;
pub use config::{OracleConfig, TransportKind};
pub use error::{OracleError, Result};
pub use hint::{Hint, HintMode, HintReader, HintWriter, NoopHinter, DEFAULT_MAX_HINT_LEN};
pub use host::{MemoryStore, PreimageGetter, RecordingGetter};
pub use key::{KeyType, Preimage, PreimageKey, UnverifiedPreimage};
pub use sponge::{keccak256, NativeKeccak, Permutation, Sponge};
pub use wire::{LengthPrefix, OracleClient, OracleServer, ReadWritePair};
pub use word::{HostCalls, MemoryWordHost, WordStreamOracle};

/// Read-only access to verified preimages.
pub trait Oracle {
    /// Fetches the value for `key`. A returned value has already been checked against the key.
    fn get(&self, key: PreimageKey) -> Result<Preimage>;
}

/// Advisory channel telling the host which preimages to stage.
pub trait Hinter {
    fn hint(&self, hint: &str) -> Result<()>;
}

impl<T: Oracle + ?Sized> Oracle for &T {
    fn get(&self, key: PreimageKey) -> Result<Preimage> {
        (**self).get(key)
    }
}

impl<T: Oracle + ?Sized> Oracle for Arc<T> {
    fn get(&self, key: PreimageKey) -> Result<Preimage> {
        (**self).get(key)
    }
}

impl<T: Hinter + ?Sized> Hinter for &T {
    fn hint(&self, hint: &str) -> Result<()> {
        (**self).hint(hint)
    }
}

impl<T: Hinter + ?Sized> Hinter for Arc<T> {
    fn hint(&self, hint: &str) -> Result<()> {
        (**self).hint(hint)
    }
}

/// Outcome of serving one frame on a host-side channel
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ServerStatus {
    Served,
    /// The peer closed the stream at a frame boundary.
    Closed,
}

/// Pairs an oracle with the hinter for the same host.
#[derive(Debug)]
pub struct OracleIo<O, H> {
    pub oracle: O,
    pub hinter: H,
}

impl<O, H> OracleIo<O, H> {
    pub fn new(oracle: O, hinter: H) -> Self {
        Self { oracle, hinter }
    }
}

impl<O: Oracle, H> Oracle for OracleIo<O, H> {
    fn get(&self, key: PreimageKey) -> Result<Preimage> {
        self.oracle.get(key)
    }
}

impl<O, H: Hinter> Hinter for OracleIo<O, H> {
    fn hint(&self, hint: &str) -> Result<()> {
        self.hinter.hint(hint)
    }
}
