//! Word-at-a-time oracle transport for constrained runtimes.
//!
//! The guest pulls one `u64` per host call: first the value length, then the
//! value packed little-endian into words. The bytes are padded and hashed
//! inline, and content-addressed values are rejected before they leave the
//! adapter unless the digest matches the requested key.

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Read};

use crate::error::{FaultLatch, OracleError, Result};
use crate::key::{Preimage, PreimageKey, UnverifiedPreimage};
use crate::sponge::{hash_padded, pad, NativeKeccak, Permutation, RATE};
use crate::wire::DEFAULT_MAX_PREIMAGE_LEN;
use crate::Oracle;

/// The host calls a constrained runtime exposes to the oracle path.
pub trait HostCalls {
    /// Pulls the next word. `is_public` is `1` for values that are public inputs.
    fn request_word(&mut self, is_public: u32) -> u64;

    /// Halt signal. A host that traps on `false` never returns from it.
    fn require(&mut self, _cond: bool) {}
}

/// Packs a value into the word sequence a host feeds: the length, then the
/// bytes little-endian, the last word zero-extended.
pub fn encode_words(value: &[u8]) -> Vec<u64> {
    let mut words = Vec::with_capacity(1 + value.len().div_ceil(8));
    words.push(value.len() as u64);
    for chunk in value.chunks(8) {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        words.push(LittleEndian::read_u64(&word));
    }
    words
}

#[derive(Debug)]
struct Channel<H, P> {
    host: H,
    perm: P,
    fault: FaultLatch,
}

/// Oracle over [`HostCalls`], hashing every value through `P` as it streams in.
#[derive(Debug)]
pub struct WordStreamOracle<H, P = NativeKeccak> {
    channel: Mutex<Channel<H, P>>,
    max_len: u64,
}

impl<H: HostCalls> WordStreamOracle<H> {
    pub fn new(host: H) -> Self {
        Self::with_permutation(host, NativeKeccak::default())
    }
}

impl<H: HostCalls, P: Permutation> WordStreamOracle<H, P> {
    pub fn with_permutation(host: H, perm: P) -> Self {
        Self {
            channel: Mutex::new(Channel {
                host,
                perm,
                fault: FaultLatch::default(),
            }),
            max_len: DEFAULT_MAX_PREIMAGE_LEN,
        }
    }

    pub fn with_max_len(mut self, max_len: u64) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn into_host(self) -> H {
        self.channel.into_inner().host
    }
}

impl<H: HostCalls, P: Permutation> Oracle for WordStreamOracle<H, P> {
    /// Once a value has been rejected the word stream is out of step with the
    /// host, so every later call fails without requesting another word.
    fn get(&self, key: PreimageKey) -> Result<Preimage> {
        let content_addressed = key.key_type()?.is_content_addressed();

        let mut channel = self.channel.lock();
        let Channel { host, perm, fault } = &mut *channel;
        fault.check()?;
        let result = read_value(host, perm, key, content_addressed, self.max_len);
        fault.record(result)
    }
}

fn read_value<H: HostCalls, P: Permutation>(
    host: &mut H,
    perm: &mut P,
    key: PreimageKey,
    content_addressed: bool,
    max_len: u64,
) -> Result<Preimage> {
    let is_public = u32::from(!content_addressed);
    let size = host.request_word(is_public);
    if size > max_len {
        host.require(false);
        return Err(OracleError::LengthOverflow(size));
    }
    let size = size as usize;

    let mut buf = Vec::with_capacity(size + RATE);
    for _ in 0..size / 8 {
        buf.extend_from_slice(&host.request_word(is_public).to_le_bytes());
    }
    let tail = size % 8;
    if tail != 0 {
        let word = host.request_word(is_public);
        buf.extend_from_slice(&word.to_le_bytes()[..tail]);
    }

    if !content_addressed {
        tracing::debug!(%key, size, "read local preimage words");
        return UnverifiedPreimage::new(buf).verify_digest(key, [0u8; 32]);
    }

    pad(&mut buf);
    let digest = hash_padded(perm, &buf);
    buf.truncate(size);

    let verified = UnverifiedPreimage::new(buf).verify_digest(key, digest);
    host.require(verified.is_ok());
    if verified.is_ok() {
        tracing::debug!(%key, size, "verified preimage words");
    }
    verified
}

/// Host that replays queued word sequences in order.
#[derive(Clone, Debug, Default)]
pub struct MemoryWordHost {
    words: VecDeque<u64>,
    requests: Vec<u32>,
    failed: bool,
}

impl MemoryWordHost {
    /// Queues a value as its length word followed by its packed words.
    pub fn push_preimage(&mut self, value: &[u8]) {
        self.words.extend(encode_words(value));
    }

    /// Queues raw words.
    pub fn push_words(&mut self, words: impl IntoIterator<Item = u64>) {
        self.words.extend(words);
    }

    /// Loads a witness in the format written by `RecordingGetter::write_witness`.
    pub fn from_witness<R: Read>(mut r: R) -> io::Result<Self> {
        let mut host = Self::default();
        loop {
            let mut len = [0u8; 8];
            match r.read_exact(&mut len) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = BigEndian::read_u64(&len);
            host.words.push_back(len);
            for _ in 0..len.div_ceil(8) {
                host.words.push_back(r.read_u64::<LittleEndian>()?);
            }
        }
        Ok(host)
    }

    pub fn remaining(&self) -> usize {
        self.words.len()
    }

    /// `is_public` flags of every request seen so far.
    pub fn requests(&self) -> &[u32] {
        &self.requests
    }

    /// Whether the guest raised a failed `require`.
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl HostCalls for MemoryWordHost {
    fn request_word(&mut self, is_public: u32) -> u64 {
        self.requests.push(is_public);
        self.words.pop_front().unwrap_or_else(|| {
            tracing::warn!("word host exhausted, feeding zero");
            0
        })
    }

    fn require(&mut self, cond: bool) {
        self.failed |= !cond;
    }
}
