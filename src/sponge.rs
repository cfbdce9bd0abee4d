//! Keccak-256 sponge fed one 64-bit lane at a time.
//!
//! The permutation sits behind [`Permutation`] so the same absorb/pad/squeeze
//! logic runs against [`NativeKeccak`] or against a host accelerator through
//! [`Accelerated`].

use byteorder::{ByteOrder, LittleEndian};

/// Sponge rate in bytes.
pub const RATE: usize = 136;
/// Lanes absorbed per block.
pub const RATE_WORDS: usize = RATE / 8;
/// Lanes squeezed to form a 256-bit digest.
pub const DIGEST_WORDS: usize = 4;

pub type Digest = [u8; 32];

/// Lane-level access to a Keccak-f[1600] permutation.
///
/// `squeeze_word` runs the permutation on its first call after absorption and
/// then returns successive lanes of the permuted state.
pub trait Permutation {
    /// Restarts absorption. `full` also zeroes the state; otherwise the state
    /// carries over from the previous block.
    fn reset(&mut self, full: bool);
    fn absorb_word(&mut self, word: u64);
    fn squeeze_word(&mut self) -> u64;
}

/// Self-contained permutation backed by `tiny_keccak::keccakf`.
#[derive(Clone, Debug, Default)]
pub struct NativeKeccak {
    state: [u64; 25],
    lane: usize,
    squeezed: Option<usize>,
}

impl Permutation for NativeKeccak {
    fn reset(&mut self, full: bool) {
        if full {
            self.state = [0; 25];
        }
        self.lane = 0;
        self.squeezed = None;
    }

    fn absorb_word(&mut self, word: u64) {
        debug_assert!(self.lane < RATE_WORDS, "absorbed past the rate");
        self.state[self.lane] ^= word;
        self.lane += 1;
    }

    fn squeeze_word(&mut self) -> u64 {
        let idx = match self.squeezed {
            Some(idx) => idx,
            None => {
                tiny_keccak::keccakf(&mut self.state);
                0
            }
        };
        self.squeezed = Some(idx + 1);
        self.state[idx]
    }
}

/// Host-provided hash accelerator calls, as exposed to a constrained runtime.
pub trait KeccakAccelerator {
    /// `1` primes a fresh state, `0` continues from the previous block.
    fn keccak_new(&mut self, full: u64);
    fn keccak_push(&mut self, word: u64);
    fn keccak_finalize(&mut self) -> u64;
}

/// Adapts a [`KeccakAccelerator`] to [`Permutation`].
#[derive(Debug)]
pub struct Accelerated<A>(pub A);

impl<A: KeccakAccelerator> Permutation for Accelerated<A> {
    fn reset(&mut self, full: bool) {
        self.0.keccak_new(full as u64);
    }

    fn absorb_word(&mut self, word: u64) {
        self.0.keccak_push(word);
    }

    fn squeeze_word(&mut self) -> u64 {
        self.0.keccak_finalize()
    }
}

/// Number of pad10*1 bytes appended to a message of `size` bytes; always in `1..=RATE`.
pub fn padding_len(size: usize) -> usize {
    RATE - size % RATE
}

/// Appends pad10*1 padding to `buf` in place.
pub fn pad(buf: &mut Vec<u8>) {
    let size = buf.len();
    let padding = padding_len(size);
    buf.resize(size + padding, 0);
    if padding == 1 {
        buf[size] = 0x81;
    } else {
        buf[size] = 0x01;
        buf[size + padding - 1] = 0x80;
    }
}

/// Absorbs one full block and squeezes the digest lanes out of it.
fn absorb_block<P: Permutation>(perm: &mut P, block: &[u8]) -> Digest {
    for lane in block.chunks_exact(8) {
        perm.absorb_word(LittleEndian::read_u64(lane));
    }
    let mut out = [0u8; 32];
    for chunk in out.chunks_exact_mut(8) {
        LittleEndian::write_u64(chunk, perm.squeeze_word());
    }
    out
}

/// Hashes an already padded buffer. Only the last block's squeeze is kept.
pub(crate) fn hash_padded<P: Permutation>(perm: &mut P, padded: &[u8]) -> Digest {
    assert!(
        !padded.is_empty() && padded.len() % RATE == 0,
        "padded buffer must be a non-empty multiple of the rate"
    );
    let mut digest = [0u8; 32];
    perm.reset(true);
    for (i, block) in padded.chunks_exact(RATE).enumerate() {
        if i > 0 {
            perm.reset(false);
        }
        digest = absorb_block(perm, block);
    }
    digest
}

/// Incremental Keccak-256 over a [`Permutation`].
///
/// `finalize` consumes the sponge, so a state can't be squeezed twice.
#[derive(Debug)]
pub struct Sponge<P> {
    perm: P,
    buf: [u8; RATE],
    offset: usize,
    started: bool,
}

impl Default for Sponge<NativeKeccak> {
    fn default() -> Self {
        Self::new(NativeKeccak::default())
    }
}

impl<P: Permutation> Sponge<P> {
    pub fn new(mut perm: P) -> Self {
        perm.reset(true);
        Self {
            perm,
            buf: [0u8; RATE],
            offset: 0,
            started: false,
        }
    }

    pub fn absorb(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let take = (RATE - self.offset).min(data.len());
            self.buf[self.offset..self.offset + take].copy_from_slice(&data[..take]);
            self.offset += take;
            data = &data[take..];
            if self.offset == RATE {
                self.flush_block();
            }
        }
    }

    fn flush_block(&mut self) -> Digest {
        if self.started {
            self.perm.reset(false);
        }
        self.started = true;
        self.offset = 0;
        absorb_block(&mut self.perm, &self.buf)
    }

    pub fn finalize(mut self) -> Digest {
        let size = self.offset;
        self.buf[size..].fill(0);
        if padding_len(size) == 1 {
            self.buf[size] = 0x81;
        } else {
            self.buf[size] = 0x01;
            self.buf[RATE - 1] = 0x80;
        }
        self.flush_block()
    }
}

/// Keccak-256 of `data` using the native permutation.
pub fn keccak256(data: &[u8]) -> Digest {
    let mut sponge = Sponge::default();
    sponge.absorb(data);
    sponge.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, RngCore};
    use tiny_keccak::{Hasher, Keccak};

    const EMPTY: &str = "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470";
    const FOOBARAA: &str = "ac84219bf8b5b2f5c7699da4bc35c11907239fbc1e7b5b8f1e64bc80acf889ca";

    fn reference(data: &[u8]) -> Digest {
        let mut out = [0u8; 32];
        let mut hasher = Keccak::v256();
        hasher.update(data);
        hasher.finalize(&mut out);
        out
    }

    /// Accelerator stand-in that records the calls it receives.
    #[derive(Default)]
    struct CountingAccelerator {
        inner: NativeKeccak,
        news: Vec<u64>,
        pushes: usize,
    }

    impl KeccakAccelerator for CountingAccelerator {
        fn keccak_new(&mut self, full: u64) {
            self.news.push(full);
            self.inner.reset(full == 1);
        }

        fn keccak_push(&mut self, word: u64) {
            self.pushes += 1;
            self.inner.absorb_word(word);
        }

        fn keccak_finalize(&mut self) -> u64 {
            self.inner.squeeze_word()
        }
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(hex::encode(keccak256(b"")), EMPTY);
        assert_eq!(hex::encode(keccak256(b"foobaraa")), FOOBARAA);
    }

    #[test]
    fn test_padding_boundaries() {
        for k in 0..4 {
            assert_eq!(padding_len(RATE * k), RATE);
        }
        assert_eq!(padding_len(135), 1);
        assert_eq!(padding_len(RATE + 135), 1);
        assert_eq!(padding_len(137), 135);

        let mut buf = vec![0xaa; 135];
        pad(&mut buf);
        assert_eq!(buf.len(), RATE);
        assert_eq!(buf[135], 0x81);

        let mut buf = Vec::new();
        pad(&mut buf);
        assert_eq!(buf.len(), RATE);
        assert_eq!(buf[0], 0x01);
        assert!(buf[1..135].iter().all(|b| *b == 0));
        assert_eq!(buf[135], 0x80);
    }

    #[test]
    fn test_matches_reference_across_block_edges() {
        let mut rng = rand::thread_rng();
        for len in [1, 7, 8, 134, 135, 136, 137, 271, 272, 273, 1000] {
            let mut data = vec![0u8; len];
            rng.fill_bytes(&mut data);
            assert_eq!(keccak256(&data), reference(&data), "len {len}");
        }
    }

    #[test]
    fn test_incremental_absorb_is_split_independent() {
        let mut rng = rand::thread_rng();
        let mut data = vec![0u8; 500];
        rng.fill_bytes(&mut data);

        let mut sponge = Sponge::default();
        let mut rest = data.as_slice();
        while !rest.is_empty() {
            let n = rng.gen_range(1..=rest.len().min(60));
            sponge.absorb(&rest[..n]);
            rest = &rest[n..];
        }
        assert_eq!(sponge.finalize(), reference(&data));
    }

    #[test]
    fn test_hash_padded_matches_incremental() {
        let mut data = b"preimage".repeat(40);
        let expected = keccak256(&data);
        pad(&mut data);
        assert_eq!(hash_padded(&mut NativeKeccak::default(), &data), expected);
    }

    #[test]
    fn test_accelerated_permutation() {
        let data = vec![0x5a; 300];
        let mut padded = data.clone();
        pad(&mut padded);

        let mut accel = Accelerated(CountingAccelerator::default());
        assert_eq!(hash_padded(&mut accel, &padded), reference(&data));

        // one full reset, then a continuation per extra block
        assert_eq!(accel.0.news, vec![1, 0, 0]);
        assert_eq!(accel.0.pushes, 3 * RATE_WORDS);
    }
}
