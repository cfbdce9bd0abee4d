use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

use crate::error::{FaultLatch, OracleError, Result};
use crate::host::PreimageGetter;
use crate::key::{Preimage, PreimageKey, UnverifiedPreimage};
use crate::{Oracle, ServerStatus};

/// Largest value a client accepts unless configured otherwise (1 GiB).
pub const DEFAULT_MAX_PREIMAGE_LEN: u64 = 1 << 30;

/// Byte order of the 8-byte response length prefix, pinned per deployment
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthPrefix {
    #[default]
    BigEndian,
    LittleEndian,
}

impl LengthPrefix {
    fn read<R: Read>(self, r: &mut R) -> io::Result<u64> {
        match self {
            LengthPrefix::BigEndian => r.read_u64::<BigEndian>(),
            LengthPrefix::LittleEndian => r.read_u64::<LittleEndian>(),
        }
    }

    fn write<W: Write>(self, w: &mut W, len: u64) -> io::Result<()> {
        match self {
            LengthPrefix::BigEndian => w.write_u64::<BigEndian>(len),
            LengthPrefix::LittleEndian => w.write_u64::<LittleEndian>(len),
        }
    }
}

/// Joins a separate reader and writer into one duplex channel.
#[derive(Debug)]
pub struct ReadWritePair<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> ReadWritePair<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: Read, W> Read for ReadWritePair<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R, W: Write> Write for ReadWritePair<R, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Fills `buf`, returning `false` if the stream ended before its first byte.
pub(crate) fn read_frame_start<R: Read>(
    r: &mut R,
    buf: &mut [u8],
    what: &'static str,
) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(OracleError::UnexpectedEof(what)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Client side of the byte-stream oracle: writes a key, reads back a length-prefixed value.
///
/// The stream sits behind a lock so exactly one request/response pair is in
/// flight per connection. After a fatal error the stream is out of step with
/// the host, and every later request fails without touching it.
#[derive(Debug)]
pub struct OracleClient<RW> {
    stream: Mutex<ClientStream<RW>>,
    prefix: LengthPrefix,
    max_len: u64,
}

#[derive(Debug)]
struct ClientStream<RW> {
    rw: RW,
    fault: FaultLatch,
}

impl<RW: Read + Write> OracleClient<RW> {
    pub fn new(rw: RW) -> Self {
        Self {
            stream: Mutex::new(ClientStream {
                rw,
                fault: FaultLatch::default(),
            }),
            prefix: LengthPrefix::default(),
            max_len: DEFAULT_MAX_PREIMAGE_LEN,
        }
    }

    pub fn with_length_prefix(mut self, prefix: LengthPrefix) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_max_len(mut self, max_len: u64) -> Self {
        self.max_len = max_len;
        self
    }

    /// Performs one exchange without checking the result.
    pub fn fetch(&self, key: PreimageKey) -> Result<UnverifiedPreimage> {
        let mut stream = self.stream.lock();
        stream.fault.check()?;
        let result = self.exchange(&mut stream.rw, key);
        stream.fault.record(result)
    }

    fn exchange(&self, rw: &mut RW, key: PreimageKey) -> Result<UnverifiedPreimage> {
        rw.write_all(key.as_bytes())?;
        rw.flush()?;

        let len = self
            .prefix
            .read(&mut *rw)
            .map_err(|e| OracleError::from_read(e, "length prefix"))?;
        if len > self.max_len {
            return Err(OracleError::LengthOverflow(len));
        }
        tracing::trace!(%key, len, "reading preimage payload");

        let mut payload = vec![0u8; len as usize];
        rw.read_exact(&mut payload)
            .map_err(|e| OracleError::from_read(e, "payload"))?;
        Ok(UnverifiedPreimage::new(payload))
    }

    pub fn into_inner(self) -> RW {
        self.stream.into_inner().rw
    }
}

impl<RW: Read + Write> Oracle for OracleClient<RW> {
    fn get(&self, key: PreimageKey) -> Result<Preimage> {
        let mut stream = self.stream.lock();
        stream.fault.check()?;
        let result = self.exchange(&mut stream.rw, key).and_then(|value| {
            tracing::trace!(%key, len = value.len(), "verifying preimage");
            value.verify(key)
        });
        let value = stream.fault.record(result)?;
        tracing::debug!(%key, len = value.len(), "fetched preimage");
        Ok(value)
    }
}

/// Host side of the byte-stream oracle.
#[derive(Debug)]
pub struct OracleServer<RW> {
    rw: RW,
    prefix: LengthPrefix,
}

impl<RW: Read + Write> OracleServer<RW> {
    pub fn new(rw: RW) -> Self {
        Self {
            rw,
            prefix: LengthPrefix::default(),
        }
    }

    pub fn with_length_prefix(mut self, prefix: LengthPrefix) -> Self {
        self.prefix = prefix;
        self
    }

    /// Answers one request. End of stream before a key arrives is a clean close.
    ///
    /// A getter failure is returned without writing a response; the caller
    /// must drop the connection so the client does not block.
    pub fn next_preimage_request<G>(&mut self, getter: &mut G) -> Result<ServerStatus>
    where
        G: PreimageGetter + ?Sized,
    {
        let mut key = [0u8; 32];
        if !read_frame_start(&mut self.rw, &mut key, "key")? {
            return Ok(ServerStatus::Closed);
        }
        let key = PreimageKey::from_bytes(key);

        let value = getter.get_preimage(key)?;
        tracing::debug!(%key, len = value.len(), "serving preimage");

        self.prefix.write(&mut self.rw, value.len() as u64)?;
        if !value.is_empty() {
            self.rw.write_all(&value)?;
        }
        self.rw.flush()?;
        Ok(ServerStatus::Served)
    }

    /// Serves requests until the client closes the stream.
    pub fn serve<G>(&mut self, getter: &mut G) -> Result<()>
    where
        G: PreimageGetter + ?Sized,
    {
        while self.next_preimage_request(getter)? == ServerStatus::Served {}
        tracing::debug!("preimage client disconnected");
        Ok(())
    }

    pub fn into_inner(self) -> RW {
        self.rw
    }
}
