use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use crate::error::{OracleError, Result};
use crate::wire::read_frame_start;
use crate::{Hinter, ServerStatus};

/// Longest hint a host reads unless configured otherwise (1 MiB).
pub const DEFAULT_MAX_HINT_LEN: u32 = 1 << 20;

/// How a client treats its hint channel
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintMode {
    /// Write failures are returned to the caller.
    #[default]
    Required,
    /// Write failures are logged and dropped.
    BestEffort,
    /// Hints are never written.
    Disabled,
}

/// A routed hint, rendered on the wire as `"<route> 0x<hex payload>"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hint {
    route: String,
    payload: Vec<u8>,
}

impl Hint {
    pub fn new(route: impl Into<String>, payload: impl Into<Vec<u8>>) -> Result<Self> {
        let route = route.into();
        if route.is_empty() || route.chars().any(char::is_whitespace) {
            return Err(OracleError::InvalidHint(format!("bad route {route:?}")));
        }
        Ok(Self {
            route,
            payload: payload.into(),
        })
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0x{}", self.route, hex::encode(&self.payload))
    }
}

impl FromStr for Hint {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self> {
        let (route, data) = s
            .split_once(' ')
            .ok_or_else(|| OracleError::InvalidHint(format!("missing payload in {s:?}")))?;
        let data = data.strip_prefix("0x").unwrap_or(data);
        let payload =
            hex::decode(data).map_err(|e| OracleError::InvalidHint(format!("{s:?}: {e}")))?;
        Hint::new(route, payload)
    }
}

/// Writes length-prefixed hints to the host. No response is read.
#[derive(Debug)]
pub struct HintWriter<W> {
    w: Mutex<W>,
    mode: HintMode,
}

impl<W: Write> HintWriter<W> {
    pub fn new(w: W) -> Self {
        Self::with_mode(w, HintMode::default())
    }

    pub fn with_mode(w: W, mode: HintMode) -> Self {
        Self {
            w: Mutex::new(w),
            mode,
        }
    }

    pub fn mode(&self) -> HintMode {
        self.mode
    }

    fn write_hint(&self, hint: &str) -> Result<()> {
        let len = u32::try_from(hint.len())
            .map_err(|_| OracleError::InvalidHint(format!("{} bytes is too long", hint.len())))?;
        let mut w = self.w.lock();
        w.write_u32::<BigEndian>(len)?;
        w.write_all(hint.as_bytes())?;
        w.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.w.into_inner()
    }
}

impl<W: Write> Hinter for HintWriter<W> {
    fn hint(&self, hint: &str) -> Result<()> {
        match self.mode {
            HintMode::Disabled => Ok(()),
            HintMode::Required => self.write_hint(hint),
            HintMode::BestEffort => {
                if let Err(err) = self.write_hint(hint) {
                    tracing::warn!(%err, hint, "dropping hint");
                }
                Ok(())
            }
        }
    }
}

/// Hinter for runtimes whose host stages everything up front.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopHinter;

impl Hinter for NoopHinter {
    fn hint(&self, _hint: &str) -> Result<()> {
        Ok(())
    }
}

/// Host-side reaction to a received hint.
pub trait HintHandler {
    fn handle_hint(&mut self, hint: &str) -> Result<()>;
}

impl<F> HintHandler for F
where
    F: FnMut(&str) -> Result<()>,
{
    fn handle_hint(&mut self, hint: &str) -> Result<()> {
        self(hint)
    }
}

/// Host side of the hint channel.
#[derive(Debug)]
pub struct HintReader<R> {
    r: R,
    max_len: u32,
}

impl<R: Read> HintReader<R> {
    pub fn new(r: R) -> Self {
        Self {
            r,
            max_len: DEFAULT_MAX_HINT_LEN,
        }
    }

    pub fn with_max_len(mut self, max_len: u32) -> Self {
        self.max_len = max_len;
        self
    }

    /// Reads one hint and hands it to `handler`.
    ///
    /// Hints are advisory, so a failing handler is logged and the channel keeps going.
    pub fn next_hint<H>(&mut self, handler: &mut H) -> Result<ServerStatus>
    where
        H: HintHandler + ?Sized,
    {
        let mut prefix = [0u8; 4];
        if !read_frame_start(&mut self.r, &mut prefix, "hint length")? {
            return Ok(ServerStatus::Closed);
        }
        let len = BigEndian::read_u32(&prefix);
        if len > self.max_len {
            return Err(OracleError::LengthOverflow(u64::from(len)));
        }

        let mut payload = vec![0u8; len as usize];
        self.r
            .read_exact(&mut payload)
            .map_err(|e| OracleError::from_read(e, "hint"))?;
        let hint = String::from_utf8(payload)
            .map_err(|e| OracleError::InvalidHint(format!("not utf-8: {e}")))?;

        tracing::trace!(%hint, "received hint");
        if let Err(err) = handler.handle_hint(&hint) {
            tracing::warn!(%err, %hint, "hint handler failed");
        }
        Ok(ServerStatus::Served)
    }

    /// Drains hints until the client closes the channel.
    pub fn serve<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: HintHandler + ?Sized,
    {
        while self.next_hint(handler)? == ServerStatus::Served {}
        Ok(())
    }
}
