use std::io;
use std::sync::Arc;

use crate::key::PreimageKey;

/// Process exit status for an unrecoverable transport fault.
pub const EXIT_TRANSPORT_FAULT: i32 = 3;
/// Process exit status for a preimage that failed verification.
pub const EXIT_INTEGRITY_FAULT: i32 = 4;
/// Process exit status for every other failure.
pub const EXIT_FAILURE: i32 = 2;

/// Errors raised by the preimage oracle protocol
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("transport fault: {0}")]
    Io(#[from] io::Error),

    #[error("stream closed mid-frame while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("length prefix {0} exceeds the accepted maximum")]
    LengthOverflow(u64),

    #[error("preimage for key {key} does not match its digest {computed}")]
    Integrity { key: PreimageKey, computed: PreimageKey },

    #[error("oracle channel is unusable after an earlier fault: {0}")]
    Faulted(String),

    #[error("preimage not found for key {0}")]
    NotFound(PreimageKey),

    #[error("invalid key type tag {0:#04x}")]
    InvalidKeyType(u8),

    #[error("invalid hint: {0}")]
    InvalidHint(String),

    #[error("bootstrap failed: {0}")]
    Boot(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Shared(Arc<OracleError>),
}

pub type Result<T, E = OracleError> = std::result::Result<T, E>;

impl OracleError {
    /// Whether the error leaves the oracle channel in an untrustworthy state.
    pub fn is_fatal(&self) -> bool {
        match self {
            OracleError::Io(_)
            | OracleError::UnexpectedEof(_)
            | OracleError::LengthOverflow(_)
            | OracleError::Faulted(_)
            | OracleError::Integrity { .. } => true,
            OracleError::Shared(inner) => inner.is_fatal(),
            _ => false,
        }
    }

    pub fn is_integrity(&self) -> bool {
        match self {
            OracleError::Integrity { .. } => true,
            OracleError::Shared(inner) => inner.is_integrity(),
            _ => false,
        }
    }

    /// Maps the error onto the process status a verification client exits with.
    pub fn exit_code(&self) -> i32 {
        if self.is_integrity() {
            EXIT_INTEGRITY_FAULT
        } else if self.is_fatal() {
            EXIT_TRANSPORT_FAULT
        } else {
            EXIT_FAILURE
        }
    }

    /// Converts an `io::Error` hit while reading a frame, turning a short read into `UnexpectedEof`.
    pub(crate) fn from_read(err: io::Error, what: &'static str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            OracleError::UnexpectedEof(what)
        } else {
            OracleError::Io(err)
        }
    }
}

/// Remembers the first fatal error on a channel so later requests fail without I/O.
#[derive(Debug, Default)]
pub(crate) struct FaultLatch(Option<String>);

impl FaultLatch {
    pub(crate) fn check(&self) -> Result<()> {
        match &self.0 {
            Some(cause) => Err(OracleError::Faulted(cause.clone())),
            None => Ok(()),
        }
    }

    pub(crate) fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() && self.0.is_none() {
                tracing::error!(%err, "oracle channel faulted, refusing further requests");
                self.0 = Some(err.to_string());
            }
        }
        result
    }
}
