//! Memoizing oracle wrapper with at most one in-flight fetch per key.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use crate::error::{OracleError, Result};
use crate::key::{Preimage, PreimageKey};
use crate::{Hinter, Oracle};

type Shared = std::result::Result<Preimage, Arc<OracleError>>;

/// One fetch that other callers of the same key wait on.
#[derive(Default)]
struct Flight {
    result: Mutex<Option<Shared>>,
    done: Condvar,
}

impl Flight {
    fn complete(&self, result: Shared) {
        *self.result.lock() = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Shared {
        let mut result = self.result.lock();
        loop {
            if let Some(result) = result.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut result);
        }
    }
}

enum Entry {
    Pending(Arc<Flight>),
    Ready(Preimage),
}

/// Settles a flight even if the fetch unwinds, so waiters never hang.
struct FlightGuard<'a, O> {
    cache: &'a CachingOracle<O>,
    key: PreimageKey,
    flight: Arc<Flight>,
    settled: bool,
}

impl<O> FlightGuard<'_, O> {
    fn settle(mut self, result: Shared) -> Shared {
        self.finish(result.clone());
        self.settled = true;
        result
    }

    fn finish(&self, result: Shared) {
        {
            let mut entries = self.cache.entries.lock();
            match &result {
                Ok(value) => {
                    entries.insert(self.key, Entry::Ready(value.clone()));
                }
                Err(_) => {
                    entries.remove(&self.key);
                }
            }
        }
        self.flight.complete(result);
    }
}

impl<O> Drop for FlightGuard<'_, O> {
    fn drop(&mut self) {
        if !self.settled {
            let err = io::Error::new(io::ErrorKind::Other, "preimage fetch abandoned");
            self.finish(Err(Arc::new(OracleError::Io(err))));
        }
    }
}

/// Wraps an oracle, keeping every verified value for the life of the cache.
///
/// Concurrent `get`s of one key share a single underlying fetch; a failed
/// fetch is handed to every waiter and then forgotten so a later call retries.
pub struct CachingOracle<O> {
    inner: O,
    entries: Mutex<HashMap<PreimageKey, Entry>>,
}

impl<O> CachingOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| matches!(entry, Entry::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached value. Fetches already in flight are left alone.
    pub fn flush(&self) {
        self.entries
            .lock()
            .retain(|_, entry| matches!(entry, Entry::Pending(_)));
    }
}

impl<O: Oracle> Oracle for CachingOracle<O> {
    fn get(&self, key: PreimageKey) -> Result<Preimage> {
        let guard = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(Entry::Ready(value)) => {
                    tracing::trace!(%key, "preimage cache hit");
                    return Ok(value.clone());
                }
                Some(Entry::Pending(flight)) => {
                    let flight = flight.clone();
                    drop(entries);
                    tracing::trace!(%key, "waiting on in-flight preimage");
                    return flight.wait().map_err(OracleError::Shared);
                }
                None => {
                    let flight = Arc::new(Flight::default());
                    entries.insert(key, Entry::Pending(flight.clone()));
                    FlightGuard {
                        cache: self,
                        key,
                        flight,
                        settled: false,
                    }
                }
            }
        };

        let result = self.inner.get(key).map_err(Arc::new);
        guard.settle(result).map_err(OracleError::Shared)
    }
}

impl<O: Hinter> Hinter for CachingOracle<O> {
    fn hint(&self, hint: &str) -> Result<()> {
        self.inner.hint(hint)
    }
}
