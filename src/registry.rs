
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::correlated::CorrelationId;
use crate::error::{Error, InvalidArgument};
use crate::pending::PendingCall;

/// Result of a single registry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SweepReport {
    /// Calls examined
    pub scanned: usize,
    /// Calls moved to `TimedOut` by this sweep
    pub expired: usize,
    /// Terminal calls dropped from the registry
    pub evicted: usize,
}

type Calls<Id, R> = HashMap<Id, Arc<PendingCall<Id, R>>>;

struct Inner<Id, R> {
    calls: Calls<Id, R>,
    // Set by `cancel_all`, nothing can be registered afterwards
    closed: bool,
}

/// Registry maps correlation ids to the outstanding calls of one session
pub struct Registry<Id, R> {
    inner: Mutex<Inner<Id, R>>,
}

impl <Id, R> Default for Registry<Id, R>
where
    Id: CorrelationId,
{
    fn default() -> Self {
        Self::new()
    }
}

impl <Id, R> Registry<Id, R>
where
    Id: CorrelationId,
{
    pub fn new() -> Registry<Id, R> {
        Registry{ inner: Mutex::new(Inner{ calls: HashMap::new(), closed: false }) }
    }

    /// Register a call under its correlation id.
    ///
    /// Fails if a pending call already holds the id, a terminal (timed out or
    /// cancelled but not yet evicted) occupant is replaced.
    /// Fails with `Error::RegistryClosed` once `cancel_all` has run.
    pub fn register(&self, call: Arc<PendingCall<Id, R>>) -> Result<(), Error> {
        let mut inner = self.lock();

        if inner.closed {
            debug!("Call id: '{:?}' rejected, registry closed", call.id());
            return Err(Error::RegistryClosed);
        }

        if let Some(existing) = inner.calls.get(call.id()) {
            if !existing.is_terminal() {
                warn!("Call id: '{:?}' already pending, rejecting duplicate", call.id());
                return Err(InvalidArgument::DuplicateCorrelationId.into());
            }
            trace!("Call id: '{:?}' replacing terminal entry", call.id());
        }

        inner.calls.insert(call.id().clone(), call);

        Ok(())
    }

    /// Remove and return the call registered under `id`
    pub fn resolve(&self, id: &Id) -> Option<Arc<PendingCall<Id, R>>> {
        self.lock().calls.remove(id)
    }

    /// Time out every call whose deadline has passed at `now`.
    ///
    /// Calls are checked against a snapshot taken under the lock, expiry runs
    /// with the lock released. With `evict` set terminal entries are dropped afterwards.
    pub fn sweep(&self, now: Instant, evict: bool) -> SweepReport {
        let snapshot: Vec<_> = self.lock().calls.values().cloned().collect();

        let mut report = SweepReport{ scanned: snapshot.len(), ..Default::default() };
        for call in &snapshot {
            if call.timeout_if_needed(now) {
                report.expired += 1;
            }
        }

        if evict {
            let mut inner = self.lock();
            let before = inner.calls.len();
            inner.calls.retain(|_, c| !c.is_terminal());
            report.evicted = before - inner.calls.len();
        }

        report
    }

    /// Close the registry and cancel every registered call, leaving it empty
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.calls.drain().map(|(_, c)| c).collect()
        };

        drained.iter().filter(|c| c.cancel()).count()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.lock().calls.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().calls.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<Id, R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
