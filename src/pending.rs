
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use futures::future::FusedFuture;

use crate::correlated::CorrelationId;
use crate::error::WaitTimeout;

/// Lifecycle state of a pending call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Completed,
    TimedOut,
    Cancelled,
}

/// Terminal outcome of a pending call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R> {
    Completed(R),
    TimedOut,
    Cancelled,
}

impl <R> Outcome<R> {
    pub fn state(&self) -> State {
        match self {
            Outcome::Completed(_) => State::Completed,
            Outcome::TimedOut => State::TimedOut,
            Outcome::Cancelled => State::Cancelled,
        }
    }

    /// Fetch the response if the call completed
    pub fn response(self) -> Option<R> {
        match self {
            Outcome::Completed(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }
}

type Observer<R> = Box<dyn FnOnce(&Outcome<R>) + Send>;

struct Inner<R> {
    // Set exactly once, never cleared
    outcome: Option<Arc<Outcome<R>>>,
    observers: Vec<Observer<R>>,
    wakers: Vec<Waker>,
}

/// PendingCall is a one-shot result cell for a single outstanding request.
///
/// The first of `complete`, `timeout_if_needed` or `cancel` to take effect
/// wins, every later attempt is a no-op returning `false`.
pub struct PendingCall<Id, R> {
    id: Id,
    deadline: Instant,
    inner: Mutex<Inner<R>>,
    done: Condvar,
}

impl <Id, R> PendingCall<Id, R>
where
    Id: CorrelationId,
{
    /// Create a pending call expiring at `deadline`
    pub fn new(id: Id, deadline: Instant) -> PendingCall<Id, R> {
        PendingCall {
            id,
            deadline,
            inner: Mutex::new(Inner {
                outcome: None,
                observers: Vec::new(),
                wakers: Vec::new(),
            }),
            done: Condvar::new(),
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn state(&self) -> State {
        self.lock().outcome.as_ref().map_or(State::Pending, |o| o.state())
    }

    pub fn is_terminal(&self) -> bool {
        self.state() != State::Pending
    }

    /// Complete the call with a response
    pub fn complete(&self, response: R) -> bool {
        self.finish(Outcome::Completed(response))
    }

    /// Time the call out if `now` has reached its deadline
    pub fn timeout_if_needed(&self, now: Instant) -> bool {
        if now < self.deadline {
            return false;
        }
        self.finish(Outcome::TimedOut)
    }

    /// Cancel the call
    pub fn cancel(&self) -> bool {
        self.finish(Outcome::Cancelled)
    }

    /// Attach an observer, called once with the terminal outcome.
    /// If the call has already finished the observer runs immediately on the calling thread.
    pub fn on_complete<F>(&self, observer: F)
    where
        F: FnOnce(&Outcome<R>) + Send + 'static,
    {
        let mut inner = self.lock();
        let outcome = inner.outcome.clone();

        match outcome {
            Some(outcome) => {
                drop(inner);
                observer(&outcome);
            },
            None => inner.observers.push(Box::new(observer)),
        }
    }

    /// Block the calling thread until the call finishes or `max_wait` elapses
    pub fn await_result(&self, max_wait: Option<Duration>) -> Result<Outcome<R>, WaitTimeout>
    where
        R: Clone,
    {
        let mut inner = self.lock();

        match max_wait {
            None => loop {
                if let Some(outcome) = inner.outcome.as_deref() {
                    return Ok(outcome.clone());
                }
                inner = self.done.wait(inner).unwrap_or_else(PoisonError::into_inner);
            },
            Some(d) => {
                let (inner, _) = self.done
                    .wait_timeout_while(inner, d, |i| i.outcome.is_none())
                    .unwrap_or_else(PoisonError::into_inner);
                inner.outcome.as_deref().cloned().ok_or(WaitTimeout(d))
            },
        }
    }

    /// Fetch the outcome if the call has finished
    pub fn outcome(&self) -> Option<Outcome<R>>
    where
        R: Clone,
    {
        self.lock().outcome.as_deref().cloned()
    }

    fn poll_outcome(&self, cx: &mut Context<'_>) -> Poll<Outcome<R>>
    where
        R: Clone,
    {
        let mut inner = self.lock();

        if let Some(outcome) = inner.outcome.as_deref() {
            return Poll::Ready(outcome.clone());
        }

        if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }

        Poll::Pending
    }

    fn finish(&self, outcome: Outcome<R>) -> bool {
        let state = outcome.state();

        let (outcome, observers, wakers) = {
            let mut inner = self.lock();
            if let Some(existing) = &inner.outcome {
                trace!("Call id: '{:?}' already {:?}, ignoring {:?}", self.id, existing.state(), state);
                return false;
            }

            let outcome = Arc::new(outcome);
            inner.outcome = Some(outcome.clone());

            (outcome, std::mem::take(&mut inner.observers), std::mem::take(&mut inner.wakers))
        };

        debug!("Call id: '{:?}' {:?}", self.id, state);

        // Notify with no lock held, observers may re-enter the engine
        self.done.notify_all();
        for waker in wakers {
            waker.wake();
        }
        for observer in observers {
            observer(&outcome);
        }

        true
    }

    // No user code runs under this lock so a poisoned cell is still consistent
    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl <Id: CorrelationId, R> fmt::Debug for PendingCall<Id, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("deadline", &self.deadline)
            .field("state", &self.state())
            .finish()
    }
}

/// PendingHandle is the caller's view of a submitted request.
///
/// Handles are cheap to clone and can be observed with callbacks,
/// blocked on, or awaited as a future resolving to the call's `Outcome`.
/// As a `FusedFuture` it can be used directly in `futures::select!`.
pub struct PendingHandle<Id, R> {
    call: Arc<PendingCall<Id, R>>,
    // Outcome already returned by `poll` on this handle
    yielded: bool,
}

impl <Id, R> Clone for PendingHandle<Id, R> {
    fn clone(&self) -> Self {
        PendingHandle{ call: self.call.clone(), yielded: false }
    }
}

impl <Id, R> PendingHandle<Id, R>
where
    Id: CorrelationId,
{
    pub(crate) fn new(call: Arc<PendingCall<Id, R>>) -> PendingHandle<Id, R> {
        PendingHandle{ call, yielded: false }
    }

    pub fn id(&self) -> &Id {
        self.call.id()
    }

    pub fn deadline(&self) -> Instant {
        self.call.deadline()
    }

    pub fn state(&self) -> State {
        self.call.state()
    }

    /// Attach an observer, see `PendingCall::on_complete`
    pub fn on_complete<F>(&self, observer: F)
    where
        F: FnOnce(&Outcome<R>) + Send + 'static,
    {
        self.call.on_complete(observer)
    }

    /// Block until the call finishes, see `PendingCall::await_result`
    pub fn await_result(&self, max_wait: Option<Duration>) -> Result<Outcome<R>, WaitTimeout>
    where
        R: Clone,
    {
        self.call.await_result(max_wait)
    }

    pub fn outcome(&self) -> Option<Outcome<R>>
    where
        R: Clone,
    {
        self.call.outcome()
    }

    /// Cancel the call locally, nothing is sent to the peer
    pub fn cancel(&self) -> bool {
        self.call.cancel()
    }
}

impl <Id: CorrelationId, R> fmt::Debug for PendingHandle<Id, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.call, f)
    }
}

impl <Id, R> Future for PendingHandle<Id, R>
where
    Id: CorrelationId,
    R: Clone,
{
    type Output = Outcome<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let res = this.call.poll_outcome(cx);
        if res.is_ready() {
            this.yielded = true;
        }

        res
    }
}

impl <Id, R> FusedFuture for PendingHandle<Id, R>
where
    Id: CorrelationId,
    R: Clone,
{
    fn is_terminated(&self) -> bool {
        self.yielded
    }
}
