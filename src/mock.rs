
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::session::{Attributes, Session, Transport};

type WriteHook<REQ> = Box<dyn Fn(&MockSession<REQ>, &REQ) + Send + Sync>;

/// MockSession provides an expectation based mock session implementation
/// to simplify writing tests against the correlation engine.
///
/// Written messages are recorded, `expect` and `finalise` check them against
/// the messages a test expects to have been sent.
pub struct MockSession<REQ> {
    id: u64,
    attributes: Attributes,
    written: Mutex<Vec<REQ>>,
    expected: Mutex<VecDeque<REQ>>,
    on_write: Option<WriteHook<REQ>>,
}

impl <REQ> MockSession<REQ>
where
    REQ: PartialEq + Debug + Send + 'static,
{
    /// Create a new mock session
    pub fn new(id: u64) -> MockSession<REQ> {
        MockSession{
            id,
            attributes: Attributes::new(),
            written: Mutex::new(Vec::new()),
            expected: Mutex::new(VecDeque::new()),
            on_write: None,
        }
    }

    /// Set the messages this session expects to have written
    pub fn expect<E>(self, messages: E) -> Self
    where
        E: Into<VecDeque<REQ>>,
    {
        *self.expected.lock().unwrap_or_else(PoisonError::into_inner) = messages.into();

        self
    }

    /// Call `f` from within every `write`, before the message is recorded.
    /// This stands in for a peer that answers before `write` returns.
    pub fn on_write<F>(mut self, f: F) -> Self
    where
        F: Fn(&MockSession<REQ>, &REQ) + Send + Sync + 'static,
    {
        self.on_write = Some(Box::new(f));

        self
    }

    /// Take the messages written so far
    pub fn take_written(&self) -> Vec<REQ> {
        self.written.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect()
    }

    /// Finalise expectations on the session
    pub fn finalise(&self) {
        let expected: Vec<_> = self.expected.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect();
        let written = self.take_written();

        assert_eq!(expected, written, "written messages do not match expectations");
    }
}

impl <REQ> Session for MockSession<REQ>
where
    REQ: Send + 'static,
{
    fn id(&self) -> u64 {
        self.id
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl <REQ> Transport<REQ> for MockSession<REQ>
where
    REQ: Send + 'static,
{
    fn write(&self, message: REQ) {
        if let Some(hook) = &self.on_write {
            hook(self, &message);
        }

        self.written.lock().unwrap_or_else(PoisonError::into_inner).push(message);
    }
}

/// ManualClock is a clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock{ start: Instant::now(), offset: Mutex::new(Duration::from_millis(0)) }
    }

    /// Instant the clock was created at
    pub fn start(&self) -> Instant {
        self.start
    }

    /// Move the clock forward by `d`
    pub fn advance(&self, d: Duration) {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner) += d;
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_mock_session_expectations() {
        let s = MockSession::<u32>::new(1).expect(vec![1, 2]);

        s.write(1);
        s.write(2);

        s.finalise();
    }

    #[test]
    #[should_panic(expected = "written messages do not match expectations")]
    fn test_mock_session_unmet_expectation() {
        let s = MockSession::<u32>::new(1).expect(vec![1, 2]);
        s.write(1);
        s.finalise();
    }

    #[test]
    fn test_mock_session_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let s = MockSession::<u32>::new(7).on_write(move |s, m| {
            assert_eq!(s.id(), 7);
            c.fetch_add(*m as usize, Ordering::SeqCst);
        });

        s.write(3);
        s.write(4);
        assert_eq!(calls.load(Ordering::SeqCst), 7);
        assert_eq!(s.take_written(), vec![3, 4]);
        assert!(s.take_written().is_empty());
    }

    #[test]
    fn test_manual_clock() {
        let c = ManualClock::new();
        assert_eq!(c.now(), c.start());

        c.advance(Duration::from_millis(250));
        c.advance(Duration::from_millis(250));
        assert_eq!(c.elapsed(), Duration::from_millis(500));
        assert_eq!(c.now(), c.start() + Duration::from_millis(500));
    }
}
