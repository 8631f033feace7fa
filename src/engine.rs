
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use derive_builder::Builder;

use crate::clock::{Clock, SystemClock};
use crate::correlated::{CorrelationId, Request, Response};
use crate::error::{Error, InvalidArgument};
use crate::muxed::Muxed;
use crate::pending::{PendingCall, PendingHandle};
use crate::registry::{Registry, SweepReport};
use crate::session::{AttributeKey, Session, Transport};
use crate::sweep::{SweepPolicy, DEFAULT_SWEEP_INTERVAL};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Minimum interval between two traffic triggered sweeps of a session
    #[builder(default = "DEFAULT_SWEEP_INTERVAL")]
    pub min_sweep_interval: Duration,

    /// Drop timed out and cancelled calls from the registry when sweeping
    #[builder(default = "true")]
    pub evict_on_sweep: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            min_sweep_interval: DEFAULT_SWEEP_INTERVAL,
            evict_on_sweep: true,
        }
    }
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.min_sweep_interval {
            Some(d) if d == Duration::from_millis(0) => Err("min_sweep_interval must be greater than zero".to_string()),
            _ => Ok(()),
        }
    }
}

/// Correlation state for a single open session
struct SessionState<Id, R> {
    registry: Registry<Id, R>,
    sweep: SweepPolicy,
}

/// Snapshot of a session's correlation state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStats {
    /// Calls currently held by the registry, including terminal calls not yet evicted
    pub registered: usize,
    /// Sweeps performed on this session
    pub sweeps: u64,
    pub last_sweep: Option<Instant>,
}

fn state_key<Id, R>() -> AttributeKey<SessionState<Id, R>> {
    AttributeKey::new("rr-correlator.in-flight")
}

/// CorrelationEngine matches inbound responses to outstanding requests
/// across any number of sessions.
///
/// The engine holds no per-session state itself, each session carries its
/// own registry from `on_session_opened` until `on_session_closed`.
/// Id is the correlation id type, R the response type calls complete with.
pub struct CorrelationEngine<Id, R> {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    _id: PhantomData<fn() -> Id>,
    _r: PhantomData<fn() -> R>,
}

impl <Id, R> Clone for CorrelationEngine<Id, R> {
    fn clone(&self) -> Self {
        CorrelationEngine {
            config: self.config.clone(),
            clock: self.clock.clone(),
            _id: PhantomData,
            _r: PhantomData,
        }
    }
}

impl <Id, R> Default for CorrelationEngine<Id, R>
where
    Id: CorrelationId,
    R: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl <Id, R> CorrelationEngine<Id, R>
where
    Id: CorrelationId,
    R: Send + Sync + 'static,
{
    /// Create a new engine using the system clock
    pub fn new(config: EngineConfig) -> CorrelationEngine<Id, R> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new engine with the provided clock
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> CorrelationEngine<Id, R> {
        CorrelationEngine {
            config,
            clock,
            _id: PhantomData,
            _r: PhantomData,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Send and register a request.
    ///
    /// The call is registered before the request is handed to the session so
    /// a response arriving during `write` is still matched.
    pub fn submit<Q, S>(&self, session: &S, request: Q, timeout: Duration) -> Result<PendingHandle<Id, R>, Error>
    where
        Q: Request<Id = Id>,
        S: Transport<Q> + ?Sized,
    {
        if timeout == Duration::from_millis(0) {
            return Err(InvalidArgument::NonPositiveTimeout.into());
        }
        let id = request.correlation_id().ok_or(InvalidArgument::MissingCorrelationId)?;

        let state = self.state(session).ok_or_else(|| Error::SessionNotOpen(session.id()))?;

        let deadline = self.clock.now().checked_add(timeout).ok_or(InvalidArgument::TimeoutOverflow)?;
        let call = Arc::new(PendingCall::new(id, deadline));

        // A close racing this submit closes the registry, the request is then never written
        state.registry.register(call.clone()).map_err(|e| match e {
            Error::RegistryClosed => Error::SessionNotOpen(session.id()),
            e => e,
        })?;

        trace!("Session {} request id: '{:?}' registered, timeout {:?}", session.id(), call.id(), timeout);

        session.write(request);

        Ok(PendingHandle::new(call))
    }

    /// Handle a received message.
    ///
    /// Correlated responses complete their matching call, anything else is
    /// left alone. The message is returned to be passed on down the pipeline.
    pub fn on_inbound_message<S>(&self, session: &S, message: R) -> R
    where
        R: Response<Id = Id> + Clone,
        S: Session + ?Sized,
    {
        let state = match self.state(session) {
            Some(s) => s,
            None => {
                debug!("Session {} not open, passing message through", session.id());
                return message;
            }
        };

        if let Some(id) = message.correlation_id() {
            match state.registry.resolve(&id) {
                Some(call) => {
                    call.complete(message.clone());
                },
                None => {
                    debug!("Session {} response id: '{:?}', no request pending", session.id(), id);
                }
            }
        }

        self.maybe_sweep(session.id(), &state);

        message
    }

    /// Handle a received muxed message, peer requests pass straight through
    pub fn on_inbound_muxed<Q, S>(&self, session: &S, message: Muxed<Q, R>) -> Muxed<Q, R>
    where
        R: Response<Id = Id> + Clone,
        S: Session + ?Sized,
    {
        match message {
            Muxed::Response(resp) => Muxed::Response(self.on_inbound_message(session, resp)),
            Muxed::Request(req) => {
                if let Some(state) = self.state(session) {
                    self.maybe_sweep(session.id(), &state);
                }
                Muxed::Request(req)
            },
        }
    }

    /// Notify the engine that a message was sent on the session
    pub fn on_outbound_message_sent<S>(&self, session: &S)
    where
        S: Session + ?Sized,
    {
        if let Some(state) = self.state(session) {
            self.maybe_sweep(session.id(), &state);
        }
    }

    /// Attach a fresh registry to a newly opened session
    pub fn on_session_opened<S>(&self, session: &S)
    where
        S: Session + ?Sized,
    {
        let state: SessionState<Id, R> = SessionState {
            registry: Registry::new(),
            sweep: SweepPolicy::new(self.config.min_sweep_interval),
        };

        if let Some(prev) = session.attributes().set(&state_key(), state) {
            let cancelled = prev.registry.cancel_all();
            warn!("Session {} opened twice, cancelled {} outstanding requests", session.id(), cancelled);
        }

        debug!("Session {} opened", session.id());
    }

    /// Detach the session's registry and cancel every outstanding call.
    /// Nothing is sent to the peer.
    pub fn on_session_closed<S>(&self, session: &S)
    where
        S: Session + ?Sized,
    {
        match session.attributes().remove(&state_key::<Id, R>()) {
            Some(state) => {
                let cancelled = state.registry.cancel_all();
                if cancelled > 0 {
                    info!("Session {} closed, cancelled {} outstanding requests", session.id(), cancelled);
                } else {
                    debug!("Session {} closed", session.id());
                }
            },
            None => {
                debug!("Session {} closed without being opened", session.id());
            }
        }
    }

    /// Sweep the session now regardless of the rate limit.
    /// This is the hook for callers that want timeouts on idle sessions, from a
    /// low frequency timer of their own for example.
    pub fn force_sweep<S>(&self, session: &S) -> Option<SweepReport>
    where
        S: Session + ?Sized,
    {
        let state = self.state(session)?;
        let now = self.clock.now();

        state.sweep.mark(now);

        Some(self.sweep(session.id(), &state, now))
    }

    /// Number of calls registered on the session, `None` if it is not open
    pub fn pending_count<S>(&self, session: &S) -> Option<usize>
    where
        S: Session + ?Sized,
    {
        self.state(session).map(|s| s.registry.len())
    }

    /// Fetch correlation statistics for the session, `None` if it is not open
    pub fn stats<S>(&self, session: &S) -> Option<SessionStats>
    where
        S: Session + ?Sized,
    {
        self.state(session).map(|s| SessionStats {
            registered: s.registry.len(),
            sweeps: s.sweep.sweeps(),
            last_sweep: s.sweep.last_sweep(),
        })
    }

    fn state<S>(&self, session: &S) -> Option<Arc<SessionState<Id, R>>>
    where
        S: Session + ?Sized,
    {
        session.attributes().get(&state_key())
    }

    fn maybe_sweep(&self, session_id: u64, state: &SessionState<Id, R>) -> Option<SweepReport> {
        let now = self.clock.now();
        if !state.sweep.try_begin(now) {
            return None;
        }

        Some(self.sweep(session_id, state, now))
    }

    fn sweep(&self, session_id: u64, state: &SessionState<Id, R>, now: Instant) -> SweepReport {
        let report = state.registry.sweep(now, self.config.evict_on_sweep);

        if report.expired > 0 {
            debug!("Session {} sweep expired {} of {} requests", session_id, report.expired, report.scanned);
        } else {
            trace!("Session {} sweep scanned {} requests", session_id, report.scanned);
        }

        report
    }
}
