//! Request / response correlation over message oriented sessions.
//!
//! A `CorrelationEngine` registers each outbound request in a per-session
//! registry and hands back a `PendingHandle` that resolves when the matching
//! response arrives, when the request times out, or when the session closes.
//!
//! There is no timer, timeouts are detected by sweeps piggybacked on session
//! traffic and rate limited to one per `EngineConfig::min_sweep_interval`.

#[macro_use]
extern crate log;


pub mod error;
pub use crate::error::{Error, InvalidArgument, RequestError, WaitTimeout};

pub mod correlated;
pub use crate::correlated::{CorrelationId, Request, Response};

pub mod muxed;
pub use crate::muxed::Muxed;

pub mod clock;
pub use crate::clock::{Clock, SystemClock};

pub mod pending;
pub use crate::pending::{Outcome, PendingCall, PendingHandle, State};

pub mod registry;
pub use crate::registry::{Registry, SweepReport};

pub mod sweep;
pub use crate::sweep::{SweepPolicy, DEFAULT_SWEEP_INTERVAL};

pub mod session;
pub use crate::session::{AttributeKey, Attributes, Session, Transport};

pub mod engine;
pub use crate::engine::{CorrelationEngine, EngineConfig, EngineConfigBuilder, SessionStats};

pub mod connector;
pub use crate::connector::Connector;

pub mod mock;
