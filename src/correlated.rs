
use std::fmt::Debug;
use std::hash::Hash;

/// Bounds required of a correlation identifier
pub trait CorrelationId: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> CorrelationId for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Request exposes the correlation id used to match its eventual response.
/// Requests returning `None` are rejected on submission.
pub trait Request {
    type Id: CorrelationId;

    fn correlation_id(&self) -> Option<Self::Id>;
}

/// Response exposes the id of the request it answers, or `None` for
/// messages that are not correlated with any request
pub trait Response {
    type Id: CorrelationId;

    fn correlation_id(&self) -> Option<Self::Id>;
}
