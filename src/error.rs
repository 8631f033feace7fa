
use std::time::Duration;

use thiserror::Error;

/// Error returned synchronously when a request cannot be submitted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(InvalidArgument),

    #[error("session {0} has not been opened or is already closed")]
    SessionNotOpen(u64),

    #[error("registry closed")]
    RegistryClosed,
}

/// Reasons a submitted request is malformed
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidArgument {
    #[error("timeout must be greater than zero")]
    NonPositiveTimeout,

    #[error("request does not carry a correlation id")]
    MissingCorrelationId,

    #[error("timeout is too large to compute a deadline")]
    TimeoutOverflow,

    #[error("a request with this correlation id is already pending")]
    DuplicateCorrelationId,
}

impl From<InvalidArgument> for Error {
    fn from(e: InvalidArgument) -> Self {
        Error::InvalidArgument(e)
    }
}

/// Error returned by the async `Connector` for a request that did not complete
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("request rejected: {0}")]
    Rejected(#[from] Error),

    #[error("request timed out")]
    TimedOut,

    #[error("request cancelled by session close")]
    Cancelled,
}

/// A blocking wait expired before the call reached a terminal state.
/// This is distinct from the call itself timing out.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("no outcome after waiting {0:?}")]
pub struct WaitTimeout(pub Duration);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let e: Error = InvalidArgument::MissingCorrelationId.into();
        assert_eq!(e.to_string(), "invalid argument: request does not carry a correlation id");
    }

    #[test]
    fn test_request_error_from_error() {
        let e = RequestError::from(Error::SessionNotOpen(3));
        assert_eq!(e, RequestError::Rejected(Error::SessionNotOpen(3)));
        assert_eq!(e.to_string(), "request rejected: session 3 has not been opened or is already closed");
    }
}
