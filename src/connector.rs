use std::time::Duration;

use async_trait::async_trait;

use crate::correlated::{CorrelationId, Request};
use crate::engine::CorrelationEngine;
use crate::error::RequestError;
use crate::pending::Outcome;
use crate::session::Transport;

/// Connector provides support for making requests and awaiting their responses
#[async_trait]
pub trait Connector<REQ, RESP, S: ?Sized> {
    // Send a request and receive a response or error at some time in the future
    async fn request(&self, session: &S, req: REQ, timeout: Duration) -> Result<RESP, RequestError>;
}

#[async_trait]
impl <Id, REQ, RESP, S> Connector<REQ, RESP, S> for CorrelationEngine<Id, RESP>
where
    Id: CorrelationId,
    REQ: Request<Id = Id> + Send + 'static,
    RESP: Clone + Send + Sync + 'static,
    S: Transport<REQ> + ?Sized + 'static,
{
    async fn request(&self, session: &S, req: REQ, timeout: Duration) -> Result<RESP, RequestError> {
        let handle = self.submit(session, req, timeout)?;

        match handle.await {
            Outcome::Completed(resp) => Ok(resp),
            Outcome::TimedOut => Err(RequestError::TimedOut),
            Outcome::Cancelled => Err(RequestError::Cancelled),
        }
    }
}
