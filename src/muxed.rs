
use crate::correlated::Response;

/// Muxed is a container for an inbound message that is either a request
/// initiated by the peer or a response to one of our requests
#[derive(Debug, Clone, PartialEq)]
pub enum Muxed<REQ, RESP> {
    Request(REQ),
    Response(RESP),
}

impl <REQ, RESP> Muxed<REQ, RESP> {
    /// Fetch a request if muxed contains a request type
    pub fn req(self) -> Option<REQ> {
        match self {
            Muxed::Request(req) => Some(req),
            _ => None
        }
    }

    /// Fetch a response if muxed contains a response type
    pub fn resp(self) -> Option<RESP> {
        match self {
            Muxed::Response(resp) => Some(resp),
            _ => None
        }
    }

    /// Borrow the response if muxed contains a response type
    pub fn as_resp(&self) -> Option<&RESP> {
        match self {
            Muxed::Response(resp) => Some(resp),
            _ => None
        }
    }
}

impl <REQ, RESP: Response> Muxed<REQ, RESP> {
    /// Correlation id of the contained response, peer requests are never correlated
    pub fn correlation_id(&self) -> Option<RESP::Id> {
        self.as_resp().and_then(|r| r.correlation_id())
    }
}
