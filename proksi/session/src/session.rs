use std::net::SocketAddr;
use std::sync::Arc;

use hyper::{Body, Client, Request, Response};
use proksi_balance::Weighted;

use crate::transport::{self, UpstreamConnector};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("upstream response timed out")]
    Timeout,
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
}

/// A persistent connection pool to one specific upstream, reused across
/// requests the way `examples/original_source/pkg/middleman/session.go`'s
/// `session` reuses its `*http.Transport`.
pub struct Session {
    addr: SocketAddr,
    score: i8,
    client: Client<UpstreamConnector>,
}

impl Session {
    pub fn new(addr: SocketAddr, score: i8) -> Self {
        let connector = UpstreamConnector::new(addr);
        let client = transport::client_builder().build(connector);
        Self { addr, score, client }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, SessionError> {
        match tokio::time::timeout(transport::RESPONSE_HEADER_TIMEOUT * 5, self.client.request(req)).await {
            Ok(result) => Ok(result?),
            Err(_elapsed) => Err(SessionError::Timeout),
        }
    }
}

/// Handle type placed into the [`proksi_balance::LoadBalancer`] — cheaply
/// cloneable, compared and hashed by upstream address so the balancer can
/// treat two handles to the same session as the same endpoint.
#[derive(Clone)]
pub struct SessionHandle(pub Arc<Session>);

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.addr == other.0.addr
    }
}
impl Eq for SessionHandle {}

impl std::hash::Hash for SessionHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.addr.hash(state);
    }
}

impl Weighted for SessionHandle {
    fn weight(&self) -> u32 {
        self.0.score.max(0) as u32
    }
}
