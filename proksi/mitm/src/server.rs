use std::net::SocketAddr;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use http::uri::{Authority, Scheme, Uri};
use hyper::service::service_fn;
use hyper::{Body, Request, Response};
use proksi_session::SessionManager;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::ca::Ca;

#[derive(Debug, thiserror::Error)]
pub enum MitmError {
    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
}

/// Always intercepts `CONNECT` tunnels rather than deciding per-request
/// whether to MITM — the same stance as
/// `examples/original_source/pkg/middleman/server.go`'s
/// `s.OnRequest().HandleConnect(goproxy.AlwaysMitm)`. Decrypted requests
/// are handed to a [`SessionManager`] instead of the default transport.
pub struct MitmServer {
    ca: Arc<dyn Ca>,
    sessions: Arc<SessionManager>,
}

impl MitmServer {
    pub fn new(ca: Arc<dyn Ca>, sessions: Arc<SessionManager>) -> Self {
        Self { ca, sessions }
    }

    pub async fn serve(self: Arc<Self>, bind: SocketAddr) -> Result<(), MitmError> {
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|e| MitmError::Bind(bind, e))?;
        tracing::info!(%bind, "mitm server listening");

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = this.handle_connection(stream).await {
                    debug!(%peer, error = %e, "connection ended");
                }
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> std::io::Result<()> {
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).await?;

        let host = match parse_connect_target(&request_line) {
            Some(host) => host,
            None => return self.handle_plain(reader, &request_line).await,
        };

        // Drain the remaining CONNECT request headers.
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 || line == "\r\n" {
                break;
            }
        }

        let mut stream = reader.into_inner();
        stream
            .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
            .await?;

        let server_config = match self.ca.server_config_for(&host) {
            Ok(config) => config,
            Err(e) => {
                warn!(%host, error = %e, "failed to issue leaf certificate");
                return Ok(());
            }
        };
        let acceptor = tokio_rustls::TlsAcceptor::from(server_config);
        let tls_stream = match acceptor.accept(stream).await {
            Ok(s) => s,
            Err(e) => {
                debug!(%host, error = %e, "tls handshake failed");
                return Ok(());
            }
        };

        let sessions = Arc::clone(&self.sessions);
        let host_for_svc = host.clone();
        let service = service_fn(move |req: Request<Body>| {
            let sessions = Arc::clone(&sessions);
            let host = host_for_svc.clone();
            async move { Ok::<_, std::convert::Infallible>(forward(&sessions, &host, req).await) }
        });

        if let Err(e) = hyper::server::conn::Http::new()
            .serve_connection(tls_stream, service)
            .await
        {
            debug!(%host, error = %e, "decrypted connection ended with error");
        }
        Ok(())
    }

    /// Handles a plain (non-`CONNECT`) HTTP/1.1 request — the client sent an
    /// absolute-form request line (`GET http://host/path HTTP/1.1`) straight
    /// over plaintext, same as any classic forward proxy. Parsed and
    /// written by hand rather than handed to `hyper::server::conn::Http`,
    /// since the request line has already been consumed off the raw
    /// socket (same reasoning as the `CONNECT` path draining its own
    /// header lines before handing the stream to TLS).
    async fn handle_plain(
        &self,
        mut reader: BufReader<TcpStream>,
        request_line: &str,
    ) -> std::io::Result<()> {
        let mut parts = request_line.trim_end().split(' ');
        let method = parts.next().unwrap_or_default();
        let target = parts.next().unwrap_or_default();

        let mut builder = Request::builder().method(method).uri(target);
        let mut content_length: usize = 0;

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 || line == "\r\n" {
                break;
            }
            let Some((name, value)) = line.trim_end().split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                builder = builder.header(name, value);
            }
        }

        let mut body = vec![0u8; content_length];
        if content_length > 0 {
            reader.read_exact(&mut body).await?;
        }

        let req = match builder.body(Body::from(body)) {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, target, "malformed plain http request");
                return Ok(());
            }
        };

        let resp = match self.sessions.round_trip(req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(target, error = %e, "round trip failed");
                Response::builder()
                    .status(http::StatusCode::BAD_GATEWAY)
                    .body(Body::empty())
                    .expect("static response is well-formed")
            }
        };

        write_response(reader.into_inner(), resp).await
    }
}

/// Serializes `resp` by hand onto `stream` — the plain-HTTP path never
/// hands its connection to `hyper::server::conn::Http`, so there's no
/// connection object to do this for us.
async fn write_response(mut stream: TcpStream, resp: Response<Body>) -> std::io::Result<()> {
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = hyper::body::to_bytes(resp.into_body())
        .await
        .map(|b| b.to_vec())
        .unwrap_or_default();

    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    for (name, value) in headers.iter() {
        if name == http::header::TRANSFER_ENCODING {
            continue;
        }
        head.push_str(name.as_str());
        head.push_str(": ");
        head.push_str(value.to_str().unwrap_or_default());
        head.push_str("\r\n");
    }
    if !headers.contains_key(CONTENT_LENGTH) {
        head.push_str(&format!("content-length: {}\r\n", body.len()));
    }
    head.push_str("\r\n");

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&body).await?;
    Ok(())
}

fn parse_connect_target(request_line: &str) -> Option<String> {
    let mut parts = request_line.trim_end().split(' ');
    let method = parts.next()?;
    let authority = parts.next()?;
    if !method.eq_ignore_ascii_case("CONNECT") {
        return None;
    }
    Some(authority.split(':').next().unwrap_or(authority).to_string())
}

/// Rewrites a decrypted, origin-form request into absolute form (the
/// client only sent `GET /path HTTP/1.1` plus a `Host` header, since it
/// believes it's talking directly to `host`) before handing it to the
/// session manager, then relays whatever it returns.
async fn forward(sessions: &SessionManager, host: &str, mut req: Request<Body>) -> Response<Body> {
    if let Ok(authority) = Authority::try_from(host) {
        let mut parts = req.uri().clone().into_parts();
        parts.scheme = Some(Scheme::HTTPS);
        parts.authority = Some(authority);
        if let Ok(uri) = Uri::from_parts(parts) {
            *req.uri_mut() = uri;
        }
    }

    match sessions.round_trip(req).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(%host, error = %e, "round trip failed");
            Response::builder()
                .status(http::StatusCode::BAD_GATEWAY)
                .body(Body::empty())
                .expect("static response is well-formed")
        }
    }
}
