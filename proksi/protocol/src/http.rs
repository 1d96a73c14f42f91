use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use proksi_core::{Protocol, Protocols};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::dial::{dial, io_timeout};
use crate::error::ProbeError;

const PROBE_REQUEST: &[u8] = b"GET http://httpbin.org/get HTTP/1.1\r\nHost: httpbin.org\r\n\r\n";

fn looks_like_http_response(buf: &[u8]) -> bool {
    buf.starts_with(b"HTTP/1.1") || buf.starts_with(b"HTTP/1.0")
}

/// Probes a candidate for plaintext HTTP proxying: connect, send a
/// plain-text proxy request for an absolute URI, and check the response
/// starts with a status line.
///
/// Grounded on `examples/original_source/pkg/protocol/http.go`'s
/// `httpProber`.
pub async fn probe(addr: SocketAddr, timeout: Duration) -> Result<Protocols, ProbeError> {
    let mut conn = dial(addr, timeout).await?;
    io_timeout(timeout, conn.write_all(PROBE_REQUEST)).await?;
    let mut buf = [0u8; 1024];
    let n = io_timeout(timeout, conn.read(&mut buf)).await?;
    if looks_like_http_response(&buf[..n]) {
        Ok(Protocols::new([Protocol::Http]))
    } else {
        Err(ProbeError::UnexpectedResponse(
            String::from_utf8_lossy(&buf[..n]).into_owned(),
        ))
    }
}

/// Probes a candidate for TLS-wrapped HTTPS proxying: the same request,
/// but the client-to-proxy leg itself runs over TLS (not a `CONNECT`
/// tunnel — that's a different deployment this probe doesn't need to
/// distinguish, since a `CONNECT`-only proxy will simply fail this probe
/// and pass the plain HTTP one instead).
pub async fn probe_tls(addr: SocketAddr, timeout: Duration) -> Result<Protocols, ProbeError> {
    let tcp = dial(addr, timeout).await?;
    let connector = tokio_rustls::TlsConnector::from(Arc::new(insecure_tls_config()));
    let server_name =
        rustls::ServerName::try_from("probe.invalid").expect("static name is valid");
    let mut conn = tokio::time::timeout(timeout, connector.connect(server_name, tcp))
        .await
        .map_err(|_| ProbeError::Timeout)?
        .map_err(ProbeError::Tls)?;

    io_timeout(timeout, conn.write_all(PROBE_REQUEST)).await?;
    let mut buf = [0u8; 1024];
    let n = io_timeout(timeout, conn.read(&mut buf)).await?;
    if looks_like_http_response(&buf[..n]) {
        Ok(Protocols::new([Protocol::Https]))
    } else {
        Err(ProbeError::UnexpectedResponse(
            String::from_utf8_lossy(&buf[..n]).into_owned(),
        ))
    }
}

fn insecure_tls_config() -> rustls::ClientConfig {
    rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth()
}

/// A prober doesn't care whether the candidate's certificate is trusted —
/// only whether it completes a TLS handshake at all.
struct AcceptAnyCert;

impl rustls::client::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}
