//! Determines which wire protocols a candidate endpoint actually speaks,
//! independent of whatever a harvester's source page claimed.

mod dial;
mod error;
mod http;
mod socks;

pub use error::ProbeError;

use std::net::SocketAddr;
use std::time::Duration;

use proksi_core::Protocols;

/// Probes `addr` for every known protocol concurrently and returns the
/// union of whichever ones answered correctly.
///
/// Grounded on `examples/original_source/pkg/protocol/prober.go`'s
/// `ProbeProtocols` (stubbed in the original as a placeholder for
/// composing the four per-protocol probers); this composes the four
/// sibling-module probers — `http.go`, `http.go`'s HTTPS variant, and
/// `socks.go`'s SOCKS4/SOCKS5 variants — the way its doc comment
/// describes: run them all, and a proxy can legitimately answer to more
/// than one (an HTTP-protocol proxy that also understands `CONNECT`
/// reports both `Http` and `Https`).
///
/// Returns [`Protocols::EMPTY`] together with the last error observed if
/// nothing answered.
pub async fn probe(addr: SocketAddr, per_probe_timeout: Duration) -> (Protocols, Option<ProbeError>) {
    let (http_res, https_res, socks4_res, socks5_res) = tokio::join!(
        http::probe(addr, per_probe_timeout),
        http::probe_tls(addr, per_probe_timeout),
        socks::probe4(addr, per_probe_timeout),
        socks::probe5(addr, per_probe_timeout),
    );

    let mut protocols = Protocols::EMPTY;
    let mut last_err = None;
    for result in [http_res, https_res, socks4_res, socks5_res] {
        match result {
            Ok(p) => protocols = protocols.combine(p),
            Err(e) => last_err = Some(e),
        }
    }

    if protocols.is_empty() {
        (protocols, last_err)
    } else {
        (protocols, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_reports_last_error_when_nothing_answers() {
        // Port 1 is reserved and will refuse the connection immediately on
        // any reachable loopback host, so every sub-probe fails fast.
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let (protocols, err) = probe(addr, Duration::from_millis(200)).await;
        assert!(protocols.is_empty());
        assert!(err.is_some());
    }
}
