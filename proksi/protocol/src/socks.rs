use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use proksi_core::{Protocol, Protocols};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::lookup_host;

use crate::dial::{dial, io_timeout};
use crate::error::ProbeError;

/// Somewhere stable and IPv4-reachable to ask the candidate to relay a
/// connection to, without actually caring whether that connection is
/// usable — only whether the proxy accepts and replies to the handshake.
const TARGET: &str = "google.com:80";

async fn resolve_target_ipv4() -> Result<(Ipv4Addr, u16), ProbeError> {
    let mut addrs = lookup_host(TARGET)
        .await
        .map_err(ProbeError::Dial)?;
    addrs
        .find_map(|a| match a {
            SocketAddr::V4(v4) => Some((*v4.ip(), v4.port())),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| ProbeError::UnexpectedResponse("no IPv4 address for target".into()))
}

/// Probes for SOCKS4 support: connect, issue a `CONNECT` request per the
/// SOCKS4 wire format, and check for the `0x5A` (request granted) reply
/// code.
///
/// Grounded on `examples/original_source/pkg/protocol/socks.go`'s
/// `socks4Prober`.
pub async fn probe4(addr: SocketAddr, timeout: Duration) -> Result<Protocols, ProbeError> {
    let (ip, port) = resolve_target_ipv4().await?;
    let mut conn = dial(addr, timeout).await?;

    let mut req = Vec::with_capacity(9);
    req.extend_from_slice(&[0x04, 0x01, (port >> 8) as u8, port as u8]);
    req.extend_from_slice(&ip.octets());
    req.push(0x00);
    io_timeout(timeout, conn.write_all(&req)).await?;

    let mut resp = [0u8; 8];
    io_timeout(timeout, conn.read_exact(&mut resp)).await?;

    match resp[1] {
        0x5A => Ok(Protocols::new([Protocol::Socks4])),
        code => Err(ProbeError::UnexpectedResponse(format!(
            "socks4 connect rejected, code {code:#x}"
        ))),
    }
}

/// Probes for SOCKS5 support: negotiate "no authentication", then issue a
/// `CONNECT` request per RFC 1928 and check for a success reply.
///
/// Grounded on the same file's `socks5Prober`.
pub async fn probe5(addr: SocketAddr, timeout: Duration) -> Result<Protocols, ProbeError> {
    let (ip, port) = resolve_target_ipv4().await?;
    let mut conn = dial(addr, timeout).await?;

    io_timeout(timeout, conn.write_all(&[0x05, 0x01, 0x00])).await?;
    let mut greeting = [0u8; 2];
    io_timeout(timeout, conn.read_exact(&mut greeting)).await?;
    if greeting[0] != 0x05 {
        return Err(ProbeError::UnexpectedResponse(format!(
            "unexpected socks version {}",
            greeting[0]
        )));
    }

    let mut req = Vec::with_capacity(10);
    req.extend_from_slice(&[0x05, 0x01, 0x00, 0x01]);
    req.extend_from_slice(&ip.octets());
    req.extend_from_slice(&[(port >> 8) as u8, port as u8]);
    io_timeout(timeout, conn.write_all(&req)).await?;

    let mut resp = [0u8; 10];
    io_timeout(timeout, conn.read_exact(&mut resp)).await?;

    match resp[1] {
        0x00 => Ok(Protocols::new([Protocol::Socks5])),
        code => Err(ProbeError::UnexpectedResponse(format!(
            "socks5 connect rejected, code {code:#x}"
        ))),
    }
}
