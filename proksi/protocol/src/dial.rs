use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::ProbeError;

/// Dials `addr`, bounding the attempt by `timeout`. Grounded on
/// `examples/original_source/pkg/protocol/prober.go`'s `dialContext`, minus
/// the manual deadline propagation `tokio::time::timeout` gives us for
/// free.
pub async fn dial(addr: SocketAddr, timeout: Duration) -> Result<TcpStream, ProbeError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ProbeError::Dial(e)),
        Err(_) => Err(ProbeError::Timeout),
    }
}

/// Bounds a single read/write call the same way `dial` bounds the connect:
/// a candidate that accepts the connection but never sends/reads another
/// byte must not hang the probe past `timeout`. Every `write_all`/`read`/
/// `read_exact` call in `http.rs`/`socks.rs` goes through this instead of
/// awaiting the raw future directly.
pub async fn io_timeout<F, T>(timeout: Duration, fut: F) -> Result<T, ProbeError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ProbeError::Dial(e)),
        Err(_) => Err(ProbeError::Timeout),
    }
}
