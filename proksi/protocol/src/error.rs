#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("dial failed: {0}")]
    Dial(#[source] std::io::Error),
    #[error("probe timed out")]
    Timeout,
    #[error("tls handshake failed: {0}")]
    Tls(#[source] std::io::Error),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("no protocol supported")]
    Unsupported,
}
