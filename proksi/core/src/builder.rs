use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::SystemTime;

use crate::{Anonymity, Endpoint, Geolocation, Protocols, Quality, Traffics};

/// Everything that can go wrong assembling an [`Endpoint`] through
/// [`Builder`]. Errors accumulate rather than short-circuiting the first
/// `with_*` call that failed, so `build()` reports every malformed field at
/// once instead of making the caller fix them one at a time.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum BuilderError {
    #[error("invalid ip address: {0:?}")]
    InvalidIp(String),
    #[error("invalid port: {0:?}")]
    InvalidPort(String),
    #[error("invalid address:port: {0:?}")]
    InvalidAddrPort(String),
    #[error("address is required")]
    MissingAddr,
}

/// Builds an [`Endpoint`] field by field, accumulating any malformed input
/// into a list of [`BuilderError`]s reported together by `build()`.
///
/// Grounded on `examples/original_source/pkg/proxy/proxy.go`'s
/// `NewProxyBuilder`/`Build`, which takes the same "collect every error,
/// fail once" approach rather than returning on the first bad field.
pub struct Builder {
    ip: Option<IpAddr>,
    port: Option<u16>,
    addr: Option<SocketAddr>,
    protocols: Protocols,
    traffic: Traffics,
    anonymity: Anonymity,
    quality: Quality,
    score: i8,
    geolocation: Option<Geolocation>,
    errors: Vec<BuilderError>,
    created_at: SystemTime,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            ip: None,
            port: None,
            addr: None,
            protocols: Protocols::default(),
            traffic: Traffics::default(),
            anonymity: Anonymity::default(),
            quality: Quality::default(),
            score: 0,
            geolocation: None,
            errors: Vec::new(),
            created_at: SystemTime::now(),
        }
    }
}

impl Builder {
    /// Stamps `created_at` immediately, matching
    /// `examples/original_source/pkg/proxy/proxy.go`'s `NewProxyBuilder`
    /// setting `CreatedAt: time.Now()` in the constructor rather than when
    /// `Build()` is eventually called.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ip(mut self, ip: &str) -> Self {
        match IpAddr::from_str(ip) {
            Ok(ip) => self.ip = Some(ip),
            Err(_) => self.errors.push(BuilderError::InvalidIp(ip.to_string())),
        }
        self
    }

    pub fn port(mut self, port: &str) -> Self {
        match port.trim().parse::<u16>() {
            Ok(port) => self.port = Some(port),
            Err(_) => self.errors.push(BuilderError::InvalidPort(port.to_string())),
        }
        self
    }

    pub fn addr_port(mut self, addr_port: &str) -> Self {
        match SocketAddr::from_str(addr_port) {
            Ok(addr) => self.addr = Some(addr),
            Err(_) => self
                .errors
                .push(BuilderError::InvalidAddrPort(addr_port.to_string())),
        }
        self
    }

    pub fn protocols(mut self, protocols: Protocols) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn traffic(mut self, traffic: Traffics) -> Self {
        self.traffic = traffic;
        self
    }

    pub fn anonymity(mut self, anonymity: Anonymity) -> Self {
        self.anonymity = anonymity;
        self
    }

    pub fn quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn score(mut self, score: i8) -> Self {
        self.score = score;
        self
    }

    pub fn geolocation(mut self, geolocation: Geolocation) -> Self {
        self.geolocation = Some(geolocation);
        self
    }

    /// Assembles the final address from `ip()`+`port()` if `addr_port()`
    /// was never called, then constructs the `Endpoint`, returning every
    /// accumulated error if any field was malformed.
    pub fn build(self) -> Result<Endpoint, Vec<BuilderError>> {
        let mut errors = self.errors;

        let addr = self.addr.or_else(|| match (self.ip, self.port) {
            (Some(ip), Some(port)) => Some(SocketAddr::new(ip, port)),
            _ => None,
        });

        let addr = match addr {
            Some(addr) => Some(addr),
            None => {
                errors.push(BuilderError::MissingAddr);
                None
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let checked_at = SystemTime::now();
        Ok(Endpoint::new(
            addr.expect("checked above"),
            self.protocols,
            self.traffic,
            self.anonymity,
            self.quality,
            self.score,
            self.geolocation,
            self.created_at,
            checked_at,
        ))
    }

    /// Like `build()`, but panics on error. Reserved for call sites — tests,
    /// and known-good static data — where a malformed input is a
    /// programmer error rather than something to recover from.
    pub fn must_build(self) -> Endpoint {
        self.build().expect("Builder::must_build: invalid endpoint")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_truncated_ip() {
        let err = Builder::new().ip("1.2.3.").build().unwrap_err();
        assert!(matches!(err[0], BuilderError::InvalidIp(_)));
    }

    #[test]
    fn rejects_empty_port() {
        let err = Builder::new()
            .ip("1.2.3.4")
            .port("")
            .build()
            .unwrap_err();
        assert!(err.contains(&BuilderError::InvalidPort(String::new())));
    }

    #[test]
    fn rejects_missing_port_only() {
        let err = Builder::new().addr_port(":1234").build().unwrap_err();
        assert!(matches!(err[0], BuilderError::InvalidAddrPort(_)));
    }

    #[test]
    fn rejects_trailing_colon_with_no_port() {
        let err = Builder::new().addr_port("1.2.3.4:").build().unwrap_err();
        assert!(matches!(err[0], BuilderError::InvalidAddrPort(_)));
    }

    #[test]
    fn rejects_empty_addr_port() {
        let err = Builder::new().addr_port("").build().unwrap_err();
        assert!(matches!(err[0], BuilderError::InvalidAddrPort(_)));
    }

    #[test]
    fn accumulates_multiple_errors() {
        let err = Builder::new().ip("bogus").port("bogus").build().unwrap_err();
        assert_eq!(err.len(), 2);
    }

    #[test]
    fn missing_addr_is_reported() {
        let err = Builder::new().build().unwrap_err();
        assert_eq!(err, vec![BuilderError::MissingAddr]);
    }

    #[test]
    fn builds_from_ip_and_port() {
        let e = Builder::new().ip("127.0.0.1").port("8080").must_build();
        assert_eq!(e.addr().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn builds_from_addr_port() {
        let e = Builder::new().addr_port("127.0.0.1:8080").must_build();
        assert_eq!(e.addr().to_string(), "127.0.0.1:8080");
    }
}
