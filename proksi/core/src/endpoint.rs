use std::net::SocketAddr;
use std::time::SystemTime;

use crate::{Anonymity, Geolocation, Protocols, Quality, Traffics, MAX_SCORE, MIN_SCORE};

/// A single proxy endpoint and everything proksi knows about it.
///
/// Grounded on `examples/original_source/pkg/proxy/proxy.go`'s `Proxy`
/// struct; `addr` folds the original's separate IP/Port fields into a
/// `SocketAddr`, which gives us `Ord`/`Eq`/`Hash` for free instead of
/// reimplementing address comparison.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Endpoint {
    addr: SocketAddr,
    protocols: Protocols,
    #[serde(default)]
    traffic: Traffics,
    #[serde(default)]
    anonymity: Anonymity,
    #[serde(default)]
    quality: Quality,
    score: i8,
    #[serde(default)]
    geolocation: Option<Geolocation>,
    created_at: SystemTime,
    checked_at: SystemTime,
}

impl Endpoint {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        addr: SocketAddr,
        protocols: Protocols,
        traffic: Traffics,
        anonymity: Anonymity,
        quality: Quality,
        score: i8,
        geolocation: Option<Geolocation>,
        created_at: SystemTime,
        checked_at: SystemTime,
    ) -> Self {
        Self {
            addr,
            protocols,
            traffic,
            anonymity,
            quality,
            score: score.clamp(MIN_SCORE, MAX_SCORE),
            geolocation,
            created_at,
            checked_at,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn protocols(&self) -> Protocols {
        self.protocols
    }

    pub fn traffic(&self) -> Traffics {
        self.traffic
    }

    pub fn anonymity(&self) -> Anonymity {
        self.anonymity
    }

    pub fn set_anonymity(&mut self, anonymity: Anonymity) {
        self.anonymity = anonymity;
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    pub fn score(&self) -> i8 {
        self.score
    }

    pub fn geolocation(&self) -> Option<&Geolocation> {
        self.geolocation.as_ref()
    }

    pub fn set_geolocation(&mut self, geolocation: Geolocation) {
        self.geolocation = Some(geolocation);
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn checked_at(&self) -> SystemTime {
        self.checked_at
    }

    pub fn touch_checked_at(&mut self, at: SystemTime) {
        self.checked_at = at;
    }

    /// Adjusts the score by `delta`, saturating at `[MIN_SCORE, MAX_SCORE]`
    /// rather than wrapping or panicking on overflow. Ported from `Proxy`'s
    /// `AddScore` in the original source.
    pub fn add_score(&mut self, delta: i8) {
        self.score = self.score.saturating_add(delta).clamp(MIN_SCORE, MAX_SCORE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;
    use std::str::FromStr;

    fn sample() -> Endpoint {
        Builder::new()
            .addr_port("127.0.0.1:8080")
            .protocols(Protocols::new([crate::Protocol::from_str("http").unwrap()]))
            .score(50)
            .must_build()
    }

    #[test]
    fn add_score_saturates_at_max() {
        let mut e = sample();
        e.add_score(MAX_SCORE);
        assert_eq!(e.score(), MAX_SCORE);
    }

    #[test]
    fn add_score_saturates_at_min() {
        let mut e = sample();
        e.add_score(-120);
        assert_eq!(e.score(), MIN_SCORE);
    }

    #[test]
    fn add_score_accumulates_within_bounds() {
        let mut e = sample();
        e.add_score(-10);
        assert_eq!(e.score(), 40);
        e.add_score(5);
        assert_eq!(e.score(), 45);
    }
}
