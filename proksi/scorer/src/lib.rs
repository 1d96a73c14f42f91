//! Scores a candidate proxy by routing a handful of requests through it
//! and rewarding or penalizing based on response time.
//!
//! Grounded on `examples/original_source/pkg/checker/score.go`'s
//! `BatchHTTPSScorer`: requests are issued sequentially (not in parallel)
//! through a single client built for the candidate, to keep per-candidate
//! memory cost down when many candidates are scored concurrently by the
//! scheduler.

use std::time::{Duration, Instant};

use proksi_core::{Endpoint, MAX_SCORE};

#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("scorer needs at least 2 hosts to score against, got {0}")]
    TooFewHosts(usize),
    #[error("failed to build client for candidate: {0}")]
    Client(#[from] reqwest::Error),
}

/// Visits a fixed batch of HTTPS hosts through each candidate and grades it
/// by response time. The timeout is derived from the host count so that,
/// if every single request fails, the score is guaranteed to bottom out at
/// 0 rather than merely trending towards it.
pub struct BatchHttpsScorer {
    hosts: Vec<String>,
    timeout: Duration,
}

impl BatchHttpsScorer {
    /// `hosts` must contain at least 2 entries — with just one host a
    /// single failure wouldn't reliably zero out the score (see
    /// [`delta_for`]'s doc comment for why).
    pub fn new(hosts: Vec<String>) -> Result<Self, ScorerError> {
        if hosts.len() < 2 {
            return Err(ScorerError::TooFewHosts(hosts.len()));
        }
        // Ceil so that N total failures sum to exactly -MAX_SCORE, never
        // less in absolute value.
        let avg = (MAX_SCORE as f64 / hosts.len() as f64).ceil();
        let timeout = Duration::from_secs_f64(avg * 2.0);
        Ok(Self { hosts, timeout })
    }

    /// Scores `endpoint` in place, returning its resulting score.
    pub async fn score(&self, endpoint: &mut Endpoint) -> Result<i8, ScorerError> {
        let proxy = reqwest::Proxy::all(format!("http://{}", endpoint.addr()))?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .build()?;

        for host in &self.hosts {
            let start = Instant::now();
            let rt = match client.get(host).send().await {
                Ok(resp) if resp.status().is_success() => start.elapsed(),
                _ => self.timeout,
            };
            endpoint.add_score(delta_for(self.timeout, rt));
        }
        Ok(endpoint.score())
    }
}

/// If `rt` is under half the timeout, reward the difference; otherwise
/// penalize it. Floored (not rounded) so that a request which times out
/// exactly (`rt == timeout`) always nets a full `-timeout/2`, which is what
/// guarantees the all-failures-zeroes-the-score invariant.
fn delta_for(timeout: Duration, rt: Duration) -> i8 {
    let half = timeout.as_secs_f64() / 2.0;
    let delta = (half - rt.as_secs_f64()).floor();
    delta.clamp(i8::MIN as f64, i8::MAX as f64) as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_fewer_than_two_hosts() {
        assert!(matches!(
            BatchHttpsScorer::new(vec!["https://a.example".into()]),
            Err(ScorerError::TooFewHosts(1))
        ));
    }

    #[test]
    fn timeout_ceils_so_failures_zero_the_score() {
        let scorer = BatchHttpsScorer::new(vec![
            "https://a.example".into(),
            "https://b.example".into(),
            "https://c.example".into(),
        ])
        .unwrap();
        // ceil(100/3) * 2 = 34 * 2 = 68s; a full timeout on all 3 hosts
        // nets floor(-34) * 3 = -102, saturating the score to exactly 0.
        assert_eq!(scorer.timeout, Duration::from_secs(68));
        assert_eq!(delta_for(scorer.timeout, scorer.timeout), -34);
    }

    #[test]
    fn fast_response_increases_score() {
        let timeout = Duration::from_secs(20);
        assert_eq!(delta_for(timeout, Duration::from_secs(1)), 9);
    }

    #[test]
    fn slow_response_decreases_score() {
        let timeout = Duration::from_secs(20);
        assert_eq!(delta_for(timeout, Duration::from_secs(15)), -5);
    }

    /// Build endpoint `127.0.0.1:1` (a reserved port that refuses
    /// connections immediately) with a fresh score of 100, score it
    /// against two unreachable hosts. Every request fails at the
    /// proxy-connect stage, well before the 100s timeout, so both deltas
    /// are `-50` and the score bottoms out at exactly 0.
    #[tokio::test]
    async fn scoring_saturates_to_zero_against_an_unreachable_proxy() {
        let scorer = BatchHttpsScorer::new(vec![
            "https://unreachable-a.example.invalid".into(),
            "https://unreachable-b.example.invalid".into(),
        ])
        .unwrap();
        let mut endpoint = proksi_core::Builder::new()
            .addr_port("127.0.0.1:1")
            .score(100)
            .must_build();

        let score = scorer.score(&mut endpoint).await.unwrap();
        assert_eq!(score, 0);
        assert_eq!(endpoint.score(), 0);
    }
}
