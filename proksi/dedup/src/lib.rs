//! A bounded channel that silently drops addresses it has already seen,
//! sitting in front of harvested candidates before they reach the
//! scheduler's admission loop.
//!
//! Grounded on `examples/original_source/pkg/proxy/chan.go`'s
//! `BloomCachedChan`: a bloom filter gates entry into an otherwise-ordinary
//! bounded channel so that a harvester re-scraping the same page twice (or
//! two harvesters finding the same proxy) doesn't re-admit it.

use std::net::{IpAddr, SocketAddr};

use bloomfilter::Bloom;
use tokio::sync::mpsc;
use tracing::trace;

/// Expected number of distinct addresses the filter is sized for. Beyond
/// this the false-positive rate climbs above [`FALSE_POSITIVE_RATE`], which
/// only costs us an occasional spuriously-dropped rediscovery — not
/// correctness.
const EXPECTED_ITEMS: usize = 1_000_000;
const FALSE_POSITIVE_RATE: f64 = 0.000_000_001;
const CHANNEL_CAPACITY: usize = 1024;

/// Sending half: deduplicates (by IP only — two different ports on the
/// same IP collapse to one dedup-channel slot, matching the original's
/// `pxy.IP`-only hash) then enqueues.
#[derive(Clone)]
pub struct Sender {
    seen: std::sync::Arc<tokio::sync::Mutex<Bloom<IpAddr>>>,
    tx: mpsc::Sender<SocketAddr>,
}

/// Receiving half: plain FIFO draw, dedup already happened on the way in.
pub struct Receiver {
    rx: mpsc::Receiver<SocketAddr>,
}

/// Builds a dedup channel pair sized for roughly a million distinct
/// addresses over its lifetime.
pub fn channel() -> (Sender, Receiver) {
    let bloom = Bloom::new_for_fp_rate(EXPECTED_ITEMS, FALSE_POSITIVE_RATE);
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        Sender {
            seen: std::sync::Arc::new(tokio::sync::Mutex::new(bloom)),
            tx,
        },
        Receiver { rx },
    )
}

impl Sender {
    /// Enqueues `addr` unless its IP has already been seen (the port is
    /// ignored for dedup purposes, though the full `addr` still goes
    /// through to the channel). The filter is marked *before* the
    /// (potentially blocking) send, matching the original's comment: once
    /// this call blocks on a full channel we must not let a concurrent
    /// duplicate slip through.
    ///
    /// Returns `true` if the address was newly admitted.
    pub async fn send(&self, addr: SocketAddr) -> bool {
        let ip = addr.ip();
        let mut seen = self.seen.lock().await;
        if seen.check(&ip) {
            trace!(%addr, "dropping already-seen candidate");
            return false;
        }
        seen.set(&ip);
        drop(seen);

        // The receiver may have gone away (shutdown); treat that the same
        // as "not admitted" rather than propagating a channel error.
        self.tx.send(addr).await.is_ok()
    }
}

impl Receiver {
    pub async fn recv(&mut self) -> Option<SocketAddr> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_addr_is_dropped() {
        let (tx, mut rx) = channel();
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();

        assert!(tx.send(addr).await);
        assert!(!tx.send(addr).await);

        assert_eq!(rx.recv().await, Some(addr));
    }

    #[tokio::test]
    async fn distinct_ips_both_pass() {
        let (tx, mut rx) = channel();
        let a: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let b: SocketAddr = "127.0.0.2:8080".parse().unwrap();

        assert!(tx.send(a).await);
        assert!(tx.send(b).await);

        let mut received = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        received.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(received, expected);
    }

    /// Two different ports on the same IP collapse to a single dedup-channel
    /// slot — the bloom filter is keyed on IP only, not `SocketAddr`.
    #[tokio::test]
    async fn same_ip_different_ports_collapse_to_one_slot() {
        let (tx, mut rx) = channel();
        let first: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let second: SocketAddr = "127.0.0.1:9090".parse().unwrap();

        assert!(tx.send(first).await);
        assert!(!tx.send(second).await);

        assert_eq!(rx.recv().await, Some(first));
    }
}
