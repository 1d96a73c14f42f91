//! Coordinates the whole pipeline: harvesters feed candidate addresses
//! into the dedup channel, the admission loop probes/scores/classifies
//! them into the registry, and two background sweeps keep already-known
//! endpoints fresh.
//!
//! Grounded on `examples/original_source/pkg/sched/sched.go`'s
//! `Scheduler`: `loopRecv`/`inspectProxy` becomes the admission loop,
//! `bgDetections` the completion sweep, `bgInspection` the inspection
//! sweep, and `bgCrawling` the harvest-drive loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use proksi_anonymity::Classifier;
use proksi_core::{Anonymity, Builder};
use proksi_geolocation::Geolocator;
use proksi_harvest::Harvester;
use proksi_registry::NotifyRegistry;
use proksi_scorer::BatchHttpsScorer;
use tracing::{debug, info, warn};

/// Tunable periods driving the background loops. Defaults mirror
/// `examples/original_source/pkg/sched/sched.go`'s hardcoded intervals;
/// the root binary's config file may override them.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub probe_timeout: Duration,
    pub completion_sweep_period: Duration,
    pub inspection_sweep_period: Duration,
    pub harvest_drive_period: Duration,
    /// Below this many registry entries, the harvest-drive loop crawls
    /// on demand instead of waiting for its own schedule. Matches the
    /// original's `bgCrawling` threshold of 100.
    pub registry_size_threshold: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            completion_sweep_period: Duration::from_secs(15 * 60),
            inspection_sweep_period: Duration::from_secs(30 * 60),
            harvest_drive_period: Duration::from_secs(20 * 60),
            registry_size_threshold: 100,
        }
    }
}

pub struct Scheduler {
    registry: Arc<NotifyRegistry>,
    scorer: BatchHttpsScorer,
    classifier: Classifier,
    geolocator: Geolocator,
    harvesters: Vec<Arc<Harvester>>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        registry: Arc<NotifyRegistry>,
        scorer: BatchHttpsScorer,
        classifier: Classifier,
        geolocator: Geolocator,
        harvesters: Vec<Arc<Harvester>>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            scorer,
            classifier,
            geolocator,
            harvesters,
            config,
        }
    }

    /// Starts every background task. Never returns; run it in its own
    /// task.
    pub async fn run(self: Arc<Self>, mut dedup: proksi_dedup::Receiver) {
        let this = Arc::clone(&self);
        tokio::spawn(async move { this.completion_sweep_loop().await });

        let this = Arc::clone(&self);
        tokio::spawn(async move { this.inspection_sweep_loop().await });

        let this = Arc::clone(&self);
        tokio::spawn(async move { this.harvest_drive_loop().await });

        while let Some(addr) = dedup.recv().await {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.admit(addr).await });
        }
    }

    /// Probes, scores, and inserts or evicts a single candidate. This is
    /// also what the inspection sweep re-runs for already-known
    /// endpoints.
    async fn admit(&self, addr: SocketAddr) {
        let (protocols, err) = proksi_protocol::probe(addr, self.config.probe_timeout).await;
        if protocols.is_empty() {
            debug!(%addr, ?err, "no protocol answered, discarding candidate");
            if self.registry.registry().search(addr).is_some() {
                let _ = self.registry.delete(addr);
            }
            return;
        }

        let mut endpoint = match Builder::new()
            .addr_port(&addr.to_string())
            .protocols(protocols)
            .traffic(protocols.supported_traffic())
            .score(proksi_core::MAX_SCORE)
            .build()
        {
            Ok(e) => e,
            Err(errors) => {
                warn!(%addr, ?errors, "failed to build endpoint for admitted candidate");
                return;
            }
        };

        let score = match self.scorer.score(&mut endpoint).await {
            Ok(score) => score,
            Err(e) => {
                warn!(%addr, error = %e, "scoring failed");
                return;
            }
        };

        if score > 0 {
            match self.registry.insert_or_update(endpoint) {
                Ok(true) => info!(%addr, score, "admitted new endpoint"),
                Ok(false) => debug!(%addr, score, "re-scored existing endpoint"),
                Err(e) => warn!(%addr, error = %e, "failed to admit endpoint"),
            }
        } else if self.registry.registry().search(addr).is_some() {
            info!(%addr, "score dropped to zero, evicting");
            let _ = self.registry.delete(addr);
        }
    }

    /// Fills in anonymity/geolocation for endpoints that don't have them
    /// yet. Runs roughly every `config.completion_sweep_period`.
    async fn completion_sweep_loop(&self) {
        let mut ticker = tokio::time::interval(self.config.completion_sweep_period);
        loop {
            ticker.tick().await;
            info!("starting completion sweep");
            for mut endpoint in self.registry.registry().iter() {
                let addr = endpoint.addr();
                let mut changed = false;

                if endpoint.anonymity() == Anonymity::Unknown {
                    match self.classifier.classify(addr).await {
                        Ok(anonymity) => {
                            endpoint.set_anonymity(anonymity);
                            changed = true;
                        }
                        Err(e) => debug!(%addr, error = %e, "anonymity detection failed"),
                    }
                }

                if endpoint.geolocation().is_none() {
                    match self.geolocator.locate(addr.ip()).await {
                        Ok(geo) => {
                            endpoint.set_geolocation(geo);
                            changed = true;
                        }
                        Err(e) => debug!(%addr, error = %e, "geolocation failed"),
                    }
                }

                if changed {
                    let _ = self.registry.update(endpoint);
                }
            }
            info!("finished completion sweep");
        }
    }

    /// Fully re-admits every known endpoint: re-probes its protocols and
    /// re-scores it, evicting anything that no longer holds up. Runs
    /// roughly every `config.inspection_sweep_period`.
    async fn inspection_sweep_loop(&self) {
        let mut ticker = tokio::time::interval(self.config.inspection_sweep_period);
        loop {
            ticker.tick().await;
            info!("starting inspection sweep");
            let addrs: Vec<SocketAddr> = self
                .registry
                .registry()
                .iter()
                .into_iter()
                .map(|e| e.addr())
                .collect();
            for addr in addrs {
                self.admit(addr).await;
            }
            info!("finished inspection sweep");
        }
    }

    /// Starts every configured harvester once, then periodically asks
    /// them all to crawl on demand whenever the registry has fewer
    /// endpoints than `config.registry_size_threshold`.
    async fn harvest_drive_loop(&self) {
        for harvester in &self.harvesters {
            harvester.start();
        }

        loop {
            if self.registry.registry().len() < self.config.registry_size_threshold {
                for harvester in &self.harvesters {
                    harvester.crawl_once().await;
                }
            }
            tokio::time::sleep(self.config.harvest_drive_period).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proksi_core::Builder;

    fn scheduler() -> Arc<Scheduler> {
        Arc::new(Scheduler::new(
            Arc::new(NotifyRegistry::new()),
            BatchHttpsScorer::new(vec![
                "https://a.example".into(),
                "https://b.example".into(),
            ])
            .unwrap(),
            Classifier::new("http://echo.example"),
            Geolocator::default_ip_api(),
            vec![],
            SchedulerConfig::default(),
        ))
    }

    #[test]
    fn starts_below_threshold_when_registry_empty() {
        let s = scheduler();
        assert!(s.registry.registry().len() < s.config.registry_size_threshold);
    }

    #[test]
    fn admitting_a_zero_score_endpoint_never_inserts() {
        let s = scheduler();
        let e = Builder::new().addr_port("127.0.0.1:1").score(0).must_build();
        assert!(s.registry.insert_or_update(e).is_err());
    }
}
