//! Periodically scrapes free-proxy listing pages and feeds discovered
//! `(ip, port)` candidates into [`proksi_dedup`].
//!
//! Grounded on `examples/original_source/pkg/spider/spider.go`'s `Spider`:
//! a per-domain rate limit (`Rule.Limit`), a round-based crawl loop driven
//! by a channel rather than a raw `time.Sleep`, and idempotent start/stop.

pub mod collector;
pub mod config;
pub mod parser;

pub use collector::BatchedCollector;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proksi_core::Builder;
use rand::Rng;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use config::{Config, ConfigError, ResolvedRule};
pub use parser::{ParserConfig, ParserError};

#[derive(Debug, thiserror::Error)]
pub enum HarvesterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parser(#[from] ParserError),
}

/// A single harvester instance: one set of URLs, one parser, one schedule.
pub struct Harvester {
    id: String,
    urls: Vec<String>,
    enabled: bool,
    rule: ResolvedRule,
    parser: Box<dyn parser::Parser>,
    http: reqwest::Client,
    round: AtomicU32,
    stop: Mutex<Option<mpsc::Sender<()>>>,
    collector: BatchedCollector<(String, String)>,
}

impl Harvester {
    pub fn new(config: Config, dedup: proksi_dedup::Sender) -> Result<Self, HarvesterError> {
        config.validate()?;
        let rule = config.resolve_rule();
        let parser = parser::build(&config.parser)?;
        let id = config.id;

        let (collector, mut batches) = BatchedCollector::new(rule.delay, rule.parallelism.max(2) * 4);
        let batch_id = id.clone();
        tokio::spawn(async move {
            while let Some(batch) = batches.recv().await {
                for (ip, port) in batch {
                    match Builder::new().ip(&ip).port(&port).build() {
                        Ok(endpoint) => {
                            dedup.send(endpoint.addr()).await;
                        }
                        Err(errors) => {
                            debug!(harvester = %batch_id, ip, port, ?errors, "discarding malformed candidate");
                        }
                    }
                }
            }
        });

        Ok(Self {
            id,
            urls: config.urls,
            enabled: config.enabled,
            rule,
            parser,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .expect("reqwest client config is static and known-good"),
            round: AtomicU32::new(0),
            stop: Mutex::new(None),
            collector,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fetches every configured URL once, bounding concurrency by
    /// `rule.limit.parallelism` and spacing requests by `delay +/-
    /// jitter`, parses each response, and forwards discovered candidates.
    /// Safe to call directly (`TryCrawl` in the original) outside the
    /// scheduled loop, e.g. when the registry runs low.
    pub async fn crawl_once(self: &Arc<Self>) {
        let round = self.round.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(harvester = %self.id, round, "start crawling");

        let semaphore = Arc::new(Semaphore::new(self.rule.parallelism));
        let mut tasks = Vec::with_capacity(self.urls.len());

        for (i, url) in self.urls.iter().cloned().enumerate() {
            let this = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                if i > 0 {
                    tokio::time::sleep(this.delay_with_jitter()).await;
                }
                this.fetch_and_parse(&url).await;
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    fn delay_with_jitter(&self) -> Duration {
        if self.rule.jitter.is_zero() {
            return self.rule.delay;
        }
        let extra = rand::thread_rng().gen_range(0..=self.rule.jitter.as_millis() as u64);
        self.rule.delay + Duration::from_millis(extra)
    }

    async fn fetch_and_parse(&self, url: &str) {
        let resp = match self.http.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(harvester = %self.id, url, error = %e, "failed to crawl");
                return;
            }
        };
        let is_xml = response_is_xml(&resp, url);
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(harvester = %self.id, url, error = %e, "failed to read response body");
                return;
            }
        };

        let found = if is_xml {
            self.parser.parse_xml(&body)
        } else {
            self.parser.parse_html(&body)
        };
        for candidate in found {
            self.collector.collect(candidate);
        }
    }

    /// Starts the scheduled crawl loop in the background. A no-op if the
    /// harvester is disabled or already started; matches `Spider.Start`'s
    /// `sync.Once` gate.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.enabled {
            warn!(harvester = %self.id, "harvester disabled, not starting");
            return None;
        }

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            let (stop_tx, mut stop_rx) = mpsc::channel(1);
            {
                let mut guard = this.stop.lock().await;
                if guard.is_some() {
                    return;
                }
                *guard = Some(stop_tx);
            }

            loop {
                tokio::select! {
                    _ = this.crawl_once() => {}
                    _ = stop_rx.recv() => return,
                }
                tokio::select! {
                    _ = tokio::time::sleep(this.rule.interval) => {}
                    _ = stop_rx.recv() => return,
                }
            }
        }))
    }

    pub async fn stop(&self) {
        if let Some(tx) = self.stop.lock().await.take() {
            let _ = tx.send(()).await;
        }
    }
}

/// Decides HTML vs XML the way `examples/original_source/pkg/spider/spider.go`
/// picks a decoder: the response's `Content-Type` wins when present, else the
/// URL's `.xml`/`.xml.gz` suffix, else HTML.
fn response_is_xml(resp: &reqwest::Response, url: &str) -> bool {
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if content_type.contains("xml") {
        return true;
    }
    if content_type.contains("html") {
        return false;
    }
    let url = url.to_ascii_lowercase();
    url.ends_with(".xml") || url.ends_with(".xml.gz")
}
