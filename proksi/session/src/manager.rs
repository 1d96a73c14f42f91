use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Response};
use proksi_balance::{LoadBalancer, Strategy};
use proksi_registry::{Filter, NotifyRegistry};

use crate::session::{Session, SessionError, SessionHandle};

/// Uptime threshold a newly-admitted endpoint must clear before a session
/// is opened for it. Matches
/// `examples/original_source/pkg/middleman/session.go`'s
/// `storage.FilterUptime(90)` (expressed here as a `0.0..=1.0` fraction
/// rather than a percentage).
pub const MIN_UPTIME: f64 = 0.9;

#[derive(Debug, thiserror::Error)]
pub enum RoundTripError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Direct(#[from] hyper::Error),
}

/// Keeps one [`Session`] open per admitted, sufficiently-reliable
/// endpoint, and round-trips requests through whichever the load balancer
/// picks.
///
/// Grounded on the same file's `SessionManager`. The original has a latent
/// bug worth calling out explicitly rather than reproducing: when
/// `pickOne` fails (no session available) it falls back to
/// `http.DefaultTransport`, but the code that follows unconditionally
/// calls `sm.lb.DelEndpoint(v.s)` on error — `v.s` is `nil` on the fallback
/// path, so a failed direct request would evict a session that was never
/// even selected. `round_trip` below only evicts when a `Session` was
/// actually used.
pub struct SessionManager {
    balancer: LoadBalancer<SessionHandle>,
    direct: Client<HttpConnector>,
    sessions: RwLock<HashMap<SocketAddr, SessionHandle>>,
}

impl SessionManager {
    /// Builds a manager and attaches it to `registry`'s insertion and
    /// deletion streams: opens a session for every endpoint that clears
    /// [`MIN_UPTIME`], and tears one down the moment its endpoint is
    /// deleted from the registry, per the same file's `SessionManager`
    /// reacting to `backend.Delete` notifications.
    pub fn attach(registry: &NotifyRegistry, strategy: Strategy) -> Arc<Self> {
        let manager = Arc::new(Self {
            balancer: LoadBalancer::new(strategy, Vec::new()),
            direct: Client::new(),
            sessions: RwLock::new(HashMap::new()),
        });

        let filters: Vec<Filter> = vec![proksi_registry::by_uptime(MIN_UPTIME)];
        let mut insertions = registry.watch_insertions(filters, 128);
        let mut deletions = registry.watch_deletions(128);

        let this = Arc::clone(&manager);
        tokio::spawn(async move {
            while let Some(endpoint) = insertions.recv().await {
                let handle = SessionHandle(Arc::new(Session::new(endpoint.addr(), endpoint.score())));
                this.balancer.add_endpoint(handle.clone());
                this.sessions.write().unwrap().insert(endpoint.addr(), handle);
            }
        });

        let this = Arc::clone(&manager);
        tokio::spawn(async move {
            while let Some(endpoint) = deletions.recv().await {
                if let Some(handle) = this.sessions.write().unwrap().remove(&endpoint.addr()) {
                    this.balancer.del_endpoint(&handle);
                }
            }
        });

        manager
    }

    fn pick(&self) -> Option<SessionHandle> {
        self.balancer.select()
    }

    /// Round-trips `req` through whichever session the balancer selects,
    /// falling back to a direct connection (bypassing the balancer
    /// entirely) when no session is currently available.
    pub async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, RoundTripError> {
        match self.pick() {
            Some(handle) => match handle.0.round_trip(req).await {
                Ok(resp) => Ok(resp),
                Err(e) => {
                    self.balancer.del_endpoint(&handle);
                    self.sessions.write().unwrap().remove(&handle.0.addr());
                    Err(e.into())
                }
            },
            None => Ok(self.direct.request(req).await?),
        }
    }
}
