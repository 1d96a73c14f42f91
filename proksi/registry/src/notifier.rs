use proksi_core::Endpoint;
use tokio::sync::{broadcast, mpsc};

use crate::filter::{self, Filter};
use crate::registry::{Registry, RegistryError};

/// The registry operation that produced an [`Event`].
///
/// Grounded on `examples/original_source/pkg/storage/backend/notification.go`'s
/// `Op` enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug)]
pub struct Event {
    pub op: Op,
    pub endpoint: Endpoint,
}

const BROADCAST_CAPACITY: usize = 256;

/// Wraps a [`Registry`] so every successful mutation also broadcasts an
/// [`Event`] to whoever is watching, via [`NotifyRegistry::watch_insertions`].
///
/// Each watcher gets its own task draining the shared broadcast channel and
/// applying its own filters before forwarding — a slow or stalled watcher
/// only ever lags on its own queue, it can't block `notify()` or other
/// watchers. Grounded on the same file's `notifyBackendWrapper` /
/// `InsertionWatcher`, translated from Go's one-goroutine-per-watcher
/// pubsub into a tokio task per watcher.
pub struct NotifyRegistry {
    registry: Registry,
    events: broadcast::Sender<Event>,
}

impl Default for NotifyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            registry: Registry::new(),
            events,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn notify(&self, op: Op, endpoint: Endpoint) {
        // No receivers is the common case (nobody watching yet); a send
        // error there is expected and not a bug.
        let _ = self.events.send(Event { op, endpoint });
    }

    pub fn insert(&self, endpoint: Endpoint) -> Result<(), RegistryError> {
        self.registry.insert(endpoint.clone())?;
        self.notify(Op::Insert, endpoint);
        Ok(())
    }

    pub fn update(&self, endpoint: Endpoint) -> Result<(), RegistryError> {
        self.registry.update(endpoint.clone())?;
        self.notify(Op::Update, endpoint);
        Ok(())
    }

    pub fn insert_or_update(&self, endpoint: Endpoint) -> Result<bool, RegistryError> {
        let inserted = self.registry.insert_or_update(endpoint.clone())?;
        self.notify(if inserted { Op::Insert } else { Op::Update }, endpoint);
        Ok(inserted)
    }

    pub fn delete(&self, addr: std::net::SocketAddr) -> Result<Endpoint, RegistryError> {
        let removed = self.registry.delete(addr)?;
        self.notify(Op::Delete, removed.clone());
        Ok(removed)
    }

    /// Attaches a new watcher interested only in insertions (including
    /// insertions that arrive via `insert_or_update`), narrowed by
    /// `filters`. Returns a channel the caller drains; dropping it detaches
    /// the watcher once its backlog is consumed.
    pub fn watch_insertions(&self, filters: Vec<Filter>, buffer: usize) -> mpsc::Receiver<Endpoint> {
        self.watch_op(Op::Insert, filters, buffer)
    }

    /// Attaches a new watcher interested only in deletions (including
    /// deletions that arrive via `insert_or_update` replacing an existing
    /// entry — though that path currently only ever inserts). Unlike
    /// [`NotifyRegistry::watch_insertions`] this takes no filters: a
    /// deletion always means "tear down whatever was built for this
    /// address", regardless of the endpoint's last-known attributes.
    pub fn watch_deletions(&self, buffer: usize) -> mpsc::Receiver<Endpoint> {
        self.watch_op(Op::Delete, Vec::new(), buffer)
    }

    fn watch_op(&self, want: Op, filters: Vec<Filter>, buffer: usize) -> mpsc::Receiver<Endpoint> {
        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::channel(buffer);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(Event { op, endpoint }) if op == want => {
                        let matched = filter::apply(&filters, vec![endpoint]);
                        if let Some(endpoint) = matched.into_iter().next() {
                            if tx.send(endpoint).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proksi_core::Builder;

    #[tokio::test]
    async fn watcher_receives_only_matching_insertions() {
        let registry = NotifyRegistry::new();
        let mut watched = registry.watch_insertions(vec![filter::by_score(50)], 8);

        registry
            .insert(Builder::new().addr_port("127.0.0.1:1").score(10).must_build())
            .unwrap();
        registry
            .insert(Builder::new().addr_port("127.0.0.1:2").score(90).must_build())
            .unwrap();

        let received = watched.recv().await.unwrap();
        assert_eq!(received.addr().to_string(), "127.0.0.1:2");
    }

    #[tokio::test]
    async fn watcher_ignores_low_uptime_insertions_and_deletions() {
        let registry = NotifyRegistry::new();
        let mut watched = registry.watch_insertions(vec![filter::by_uptime(0.8)], 8);

        let high_uptime = Builder::new()
            .addr_port("127.0.0.1:1")
            .quality(proksi_core::Quality::new(std::time::Duration::ZERO, 0.9))
            .score(10)
            .must_build();
        registry.insert(high_uptime).unwrap();

        let low_uptime = Builder::new()
            .addr_port("127.0.0.1:2")
            .quality(proksi_core::Quality::new(std::time::Duration::ZERO, 0.5))
            .score(10)
            .must_build();
        registry.insert(low_uptime).unwrap();

        let received = watched.recv().await.unwrap();
        assert_eq!(received.addr().to_string(), "127.0.0.1:1");

        registry.delete("127.0.0.1:1".parse().unwrap()).unwrap();
        // Nothing else should ever arrive: the low-uptime insertion was
        // filtered out and deletions aren't delivered to insertion
        // watchers at all.
        assert!(watched.try_recv().is_err());
    }

    #[tokio::test]
    async fn watch_deletions_ignores_inserts_and_updates() {
        let registry = NotifyRegistry::new();
        let mut watched = registry.watch_deletions(8);

        registry
            .insert(Builder::new().addr_port("127.0.0.1:1").score(10).must_build())
            .unwrap();
        registry
            .update(Builder::new().addr_port("127.0.0.1:1").score(20).must_build())
            .unwrap();
        registry.delete("127.0.0.1:1".parse().unwrap()).unwrap();

        let received = watched.recv().await.unwrap();
        assert_eq!(received.addr().to_string(), "127.0.0.1:1");
        assert!(watched.try_recv().is_err());
    }

    #[tokio::test]
    async fn updates_are_not_delivered_to_insertion_watchers() {
        let registry = NotifyRegistry::new();
        registry
            .insert(Builder::new().addr_port("127.0.0.1:1").score(10).must_build())
            .unwrap();
        let mut watched = registry.watch_insertions(vec![], 8);

        registry
            .update(Builder::new().addr_port("127.0.0.1:1").score(20).must_build())
            .unwrap();
        registry
            .insert(Builder::new().addr_port("127.0.0.1:2").score(30).must_build())
            .unwrap();

        let received = watched.recv().await.unwrap();
        assert_eq!(received.addr().to_string(), "127.0.0.1:2");
    }
}
