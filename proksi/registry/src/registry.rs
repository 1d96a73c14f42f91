use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::RwLock;

use proksi_core::Endpoint;

use crate::filter::{self, Filter};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("endpoint has non-positive score and cannot be inserted")]
    InvalidScore,
    #[error("endpoint {0} already exists")]
    AlreadyExists(SocketAddr),
    #[error("endpoint {0} does not exist")]
    NotFound(SocketAddr),
    #[error("no endpoint available matching the given selection")]
    NoneAvailable,
}

/// Dual-indexed in-memory store of known endpoints: a hash map for O(1)
/// lookup by address, and a `BTreeSet` keyed `(score desc, addr)` for
/// O(log n) score-ordered iteration.
///
/// Grounded on `examples/original_source/pkg/storage/backend/inmemory.go`'s
/// `InMemoryBackend`, which pairs a `map[hash64(IP)]*Proxy` with an
/// `rbtree.Rbtree` ordered by score. A `BTreeSet` of `(Reverse<score>,
/// addr)` tuples gives the same descending-by-score walk without pulling in
/// a red-black tree crate.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    by_addr: HashMap<SocketAddr, Endpoint>,
    by_score: BTreeSet<(Reverse<i8>, SocketAddr)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_locked(inner: &mut Inner, endpoint: Endpoint) {
        let key = (Reverse(endpoint.score()), endpoint.addr());
        inner.by_score.insert(key);
        inner.by_addr.insert(endpoint.addr(), endpoint);
    }

    fn remove_locked(inner: &mut Inner, addr: SocketAddr) -> Option<Endpoint> {
        let removed = inner.by_addr.remove(&addr)?;
        inner.by_score.remove(&(Reverse(removed.score()), addr));
        Some(removed)
    }

    /// Inserts a brand-new endpoint. Fails if one already exists at the
    /// same address, or if the endpoint's score is non-positive — a freshly
    /// probed endpoint with a zero score isn't worth keeping around.
    pub fn insert(&self, endpoint: Endpoint) -> Result<(), RegistryError> {
        if endpoint.score() <= 0 {
            return Err(RegistryError::InvalidScore);
        }
        let mut inner = self.inner.write().unwrap();
        if inner.by_addr.contains_key(&endpoint.addr()) {
            return Err(RegistryError::AlreadyExists(endpoint.addr()));
        }
        Self::insert_locked(&mut inner, endpoint);
        Ok(())
    }

    /// Replaces an existing endpoint at the same address.
    pub fn update(&self, endpoint: Endpoint) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.by_addr.contains_key(&endpoint.addr()) {
            return Err(RegistryError::NotFound(endpoint.addr()));
        }
        Self::remove_locked(&mut inner, endpoint.addr());
        Self::insert_locked(&mut inner, endpoint);
        Ok(())
    }

    /// Inserts `endpoint` if its address is new, otherwise updates the
    /// existing entry in place. Returns `true` if this was an insertion.
    pub fn insert_or_update(&self, endpoint: Endpoint) -> Result<bool, RegistryError> {
        let mut inner = self.inner.write().unwrap();
        let existed = inner.by_addr.contains_key(&endpoint.addr());
        if existed {
            Self::remove_locked(&mut inner, endpoint.addr());
            Self::insert_locked(&mut inner, endpoint);
            Ok(false)
        } else {
            if endpoint.score() <= 0 {
                return Err(RegistryError::InvalidScore);
            }
            Self::insert_locked(&mut inner, endpoint);
            Ok(true)
        }
    }

    pub fn delete(&self, addr: SocketAddr) -> Result<Endpoint, RegistryError> {
        let mut inner = self.inner.write().unwrap();
        Self::remove_locked(&mut inner, addr).ok_or(RegistryError::NotFound(addr))
    }

    pub fn search(&self, addr: SocketAddr) -> Option<Endpoint> {
        self.inner.read().unwrap().by_addr.get(&addr).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest-scoring `k` endpoints, or all of them if `k == 0`.
    pub fn top_k(&self, k: usize) -> Vec<Endpoint> {
        let inner = self.inner.read().unwrap();
        let iter = inner.by_score.iter().filter_map(|(_, addr)| inner.by_addr.get(addr).cloned());
        if k == 0 {
            iter.collect()
        } else {
            iter.take(k).collect()
        }
    }

    /// All endpoints, score-descending.
    pub fn iter(&self) -> Vec<Endpoint> {
        self.top_k(0)
    }

    /// Applies `filters` in order over the full score-descending listing,
    /// returning endpoints `[offset, offset+limit)` of what remains (or to
    /// the end, if `limit == 0`).
    pub fn select(
        &self,
        filters: &[Filter],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Endpoint>, RegistryError> {
        let endpoints = filter::apply(filters, self.top_k(0));
        if endpoints.is_empty() || offset >= endpoints.len() {
            return Err(RegistryError::NoneAvailable);
        }
        let remaining = endpoints.len() - offset;
        let take = if limit == 0 || limit >= remaining { remaining } else { limit };
        Ok(endpoints[offset..offset + take].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proksi_core::Builder;

    fn endpoint(addr: &str, score: i8) -> Endpoint {
        Builder::new().addr_port(addr).score(score).must_build()
    }

    #[test]
    fn insert_rejects_duplicate_addr() {
        let r = Registry::new();
        r.insert(endpoint("127.0.0.1:1", 10)).unwrap();
        assert_eq!(
            r.insert(endpoint("127.0.0.1:1", 20)).unwrap_err(),
            RegistryError::AlreadyExists("127.0.0.1:1".parse().unwrap())
        );
    }

    #[test]
    fn insert_rejects_non_positive_score() {
        let r = Registry::new();
        assert_eq!(
            r.insert(endpoint("127.0.0.1:1", 0)).unwrap_err(),
            RegistryError::InvalidScore
        );
    }

    #[test]
    fn top_k_orders_by_score_descending() {
        let r = Registry::new();
        r.insert(endpoint("127.0.0.1:1", 10)).unwrap();
        r.insert(endpoint("127.0.0.1:2", 90)).unwrap();
        r.insert(endpoint("127.0.0.1:3", 50)).unwrap();

        let top = r.top_k(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].score(), 90);
        assert_eq!(top[1].score(), 50);
    }

    #[test]
    fn insert_or_update_reports_which_happened() {
        let r = Registry::new();
        assert!(r.insert_or_update(endpoint("127.0.0.1:1", 10)).unwrap());
        assert!(!r.insert_or_update(endpoint("127.0.0.1:1", 20)).unwrap());
        assert_eq!(r.search("127.0.0.1:1".parse().unwrap()).unwrap().score(), 20);
    }

    #[test]
    fn delete_removes_from_both_indices() {
        let r = Registry::new();
        r.insert(endpoint("127.0.0.1:1", 10)).unwrap();
        r.delete("127.0.0.1:1".parse().unwrap()).unwrap();
        assert!(r.search("127.0.0.1:1".parse().unwrap()).is_none());
        assert_eq!(r.top_k(0).len(), 0);
    }

    #[test]
    fn select_applies_filters_then_paginates() {
        let r = Registry::new();
        r.insert(endpoint("127.0.0.1:1", 90)).unwrap();
        r.insert(endpoint("127.0.0.1:2", 10)).unwrap();
        r.insert(endpoint("127.0.0.1:3", 50)).unwrap();

        let selected = r.select(&[filter::by_score(40)], 0, 0).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].score(), 90);
        assert_eq!(selected[1].score(), 50);
    }

    #[test]
    fn top_k_zero_returns_every_endpoint_in_score_order() {
        let r = Registry::new();
        r.insert(endpoint("127.0.0.1:1", 50)).unwrap();
        r.insert(endpoint("127.0.0.1:2", 80)).unwrap();
        r.insert(endpoint("127.0.0.1:3", 30)).unwrap();

        let top2 = r.top_k(2);
        assert_eq!(top2.iter().map(Endpoint::score).collect::<Vec<_>>(), vec![80, 50]);

        let all = r.top_k(0);
        assert_eq!(all.iter().map(Endpoint::score).collect::<Vec<_>>(), vec![80, 50, 30]);
    }

    #[test]
    fn insert_or_update_then_search_returns_just_inserted_endpoint() {
        let r = Registry::new();
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        r.insert_or_update(endpoint("127.0.0.1:1", 42)).unwrap();
        assert_eq!(r.search(addr).unwrap().score(), 42);
    }

    #[test]
    fn select_errors_when_nothing_matches() {
        let r = Registry::new();
        r.insert(endpoint("127.0.0.1:1", 10)).unwrap();
        assert_eq!(
            r.select(&[filter::by_score(99)], 0, 0).unwrap_err(),
            RegistryError::NoneAvailable
        );
    }
}
