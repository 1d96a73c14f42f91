//! Picks among a pool of equally-admitted endpoints using one of three
//! strategies.
//!
//! Grounded on `examples/original_source/pkg/loadbalancer/loadbalancer.go`
//! and `pkg/utils/picker/strategy.go`: the former's `Endpoint`/
//! `weightedRoundRobin` shape this module, the latter shows the same
//! random/round-robin pair done more simply for the non-weighted cases.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use rand::Rng;

/// Anything a load balancer can pick among: a stable identity plus a
/// relative weight for [`Strategy::WeightedRoundRobin`].
pub trait Weighted: Clone + Eq + Hash {
    fn weight(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Random,
    RoundRobin,
    WeightedRoundRobin,
}

enum Algorithm<E> {
    Random,
    RoundRobin { cursor: AtomicU64 },
    WeightedRoundRobin { current_weight: RwLock<HashMap<E, i64>> },
}

/// Holds a pool of endpoints and picks among them per `strategy`.
pub struct LoadBalancer<E: Weighted> {
    endpoints: RwLock<Vec<E>>,
    algorithm: Algorithm<E>,
}

impl<E: Weighted> LoadBalancer<E> {
    pub fn new(strategy: Strategy, endpoints: Vec<E>) -> Self {
        let algorithm = match strategy {
            Strategy::Random => Algorithm::Random,
            Strategy::RoundRobin => Algorithm::RoundRobin {
                cursor: AtomicU64::new(rand::thread_rng().gen()),
            },
            Strategy::WeightedRoundRobin => Algorithm::WeightedRoundRobin {
                current_weight: RwLock::new(HashMap::new()),
            },
        };
        Self {
            endpoints: RwLock::new(endpoints),
            algorithm,
        }
    }

    pub fn add_endpoint(&self, endpoint: E) {
        let mut endpoints = self.endpoints.write().unwrap();
        if !endpoints.contains(&endpoint) {
            endpoints.push(endpoint);
        }
    }

    pub fn del_endpoint(&self, endpoint: &E) {
        self.endpoints.write().unwrap().retain(|e| e != endpoint);
        if let Algorithm::WeightedRoundRobin { current_weight } = &self.algorithm {
            current_weight.write().unwrap().remove(endpoint);
        }
    }

    pub fn select(&self) -> Option<E> {
        let endpoints = self.endpoints.read().unwrap();
        if endpoints.is_empty() {
            return None;
        }
        match &self.algorithm {
            Algorithm::Random => {
                let i = rand::thread_rng().gen_range(0..endpoints.len());
                Some(endpoints[i].clone())
            }
            Algorithm::RoundRobin { cursor } => {
                let i = cursor.fetch_add(1, Ordering::Relaxed) as usize % endpoints.len();
                Some(endpoints[i].clone())
            }
            Algorithm::WeightedRoundRobin { current_weight } => {
                self.select_weighted(&endpoints, current_weight)
            }
        }
    }

    /// Smooth weighted round robin: every pick, add each endpoint's weight
    /// to its running total, hand out the highest total, then subtract the
    /// sum of all weights from the winner. Over a window of `sum(weight)`
    /// picks this distributes selections proportionally to weight while
    /// keeping consecutive picks of the same heavy endpoint rare.
    fn select_weighted(
        &self,
        endpoints: &[E],
        current_weight: &RwLock<HashMap<E, i64>>,
    ) -> Option<E> {
        let mut current = current_weight.write().unwrap();
        let mut total_weight = 0i64;
        let mut best: Option<E> = None;
        let mut best_weight = i64::MIN;

        for e in endpoints {
            let w = e.weight() as i64;
            total_weight += w;
            let running = current.entry(e.clone()).or_insert(0);
            *running += w;
            if *running > best_weight {
                best_weight = *running;
                best = Some(e.clone());
            }
        }

        if let Some(best) = &best {
            *current.get_mut(best).unwrap() -= total_weight;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct E(u32, u32); // (id, weight)

    impl Weighted for E {
        fn weight(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn round_robin_cycles_through_all_endpoints() {
        let lb = LoadBalancer::new(
            Strategy::RoundRobin,
            vec![E(1, 1), E(2, 1), E(3, 1)],
        );
        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            seen.insert(lb.select().unwrap().0);
        }
        assert_eq!(seen, [1, 2, 3].into_iter().collect());
    }

    #[test]
    fn weighted_round_robin_distributes_by_weight() {
        let lb = LoadBalancer::new(
            Strategy::WeightedRoundRobin,
            vec![E(1, 5), E(2, 1), E(3, 1)],
        );
        let mut counts = HashMap::new();
        for _ in 0..7 {
            *counts.entry(lb.select().unwrap().0).or_insert(0) += 1;
        }
        // Over one full window (sum of weights = 7), the heavy endpoint
        // gets exactly its share.
        assert_eq!(counts[&1], 5);
        assert_eq!(counts[&2], 1);
        assert_eq!(counts[&3], 1);
    }

    #[test]
    fn select_returns_none_when_empty() {
        let lb: LoadBalancer<E> = LoadBalancer::new(Strategy::Random, vec![]);
        assert!(lb.select().is_none());
    }

    #[test]
    fn del_endpoint_removes_it_from_rotation() {
        let lb = LoadBalancer::new(Strategy::RoundRobin, vec![E(1, 1), E(2, 1)]);
        lb.del_endpoint(&E(1, 1));
        for _ in 0..4 {
            assert_eq!(lb.select().unwrap().0, 2);
        }
    }
}
