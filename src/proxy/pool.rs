//
// src/proxy/pool.rs
//

use super::proxy::ProxyError;
use crate::load_balancer::{LoadBalancer, PoolSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct PoolState {
    configured: Vec<String>,
    healthy: Vec<String>,
    connections: HashMap<String, usize>,
    cursor: usize,
}

impl PoolState {
    fn snapshot(&self) -> PoolSnapshot<'_> {
        PoolSnapshot::new(&self.healthy, &self.connections)
    }

    fn replace_healthy(&mut self, healthy: Vec<String>) {
        let connections = healthy
            .iter()
            .map(|addr| {
                let count = self.connections.get(addr).copied().unwrap_or(0);
                (addr.clone(), count)
            })
            .collect();

        self.healthy = healthy;
        self.connections = connections;
        self.clamp_cursor();

        tracing::debug!(
            healthy = self.healthy.len(),
            total = self.configured.len(),
            "Updated healthy backends"
        );
    }

    fn clamp_cursor(&mut self) {
        if self.cursor >= self.healthy.len() {
            self.cursor = 0;
        }
    }
}

/// Shared backend state: configured set, healthy subset, active-connection
/// counters and the round-robin cursor, all behind one lock.
///
/// The healthy set starts empty; the health checker populates it.
#[derive(Clone, Debug)]
pub struct BackendPool {
    state: Arc<RwLock<PoolState>>,
}

impl BackendPool {
    pub fn new(backends: Vec<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(PoolState {
                configured: backends,
                ..PoolState::default()
            })),
        }
    }

    pub fn configured_backends(&self) -> Vec<String> {
        self.state.read().configured.clone()
    }

    pub fn healthy_snapshot(&self) -> Vec<String> {
        self.state.read().healthy.clone()
    }

    pub fn connection_count(&self, addr: &str) -> usize {
        self.state.read().connections.get(addr).copied().unwrap_or(0)
    }

    pub fn increment_connections(&self, addr: &str) {
        let mut state = self.state.write();
        *state.connections.entry(addr.to_string()).or_insert(0) += 1;
    }

    /// No-op for unknown addresses and for counters already at zero.
    pub fn decrement_connections(&self, addr: &str) {
        let mut state = self.state.write();
        if let Some(count) = state.connections.get_mut(addr) {
            *count = count.saturating_sub(1);
        }
    }

    /// Replaces the healthy set. Counters of backends that stay healthy are
    /// carried over, new ones start at zero and the rest are dropped.
    pub fn update_healthy(&self, healthy: Vec<String>) {
        let mut state = self.state.write();
        state.replace_healthy(healthy);
    }

    /// Publishes one health check pass. Backends evicted while the pass was
    /// probing are left out even if they answered.
    pub fn publish_probe_results(&self, reachable: Vec<String>) -> Vec<String> {
        let mut state = self.state.write();
        let healthy: Vec<String> = reachable
            .into_iter()
            .filter(|addr| state.configured.contains(addr))
            .collect();
        state.replace_healthy(healthy.clone());
        healthy
    }

    /// Runs `balancer` against the current healthy set.
    pub fn select(&self, balancer: &dyn LoadBalancer) -> Result<String, ProxyError> {
        let mut state = self.state.write();
        let mut cursor = state.cursor;
        let chosen = balancer
            .select_backend(&state.snapshot(), &mut cursor)
            .map(String::from);
        state.cursor = cursor;
        chosen.ok_or(ProxyError::NoHealthyBackends)
    }

    /// Selects a backend and counts a connection against it in the same
    /// critical section. The count is released when the guard drops.
    pub fn acquire(&self, balancer: &dyn LoadBalancer) -> Result<ConnectionGuard, ProxyError> {
        let mut state = self.state.write();
        let mut cursor = state.cursor;
        let chosen = balancer
            .select_backend(&state.snapshot(), &mut cursor)
            .map(String::from)
            .ok_or(ProxyError::NoHealthyBackends)?;
        state.cursor = cursor;
        *state.connections.entry(chosen.clone()).or_insert(0) += 1;

        Ok(ConnectionGuard {
            pool: self.clone(),
            backend: chosen,
        })
    }

    /// Takes a backend out of rotation until the next health check
    /// re-admits it.
    pub fn quarantine(&self, addr: &str) -> bool {
        let mut state = self.state.write();
        let before = state.healthy.len();
        state.healthy.retain(|b| b != addr);
        state.connections.remove(addr);
        state.clamp_cursor();
        let removed = state.healthy.len() != before;
        if removed {
            tracing::info!(backend = %addr, "Quarantined backend");
        }
        removed
    }

    /// Removes a backend from the configured set; health checks never probe
    /// it again.
    pub fn evict(&self, addr: &str) -> bool {
        let mut state = self.state.write();
        let before = state.configured.len();
        state.configured.retain(|b| b != addr);
        state.healthy.retain(|b| b != addr);
        state.connections.remove(addr);
        state.clamp_cursor();
        let removed = state.configured.len() != before;
        if removed {
            tracing::info!(backend = %addr, "Evicted backend");
        }
        removed
    }
}

/// One active connection counted against a backend.
#[derive(Debug)]
pub struct ConnectionGuard {
    pool: BackendPool,
    backend: String,
}

impl ConnectionGuard {
    pub fn backend(&self) -> &str {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.pool.decrement_connections(&self.backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::{LeastConnectionsBalancer, RoundRobinBalancer};
    use proptest::prelude::*;

    fn addrs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn healthy_pool(names: &[&str]) -> BackendPool {
        let pool = BackendPool::new(addrs(names));
        pool.update_healthy(addrs(names));
        pool
    }

    #[test]
    fn starts_with_empty_healthy_set() {
        let pool = BackendPool::new(addrs(&["A", "B"]));
        assert!(pool.healthy_snapshot().is_empty());
        assert_eq!(pool.configured_backends(), addrs(&["A", "B"]));
        assert!(matches!(
            pool.select(&RoundRobinBalancer::new()),
            Err(ProxyError::NoHealthyBackends)
        ));
    }

    #[test]
    fn decrement_never_goes_below_zero() {
        let pool = healthy_pool(&["A"]);
        pool.decrement_connections("A");
        assert_eq!(pool.connection_count("A"), 0);

        pool.increment_connections("A");
        pool.increment_connections("A");
        pool.decrement_connections("A");
        assert_eq!(pool.connection_count("A"), 1);

        pool.decrement_connections("unknown");
        assert_eq!(pool.connection_count("unknown"), 0);
    }

    #[test]
    fn update_carries_counts_and_prunes_the_rest() {
        let pool = healthy_pool(&["A", "B", "C"]);
        pool.increment_connections("A");
        pool.increment_connections("B");
        pool.increment_connections("B");

        pool.update_healthy(addrs(&["C", "B", "D"]));

        assert_eq!(pool.healthy_snapshot(), addrs(&["C", "B", "D"]));
        assert_eq!(pool.connection_count("A"), 0);
        assert_eq!(pool.connection_count("B"), 2);
        assert_eq!(pool.connection_count("C"), 0);
        assert_eq!(pool.connection_count("D"), 0);
    }

    #[test]
    fn round_robin_follows_shrinking_healthy_set() {
        let pool = healthy_pool(&["A", "B", "C"]);
        let rr = RoundRobinBalancer::new();

        let picks: Vec<_> = (0..4).map(|_| pool.select(&rr).unwrap()).collect();
        assert_eq!(picks, addrs(&["A", "B", "C", "A"]));

        pool.update_healthy(addrs(&["A", "C"]));
        let picks: Vec<_> = (0..4).map(|_| pool.select(&rr).unwrap()).collect();
        assert!(!picks.contains(&"B".to_string()));
        assert!(picks.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn least_connections_with_acquire() {
        let pool = healthy_pool(&["A", "B", "C"]);
        pool.increment_connections("A");
        pool.increment_connections("A");
        pool.increment_connections("C");
        let lc = LeastConnectionsBalancer::new();

        let first = pool.acquire(&lc).unwrap();
        assert_eq!(first.backend(), "B");
        assert_eq!(pool.connection_count("B"), 1);

        let second = pool.acquire(&lc).unwrap();
        assert_eq!(second.backend(), "B");
        assert_eq!(pool.connection_count("B"), 2);

        drop(first);
        drop(second);
        assert_eq!(pool.connection_count("B"), 0);
    }

    #[test]
    fn guard_outliving_its_backend_is_harmless() {
        let pool = healthy_pool(&["A"]);
        let guard = pool.acquire(&LeastConnectionsBalancer::new()).unwrap();
        pool.update_healthy(Vec::new());
        drop(guard);
        assert_eq!(pool.connection_count("A"), 0);
        assert!(pool.healthy_snapshot().is_empty());
    }

    #[test]
    fn published_results_skip_backends_evicted_mid_check() {
        let pool = healthy_pool(&["A", "B"]);
        pool.increment_connections("B");
        // A pass started with both configured; A is evicted before it ends.
        assert!(pool.evict("A"));

        let published = pool.publish_probe_results(addrs(&["A", "B"]));
        assert_eq!(published, addrs(&["B"]));
        assert_eq!(pool.healthy_snapshot(), addrs(&["B"]));
        assert_eq!(pool.connection_count("A"), 0);
        assert_eq!(pool.connection_count("B"), 1);
        assert_eq!(pool.select(&RoundRobinBalancer::new()).unwrap(), "B");
    }

    #[test]
    fn quarantine_only_touches_healthy_set() {
        let pool = healthy_pool(&["A", "B"]);
        assert!(pool.quarantine("A"));
        assert!(!pool.quarantine("A"));
        assert_eq!(pool.healthy_snapshot(), addrs(&["B"]));
        assert_eq!(pool.configured_backends(), addrs(&["A", "B"]));
    }

    #[test]
    fn evict_removes_backend_everywhere() {
        let pool = healthy_pool(&["A", "D"]);
        pool.increment_connections("D");
        assert!(pool.evict("D"));
        assert!(!pool.evict("D"));
        assert_eq!(pool.configured_backends(), addrs(&["A"]));
        assert_eq!(pool.healthy_snapshot(), addrs(&["A"]));
        assert_eq!(pool.connection_count("D"), 0);
    }

    proptest! {
        #[test]
        fn increment_then_decrement_is_net_zero(start in 0usize..8) {
            let pool = healthy_pool(&["A"]);
            for _ in 0..start {
                pool.increment_connections("A");
            }
            pool.increment_connections("A");
            pool.decrement_connections("A");
            prop_assert_eq!(pool.connection_count("A"), start);
        }

        #[test]
        fn update_healthy_publishes_exact_list(
            before in proptest::collection::vec(0usize..6, 0..6),
            after in proptest::collection::vec(0usize..6, 0..6),
        ) {
            let dedup = |v: Vec<usize>| {
                let mut out: Vec<String> = Vec::new();
                for i in v {
                    let addr = format!("b{i}:1");
                    if !out.contains(&addr) {
                        out.push(addr);
                    }
                }
                out
            };
            let before = dedup(before);
            let after = dedup(after);

            let pool = BackendPool::new(before.clone());
            pool.update_healthy(before.clone());
            for addr in &before {
                pool.increment_connections(addr);
            }

            pool.update_healthy(after.clone());
            prop_assert_eq!(pool.healthy_snapshot(), after.clone());
            for i in 0..6 {
                let addr = format!("b{i}:1");
                let expected = usize::from(after.contains(&addr) && before.contains(&addr));
                prop_assert_eq!(pool.connection_count(&addr), expected);
            }
        }
    }
}
