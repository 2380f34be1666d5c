// src/load_balancer/algorithm.rs
use std::collections::HashMap;

/// Read-only view of the pool handed to a selection policy while the pool
/// lock is held.
#[derive(Debug, Clone, Copy)]
pub struct PoolSnapshot<'a> {
    healthy: &'a [String],
    connections: &'a HashMap<String, usize>,
}

impl<'a> PoolSnapshot<'a> {
    pub fn new(healthy: &'a [String], connections: &'a HashMap<String, usize>) -> Self {
        Self { healthy, connections }
    }

    pub fn healthy(&self) -> &'a [String] {
        self.healthy
    }

    pub fn connection_count(&self, addr: &str) -> usize {
        self.connections.get(addr).copied().unwrap_or(0)
    }
}

pub trait LoadBalancer: Send + Sync {
    /// Picks a healthy backend, or `None` when the healthy set is empty.
    /// `cursor` is the pool-owned rotation state; policies that do not
    /// rotate leave it alone.
    fn select_backend<'a>(
        &self,
        snapshot: &PoolSnapshot<'a>,
        cursor: &mut usize,
    ) -> Option<&'a str>;

    fn name(&self) -> &'static str;
}
