// src/load_balancer/least_connections.rs
use crate::load_balancer::{LoadBalancer, PoolSnapshot};

/// Picks the healthy backend with the fewest active connections. Ties go to
/// whichever comes first in the healthy list.
#[derive(Debug, Default)]
pub struct LeastConnectionsBalancer;

impl LeastConnectionsBalancer {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnectionsBalancer {
    fn select_backend<'a>(
        &self,
        snapshot: &PoolSnapshot<'a>,
        _cursor: &mut usize,
    ) -> Option<&'a str> {
        let mut best: Option<(&'a str, usize)> = None;

        for addr in snapshot.healthy() {
            let count = snapshot.connection_count(addr);
            match best {
                Some((_, min)) if count >= min => {}
                _ => best = Some((addr.as_str(), count)),
            }
        }

        best.map(|(addr, _)| addr)
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}
