// src/load_balancer/round_robin.rs
use crate::load_balancer::{LoadBalancer, PoolSnapshot};

#[derive(Debug, Default)]
pub struct RoundRobinBalancer;

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn select_backend<'a>(
        &self,
        snapshot: &PoolSnapshot<'a>,
        cursor: &mut usize,
    ) -> Option<&'a str> {
        let backends = snapshot.healthy();
        if backends.is_empty() {
            return None;
        }

        // The healthy list may have shrunk since the cursor was last used.
        if *cursor >= backends.len() {
            *cursor = 0;
        }

        let chosen = &backends[*cursor];
        *cursor = (*cursor + 1) % backends.len();
        Some(chosen.as_str())
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn addrs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cycles_in_configured_order() {
        let healthy = addrs(&["A", "B", "C"]);
        let counts = HashMap::new();
        let snapshot = PoolSnapshot::new(&healthy, &counts);
        let balancer = RoundRobinBalancer::new();
        let mut cursor = 0;

        let picks: Vec<_> = (0..4)
            .map(|_| balancer.select_backend(&snapshot, &mut cursor).unwrap())
            .collect();
        assert_eq!(picks, vec!["A", "B", "C", "A"]);
    }

    #[test]
    fn out_of_range_cursor_restarts_at_zero() {
        let healthy = addrs(&["A", "C"]);
        let counts = HashMap::new();
        let snapshot = PoolSnapshot::new(&healthy, &counts);
        let mut cursor = 2;

        assert_eq!(
            RoundRobinBalancer::new().select_backend(&snapshot, &mut cursor),
            Some("A")
        );
        assert_eq!(cursor, 1);
    }

    #[test]
    fn empty_healthy_set_selects_nothing() {
        let healthy = Vec::new();
        let counts = HashMap::new();
        let snapshot = PoolSnapshot::new(&healthy, &counts);
        let mut cursor = 0;
        assert_eq!(RoundRobinBalancer::new().select_backend(&snapshot, &mut cursor), None);
    }

    proptest! {
        #[test]
        fn visits_every_backend_before_repeating(n in 1usize..16, start in 0usize..32) {
            let healthy: Vec<String> = (0..n).map(|i| format!("10.0.0.{i}:80")).collect();
            let counts = HashMap::new();
            let snapshot = PoolSnapshot::new(&healthy, &counts);
            let balancer = RoundRobinBalancer::new();
            let mut cursor = start;

            let first = balancer.select_backend(&snapshot, &mut cursor).unwrap().to_string();
            let mut seen = vec![first.clone()];
            for _ in 1..n {
                seen.push(balancer.select_backend(&snapshot, &mut cursor).unwrap().to_string());
            }

            let mut sorted = seen.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), n);
            prop_assert_eq!(balancer.select_backend(&snapshot, &mut cursor).unwrap(), first.as_str());
        }
    }
}
