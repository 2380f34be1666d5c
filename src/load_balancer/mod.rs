// src/load_balancer/mod.rs
mod algorithm;
mod least_connections;
mod round_robin;

pub use algorithm::{LoadBalancer, PoolSnapshot}; // trait + view
pub use least_connections::LeastConnectionsBalancer;
pub use round_robin::RoundRobinBalancer;
pub use crate::config::LoadBalancerAlgorithm;

use std::sync::Arc;

pub fn create_load_balancer(algorithm: LoadBalancerAlgorithm) -> Arc<dyn LoadBalancer> {
    match algorithm {
        LoadBalancerAlgorithm::RoundRobin => Arc::new(RoundRobinBalancer::new()),
        LoadBalancerAlgorithm::LeastConnections => Arc::new(LeastConnectionsBalancer::new()),
    }
}
