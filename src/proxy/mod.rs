//
// src/proxy/mod.rs
//
mod proxy;
mod pool;

pub use proxy::{Proxy, ProxyError, ProxyStats};
pub use pool::{BackendPool, ConnectionGuard};
