//! Per-host robots.txt cache
//!
//! Each host's rules are fetched at most once per run. Concurrent lookups for
//! the same host wait on the first fetch instead of starting their own.

use crate::robots::RobotsRules;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<RobotsRules>>>;

/// Robots rules keyed by host (including any explicit port)
#[derive(Debug, Default)]
pub struct RobotsCache {
    hosts: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached rules for `host`, running `load` on first use
    ///
    /// # Arguments
    ///
    /// * `host` - Cache key, e.g. `example.com` or `example.com:8080`
    /// * `load` - Produces the rules when the host has not been seen yet
    pub async fn get_or_load<F, Fut>(&self, host: &str, load: F) -> Arc<RobotsRules>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RobotsRules>,
    {
        let slot = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(hosts.entry(host.to_string()).or_default())
        };

        let rules = slot.get_or_init(|| async { Arc::new(load().await) }).await;
        Arc::clone(rules)
    }

    /// Returns the rules for `host` if they have already been loaded
    pub fn get(&self, host: &str) -> Option<Arc<RobotsRules>> {
        let hosts = self.hosts.lock().unwrap_or_else(|p| p.into_inner());
        hosts.get(host).and_then(|slot| slot.get().cloned())
    }

    /// Returns the number of hosts with loaded rules
    pub fn len(&self) -> usize {
        let hosts = self.hosts.lock().unwrap_or_else(|p| p.into_inner());
        hosts.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
