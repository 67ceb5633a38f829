//! `SubscriptionManager`: capacity/TTL/LRU subscription policy layered over
//! the [`crate::collector::Collector`] (spec §4.7). Grounded on
//! `original_source/scanner/sub_manager.py::SubscriptionManager`.

use std::collections::HashMap;

use crate::metrics;

/// The subset of [`crate::collector::Collector`] the manager needs, so unit
/// tests can drive the LRU/TTL policy against a lightweight fake instead of
/// real WebSocket connections.
pub trait SubscriptionTarget {
    async fn subscribe(&self, symbol: &str);
    async fn unsubscribe(&self, symbol: &str);
    fn is_subscribed(&self, symbol: &str) -> bool;
}

/// `active_pairs: symbol -> last-seen timestamp` (spec §3 `SubscriptionTable`).
pub struct SubscriptionManager {
    top_n: usize,
    lru_ttl_sec: f64,
    active_pairs: HashMap<String, f64>,
}

impl SubscriptionManager {
    pub fn new(top_n: usize, lru_ttl_sec: f64) -> Self {
        Self {
            top_n,
            lru_ttl_sec,
            active_pairs: HashMap::new(),
        }
    }

    pub fn active_pairs(&self) -> &HashMap<String, f64> {
        &self.active_pairs
    }

    /// Subscribe to new pairs, evict entries past their TTL, then evict the
    /// least-recently-refreshed entries until the table is back at or below
    /// `top_n`. After returning, `2 * |active_pairs|` is recorded as the
    /// active-streams gauge (spec §6).
    pub async fn ensure_subscribed<T: SubscriptionTarget>(&mut self, pairs: &[String], target: &T, now: f64) {
        for pair in pairs {
            self.active_pairs.insert(pair.clone(), now);
            if !target.is_subscribed(pair) {
                target.subscribe(pair).await;
            }
        }

        let expired: Vec<String> = self
            .active_pairs
            .iter()
            .filter(|(_, &ts)| now - ts > self.lru_ttl_sec)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        for symbol in expired {
            target.unsubscribe(&symbol).await;
            self.active_pairs.remove(&symbol);
        }

        while self.active_pairs.len() > self.top_n {
            let oldest = self
                .active_pairs
                .iter()
                .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(symbol, _)| symbol.clone());
            let Some(oldest) = oldest else { break };
            target.unsubscribe(&oldest).await;
            self.active_pairs.remove(&oldest);
        }

        metrics::set_active_streams(2 * self.active_pairs.len() as u64);
    }
}
