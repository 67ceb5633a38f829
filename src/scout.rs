//! `VolumeScout`: periodic REST poll producing ranked "hot" pairs (spec
//! §4.6). Grounded on `original_source/scanner/volume_scout.py`.

use std::collections::HashMap;

use crate::error::ScoutError;
use crate::exchange::TickerStat;
use crate::rolling_window::RollingWindow;

const HISTORY_HORIZON_SEC: f64 = 300.0;

/// One scout cycle's ranked result for a symbol (spec §3 `PairStat`).
#[derive(Debug, Clone, PartialEq)]
pub struct PairStat {
    pub symbol: String,
    pub quote_volume: f64,
    pub vol_delta_5m: f64,
    pub pm_delta_5m: f64,
    pub hotness: f64,
}

/// Periodic REST poll of `<rest_url>/api/v3/ticker/24hr`, ranking symbols by
/// `hotness = vol_delta_5m + 50 * pm_delta_5m`.
pub struct VolumeScout {
    http: reqwest::Client,
    rest_url: String,
    min_quote_vol_usd: f64,
    top_n: usize,
    history: HashMap<String, RollingWindow<[f64; 2]>>,
    request_count: u64,
}

impl VolumeScout {
    pub fn new(rest_url: impl Into<String>, min_quote_vol_usd: f64, top_n: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            rest_url: rest_url.into(),
            min_quote_vol_usd,
            top_n,
            history: HashMap::new(),
            request_count: 0,
        }
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Issue one GET and return the top `top_n` pairs by descending
    /// hotness. `now` is the sample timestamp used for the 300s history
    /// windows (so tests can drive it deterministically).
    pub async fn poll(&mut self, now: f64) -> Result<Vec<PairStat>, ScoutError> {
        self.request_count += 1;
        let url = format!("{}/api/v3/ticker/24hr", self.rest_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ScoutError::Request { url: url.clone(), source })?;
        let response = response
            .error_for_status()
            .map_err(|source| ScoutError::Request { url: url.clone(), source })?;
        let items: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|source| ScoutError::Request { url, source })?;

        Ok(self.rank(&items, now))
    }

    /// Pure ranking step, separated from the network call so it can be unit
    /// tested without a mock server.
    fn rank(&mut self, items: &[serde_json::Value], now: f64) -> Vec<PairStat> {
        let mut stats = Vec::with_capacity(items.len());

        for item in items {
            let Some(ticker) = TickerStat::from_json(item) else {
                continue;
            };
            if ticker.quote_volume < self.min_quote_vol_usd {
                continue;
            }

            let window = self
                .history
                .entry(ticker.symbol.clone())
                .or_insert_with(|| RollingWindow::new(HISTORY_HORIZON_SEC));

            let has_history = !window.is_empty();
            window.append(now, [ticker.quote_volume, ticker.last_price]);
            let (oldest_vol, oldest_price) = window
                .oldest()
                .expect("just appended, window can't be empty");

            let vol_delta_5m = if has_history { ticker.quote_volume - oldest_vol } else { 0.0 };
            let pm_delta_5m = if has_history && oldest_price > 0.0 {
                (ticker.last_price - oldest_price) / oldest_price
            } else {
                0.0
            };
            let hotness = vol_delta_5m + 50.0 * pm_delta_5m;

            stats.push(PairStat {
                symbol: ticker.symbol,
                quote_volume: ticker.quote_volume,
                vol_delta_5m,
                pm_delta_5m,
                hotness,
            });
        }

        stats.sort_by(|a, b| b.hotness.partial_cmp(&a.hotness).unwrap());
        stats.truncate(self.top_n);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn rank_filters_below_min_volume_and_sorts_descending() {
        let mut scout = VolumeScout::new("https://example.invalid", 1000.0, 10);
        let items = vec![
            json!({"symbol": "LOW", "quoteVolume": "500", "lastPrice": "1.0"}),
            json!({"symbol": "HIGH", "quoteVolume": "5000", "lastPrice": "1.0"}),
        ];
        let stats = scout.rank(&items, 0.0);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].symbol, "HIGH");
    }

    #[test]
    fn first_sample_has_zero_deltas() {
        let mut scout = VolumeScout::new("https://example.invalid", 0.0, 10);
        let items = vec![json!({"symbol": "ABC", "quoteVolume": "1000", "lastPrice": "10.0"})];
        let stats = scout.rank(&items, 0.0);
        assert_eq!(stats[0].vol_delta_5m, 0.0);
        assert_eq!(stats[0].pm_delta_5m, 0.0);
    }

    #[test]
    fn second_sample_computes_deltas_against_oldest() {
        let mut scout = VolumeScout::new("https://example.invalid", 0.0, 10);
        let items1 = vec![json!({"symbol": "ABC", "quoteVolume": "1000", "lastPrice": "10.0"})];
        scout.rank(&items1, 0.0);
        let items2 = vec![json!({"symbol": "ABC", "quoteVolume": "1500", "lastPrice": "11.0"})];
        let stats = scout.rank(&items2, 10.0);
        assert_eq!(stats[0].vol_delta_5m, 500.0);
        assert!((stats[0].pm_delta_5m - 0.1).abs() < 1e-9);
        assert!((stats[0].hotness - (500.0 + 50.0 * 0.1)).abs() < 1e-9);
    }

    /// Once a symbol's 300s history has accumulated enough samples at the
    /// default 60s poll cadence that appending the newest one evicts the
    /// head, the delta must be computed against the sample trimming left
    /// behind, not the one that just got evicted. Seven polls 60s apart
    /// (quoteVolume/lastPrice rising by a fixed step each time): by the
    /// seventh poll at t=360 the t=0 sample has fallen outside the 300s
    /// horizon, so the oldest retained sample is the t=60 one.
    #[test]
    fn vol_and_pm_delta_read_oldest_after_trim_once_history_is_full() {
        let mut scout = VolumeScout::new("https://example.invalid", 0.0, 10);
        let mut stats = Vec::new();
        for i in 0..=6 {
            let vol = 1000.0 + i as f64 * 100.0;
            let price = 10.0 + i as f64;
            let items = vec![json!({
                "symbol": "ABC",
                "quoteVolume": vol.to_string(),
                "lastPrice": price.to_string(),
            })];
            stats = scout.rank(&items, i as f64 * 60.0);
        }

        // oldest retained sample after trim is i=1 (vol=1100, price=11), not
        // i=0 (vol=1000, price=10).
        assert_eq!(stats[0].vol_delta_5m, 500.0);
        assert!((stats[0].pm_delta_5m - (5.0 / 11.0)).abs() < 1e-9);
    }

    #[test]
    fn truncates_to_top_n() {
        let mut scout = VolumeScout::new("https://example.invalid", 0.0, 1);
        let items = vec![
            json!({"symbol": "A", "quoteVolume": "1000", "lastPrice": "10.0"}),
            json!({"symbol": "B", "quoteVolume": "2000", "lastPrice": "10.0"}),
        ];
        let stats = scout.rank(&items, 0.0);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].symbol, "B");
    }

    #[tokio::test]
    async fn poll_hits_the_ticker_endpoint_and_ranks_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"symbol": "BTCUSDT", "quoteVolume": "100000", "lastPrice": "50000"},
            ])))
            .mount(&server)
            .await;

        let mut scout = VolumeScout::new(server.uri(), 0.0, 10);
        let stats = scout.poll(0.0).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].symbol, "BTCUSDT");
        assert_eq!(scout.request_count(), 1);
    }

    #[tokio::test]
    async fn poll_propagates_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut scout = VolumeScout::new(server.uri(), 0.0, 10);
        assert!(scout.poll(0.0).await.is_err());
    }
}
