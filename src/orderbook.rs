//! Per-symbol order-book replica maintained from incremental diffs.
//!
//! After every mutation the book is pruned to the top 10 levels per side
//! within ±0.1% of the mid price, and levels with quantity 0 are removed
//! entirely — never retained with a zero quantity.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::exchange::{DepthDiff, LevelUpdate};

const BAND: f64 = 0.001;
const MAX_LEVELS: usize = 10;

/// `(price, qty)` pair as returned by book queries.
pub type Level = (f64, f64);

#[derive(Debug, Clone, Default)]
pub struct OrderBookReplica {
    bids: BTreeMap<OrderedFloat<f64>, f64>,
    asks: BTreeMap<OrderedFloat<f64>, f64>,
}

impl OrderBookReplica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an incremental diff, then re-prune to the invariant band.
    pub fn apply_diff(&mut self, diff: &DepthDiff) {
        for lvl in &diff.bids {
            apply_level(&mut self.bids, lvl);
        }
        for lvl in &diff.asks {
            apply_level(&mut self.asks, lvl);
        }
        self.prune();
    }

    fn prune(&mut self) {
        let (Some(best_bid), Some(best_ask)) = (self.best_bid(), self.best_ask()) else {
            return;
        };
        let mid = (best_bid + best_ask) / 2.0;
        let lo = mid * (1.0 - BAND);
        let hi = mid * (1.0 + BAND);

        let mut kept_bids: Vec<(OrderedFloat<f64>, f64)> = self
            .bids
            .iter()
            .filter(|(p, _)| p.0 >= lo)
            .map(|(p, q)| (*p, *q))
            .collect();
        kept_bids.sort_by(|a, b| b.0.cmp(&a.0));
        kept_bids.truncate(MAX_LEVELS);
        self.bids = kept_bids.into_iter().collect();

        let mut kept_asks: Vec<(OrderedFloat<f64>, f64)> = self
            .asks
            .iter()
            .filter(|(p, _)| p.0 <= hi)
            .map(|(p, q)| (*p, *q))
            .collect();
        kept_asks.sort_by(|a, b| a.0.cmp(&b.0));
        kept_asks.truncate(MAX_LEVELS);
        self.asks = kept_asks.into_iter().collect();
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.keys().next_back().map(|p| p.0)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.keys().next().map(|p| p.0)
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// `(best bid, best ask)` as `(price, qty)` pairs, or `None` if either
    /// side is empty.
    pub fn get_best(&self) -> Option<(Level, Level)> {
        let bid_p = self.best_bid()?;
        let ask_p = self.best_ask()?;
        let bid_q = *self.bids.get(&OrderedFloat(bid_p))?;
        let ask_q = *self.asks.get(&OrderedFloat(ask_p))?;
        Some(((bid_p, bid_q), (ask_p, ask_q)))
    }

    /// `(bid_depth, ask_depth)`: cumulative quantity within 0.1% of mid on
    /// each side.
    pub fn cum_depth(&self) -> Option<(f64, f64)> {
        let ((bid_p, _), (ask_p, _)) = self.get_best()?;
        let mid = (bid_p + ask_p) / 2.0;
        let bid_lo = mid * (1.0 - BAND);
        let ask_hi = mid * (1.0 + BAND);
        let depth_bid: f64 = self
            .bids
            .iter()
            .filter(|(p, _)| p.0 >= bid_lo)
            .map(|(_, q)| *q)
            .sum();
        let depth_ask: f64 = self
            .asks
            .iter()
            .filter(|(p, _)| p.0 <= ask_hi)
            .map(|(_, q)| *q)
            .sum();
        Some((depth_bid, depth_ask))
    }
}

fn apply_level(side: &mut BTreeMap<OrderedFloat<f64>, f64>, lvl: &LevelUpdate) {
    let key = OrderedFloat(lvl.price);
    if lvl.qty == 0.0 {
        side.remove(&key);
    } else {
        side.insert(key, lvl.qty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> DepthDiff {
        DepthDiff {
            symbol: "BTCUSDT".into(),
            bids: bids.iter().map(|&(p, q)| LevelUpdate { price: p, qty: q }).collect(),
            asks: asks.iter().map(|&(p, q)| LevelUpdate { price: p, qty: q }).collect(),
        }
    }

    #[test]
    fn empty_book_has_no_best() {
        let book = OrderBookReplica::new();
        assert_eq!(book.get_best(), None);
        assert_eq!(book.cum_depth(), None);
    }

    #[test]
    fn qty_zero_deletes_level() {
        let mut book = OrderBookReplica::new();
        book.apply_diff(&diff(&[(100.0, 1.0)], &[(100.1, 1.0)]));
        assert_eq!(book.best_bid(), Some(100.0));
        book.apply_diff(&diff(&[(100.0, 0.0)], &[]));
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn best_bid_is_highest_best_ask_is_lowest() {
        let mut book = OrderBookReplica::new();
        book.apply_diff(&diff(
            &[(99.0, 1.0), (99.5, 2.0), (98.0, 3.0)],
            &[(100.5, 1.0), (100.1, 2.0), (101.0, 1.0)],
        ));
        assert_eq!(book.best_bid(), Some(99.5));
        assert_eq!(book.best_ask(), Some(100.1));
    }

    #[test]
    fn prunes_to_top_ten_and_band() {
        let mut book = OrderBookReplica::new();
        // mid ~= 100.0; band is [99.9, 100.1]. Push bids far outside the band.
        let mut bids: Vec<(f64, f64)> = (0..20).map(|i| (99.95 - i as f64 * 0.001, 1.0)).collect();
        bids.push((90.0, 100.0)); // far below band, should be dropped regardless of count
        let asks = vec![(100.05, 1.0)];
        book.apply_diff(&diff(&bids, &asks));

        assert!(book.bid_levels() <= 10);
        assert!(book.best_bid().unwrap() >= 99.9);
        for price in book_prices(&book.bids_snapshot()) {
            assert!(price >= 99.9);
        }
    }

    #[test]
    fn cum_depth_sums_within_band() {
        let mut book = OrderBookReplica::new();
        book.apply_diff(&diff(
            &[(99.95, 1.0), (99.0, 5.0)],
            &[(100.05, 2.0), (101.5, 10.0)],
        ));
        // mid = (99.95 + 100.05)/2 = 100.0, band [99.9, 100.1]
        let (bid_depth, ask_depth) = book.cum_depth().unwrap();
        assert_eq!(bid_depth, 1.0); // 99.0 is outside band
        assert_eq!(ask_depth, 2.0); // 101.5 is outside band
    }

    impl OrderBookReplica {
        fn bids_snapshot(&self) -> Vec<f64> {
            self.bids.keys().map(|p| p.0).collect()
        }
    }

    fn book_prices(prices: &[f64]) -> Vec<f64> {
        prices.to_vec()
    }
}
