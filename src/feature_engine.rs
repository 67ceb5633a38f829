//! Stateful per-symbol feature computation (spec §4.4).
//!
//! Grounded line-for-line on `original_source/scanner/features.py`'s
//! `FeatureEngine.update`: VSR, VWAP/PM, OBI, spread, cum-depth-delta,
//! listing age and the readiness gate. `now` is passed in explicitly rather
//! than read from the wall clock, so callers (and tests) control time the
//! same way [`crate::rolling_window::RollingWindow`] already does.

use std::collections::HashMap;

use crate::collector::Tick;
use crate::rolling_window::RollingWindow;

const VOL_5M_SEC: f64 = 300.0;
const VOL_6H_SEC: f64 = 21_600.0;
const VOL_1M_SEC: f64 = 60.0;
const DEPTH_NET_3M_SEC: f64 = 180.0;

/// Output of one [`FeatureEngine::update`] call (spec §3 `FeatureVector`).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub symbol: String,
    /// Volume Surge Ratio: sum(vol_5m) / median(vol_6h).
    pub vsr: f64,
    /// Price Momentum: (price - VWAP) / VWAP over the 5m window.
    pub pm: f64,
    /// Order-Book Imbalance, price-based per spec §9 (always <= 0 for a
    /// valid book; this is intentional, see DESIGN.md).
    pub obi: f64,
    /// Change over 3 minutes in (bid depth - ask depth) within the mid band.
    pub cum_depth_delta: f64,
    pub spread: f64,
    pub listing_age_sec: f64,
    /// True only once vol_5m, vol_6h and depth_net_3m each span their full
    /// horizon.
    pub ready: bool,
}

struct SymbolState {
    vol_5m: RollingWindow<f64>,
    vol_6h: RollingWindow<f64>,
    price_vol_5m: RollingWindow<[f64; 2]>,
    vol_1m: RollingWindow<f64>,
    depth_net_3m: RollingWindow<f64>,
    first_seen_ts: f64,
}

impl SymbolState {
    fn new(now: f64) -> Self {
        Self {
            vol_5m: RollingWindow::new(VOL_5M_SEC),
            vol_6h: RollingWindow::new(VOL_6H_SEC),
            price_vol_5m: RollingWindow::new(VOL_5M_SEC),
            vol_1m: RollingWindow::new(VOL_1M_SEC),
            depth_net_3m: RollingWindow::new(DEPTH_NET_3M_SEC),
            first_seen_ts: now,
        }
    }
}

/// Per-symbol rolling feature computation. State is never explicitly
/// destroyed — a symbol's footprint is bounded by the size of the
/// subscription set that feeds it ticks (spec §4.4).
#[derive(Default)]
pub struct FeatureEngine {
    symbols: HashMap<String, SymbolState>,
}

impl FeatureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one [`Tick`] and return the resulting [`FeatureVector`].
    pub fn update(&mut self, tick: &Tick, now: f64) -> FeatureVector {
        let price = tick.kline.close;
        let quote_vol = tick.kline.quote_volume;

        let state = self
            .symbols
            .entry(tick.symbol.clone())
            .or_insert_with(|| SymbolState::new(now));

        state.vol_5m.append(now, quote_vol);
        state.vol_6h.append(now, quote_vol);
        state.vol_1m.append(now, quote_vol);
        state.price_vol_5m.append(now, [price * quote_vol, quote_vol]);

        let net = tick.depth.cum_bid_depth - tick.depth.cum_ask_depth;
        state.depth_net_3m.append(now, net);
        let cum_depth_delta = match state.depth_net_3m.oldest() {
            Some(oldest) => net - oldest,
            None => 0.0,
        };

        let vol_5m_sum = state.vol_5m.sum();
        let median_6h = state.vol_6h.median();
        let vsr = if median_6h > 0.0 { vol_5m_sum / median_6h } else { 0.0 };

        let pv_sum = state.price_vol_5m.sum();
        let vwap = if pv_sum[1] > 0.0 { pv_sum[0] / pv_sum[1] } else { 0.0 };
        let pm = if vwap > 0.0 { (price - vwap) / vwap } else { 0.0 };

        let (spread, obi) = match (tick.depth.best_bid, tick.depth.best_ask) {
            (Some((bid_p, _)), Some((ask_p, _))) => {
                let mid = (bid_p + ask_p) / 2.0;
                let spread = if mid > 0.0 { (ask_p - bid_p) / mid } else { 0.0 };
                let obi = (bid_p - ask_p) / (bid_p + ask_p);
                (spread, obi)
            }
            _ => (0.0, 0.0),
        };

        let listing_age_sec = now - state.first_seen_ts;

        let ready = state.vol_5m.spans_horizon(now)
            && state.vol_6h.spans_horizon(now)
            && state.depth_net_3m.spans_horizon(now);

        FeatureVector {
            symbol: tick.symbol.clone(),
            vsr,
            pm,
            obi,
            cum_depth_delta,
            spread,
            listing_age_sec,
            ready,
        }
    }
}
