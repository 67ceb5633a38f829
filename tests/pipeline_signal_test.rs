//! End-to-end tick -> feature vector -> candidate filter -> scoring model
//! wiring (spec §8 seeded scenario 6). Drives the same stages
//! `Scanner::run_tick_consumer` composes, with `now` supplied explicitly
//! instead of read from a wall clock -- exactly as `FeatureEngine::update`
//! already takes it -- so the 300s/21600s/180s windows can be filled
//! deterministically without the test actually taking six hours.

use pump_scanner_core::collector::{BookSnapshot, Tick};
use pump_scanner_core::config::ThresholdsConfig;
use pump_scanner_core::exchange::KlineSnapshot;
use pump_scanner_core::feature_engine::FeatureEngine;
use pump_scanner_core::filter::is_candidate;
use pump_scanner_core::model::{LogisticModel, ScoringModel};

fn tick(fused_at: f64, close: f64, quote_volume: f64, depth: BookSnapshot) -> Tick {
    Tick {
        symbol: "PUMPUSDT".to_string(),
        kline: KlineSnapshot {
            symbol: "PUMPUSDT".to_string(),
            close,
            quote_volume,
        },
        depth,
        fused_at,
    }
}

fn balanced_depth() -> BookSnapshot {
    BookSnapshot {
        best_bid: Some((99.9, 1.0)),
        best_ask: Some((100.0, 1.0)),
        cum_bid_depth: 10.0,
        cum_ask_depth: 10.0,
    }
}

/// Seeded scenario 6 (spec §8): thresholds {vsr:2, pm:0.02, obi:-1,
/// spread:0.02, age:0}, prob_threshold=0.6, ticks crafted so VSR rises
/// past 2 and PM past 2% -> one signal with probability > 0.6.
#[test]
fn end_to_end_tick_to_signal_crosses_probability_threshold() {
    let thresholds = ThresholdsConfig {
        vsr: 2.0,
        pm: 0.02,
        obi: -1.0,
        spread: 0.02,
        listing_age_min: 0.0,
    };
    let model = LogisticModel::with_thresholds(thresholds.clone());
    let mut engine = FeatureEngine::new();

    // Six hours of flat baseline activity, sampled every minute, so the
    // vol_5m/vol_6h/depth_net_3m windows all accumulate a full horizon of
    // history before the surge tick arrives.
    let mut t = 0.0_f64;
    while t <= 21_600.0 {
        engine.update(&tick(t, 100.0, 50.0, balanced_depth()), t);
        t += 60.0;
    }

    let surge_depth = BookSnapshot {
        best_bid: Some((109.9, 1.0)),
        best_ask: Some((110.0, 1.0)),
        cum_bid_depth: 20.0,
        cum_ask_depth: 5.0,
    };
    let fv = engine.update(&tick(21_660.0, 110.0, 400.0, surge_depth), 21_660.0);

    assert!(fv.ready, "all three windows should span their full horizon by now");
    assert!(fv.vsr > thresholds.vsr, "vsr {} should exceed {}", fv.vsr, thresholds.vsr);
    assert!(fv.pm > thresholds.pm, "pm {} should exceed {}", fv.pm, thresholds.pm);
    assert!(is_candidate(&fv, &thresholds));

    let probability = model.predict_proba(&fv);
    assert!(probability > 0.6, "probability {probability} should cross 0.6");
}

/// A tick that fails even one threshold never becomes a candidate, so the
/// scanner would never score or emit it.
#[test]
fn a_tick_below_threshold_is_never_a_candidate() {
    let thresholds = ThresholdsConfig {
        vsr: 2.0,
        pm: 0.02,
        obi: -1.0,
        spread: 0.02,
        listing_age_min: 0.0,
    };
    let mut engine = FeatureEngine::new();

    let mut t = 0.0_f64;
    let mut last_fv = None;
    while t <= 21_600.0 {
        last_fv = Some(engine.update(&tick(t, 100.0, 50.0, balanced_depth()), t));
        t += 60.0;
    }

    // No volume/price surge: vsr stays near the window-length ratio, but
    // pm stays at 0 since price never deviates from the running VWAP.
    let fv = last_fv.unwrap();
    assert_eq!(fv.pm, 0.0);
    assert!(!is_candidate(&fv, &thresholds));
}
