//! `CandidateFilter`: a pure predicate over a [`FeatureVector`] and the
//! configured thresholds. Grounded on `original_source/scanner/rules.py`.

use crate::config::ThresholdsConfig;
use crate::feature_engine::FeatureVector;

/// True iff `fv` crosses every configured threshold (spec §4.5):
///
/// ```text
/// vsr > th.vsr ∧ pm > th.pm ∧ obi > th.obi ∧ spread < th.spread ∧ listing_age > th.listing_age_min
/// ```
pub fn is_candidate(fv: &FeatureVector, thresholds: &ThresholdsConfig) -> bool {
    fv.vsr > thresholds.vsr
        && fv.pm > thresholds.pm
        && fv.obi > thresholds.obi
        && fv.spread < thresholds.spread
        && fv.listing_age_sec > thresholds.listing_age_min
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv() -> FeatureVector {
        FeatureVector {
            symbol: "BTCUSDT".into(),
            vsr: 3.0,
            pm: 0.05,
            obi: -0.2,
            cum_depth_delta: 10.0,
            spread: 0.01,
            listing_age_sec: 120.0,
            ready: true,
        }
    }

    fn thresholds() -> ThresholdsConfig {
        ThresholdsConfig {
            vsr: 2.0,
            pm: 0.02,
            obi: -1.0,
            spread: 0.02,
            listing_age_min: 60.0,
        }
    }

    #[test]
    fn passes_when_all_thresholds_crossed() {
        assert!(is_candidate(&fv(), &thresholds()));
    }

    #[test]
    fn fails_when_vsr_below_threshold() {
        let mut v = fv();
        v.vsr = 1.0;
        assert!(!is_candidate(&v, &thresholds()));
    }

    #[test]
    fn fails_when_spread_too_wide() {
        let mut v = fv();
        v.spread = 0.05;
        assert!(!is_candidate(&v, &thresholds()));
    }

    #[test]
    fn fails_when_listing_age_too_young() {
        let mut v = fv();
        v.listing_age_sec = 10.0;
        assert!(!is_candidate(&v, &thresholds()));
    }

    #[test]
    fn missing_thresholds_default_to_permissive_values() {
        let v = fv();
        let permissive = ThresholdsConfig::default();
        assert!(is_candidate(&v, &permissive));
    }
}
