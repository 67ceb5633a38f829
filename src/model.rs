//! Scoring model boundary (spec §1: "logistic-regression scoring model" is
//! an external collaborator, present here only as a trait + one reference
//! implementation for tests and standalone runs).

use crate::config::ThresholdsConfig;
use crate::feature_engine::FeatureVector;

/// A pure function from a feature vector to a probability in `[0, 1]`.
/// Swapping in a different model requires no changes to [`crate::scanner::Scanner`].
pub trait ScoringModel: Send + Sync {
    fn predict_proba(&self, fv: &FeatureVector) -> f64;
}

/// Reference implementation grounded in `original_source/model.py`:
/// normalize each feature by its configured threshold, take a weighted sum
/// plus an intercept, and squash through a sigmoid.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    intercept: f64,
    coef_vsr: f64,
    coef_pm: f64,
    coef_obi: f64,
    thresholds: ThresholdsConfig,
}

impl LogisticModel {
    pub fn new(
        intercept: f64,
        coef_vsr: f64,
        coef_pm: f64,
        coef_obi: f64,
        thresholds: ThresholdsConfig,
    ) -> Self {
        Self {
            intercept,
            coef_vsr,
            coef_pm,
            coef_obi,
            thresholds,
        }
    }

    /// A reasonable default model: a mild positive weight on each of VSR,
    /// PM and OBI, normalized by the configured thresholds so a feature
    /// exactly at its threshold contributes 1.0 before weighting.
    pub fn with_thresholds(thresholds: ThresholdsConfig) -> Self {
        Self::new(-1.0, 1.0, 1.0, 1.0, thresholds)
    }

    fn normalize(value: f64, threshold: f64) -> f64 {
        if threshold == 0.0 || !threshold.is_finite() {
            0.0
        } else {
            value / threshold
        }
    }
}

impl ScoringModel for LogisticModel {
    fn predict_proba(&self, fv: &FeatureVector) -> f64 {
        let vsr_norm = Self::normalize(fv.vsr, self.thresholds.vsr);
        let pm_norm = Self::normalize(fv.pm, self.thresholds.pm);
        let obi_norm = Self::normalize(fv.obi, self.thresholds.obi);

        let x = self.intercept
            + vsr_norm * self.coef_vsr
            + pm_norm * self.coef_pm
            + obi_norm * self.coef_obi;

        1.0 / (1.0 + (-x).exp())
    }
}
