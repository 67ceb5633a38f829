//! Configuration management module.
//!
//! Loads a `scanner.toml`-shaped configuration (`[mexc]`, `[scanner]`,
//! `[scanner.metrics]`, `[subscriptions]`, `[scout]`, `[ws]`, `[logging]`),
//! applies `PUMPSCAN_*` environment overrides, and validates the result.
//! Mirrors the teacher's own `load_from_file` / `apply_env_overrides` /
//! `validate` shape, re-keyed to this system's option names.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub mexc: MexcConfig,
    pub scanner: ScannerConfig,
    pub subscriptions: SubscriptionsConfig,
    pub scout: ScoutConfig,
    pub ws: WsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MexcConfig {
    pub ws_url: String,
    pub rest_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub prob_threshold: f64,
    pub metrics: ThresholdsConfig,
}

/// Candidate-filter thresholds (spec §4.5). Missing fields default to 0,
/// except `spread`, which defaults to `+inf` (an always-true upper bound).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub vsr: f64,
    pub pm: f64,
    pub obi: f64,
    pub spread: f64,
    pub listing_age_min: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubscriptionsConfig {
    pub top_n: usize,
    pub lru_ttl_sec: f64,
    pub poll_interval: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub min_quote_vol_usd: f64,
    pub top_n: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WsConfig {
    pub max_streams_per_conn: usize,
    pub max_msg_per_sec: u32,
    pub quality_cooldown_sec: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mexc: MexcConfig::default(),
            scanner: ScannerConfig::default(),
            subscriptions: SubscriptionsConfig::default(),
            scout: ScoutConfig::default(),
            ws: WsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MexcConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://wbs.mexc.com/ws".to_string(),
            rest_url: "https://api.mexc.com".to_string(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            prob_threshold: 0.6,
            metrics: ThresholdsConfig::default(),
        }
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            vsr: 0.0,
            pm: 0.0,
            obi: 0.0,
            spread: f64::INFINITY,
            listing_age_min: 0.0,
        }
    }
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self {
            top_n: 50,
            lru_ttl_sec: 900.0,
            poll_interval: 60.0,
        }
    }
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            min_quote_vol_usd: 20_000.0,
            top_n: 50,
        }
    }
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_streams_per_conn: 30,
            max_msg_per_sec: 100,
            quality_cooldown_sec: 30.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: "logs/pump-scanner.log".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, applying env overrides and
    /// validating the result. A read/parse/validation failure here is a
    /// fatal configuration error per spec §7 — callers should propagate it
    /// out of `main`, not recover from it.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path_str,
            source,
        })?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `PUMPSCAN_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("PUMPSCAN_MEXC_WS_URL") {
            self.mexc.ws_url = v;
        }
        if let Ok(v) = env::var("PUMPSCAN_MEXC_REST_URL") {
            self.mexc.rest_url = v;
        }
        if let Ok(v) = env::var("PUMPSCAN_PROB_THRESHOLD") {
            if let Ok(value) = v.parse() {
                self.scanner.prob_threshold = value;
            }
        }
        if let Ok(v) = env::var("PUMPSCAN_SUBSCRIPTIONS_TOP_N") {
            if let Ok(value) = v.parse() {
                self.subscriptions.top_n = value;
            }
        }
        if let Ok(v) = env::var("PUMPSCAN_SUBSCRIPTIONS_LRU_TTL_SEC") {
            if let Ok(value) = v.parse() {
                self.subscriptions.lru_ttl_sec = value;
            }
        }
        if let Ok(v) = env::var("PUMPSCAN_SUBSCRIPTIONS_POLL_INTERVAL") {
            if let Ok(value) = v.parse() {
                self.subscriptions.poll_interval = value;
            }
        }
        if let Ok(v) = env::var("PUMPSCAN_SCOUT_MIN_QUOTE_VOL_USD") {
            if let Ok(value) = v.parse() {
                self.scout.min_quote_vol_usd = value;
            }
        }
        if let Ok(v) = env::var("PUMPSCAN_SCOUT_TOP_N") {
            if let Ok(value) = v.parse() {
                self.scout.top_n = value;
            }
        }
        if let Ok(v) = env::var("PUMPSCAN_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = env::var("PUMPSCAN_LOG_FILE_PATH") {
            if !v.trim().is_empty() {
                self.logging.file_path = v;
            }
        }
    }

    /// Save configuration to a TOML file (used by config-reload callers and
    /// by the `config reset` CLI action).
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).expect("Config serialization is infallible");
        std::fs::write(&path, content).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })
    }

    /// Load with fallback to defaults, logging a warning on failure. Used
    /// only by non-fatal call sites (e.g. `config show`); `main`'s startup
    /// path uses [`Config::load_from_file`] directly so a bad config is
    /// fatal, per spec §7.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(path).unwrap_or_else(|err| {
            tracing::warn!("failed to load config: {err}, using defaults");
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mexc.ws_url.trim().is_empty() {
            return Err(ConfigError::Invalid("mexc.ws_url must not be empty".into()));
        }
        if self.mexc.rest_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "mexc.rest_url must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.scanner.prob_threshold) {
            return Err(ConfigError::Invalid(
                "scanner.prob_threshold must be in [0, 1]".into(),
            ));
        }
        if self.subscriptions.top_n == 0 {
            return Err(ConfigError::Invalid(
                "subscriptions.top_n must be greater than 0".into(),
            ));
        }
        if self.subscriptions.lru_ttl_sec <= 0.0 {
            return Err(ConfigError::Invalid(
                "subscriptions.lru_ttl_sec must be greater than 0".into(),
            ));
        }
        if self.subscriptions.poll_interval <= 0.0 {
            return Err(ConfigError::Invalid(
                "subscriptions.poll_interval must be greater than 0".into(),
            ));
        }
        if self.ws.max_streams_per_conn == 0 || self.ws.max_streams_per_conn % 2 != 0 {
            return Err(ConfigError::Invalid(
                "ws.max_streams_per_conn must be a positive even number".into(),
            ));
        }
        if self.ws.max_msg_per_sec == 0 {
            return Err(ConfigError::Invalid(
                "ws.max_msg_per_sec must be greater than 0".into(),
            ));
        }
        if self.logging.file_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "logging.file_path must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ws.max_streams_per_conn, 30);
        assert_eq!(config.ws.max_msg_per_sec, 100);
    }

    #[test]
    fn thresholds_default_spread_to_infinity() {
        let thresholds = ThresholdsConfig::default();
        assert_eq!(thresholds.spread, f64::INFINITY);
        assert_eq!(thresholds.vsr, 0.0);
    }

    #[test]
    fn rejects_out_of_range_prob_threshold() {
        let mut config = Config::default();
        config.scanner.prob_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_odd_max_streams_per_conn() {
        let mut config = Config::default();
        config.ws.max_streams_per_conn = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_file() {
        let config = Config::default();
        let temp_file = NamedTempFile::new().unwrap();
        config.save_to_file(temp_file.path()).unwrap();
        let loaded = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.mexc.ws_url, config.mexc.ws_url);
        assert_eq!(loaded.subscriptions.top_n, config.subscriptions.top_n);
    }

    #[test]
    fn env_override_applies_on_top_of_file() {
        let mut config = Config::default();
        // SAFETY: test is single-threaded with respect to this var.
        unsafe {
            env::set_var("PUMPSCAN_SUBSCRIPTIONS_TOP_N", "7");
        }
        config.apply_env_overrides();
        unsafe {
            env::remove_var("PUMPSCAN_SUBSCRIPTIONS_TOP_N");
        }
        assert_eq!(config.subscriptions.top_n, 7);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::load_from_file("/no/such/path/scanner.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
