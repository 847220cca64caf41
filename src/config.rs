//! Flat configuration model (spec.md §6) with default-on-error loading.
//!
//! Grounded on `parser.py`'s `_load_config` (load a JSON file relative to
//! the working directory, fall back to `{}` and log on any failure) and
//! `consts.rs`'s static source registry, generalized into a deserializable
//! struct instead of ad-hoc `dict.get(...)` chains.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub search_url: Option<String>,
    #[serde(default)]
    pub rss_url: Option<String>,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

fn default_max_items() -> usize {
    50
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            base_url: None,
            search_url: None,
            rss_url: None,
            max_items: default_max_items(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsingConfig {
    #[serde(default = "default_interval_minutes")]
    pub auto_update_interval_minutes: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,
}

fn default_interval_minutes() -> u64 {
    20
}
fn default_retry_count() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    2
}
fn default_timeout_secs() -> u64 {
    15
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            auto_update_interval_minutes: default_interval_minutes(),
            retry_count: default_retry_count(),
            retry_delay: default_retry_delay_secs(),
            timeout: default_timeout_secs(),
            sources: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskThresholdEntry {
    pub threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskLevelsConfig {
    #[serde(default = "low_default")]
    pub low: RiskThresholdEntry,
    #[serde(default = "moderate_default")]
    pub moderate: RiskThresholdEntry,
    #[serde(default = "high_default")]
    pub high: RiskThresholdEntry,
    #[serde(default = "very_high_default")]
    pub very_high: RiskThresholdEntry,
}

fn low_default() -> RiskThresholdEntry {
    RiskThresholdEntry { threshold: 50 }
}
fn moderate_default() -> RiskThresholdEntry {
    RiskThresholdEntry { threshold: 100 }
}
fn high_default() -> RiskThresholdEntry {
    RiskThresholdEntry { threshold: 150 }
}
fn very_high_default() -> RiskThresholdEntry {
    RiskThresholdEntry { threshold: 999_999 }
}

impl Default for RiskLevelsConfig {
    fn default() -> Self {
        Self {
            low: low_default(),
            moderate: moderate_default(),
            high: high_default(),
            very_high: very_high_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_weeks_to_show")]
    pub weeks_to_show: usize,
    #[serde(default = "default_filtered_max_items")]
    pub filtered_max_items: usize,
}

fn default_weeks_to_show() -> usize {
    8
}
fn default_filtered_max_items() -> usize {
    500
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            weeks_to_show: default_weeks_to_show(),
            filtered_max_items: default_filtered_max_items(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_backup_count")]
    pub backup_count: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_backup_count() -> u32 {
    3
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            file: None,
            max_bytes: default_max_bytes(),
            backup_count: default_backup_count(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub parsing: ParsingConfig,
    #[serde(default)]
    pub risk_levels: RiskLevelsConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from `path`, falling back to spec-documented defaults on any
    /// failure (missing file, malformed JSON). Never returns `Err` — per
    /// spec.md §7, configuration errors are substituted, not propagated.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::warn!("Malformed config at {}: {e}; using defaults", path.display());
                    AppConfig::default()
                }
            },
            Err(e) => {
                log::warn!("Could not read config at {}: {e}; using defaults", path.display());
                AppConfig::default()
            }
        }
    }

    pub fn risk_thresholds(&self) -> crate::model::RiskThresholds {
        crate::model::RiskThresholds {
            low: self.risk_levels.low.threshold,
            moderate: self.risk_levels.moderate.threshold,
            high: self.risk_levels.high.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = AppConfig::load(Path::new("/nonexistent/path/config.json"));
        assert_eq!(cfg.parsing.auto_update_interval_minutes, 20);
        assert_eq!(cfg.risk_levels.low.threshold, 50);
    }

    #[test]
    fn malformed_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid json").unwrap();
        let cfg = AppConfig::load(&path);
        assert_eq!(cfg.parsing.retry_count, 3);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"parsing": {"retry_count": 5}}"#).unwrap();
        let cfg = AppConfig::load(&path);
        assert_eq!(cfg.parsing.retry_count, 5);
        assert_eq!(cfg.parsing.timeout, 15);
    }
}
