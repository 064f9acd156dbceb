//! Configuration Module
//! Dashboard settings read from an optional JSON file.

use crate::data::{DetailColumns, SummaryColumns};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SEOUL_APT_CONFIG";

/// Config file looked up in the working directory when the variable is unset.
pub const DEFAULT_CONFIG_FILE: &str = "seoul_apt.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Detail and summary CSV locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcePaths {
    pub detail: PathBuf,
    /// Without a summary file the monthly summary is computed from the detail rows.
    pub summary: Option<PathBuf>,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            detail: PathBuf::from("data2.csv"),
            summary: Some(PathBuf::from("data1.csv")),
        }
    }
}

/// Settings that drive dataset loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Fraction of dropped rows above which the load reports a warning.
    pub max_drop_fraction: f64,
    pub detail_columns: DetailColumns,
    pub summary_columns: SummaryColumns,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_drop_fraction: 0.05,
            detail_columns: DetailColumns::default(),
            summary_columns: SummaryColumns::default(),
        }
    }
}

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub sources: SourcePaths,
    pub loader: LoaderConfig,
    /// TTF/OTF font with Hangul glyphs; egui's bundled fonts lack them.
    pub font_path: Option<PathBuf>,
}

impl DashboardConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load from `$SEOUL_APT_CONFIG`, falling back to `./seoul_apt.json`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load(&path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.loader.max_drop_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigError::Invalid(format!(
                "max_drop_fraction must be within [0, 1], got {}",
                fraction
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DashboardConfig::from_json(
            r#"{ "sources": { "detail": "seoul_apartment.csv", "summary": null },
                 "loader": { "max_drop_fraction": 0.2 } }"#,
        )
        .unwrap();

        assert_eq!(config.sources.detail, PathBuf::from("seoul_apartment.csv"));
        assert_eq!(config.sources.summary, None);
        assert_eq!(config.loader.max_drop_fraction, 0.2);
        assert_eq!(config.loader.detail_columns, DetailColumns::default());
        assert_eq!(config.font_path, None);
    }

    #[test]
    fn test_column_override() {
        let config = DashboardConfig::from_json(
            r#"{ "loader": { "detail_columns": { "deal_amount": ["price"] } } }"#,
        )
        .unwrap();
        assert_eq!(config.loader.detail_columns.deal_amount, vec!["price"]);
        assert_eq!(
            config.loader.detail_columns.district,
            DetailColumns::default().district
        );
    }

    #[test]
    fn test_rejects_out_of_range_fraction() {
        let err = DashboardConfig::from_json(r#"{ "loader": { "max_drop_fraction": 1.5 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = DashboardConfig::load(Path::new("/nonexistent/seoul_apt.json")).unwrap();
        assert_eq!(config, DashboardConfig::default());
    }
}
