use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::aggregate::AggregateOptions;
use crate::data::model::Pollutant;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "AIRQ_CONFIG";
/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.json";

// ---------------------------------------------------------------------------
// Dashboard layout configuration
// ---------------------------------------------------------------------------

/// Layout and styling knobs for the charts. None of these change the
/// statistics, only how they are laid out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Metric tiles and histograms per row.
    pub columns_per_row: usize,
    /// Boxplots per row.
    pub boxplot_columns_per_row: usize,
    pub histogram_bins: usize,
    /// Pollutants ticked when a dataset is opened.
    pub default_pollutants: Vec<Pollutant>,
    /// RGB of the dominant station's bar.
    pub highlight_color: [u8; 3],
    /// RGB of every other station's bar.
    pub default_bar_color: [u8; 3],
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            columns_per_row: 3,
            boxplot_columns_per_row: 2,
            histogram_bins: 30,
            default_pollutants: vec![Pollutant::Pm25, Pollutant::Pm10],
            // skyblue / lightgray
            highlight_color: [135, 206, 235],
            default_bar_color: [211, 211, 211],
        }
    }
}

impl DashboardConfig {
    /// Parse a config from JSON; absent fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: DashboardConfig =
            serde_json::from_str(text).context("parsing dashboard config")?;
        config.columns_per_row = config.columns_per_row.max(1);
        config.boxplot_columns_per_row = config.boxplot_columns_per_row.max(1);
        config.histogram_bins = config.histogram_bins.max(1);
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Load from `$AIRQ_CONFIG` or `./dashboard.json`, falling back to defaults.
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::from_path(&path) {
            Ok(config) => {
                log::info!("Loaded dashboard config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring config {}: {e:#}", path.display());
                Self::default()
            }
        }
    }

    pub fn aggregate_options(&self, with_correlation: bool) -> AggregateOptions {
        AggregateOptions {
            histogram_bins: self.histogram_bins,
            with_correlation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        assert_eq!(DashboardConfig::from_json("{}").unwrap(), DashboardConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = DashboardConfig::from_json(
            r#"{"histogram_bins": 12, "default_pollutants": ["O3", "CO"]}"#,
        )
        .unwrap();
        assert_eq!(config.histogram_bins, 12);
        assert_eq!(config.default_pollutants, vec![Pollutant::O3, Pollutant::Co]);
        assert_eq!(config.columns_per_row, 3);
        assert_eq!(config.boxplot_columns_per_row, 2);
    }

    #[test]
    fn zero_layout_values_are_clamped() {
        let config = DashboardConfig::from_json(r#"{"columns_per_row": 0, "histogram_bins": 0}"#)
            .unwrap();
        assert_eq!(config.columns_per_row, 1);
        assert_eq!(config.histogram_bins, 1);
    }

    #[test]
    fn unknown_pollutant_is_rejected() {
        assert!(DashboardConfig::from_json(r#"{"default_pollutants": ["PM1"]}"#).is_err());
    }

    #[test]
    fn aggregate_options_carry_bins() {
        let opts = DashboardConfig::default().aggregate_options(true);
        assert_eq!(opts.histogram_bins, 30);
        assert!(opts.with_correlation);
    }
}
