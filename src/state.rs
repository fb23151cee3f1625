use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::color::StationColors;
use crate::config::DashboardConfig;
use crate::data::aggregate::{AggregateResult, Summary, aggregate};
use crate::data::filter::FilterParams;
use crate::data::loader::load_file;
use crate::data::model::{Dataset, Pollutant};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Layout configuration, fixed for the session.
    pub config: DashboardConfig,

    /// Loaded dataset (None until user loads a file).
    pub dataset: Option<Dataset>,

    /// Current date range and pollutant selection.
    pub params: Option<FilterParams>,

    /// Derived views for `params` (recomputed on every change).
    pub result: Option<AggregateResult>,

    /// Whether the correlation heatmap is requested.
    pub show_correlation: bool,

    /// Colour per station, rebuilt on load.
    pub station_colors: Option<StationColors>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DashboardConfig::default())
    }
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            dataset: None,
            params: None,
            result: None,
            show_correlation: false,
            station_colors: None,
            status_message: None,
        }
    }

    /// Ingest a newly loaded dataset, reset filters to its full span.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.params = Some(FilterParams::full_range(
            &dataset,
            &self.config.default_pollutants,
        ));
        self.station_colors = Some(StationColors::new(&dataset.stations));
        self.dataset = Some(dataset);
        self.status_message = None;
        self.recompute();
    }

    /// Load a file and ingest it, or record the error for the top bar.
    pub fn open_path(&mut self, path: &Path) {
        match load_file(path) {
            Ok(dataset) => {
                log::info!(
                    "Loaded {} rows from {} with stations {:?}",
                    dataset.len(),
                    path.display(),
                    dataset.stations
                );
                self.set_dataset(dataset);
            }
            Err(e) => {
                log::error!("Failed to load {}: {e:#}", path.display());
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Rebuild `result` from the current parameters.
    pub fn recompute(&mut self) {
        let (Some(ds), Some(params)) = (&self.dataset, &self.params) else {
            self.result = None;
            return;
        };
        let options = self.config.aggregate_options(self.show_correlation);
        self.result = Some(aggregate(ds, params, options));
    }

    /// Replace the date range. An inverted range is clamped so `end >= start`.
    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) {
        let Some(params) = &mut self.params else {
            return;
        };
        let end = end.max(start);
        if params.start_date == start && params.end_date == end {
            return;
        }
        params.start_date = start;
        params.end_date = end;
        self.recompute();
    }

    /// Reset the date range to the whole dataset.
    pub fn reset_date_range(&mut self) {
        let Some((lo, hi)) = self.dataset.as_ref().and_then(|ds| ds.time_span) else {
            return;
        };
        self.set_date_range(lo.date(), hi.date());
    }

    /// Select or deselect one pollutant for the boxplots.
    pub fn set_pollutant_selected(&mut self, pollutant: Pollutant, selected: bool) {
        let Some(params) = &mut self.params else {
            return;
        };
        let changed = if selected {
            params.select(pollutant)
        } else {
            params.deselect(pollutant)
        };
        if changed {
            self.recompute();
        }
    }

    pub fn set_show_correlation(&mut self, show: bool) {
        if self.show_correlation != show {
            self.show_correlation = show;
            self.recompute();
        }
    }

    /// Serializable summary of the current result.
    pub fn summary(&self) -> Option<Summary> {
        Some(Summary::new(self.params.as_ref()?, self.result.as_ref()?))
    }

    /// Write the current summary as pretty JSON.
    pub fn export_summary(&self, path: &Path) -> Result<()> {
        let summary = self.summary().context("no data loaded")?;
        let json = serde_json::to_string_pretty(&summary).context("serializing summary")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Exported summary to {}", path.display());
        Ok(())
    }
}
