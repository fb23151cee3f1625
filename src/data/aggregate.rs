use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::filter::{FilterParams, filtered_indices};
use super::model::{Dataset, Pollutant, Record};
use super::stats::{
    CorrelationMatrix, Histogram, StationBox, StationCounts, boxplots_by_station,
    compute_correlation, compute_mean, count_by_station, histogram, pollutant_values,
};

// ---------------------------------------------------------------------------
// Aggregation pass: FilterParams → derived views
// ---------------------------------------------------------------------------

/// Knobs that shape the derived views without affecting the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub histogram_bins: usize,
    pub with_correlation: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            histogram_bins: 30,
            with_correlation: false,
        }
    }
}

/// Everything the charts need for one filter selection.
#[derive(Debug, Clone)]
pub struct AggregateResult {
    /// Indices into `Dataset::records` of rows in range, in file order.
    pub indices: Vec<usize>,
    pub total_count: usize,
    pub mean_by_pollutant: BTreeMap<Pollutant, Option<f64>>,
    pub station_counts: StationCounts,
    pub dominant_station: Option<String>,
    /// One histogram per pollutant that has readings in range.
    pub histograms: BTreeMap<Pollutant, Histogram>,
    /// Per-station boxes for each selected pollutant.
    pub boxplots: BTreeMap<Pollutant, Vec<StationBox>>,
    /// Only present when requested.
    pub correlation: Option<CorrelationMatrix>,
}

impl AggregateResult {
    /// Iterate the filtered records of `dataset`.
    pub fn rows<'a>(&'a self, dataset: &'a Dataset) -> impl Iterator<Item = &'a Record> + 'a {
        self.indices.iter().map(move |&i| &dataset.records[i])
    }

    pub fn mean(&self, pollutant: Pollutant) -> Option<f64> {
        self.mean_by_pollutant.get(&pollutant).copied().flatten()
    }
}

/// Run the full filter-and-aggregate pipeline.
pub fn aggregate(dataset: &Dataset, params: &FilterParams, options: AggregateOptions) -> AggregateResult {
    let (start, end) = params.time_bounds();
    let indices = filtered_indices(dataset, start, end);
    let rows: Vec<&Record> = indices.iter().map(|&i| &dataset.records[i]).collect();

    let mean_by_pollutant = Pollutant::ALL
        .into_iter()
        .map(|p| (p, compute_mean(rows.iter().copied(), p)))
        .collect();

    let station_counts = count_by_station(rows.iter().copied());
    let dominant_station = station_counts.dominant().map(str::to_string);

    let histograms = Pollutant::ALL
        .into_iter()
        .filter_map(|p| {
            let values = pollutant_values(rows.iter().copied(), p);
            histogram(&values, options.histogram_bins).map(|h| (p, h))
        })
        .collect();

    let boxplots = params
        .selected_pollutants
        .iter()
        .map(|&p| (p, boxplots_by_station(rows.iter().copied(), p)))
        .collect();

    let correlation = options
        .with_correlation
        .then(|| compute_correlation(&rows));

    log::debug!(
        "Aggregated {} of {} rows between {} and {} ({} stations)",
        rows.len(),
        dataset.len(),
        params.start_date,
        params.end_date,
        station_counts.len()
    );

    AggregateResult {
        total_count: rows.len(),
        indices,
        mean_by_pollutant,
        station_counts,
        dominant_station,
        histograms,
        boxplots,
        correlation,
    }
}

// ---------------------------------------------------------------------------
// Summary export
// ---------------------------------------------------------------------------

/// Serializable digest of an [`AggregateResult`] for JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_count: usize,
    pub mean_by_pollutant: BTreeMap<Pollutant, Option<f64>>,
    pub station_counts: StationCounts,
    pub dominant_station: Option<String>,
    pub correlation: Option<BTreeMap<Pollutant, BTreeMap<Pollutant, Option<f64>>>>,
}

impl Summary {
    pub fn new(params: &FilterParams, result: &AggregateResult) -> Self {
        let correlation = result.correlation.as_ref().map(|m| {
            Pollutant::ALL
                .into_iter()
                .map(|a| {
                    let row = Pollutant::ALL.into_iter().map(|b| (b, m.get(a, b))).collect();
                    (a, row)
                })
                .collect()
        });
        Summary {
            start_date: params.start_date,
            end_date: params.end_date,
            total_count: result.total_count,
            mean_by_pollutant: result.mean_by_pollutant.clone(),
            station_counts: result.station_counts.clone(),
            dominant_station: result.dominant_station.clone(),
            correlation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(pm25: f64) -> [Option<f64>; Pollutant::COUNT] {
        let mut readings = [None; Pollutant::COUNT];
        readings[Pollutant::Pm25.index()] = Some(pm25);
        readings[Pollutant::Pm10.index()] = Some(pm25 * 2.0);
        readings
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2013, 3, d).unwrap()
    }

    /// Four rows over two days: A has PM2.5 10 and 20, B has 30 and 40.
    fn two_day_dataset() -> Dataset {
        let rows = [(1, "A", 10.0), (1, "B", 30.0), (2, "A", 20.0), (2, "B", 40.0)];
        Dataset::from_records(
            rows.iter()
                .map(|&(d, station, pm25)| Record {
                    timestamp: day(d).and_hms_opt(12, 0, 0).unwrap(),
                    station: station.to_string(),
                    readings: reading(pm25),
                })
                .collect(),
        )
    }

    fn params(start: u32, end: u32) -> FilterParams {
        FilterParams {
            start_date: day(start),
            end_date: day(end),
            selected_pollutants: vec![Pollutant::Pm25],
        }
    }

    #[test]
    fn full_range_scenario() {
        let ds = two_day_dataset();
        let result = aggregate(&ds, &params(1, 2), AggregateOptions::default());

        assert_eq!(result.total_count, 4);
        assert_eq!(result.mean(Pollutant::Pm25), Some(25.0));
        assert_eq!(result.mean(Pollutant::Co), None);
        assert_eq!(result.station_counts.get("A"), 2);
        assert_eq!(result.station_counts.get("B"), 2);
        assert_eq!(result.station_counts.total(), result.total_count);
        // Tie: A was seen first.
        assert_eq!(result.dominant_station.as_deref(), Some("A"));
        assert!(result.correlation.is_none());
        assert_eq!(result.rows(&ds).count(), 4);
    }

    #[test]
    fn excluded_range_scenario() {
        let ds = two_day_dataset();
        let result = aggregate(&ds, &params(5, 9), AggregateOptions::default());

        assert_eq!(result.total_count, 0);
        assert!(result.indices.is_empty());
        for p in Pollutant::ALL {
            assert_eq!(result.mean(p), None);
        }
        assert!(result.station_counts.is_empty());
        assert_eq!(result.dominant_station, None);
        assert!(result.histograms.is_empty());
        assert!(result.boxplots[&Pollutant::Pm25].is_empty());
    }

    #[test]
    fn inverted_range_yields_empty_result() {
        let ds = two_day_dataset();
        let result = aggregate(
            &ds,
            &params(2, 1),
            AggregateOptions {
                histogram_bins: 30,
                with_correlation: true,
            },
        );
        assert_eq!(result.total_count, 0);
        let m = result.correlation.unwrap();
        assert_eq!(m.get(Pollutant::Pm25, Pollutant::Pm25), None);
    }

    #[test]
    fn single_day_range_includes_whole_day() {
        let ds = two_day_dataset();
        let result = aggregate(&ds, &params(2, 2), AggregateOptions::default());
        assert_eq!(result.indices, vec![2, 3]);
        assert_eq!(result.mean(Pollutant::Pm25), Some(30.0));
    }

    #[test]
    fn derived_views_follow_options_and_selection() {
        let ds = two_day_dataset();
        let result = aggregate(
            &ds,
            &params(1, 2),
            AggregateOptions {
                histogram_bins: 5,
                with_correlation: true,
            },
        );
        let h = &result.histograms[&Pollutant::Pm25];
        assert_eq!(h.counts.len(), 5);
        assert_eq!(h.counts.iter().sum::<usize>(), 4);
        assert_eq!(result.boxplots.len(), 1);
        assert_eq!(result.boxplots[&Pollutant::Pm25].len(), 2);

        let m = result.correlation.as_ref().unwrap();
        let r = m.get(Pollutant::Pm25, Pollutant::Pm10).unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn summary_serializes_to_json() {
        let ds = two_day_dataset();
        let p = params(1, 2);
        let result = aggregate(
            &ds,
            &p,
            AggregateOptions {
                histogram_bins: 30,
                with_correlation: true,
            },
        );
        let json = serde_json::to_value(Summary::new(&p, &result)).unwrap();
        assert_eq!(json["total_count"], 4);
        assert_eq!(json["start_date"], "2013-03-01");
        assert_eq!(json["mean_by_pollutant"]["PM2.5"], 25.0);
        assert!(json["mean_by_pollutant"]["SO2"].is_null());
        assert_eq!(json["station_counts"][0]["station"], "A");
        assert_eq!(json["dominant_station"], "A");
        assert_eq!(json["correlation"]["PM2.5"]["PM2.5"], 1.0);
    }
}
