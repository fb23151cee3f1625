use std::collections::HashMap;

use serde::Serialize;

use super::model::{Pollutant, Record};

// ---------------------------------------------------------------------------
// Column access
// ---------------------------------------------------------------------------

/// Present readings of one pollutant, missing values skipped.
pub fn pollutant_values<'a, I>(rows: I, pollutant: Pollutant) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Record>,
{
    rows.into_iter()
        .filter_map(|rec| rec.reading(pollutant))
        .collect()
}

// ---------------------------------------------------------------------------
// Mean
// ---------------------------------------------------------------------------

/// Arithmetic mean of the present readings, `None` when there are none.
pub fn compute_mean<'a, I>(rows: I, pollutant: Pollutant) -> Option<f64>
where
    I: IntoIterator<Item = &'a Record>,
{
    let (sum, n) = rows
        .into_iter()
        .filter_map(|rec| rec.reading(pollutant))
        .fold((0.0_f64, 0_usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

// ---------------------------------------------------------------------------
// Station counts
// ---------------------------------------------------------------------------

/// Row count per station, sorted by descending count.
/// Equal counts keep the order in which stations first appeared.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StationCounts(Vec<StationCount>);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationCount {
    pub station: String,
    pub count: usize,
}

impl StationCounts {
    pub fn iter(&self) -> impl Iterator<Item = &StationCount> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Count for one station, 0 if it has no rows.
    pub fn get(&self, station: &str) -> usize {
        self.0
            .iter()
            .find(|c| c.station == station)
            .map_or(0, |c| c.count)
    }

    /// Sum of all counts; equals the number of rows counted.
    pub fn total(&self) -> usize {
        self.0.iter().map(|c| c.count).sum()
    }

    /// Station with the highest count.
    pub fn dominant(&self) -> Option<&str> {
        self.0.first().map(|c| c.station.as_str())
    }
}

/// Group rows by station and count them.
pub fn count_by_station<'a, I>(rows: I) -> StationCounts
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<StationCount> = Vec::new();

    for rec in rows {
        let slot = *slots.entry(rec.station.as_str()).or_insert_with(|| {
            counts.push(StationCount {
                station: rec.station.clone(),
                count: 0,
            });
            counts.len() - 1
        });
        counts[slot].count += 1;
    }

    // Stable sort: ties stay in first-seen order.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    StationCounts(counts)
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// Pairwise-complete Pearson correlation between the six pollutants.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    cells: [[Option<f64>; Pollutant::COUNT]; Pollutant::COUNT],
}

impl CorrelationMatrix {
    pub fn get(&self, a: Pollutant, b: Pollutant) -> Option<f64> {
        self.cells[a.index()][b.index()]
    }

    /// Smallest and largest defined coefficient, used to scale the heatmap.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.cells
            .iter()
            .flatten()
            .flatten()
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Correlation over the six pollutant columns.
///
/// Each pair only uses rows where both readings are present. A pair with
/// fewer than two such rows, or with a constant side, is undefined. The
/// diagonal is 1.0 for every column that has at least one reading.
pub fn compute_correlation(rows: &[&Record]) -> CorrelationMatrix {
    let mut cells = [[None; Pollutant::COUNT]; Pollutant::COUNT];

    for a in Pollutant::ALL {
        let i = a.index();
        if rows.iter().any(|rec| rec.reading(a).is_some()) {
            cells[i][i] = Some(1.0);
        }
        for b in Pollutant::ALL.into_iter().skip(i + 1) {
            let (xs, ys): (Vec<f64>, Vec<f64>) = rows
                .iter()
                .filter_map(|rec| Some((rec.reading(a)?, rec.reading(b)?)))
                .unzip();
            let r = pearson(&xs, &ys);
            cells[i][b.index()] = r;
            cells[b.index()][i] = r;
        }
    }

    CorrelationMatrix { cells }
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 2 || is_constant(xs) || is_constant(ys) {
        return None;
    }
    // Correlation is scale-invariant; bring both sides into [-1, 1] so the
    // sums of squares cannot overflow.
    let xs = rescaled(xs);
    let ys = rescaled(ys);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&x, &y) in xs.iter().zip(&ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

fn rescaled(values: &[f64]) -> Vec<f64> {
    let scale = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if scale > 0.0 && scale.is_finite() {
        values.iter().map(|v| v / scale).collect()
    } else {
        values.to_vec()
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Equal-width histogram. `edges` has one more entry than `counts`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        (self.edges[bin] + self.edges[bin + 1]) / 2.0
    }
}

/// Bin `values` into `bins` equal-width bins spanning [min, max].
///
/// Bins are half-open except the last, which also holds `max`. When every
/// value is equal the range is widened to `[v - 0.5, v + 0.5]`.
pub fn histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    if values.is_empty() || bins == 0 {
        return None;
    }
    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect();

    let mut counts = vec![0; bins];
    for &v in values {
        let bin = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[bin] += 1;
    }
    Some(Histogram { edges, counts })
}

// ---------------------------------------------------------------------------
// Boxplot summaries
// ---------------------------------------------------------------------------

/// Five-number summary plus Tukey outliers (1.5 × IQR).
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSummary {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationBox {
    pub station: String,
    pub summary: BoxSummary,
}

/// Quantile of sorted data with linear interpolation between order statistics.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn box_summary(values: &[f64]) -> Option<BoxSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.5);
    let q3 = quantile(&sorted, 0.75);
    let reach = 1.5 * (q3 - q1);
    let (fence_lo, fence_hi) = (q1 - reach, q3 + reach);

    let inside = || sorted.iter().copied().filter(|&v| v >= fence_lo && v <= fence_hi);
    let lower_whisker = inside().next().unwrap_or(q1);
    let upper_whisker = inside().last().unwrap_or(q3);
    let outliers = sorted
        .iter()
        .copied()
        .filter(|&v| v < fence_lo || v > fence_hi)
        .collect();

    Some(BoxSummary {
        lower_whisker,
        q1,
        median,
        q3,
        upper_whisker,
        outliers,
    })
}

/// One box per station in first-seen order; stations without readings are skipped.
pub fn boxplots_by_station<'a, I>(rows: I, pollutant: Pollutant) -> Vec<StationBox>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<f64>)> = Vec::new();

    for rec in rows {
        let slot = *slots.entry(rec.station.as_str()).or_insert_with(|| {
            groups.push((rec.station.as_str(), Vec::new()));
            groups.len() - 1
        });
        if let Some(v) = rec.reading(pollutant) {
            groups[slot].1.push(v);
        }
    }

    groups
        .into_iter()
        .filter_map(|(station, values)| {
            box_summary(&values).map(|summary| StationBox {
                station: station.to_string(),
                summary,
            })
        })
        .collect()
}
