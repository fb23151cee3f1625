use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::model::{Dataset, Pollutant, Record};

// ---------------------------------------------------------------------------
// Filter parameters: date range + pollutant selection
// ---------------------------------------------------------------------------

/// User selection driving one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParams {
    /// First day included.
    pub start_date: NaiveDate,
    /// Last day included (the whole day counts).
    pub end_date: NaiveDate,
    /// Pollutants shown in the per-station boxplots, in the order they were
    /// picked. Never holds duplicates.
    pub selected_pollutants: Vec<Pollutant>,
}

impl FilterParams {
    /// Parameters spanning the whole dataset with the given default pollutants.
    /// Falls back to today's date for an empty dataset.
    pub fn full_range(dataset: &Dataset, pollutants: &[Pollutant]) -> Self {
        let (start_date, end_date) = match dataset.time_span {
            Some((lo, hi)) => (lo.date(), hi.date()),
            None => {
                let today = chrono::Local::now().date_naive();
                (today, today)
            }
        };
        FilterParams {
            start_date,
            end_date,
            selected_pollutants: Vec::new(),
        }
        .with_pollutants(pollutants)
    }

    fn with_pollutants(mut self, pollutants: &[Pollutant]) -> Self {
        for &p in pollutants {
            self.select(p);
        }
        self
    }

    /// Append `pollutant` to the selection. Returns false if already selected.
    pub fn select(&mut self, pollutant: Pollutant) -> bool {
        if self.selected_pollutants.contains(&pollutant) {
            return false;
        }
        self.selected_pollutants.push(pollutant);
        true
    }

    /// Remove `pollutant` from the selection. Returns false if it was not selected.
    pub fn deselect(&mut self, pollutant: Pollutant) -> bool {
        let before = self.selected_pollutants.len();
        self.selected_pollutants.retain(|&p| p != pollutant);
        self.selected_pollutants.len() != before
    }

    /// Inclusive timestamp bounds covering every instant of both end days.
    pub fn time_bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.start_date.and_time(NaiveTime::MIN);
        let end = self.end_date.and_time(end_of_day());
        (start, end)
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

// ---------------------------------------------------------------------------
// Date range filtering
// ---------------------------------------------------------------------------

/// Return indices of records with `start <= timestamp <= end`, in input order.
///
/// An inverted range (`start > end`) selects nothing.
pub fn filtered_indices(dataset: &Dataset, start: NaiveDateTime, end: NaiveDateTime) -> Vec<usize> {
    if start > end {
        return Vec::new();
    }
    dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| rec.timestamp >= start && rec.timestamp <= end)
        .map(|(i, _)| i)
        .collect()
}

/// Borrowing variant of [`filtered_indices`].
pub fn filter_by_date_range(
    dataset: &Dataset,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<&Record> {
    filtered_indices(dataset, start, end)
        .into_iter()
        .map(|i| &dataset.records[i])
        .collect()
}
