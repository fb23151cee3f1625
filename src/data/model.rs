use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Pollutant – one of the six tracked measures
// ---------------------------------------------------------------------------

/// The six tracked air-quality measures, in canonical column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "PM2.5")]
    Pm25,
    #[serde(rename = "PM10")]
    Pm10,
    #[serde(rename = "CO")]
    Co,
    #[serde(rename = "SO2")]
    So2,
    #[serde(rename = "NO2")]
    No2,
    #[serde(rename = "O3")]
    O3,
}

impl Pollutant {
    pub const COUNT: usize = 6;

    pub const ALL: [Pollutant; Self::COUNT] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::Co,
        Pollutant::So2,
        Pollutant::No2,
        Pollutant::O3,
    ];

    /// Column name as it appears in the CSV header.
    pub fn column_name(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::Co => "CO",
            Pollutant::So2 => "SO2",
            Pollutant::No2 => "NO2",
            Pollutant::O3 => "O3",
        }
    }

    /// Position in [`Pollutant::ALL`]; used to index per-pollutant arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pollutant '{0}'")]
pub struct UnknownPollutant(pub String);

impl FromStr for Pollutant {
    type Err = UnknownPollutant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pollutant::ALL
            .into_iter()
            .find(|p| p.column_name() == s.trim())
            .ok_or_else(|| UnknownPollutant(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Record – one measurement row
// ---------------------------------------------------------------------------

/// A single hourly measurement at one station.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: NaiveDateTime,
    pub station: String,
    /// Readings indexed by [`Pollutant::index`]. `None` means not measured,
    /// which is distinct from a measured zero.
    pub readings: [Option<f64>; Pollutant::COUNT],
}

impl Record {
    /// The reading for `pollutant`; NaN and infinities count as missing.
    pub fn reading(&self, pollutant: Pollutant) -> Option<f64> {
        self.readings[pollutant.index()].filter(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full parsed dataset. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// All records in file order.
    pub records: Vec<Record>,
    /// Station identifiers in order of first appearance.
    pub stations: Vec<String>,
    /// Earliest and latest timestamp, `None` for an empty dataset.
    pub time_span: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl Dataset {
    /// Build the station index and time span from loaded records.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stations = Vec::new();
        let mut time_span: Option<(NaiveDateTime, NaiveDateTime)> = None;

        for rec in &records {
            if seen.insert(rec.station.as_str()) {
                stations.push(rec.station.clone());
            }
            time_span = Some(match time_span {
                None => (rec.timestamp, rec.timestamp),
                Some((lo, hi)) => (lo.min(rec.timestamp), hi.max(rec.timestamp)),
            });
        }

        Dataset {
            records,
            stations,
            time_span,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn record(ts: NaiveDateTime, station: &str) -> Record {
        Record {
            timestamp: ts,
            station: station.to_string(),
            readings: [None; Pollutant::COUNT],
        }
    }

    #[test]
    fn pollutant_parses_column_names() {
        for p in Pollutant::ALL {
            assert_eq!(p.column_name().parse::<Pollutant>().unwrap(), p);
        }
        assert_eq!(" PM2.5 ".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
        assert!("PM25".parse::<Pollutant>().is_err());
    }

    #[test]
    fn pollutant_index_matches_canonical_order() {
        for (i, p) in Pollutant::ALL.iter().enumerate() {
            assert_eq!(p.index(), i);
        }
    }

    #[test]
    fn pollutant_serializes_as_column_name() {
        let json = serde_json::to_string(&Pollutant::Pm25).unwrap();
        assert_eq!(json, "\"PM2.5\"");
        let back: Pollutant = serde_json::from_str("\"NO2\"").unwrap();
        assert_eq!(back, Pollutant::No2);
    }

    #[test]
    fn dataset_tracks_stations_and_span() {
        let ds = Dataset::from_records(vec![
            record(at(2, 5), "Dongsi"),
            record(at(1, 0), "Changping"),
            record(at(3, 23), "Dongsi"),
        ]);
        assert_eq!(ds.stations, vec!["Dongsi", "Changping"]);
        assert_eq!(ds.time_span, Some((at(1, 0), at(3, 23))));
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn empty_dataset_has_no_span() {
        let ds = Dataset::from_records(Vec::new());
        assert!(ds.is_empty());
        assert!(ds.time_span.is_none());
        assert!(ds.stations.is_empty());
    }
}
