use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int32Type, Int64Type, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Dataset, Pollutant, Record};

pub const DATETIME_COLUMN: &str = "datetime";
pub const STATION_COLUMN: &str = "station";

/// Data-format failures. I/O and framing errors travel as `anyhow` context.
///
/// `row` counts data rows from 1, header excluded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),
    #[error("data row {row}: cannot parse timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },
    #[error("data row {row}: missing station")]
    MissingStation { row: usize },
    #[error("data row {row}, {column}: '{value}' is not a finite number")]
    BadNumber {
        row: usize,
        column: String,
        value: String,
    },
    #[error("column '{column}' has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: String },
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an air-quality dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with `datetime`, `station` and pollutant columns
/// * `.parquet` – same columns; `datetime` may be text or a timestamp
/// * `.json`    – `[{ "datetime": "...", "station": "...", "PM2.5": 12.0, ... }, ...]`
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// Cell parsing shared by all formats
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const MISSING_MARKERS: &[&str] = &["", "na", "nan", "null", "none"];

/// Parse a timestamp in any of the accepted layouts. A bare date means midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn bad_number(row: usize, pollutant: Pollutant, value: impl ToString) -> LoadError {
    LoadError::BadNumber {
        row,
        column: pollutant.to_string(),
        value: value.to_string(),
    }
}

/// NaN is the usual missing marker in numeric columns; infinities are rejected.
fn finite_reading(value: f64, row: usize, pollutant: Pollutant) -> Result<Option<f64>, LoadError> {
    if value.is_nan() {
        Ok(None)
    } else if value.is_infinite() {
        Err(bad_number(row, pollutant, value))
    } else {
        Ok(Some(value))
    }
}

/// Parse a pollutant cell. Missing markers and NaN become `None`; `inf` and
/// literals that overflow `f64` are errors.
fn parse_reading(s: &str, row: usize, pollutant: Pollutant) -> Result<Option<f64>, LoadError> {
    let s = s.trim();
    if MISSING_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m)) {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_infinite() => Err(bad_number(row, pollutant, s)),
        Ok(v) => finite_reading(v, row, pollutant),
        Err(_) => Err(bad_number(row, pollutant, s)),
    }
}

fn timestamp_or_err(s: &str, row: usize) -> Result<NaiveDateTime, LoadError> {
    parse_timestamp(s).ok_or_else(|| LoadError::BadTimestamp {
        row,
        value: s.to_string(),
    })
}

fn station_or_err(s: &str, row: usize) -> Result<String, LoadError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(LoadError::MissingStation { row });
    }
    Ok(s.to_string())
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening CSV")?;
    read_csv(file)
}

/// CSV layout: header row naming at least `datetime`, `station` and the six
/// pollutant columns. Other columns (`No`, `TEMP`, `wd`, ...) are ignored.
pub fn read_csv<R: Read>(source: R) -> Result<Dataset> {
    let mut reader = csv::Reader::from_reader(source);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let position = |name: &str| -> Result<usize, LoadError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
    };
    let datetime_idx = position(DATETIME_COLUMN)?;
    let station_idx = position(STATION_COLUMN)?;
    let mut pollutant_idx = [0usize; Pollutant::COUNT];
    for p in Pollutant::ALL {
        pollutant_idx[p.index()] = position(p.column_name())?;
    }

    let mut records = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let row_no = index + 1;
        let record = result.with_context(|| format!("CSV data row {row_no}"))?;
        let cell = |idx: usize| record.get(idx).unwrap_or("");

        let timestamp = timestamp_or_err(cell(datetime_idx), row_no)?;
        let station = station_or_err(cell(station_idx), row_no)?;
        let mut readings = [None; Pollutant::COUNT];
        for p in Pollutant::ALL {
            readings[p.index()] = parse_reading(cell(pollutant_idx[p.index()]), row_no, p)?;
        }

        records.push(Record {
            timestamp,
            station,
            readings,
        });
    }

    Ok(Dataset::from_records(records))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

/// Records-oriented JSON, as written by `df.to_json(orient='records')`.
/// `datetime` is either a string or epoch milliseconds (the Pandas default).
pub fn parse_json(text: &str) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let rows = root.as_array().context("Expected top-level JSON array")?;

    let mut records = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let i = index + 1;
        let obj = row
            .as_object()
            .with_context(|| format!("Record {i} is not a JSON object"))?;

        let timestamp = match obj.get(DATETIME_COLUMN) {
            Some(JsonValue::String(s)) => timestamp_or_err(s, i)?,
            Some(JsonValue::Number(n)) => n
                .as_i64()
                .and_then(chrono::DateTime::from_timestamp_millis)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| LoadError::BadTimestamp {
                    row: i,
                    value: n.to_string(),
                })?,
            Some(_) => bail!(LoadError::BadTimestamp {
                row: i,
                value: obj[DATETIME_COLUMN].to_string(),
            }),
            None => bail!(LoadError::MissingColumn(DATETIME_COLUMN.to_string())),
        };

        let station = match obj.get(STATION_COLUMN) {
            Some(JsonValue::String(s)) => station_or_err(s, i)?,
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => bail!(LoadError::MissingStation { row: i }),
        };

        let mut readings = [None; Pollutant::COUNT];
        for p in Pollutant::ALL {
            readings[p.index()] = match obj.get(p.column_name()) {
                None | Some(JsonValue::Null) => None,
                Some(JsonValue::Number(n)) => match n.as_f64() {
                    Some(v) => finite_reading(v, i, p)?,
                    None => bail!(bad_number(i, p, n)),
                },
                Some(JsonValue::String(s)) => parse_reading(s, i, p)?,
                Some(other) => bail!(bad_number(i, p, other)),
            };
        }

        records.push(Record {
            timestamp,
            station,
            readings,
        });
    }

    Ok(Dataset::from_records(records))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of measurements.
///
/// Expected schema:
/// - `datetime`: Utf8 / LargeUtf8 text, Timestamp (any unit) or Date32
/// - `station`: Utf8 / LargeUtf8
/// - one nullable numeric column per pollutant (Float64, Float32, Int64, Int32)
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;

        let datetime_col = batch_column(&batch, DATETIME_COLUMN)?;
        let station_col = batch_column(&batch, STATION_COLUMN)?;
        let mut pollutant_cols = Vec::with_capacity(Pollutant::COUNT);
        for p in Pollutant::ALL {
            pollutant_cols.push(batch_column(&batch, p.column_name())?);
        }

        let offset = records.len();
        for row in 0..batch.num_rows() {
            let row_no = offset + row + 1;
            let timestamp = extract_timestamp(datetime_col, row, row_no)?;
            let station = extract_station(station_col, row, row_no)?;
            let mut readings = [None; Pollutant::COUNT];
            for (p, col) in Pollutant::ALL.into_iter().zip(&pollutant_cols) {
                readings[p.index()] = extract_reading(col, row, row_no, p)?;
            }
            records.push(Record {
                timestamp,
                station,
                readings,
            });
        }
    }

    Ok(Dataset::from_records(records))
}

// -- Parquet / Arrow helpers --

fn batch_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b ArrayRef, LoadError> {
    batch
        .schema_ref()
        .index_of(name)
        .map(|idx| batch.column(idx))
        .map_err(|_| LoadError::MissingColumn(name.to_string()))
}

fn unsupported(column: &str, data_type: &DataType) -> LoadError {
    LoadError::UnsupportedType {
        column: column.to_string(),
        data_type: format!("{data_type:?}"),
    }
}

fn extract_timestamp(col: &ArrayRef, row: usize, row_no: usize) -> Result<NaiveDateTime, LoadError> {
    let bad = |value: String| LoadError::BadTimestamp { row: row_no, value };
    if col.is_null(row) {
        return Err(bad("<null>".to_string()));
    }
    let parsed = match col.data_type() {
        DataType::Utf8 => return timestamp_or_err(col.as_string::<i32>().value(row), row_no),
        DataType::LargeUtf8 => return timestamp_or_err(col.as_string::<i64>().value(row), row_no),
        DataType::Timestamp(TimeUnit::Second, _) => {
            col.as_primitive::<TimestampSecondType>().value_as_datetime(row)
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            col.as_primitive::<TimestampMillisecondType>().value_as_datetime(row)
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            col.as_primitive::<TimestampMicrosecondType>().value_as_datetime(row)
        }
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            col.as_primitive::<TimestampNanosecondType>().value_as_datetime(row)
        }
        DataType::Date32 => col.as_primitive::<Date32Type>().value_as_datetime(row),
        other => return Err(unsupported(DATETIME_COLUMN, other)),
    };
    parsed.ok_or_else(|| bad(format!("{:?}", col.slice(row, 1))))
}

fn extract_station(col: &ArrayRef, row: usize, row_no: usize) -> Result<String, LoadError> {
    if col.is_null(row) {
        return Err(LoadError::MissingStation { row: row_no });
    }
    match col.data_type() {
        DataType::Utf8 => station_or_err(col.as_string::<i32>().value(row), row_no),
        DataType::LargeUtf8 => station_or_err(col.as_string::<i64>().value(row), row_no),
        other => Err(unsupported(STATION_COLUMN, other)),
    }
}

fn extract_reading(
    col: &ArrayRef,
    row: usize,
    row_no: usize,
    pollutant: Pollutant,
) -> Result<Option<f64>, LoadError> {
    if col.is_null(row) {
        return Ok(None);
    }
    let value = match col.data_type() {
        DataType::Float64 => col.as_primitive::<Float64Type>().value(row),
        DataType::Float32 => col.as_primitive::<Float32Type>().value(row) as f64,
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row) as f64,
        DataType::Int32 => col.as_primitive::<Int32Type>().value(row) as f64,
        other => return Err(unsupported(pollutant.column_name(), other)),
    };
    finite_reading(value, row_no, pollutant)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "No,datetime,station,PM2.5,PM10,SO2,NO2,CO,O3,TEMP\n";

    fn csv(body: &str) -> Result<Dataset> {
        read_csv(format!("{HEADER}{body}").as_bytes())
    }

    #[test]
    fn reads_rows_in_any_column_order() {
        let ds = csv(
            "1,2013-03-01 00:00:00,Aotizhongxin,4,4,4,7,300,77,-0.7\n\
             2,2013-03-01 01:00:00,Aotizhongxin,8,8,4,7,300,77,-1.1\n",
        )
        .unwrap();
        assert_eq!(ds.len(), 2);
        let first = &ds.records[0];
        assert_eq!(first.station, "Aotizhongxin");
        assert_eq!(first.reading(Pollutant::Co), Some(300.0));
        assert_eq!(first.reading(Pollutant::O3), Some(77.0));
        assert_eq!(first.reading(Pollutant::No2), Some(7.0));
        assert_eq!(ds.records[1].reading(Pollutant::Pm25), Some(8.0));
    }

    #[test]
    fn missing_markers_become_none() {
        let ds = csv("1,2013-03-01 00:00:00,Dongsi,,NA,nan,NULL,None, 3 ,0\n").unwrap();
        let rec = &ds.records[0];
        assert_eq!(rec.reading(Pollutant::Pm25), None);
        assert_eq!(rec.reading(Pollutant::Pm10), None);
        assert_eq!(rec.reading(Pollutant::So2), None);
        assert_eq!(rec.reading(Pollutant::No2), None);
        assert_eq!(rec.reading(Pollutant::Co), None);
        assert_eq!(rec.reading(Pollutant::O3), Some(3.0));
    }

    #[test]
    fn zero_is_a_reading() {
        let ds = csv("1,2013-03-01,Dongsi,0,0,0,0,0,0,0\n").unwrap();
        assert_eq!(ds.records[0].reading(Pollutant::Pm25), Some(0.0));
    }

    #[test]
    fn accepts_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2013, 3, 1)
            .unwrap()
            .and_hms_opt(5, 30, 0)
            .unwrap();
        for s in [
            "2013-03-01 05:30:00",
            "2013-03-01T05:30:00",
            "2013-03-01 05:30",
            "2013/03/01 05:30:00",
            "2013-03-01 05:30:00.000",
        ] {
            assert_eq!(parse_timestamp(s), Some(expected), "{s}");
        }
        let midnight = parse_timestamp("2013-03-01").unwrap();
        assert_eq!(midnight, expected.date().and_hms_opt(0, 0, 0).unwrap());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn rejects_missing_column() {
        let err = read_csv("datetime,station,PM2.5\n2013-03-01,A,1\n".as_bytes()).unwrap_err();
        let load_err = err.downcast_ref::<LoadError>().unwrap();
        assert!(matches!(load_err, LoadError::MissingColumn(c) if c == "PM10"));
    }

    #[test]
    fn rejects_bad_timestamp_and_number() {
        let err = csv("1,not-a-date,A,1,1,1,1,1,1,0\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::BadTimestamp { row: 1, .. })
        ));

        let err = csv("1,2013-03-01,A,1,1,1,1,lots,1,0\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::BadNumber { column, .. }) if column == "CO"
        ));

        let err = csv("1,2013-03-01, ,1,1,1,1,1,1,0\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::MissingStation { row: 1 })
        ));
    }

    #[test]
    fn infinite_readings_are_rejected() {
        for cell in ["inf", "-inf", "infinity", "1e400"] {
            let err = csv(&format!("1,2013-03-01,A,{cell},1,1,1,1,1,0\n")).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<LoadError>(),
                    Some(LoadError::BadNumber { column, .. }) if column == "PM2.5"
                ),
                "{cell}"
            );
        }
        assert!(finite_reading(f64::NEG_INFINITY, 1, Pollutant::O3).is_err());
        assert_eq!(finite_reading(f64::NAN, 1, Pollutant::O3).unwrap(), None);
        assert_eq!(finite_reading(-2.5, 1, Pollutant::O3).unwrap(), Some(-2.5));
    }

    #[test]
    fn error_rows_count_from_one() {
        let err = csv(
            "1,2013-03-01,A,1,1,1,1,1,1,0\n\
             2,2013-03-01,A,1,1,1,1,1,oops,0\n",
        )
        .unwrap_err();
        let load_err = err.downcast_ref::<LoadError>().unwrap();
        assert!(matches!(load_err, LoadError::BadNumber { row: 2, .. }));
        assert!(load_err.to_string().starts_with("data row 2, O3"));

        let err = parse_json(r#"[{"datetime": "later", "station": "A"}]"#).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::BadTimestamp { row: 1, .. })
        ));
    }

    #[test]
    fn parses_records_json() {
        let ds = parse_json(
            r#"[
                {"datetime": "2013-03-01 00:00:00", "station": "Gucheng",
                 "PM2.5": 6.0, "PM10": 18.0, "SO2": null, "NO2": 20, "CO": "800", "O3": 40},
                {"datetime": 1362099600000, "station": "Gucheng", "PM2.5": 9.5}
            ]"#,
        )
        .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].reading(Pollutant::So2), None);
        assert_eq!(ds.records[0].reading(Pollutant::Co), Some(800.0));
        assert_eq!(ds.records[0].reading(Pollutant::No2), Some(20.0));
        // 2013-03-01 01:00:00 UTC in epoch milliseconds.
        assert_eq!(
            ds.records[1].timestamp,
            parse_timestamp("2013-03-01 01:00:00").unwrap()
        );
        assert_eq!(ds.records[1].reading(Pollutant::O3), None);
    }

    #[test]
    fn json_must_be_an_array() {
        assert!(parse_json(r#"{"datetime": "2013-03-01"}"#).is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(load_file(Path::new("data.xlsx")).is_err());
    }
}
