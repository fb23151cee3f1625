use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray, TimestampSecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use parquet::arrow::ArrowWriter;

const POLLUTANTS: [&str; 6] = ["PM2.5", "PM10", "SO2", "NO2", "CO", "O3"];
const MISSING_RATE: f64 = 0.02;
const DAYS: i64 = 60;

/// Station name plus a pollution level multiplier.
const STATIONS: [(&str, f64); 6] = [
    ("Aotizhongxin", 1.10),
    ("Changping", 0.80),
    ("Dingling", 0.65),
    ("Dongsi", 1.25),
    ("Guanyuan", 1.05),
    ("Gucheng", 0.95),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Typical level and spread per pollutant, in `POLLUTANTS` order.
fn baseline(pollutant: usize) -> (f64, f64) {
    match pollutant {
        0 => (80.0, 30.0),   // PM2.5
        1 => (105.0, 35.0),  // PM10
        2 => (15.0, 8.0),    // SO2
        3 => (50.0, 18.0),   // NO2
        4 => (1200.0, 400.0), // CO
        _ => (55.0, 25.0),   // O3
    }
}

struct Row {
    timestamp: NaiveDateTime,
    station: &'static str,
    readings: [Option<f64>; 6],
}

fn generate_rows(rng: &mut SimpleRng, start: NaiveDateTime) -> Vec<Row> {
    let mut rows = Vec::new();
    for (station, level) in STATIONS {
        for hour in 0..DAYS * 24 {
            let timestamp = start + Duration::hours(hour);
            // Particulates peak at night, ozone in the afternoon.
            let daily = (2.0 * std::f64::consts::PI * timestamp.hour() as f64 / 24.0).cos();
            let seasonal = 1.0 + 0.3 * (hour as f64 / (DAYS * 24) as f64 * std::f64::consts::PI).sin();
            // Shared smog factor so particulates correlate.
            let smog = rng.gauss(1.0, 0.25).max(0.1);

            let mut readings = [None; 6];
            for (i, slot) in readings.iter_mut().enumerate() {
                if rng.next_f64() < MISSING_RATE {
                    continue;
                }
                let (mean, spread) = baseline(i);
                let cycle = if i == 5 { 1.0 - 0.4 * daily } else { 1.0 + 0.2 * daily };
                let factor = if i == 5 { 1.0 } else { smog };
                let value = rng.gauss(mean * level * seasonal * cycle * factor, spread * 0.3);
                *slot = Some((value.max(1.0) * 10.0).round() / 10.0);
            }
            rows.push(Row {
                timestamp,
                station,
                readings,
            });
        }
    }
    rows.sort_by_key(|r| r.timestamp);
    rows
}

fn write_csv(rows: &[Row], path: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    let mut header = vec!["No", "datetime", "station"];
    header.extend(POLLUTANTS);
    writer.write_record(&header)?;

    for (no, row) in rows.iter().enumerate() {
        let mut record = vec![
            (no + 1).to_string(),
            row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            row.station.to_string(),
        ];
        record.extend(
            row.readings
                .iter()
                .map(|r| r.map_or_else(String::new, |v| v.to_string())),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(rows: &[Row], path: &str) -> Result<()> {
    let mut fields = vec![
        Field::new("datetime", DataType::Timestamp(TimeUnit::Second, None), false),
        Field::new("station", DataType::Utf8, false),
    ];
    fields.extend(POLLUTANTS.iter().map(|p| Field::new(*p, DataType::Float64, true)));
    let schema = Arc::new(Schema::new(fields));

    let mut columns: Vec<arrow::array::ArrayRef> = vec![
        Arc::new(TimestampSecondArray::from(
            rows.iter()
                .map(|r| r.timestamp.and_utc().timestamp())
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.station).collect::<Vec<_>>(),
        )),
    ];
    for i in 0..POLLUTANTS.len() {
        columns.push(Arc::new(Float64Array::from(
            rows.iter().map(|r| r.readings[i]).collect::<Vec<_>>(),
        )));
    }

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let start = NaiveDate::from_ymd_opt(2013, 3, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid start date")?;

    let rows = generate_rows(&mut rng, start);

    let csv_path = "sample_air_quality.csv";
    let parquet_path = "sample_air_quality.parquet";
    write_csv(&rows, csv_path)?;
    write_parquet(&rows, parquet_path)?;

    println!(
        "Wrote {} rows ({} stations, {DAYS} days) to {csv_path} and {parquet_path}",
        rows.len(),
        STATIONS.len()
    );
    Ok(())
}
