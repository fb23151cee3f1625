/// Data layer: core types, loading, filtering and aggregation.
///
/// Architecture:
/// ```text
///  .csv / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  Vec<Record>, station index, time span
///   └──────────┘
///        │   + FilterParams (date range, pollutants)
///        ▼
///   ┌──────────┐
///   │  filter   │  inclusive date range → row indices
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ aggregate │  means, station counts, histograms,
///   └───────────┘  boxplots, correlation (via stats)
/// ```

pub mod aggregate;
pub mod filter;
pub mod loader;
pub mod model;
pub mod stats;
