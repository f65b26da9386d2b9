/// Data layer: trace storage, loading and per-trace metadata.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv          in-RAM arrays
///        │                               │
///        ▼                               ▼
///   ┌──────────┐               ┌──────────────────────┐
///   │  loader   │──────────────▶│ dyn TraceHeaderSet    │  len, width,
///   └──────────┘               └──────────────────────┘  samples(range),
///                                        │               metadata(range)
///                                        ▼
///                                  crate::container
/// ```

pub mod loader;
pub mod model;
pub mod parquet;
pub mod ths;
