use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::info;
use serde_json::Value as JsonValue;

use super::model::{Metadata, MetadataValue};
use super::parquet::ParquetTraceHeaderSet;
use super::ths::{InMemoryTraceHeaderSet, TraceHeaderSet};

/// Name of the column / key holding the raw sample vector of each trace.
pub const SAMPLES_COLUMN: &str = "samples";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Open a trace set from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `samples` list column plus metadata columns, read lazily
/// * `.json`    – `[{ "samples": [...], "plaintext": [...], ... }, ...]`
/// * `.csv`     – `samples` column of semicolon-separated numbers
///
/// JSON and CSV sets are loaded into memory; Parquet sets only read the rows a
/// caller asks for.
pub fn load_file(path: &Path) -> Result<Arc<dyn TraceHeaderSet>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let ths: Arc<dyn TraceHeaderSet> = match ext.as_str() {
        "parquet" | "pq" => Arc::new(ParquetTraceHeaderSet::open(path)?),
        "json" => Arc::new(load_json(path)?),
        "csv" => Arc::new(load_csv(path)?),
        other => bail!("Unsupported file extension: .{other}"),
    };
    info!(
        "opened trace set {}: {} traces x {} samples",
        path.display(),
        ths.len(),
        ths.sample_width()
    );
    Ok(ths)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "samples": [12.0, 13.5, ...], "plaintext": [0, 17, ...], "key_id": 3 },
///   ...
/// ]
/// ```
///
/// Arrays of integers in `0..=255` become [`MetadataValue::Bytes`].
pub fn load_json(path: &Path) -> Result<InMemoryTraceHeaderSet> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());
    let mut row_meta = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        rows.push(json_array_to_f64(obj.get(SAMPLES_COLUMN), i)?);

        let mut metadata = BTreeMap::new();
        for (key, val) in obj {
            if key == SAMPLES_COLUMN {
                continue;
            }
            metadata.insert(key.clone(), json_to_metadata(val));
        }
        row_meta.push(metadata);
    }

    InMemoryTraceHeaderSet::from_rows(rows, columns_from_rows(row_meta))
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{SAMPLES_COLUMN}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {SAMPLES_COLUMN}[{j}]: not a number"))
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        JsonValue::Array(items) => items
            .iter()
            .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map_or_else(|| MetadataValue::String(val.to_string()), MetadataValue::Bytes),
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  header row with column names.
/// The `samples` column contains semicolon-separated numbers:
///   `"12.0;13.5;11.0"`
/// All other columns are treated as metadata.
pub fn load_csv(path: &Path) -> Result<InMemoryTraceHeaderSet> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let samples_idx = headers
        .iter()
        .position(|h| h == SAMPLES_COLUMN)
        .with_context(|| format!("CSV missing '{SAMPLES_COLUMN}' column"))?;

    let mut rows = Vec::new();
    let mut row_meta = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        rows.push(parse_semicolon_floats(
            record.get(samples_idx).unwrap_or(""),
            row_no,
        )?);

        let mut metadata = BTreeMap::new();
        for (col_idx, value) in record.iter().enumerate() {
            if col_idx == samples_idx {
                continue;
            }
            metadata.insert(headers[col_idx].clone(), guess_metadata_type(value));
        }
        row_meta.push(metadata);
    }

    InMemoryTraceHeaderSet::from_rows(rows, columns_from_rows(row_meta))
}

fn parse_semicolon_floats(s: &str, row: usize) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim().parse::<f64>().with_context(|| {
                format!("Row {row}, {SAMPLES_COLUMN}[{j}]: '{tok}' is not a number")
            })
        })
        .collect()
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Row → column pivot
// ---------------------------------------------------------------------------

/// Pivot per-trace records into aligned columns; a trace missing a key gets
/// [`MetadataValue::Null`] in that column.
fn columns_from_rows(rows: Vec<BTreeMap<String, MetadataValue>>) -> Metadata {
    let mut columns = Metadata::new();
    for row in &rows {
        for key in row.keys() {
            columns.entry(key.clone()).or_default();
        }
    }
    for (name, values) in columns.iter_mut() {
        values.extend(
            rows.iter()
                .map(|row| row.get(name).cloned().unwrap_or(MetadataValue::Null)),
        );
    }
    columns
}
