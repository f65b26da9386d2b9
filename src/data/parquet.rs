use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use log::trace;
use ndarray::Array2;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::loader::SAMPLES_COLUMN;
use super::model::{Metadata, MetadataValue};
use super::ths::{TraceHeaderSet, check_range};

// ---------------------------------------------------------------------------
// ParquetTraceHeaderSet
// ---------------------------------------------------------------------------

/// Trace set stored in a Parquet file, read lazily.
///
/// Expected schema:
/// - `samples`: List/LargeList of Float64, Float32 or integers – one vector per trace
/// - any other column is per-trace metadata (strings, ints, floats, bools,
///   binary, lists of bytes); any other type fails the metadata read
///
/// Only the footer is read on open. Every `samples` / `metadata` call reopens
/// the file and decodes just the requested rows of just the needed columns.
#[derive(Debug, Clone)]
pub struct ParquetTraceHeaderSet {
    path: PathBuf,
    len: usize,
    width: usize,
    samples_root: usize,
    /// (root column index, column name) of every metadata column.
    meta_cols: Vec<(usize, String)>,
}

impl ParquetTraceHeaderSet {
    /// Read the file footer and the first trace to learn the sample width.
    pub fn open(path: &Path) -> Result<Self> {
        let builder = reader_builder(path)?;
        let schema = builder.schema().clone();

        let samples_root = schema
            .index_of(SAMPLES_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{SAMPLES_COLUMN}' column"))?;

        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != samples_root)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        let num_rows = builder.metadata().file_metadata().num_rows();
        let len = usize::try_from(num_rows)
            .with_context(|| format!("invalid row count {num_rows} in parquet footer"))?;

        let mut ths = Self {
            path: path.to_path_buf(),
            len,
            width: 0,
            samples_root,
            meta_cols,
        };
        if len > 0 {
            let rows = ths.read_sample_rows(0..1)?;
            ths.width = rows.first().map_or(0, Vec::len);
        }
        Ok(ths)
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode rows `range` of the projected root columns.
    fn read_batches(&self, range: &Range<usize>, roots: Vec<usize>) -> Result<Vec<RecordBatch>> {
        let builder = reader_builder(&self.path)?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
        let reader = builder
            .with_projection(mask)
            .with_offset(range.start)
            .with_limit(range.len())
            .with_batch_size(range.len().max(1))
            .build()
            .context("building parquet reader")?;

        trace!("parquet read {}..{} from {}", range.start, range.end, self.path.display());
        reader
            .map(|batch| batch.context("reading parquet record batch"))
            .collect()
    }

    fn read_sample_rows(&self, range: Range<usize>) -> Result<Vec<Vec<f64>>> {
        let mut rows = Vec::with_capacity(range.len());
        for batch in self.read_batches(&range, vec![self.samples_root])? {
            let col = batch
                .column_by_name(SAMPLES_COLUMN)
                .with_context(|| format!("record batch missing '{SAMPLES_COLUMN}'"))?;
            for row in 0..batch.num_rows() {
                let values = extract_f64_list(col, row).with_context(|| {
                    format!("Row {}: failed to read '{SAMPLES_COLUMN}'", range.start + rows.len())
                })?;
                rows.push(values);
            }
        }
        if rows.len() != range.len() {
            bail!(
                "expected {} rows from {}, got {}",
                range.len(),
                self.path.display(),
                rows.len()
            );
        }
        Ok(rows)
    }
}

fn reader_builder(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
    let file = File::open(path)
        .with_context(|| format!("opening parquet file {}", path.display()))?;
    ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")
}

impl TraceHeaderSet for ParquetTraceHeaderSet {
    fn len(&self) -> usize {
        self.len
    }

    fn sample_width(&self) -> usize {
        self.width
    }

    fn samples(&self, range: Range<usize>) -> Result<Array2<f64>> {
        check_range(&range, self.len)?;
        if range.is_empty() {
            return Ok(Array2::zeros((0, self.width)));
        }
        let n = range.len();
        let mut flat = Vec::with_capacity(n * self.width);
        for (i, row) in self.read_sample_rows(range.clone())?.into_iter().enumerate() {
            if row.len() != self.width {
                bail!(
                    "trace {} has {} samples, expected {}",
                    range.start + i,
                    row.len(),
                    self.width
                );
            }
            flat.extend(row);
        }
        Ok(Array2::from_shape_vec((n, self.width), flat)?)
    }

    fn metadata(&self, range: Range<usize>) -> Result<Metadata> {
        check_range(&range, self.len)?;
        let mut columns: Metadata = self
            .meta_cols
            .iter()
            .map(|(_, name)| (name.clone(), Vec::with_capacity(range.len())))
            .collect();
        if self.meta_cols.is_empty() || range.is_empty() {
            return Ok(columns);
        }

        let roots = self.meta_cols.iter().map(|(i, _)| *i).collect();
        for batch in self.read_batches(&range, roots)? {
            for (name, values) in columns.iter_mut() {
                let col = batch
                    .column_by_name(name)
                    .with_context(|| format!("record batch missing '{name}'"))?;
                let extracted = extract_metadata_column(col)
                    .with_context(|| format!("reading metadata column '{name}'"))?;
                values.extend(extracted);
            }
        }
        Ok(columns)
    }
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &ArrayRef, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col.as_list::<i32>().value(row),
        DataType::LargeList(_) => col.as_list::<i64>().value(row),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // Inner arrays may be any numeric type; widen to f64.
    let inner = values_array.data_type().clone();
    let widened = match &inner {
        DataType::Float64 => values_array,
        other if other.is_numeric() => cast(&values_array, &DataType::Float64)
            .with_context(|| format!("casting {other:?} samples to Float64"))?,
        other => bail!("List inner type is {other:?}, expected a numeric type"),
    };
    Ok(widened
        .as_primitive::<Float64Type>()
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Extract every row of a metadata column. Integers are widened to Int64
/// and floats to Float64 once per column.
fn extract_metadata_column(col: &ArrayRef) -> Result<Vec<MetadataValue>> {
    let dt = col.data_type();
    let widened = if dt.is_integer() && *dt != DataType::Int64 {
        cast(col, &DataType::Int64).with_context(|| format!("casting {dt:?} to Int64"))?
    } else if dt.is_floating() && *dt != DataType::Float64 {
        cast(col, &DataType::Float64).with_context(|| format!("casting {dt:?} to Float64"))?
    } else {
        col.clone()
    };
    (0..col.len())
        .map(|row| {
            if col.is_null(row) {
                return Ok(MetadataValue::Null);
            }
            if widened.is_null(row) {
                bail!("row {row}: {dt:?} value does not fit in Int64");
            }
            extract_metadata_value(&widened, row)
        })
        .collect()
}

/// Extract a single metadata value from a widened Arrow column at a given row.
fn extract_metadata_value(col: &ArrayRef, row: usize) -> Result<MetadataValue> {
    Ok(match col.data_type() {
        DataType::Utf8 => MetadataValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => {
            MetadataValue::String(col.as_string::<i64>().value(row).to_string())
        }
        DataType::Int64 => MetadataValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float64 => MetadataValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => MetadataValue::Bool(col.as_boolean().value(row)),
        DataType::Binary => MetadataValue::Bytes(col.as_binary::<i32>().value(row).to_vec()),
        DataType::LargeBinary => MetadataValue::Bytes(col.as_binary::<i64>().value(row).to_vec()),
        DataType::FixedSizeBinary(_) => {
            MetadataValue::Bytes(col.as_fixed_size_binary().value(row).to_vec())
        }
        DataType::List(_) => list_to_bytes(&col.as_list::<i32>().value(row))
            .with_context(|| format!("row {row}: list is not a byte string"))?,
        DataType::LargeList(_) => list_to_bytes(&col.as_list::<i64>().value(row))
            .with_context(|| format!("row {row}: list is not a byte string"))?,
        other => bail!("unsupported metadata column type {other:?}"),
    })
}

/// Interpret a list of small non-negative integers as bytes.
fn list_to_bytes(values: &ArrayRef) -> Option<MetadataValue> {
    if values.null_count() > 0 || !values.data_type().is_integer() {
        return None;
    }
    let widened = cast(values, &DataType::Int64).ok()?;
    widened
        .as_primitive::<Int64Type>()
        .values()
        .iter()
        .map(|v| u8::try_from(*v).ok())
        .collect::<Option<Vec<u8>>>()
        .map(MetadataValue::Bytes)
}
