use std::ops::Range;

use anyhow::{Result, bail};
use ndarray::{Array2, s};

use super::model::{Metadata, metadata_rows, slice_metadata};

// ---------------------------------------------------------------------------
// TraceHeaderSet – the storage capability consumed by `Container`
// ---------------------------------------------------------------------------

/// An addressable, read-only collection of traces.
///
/// Every trace has `sample_width()` raw samples and one value per metadata
/// column. Readers take a half-open row range and return exactly
/// `range.len()` rows; metadata rows line up with sample rows.
pub trait TraceHeaderSet: Send + Sync {
    /// Number of traces `T`.
    fn len(&self) -> usize;

    /// Raw sample count `M` of every trace.
    fn sample_width(&self) -> usize;

    /// Raw samples of traces `range`, shaped `(range.len(), M)`.
    fn samples(&self, range: Range<usize>) -> Result<Array2<f64>>;

    /// Metadata of traces `range`, every column holding `range.len()` values.
    fn metadata(&self, range: Range<usize>) -> Result<Metadata>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reject ranges that fall outside `[0, len)` or run backwards.
pub(crate) fn check_range(range: &Range<usize>, len: usize) -> Result<()> {
    if range.start > range.end || range.end > len {
        bail!(
            "trace range {}..{} is out of bounds for {len} traces",
            range.start,
            range.end
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// InMemoryTraceHeaderSet
// ---------------------------------------------------------------------------

/// Trace set backed by arrays already resident in RAM.
#[derive(Debug, Clone)]
pub struct InMemoryTraceHeaderSet {
    samples: Array2<f64>,
    metadata: Metadata,
}

impl InMemoryTraceHeaderSet {
    /// Wrap a `(T, M)` sample matrix and its per-trace metadata columns.
    pub fn new(samples: Array2<f64>, metadata: Metadata) -> Result<Self> {
        let rows = samples.nrows();
        for (name, values) in &metadata {
            if values.len() != rows {
                bail!(
                    "metadata column '{name}' has {} values but there are {rows} traces",
                    values.len()
                );
            }
        }
        Ok(Self { samples, metadata })
    }

    /// Build from one sample vector per trace; all must share a width.
    pub fn from_rows(rows: Vec<Vec<f64>>, metadata: Metadata) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        let n = rows.len();
        let mut flat = Vec::with_capacity(n * width);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                bail!("trace {i} has {} samples, expected {width}", row.len());
            }
            flat.extend(row);
        }
        let samples = Array2::from_shape_vec((n, width), flat)?;
        Self::new(samples, metadata)
    }

    /// The full sample matrix.
    pub fn raw_samples(&self) -> &Array2<f64> {
        &self.samples
    }
}

impl TraceHeaderSet for InMemoryTraceHeaderSet {
    fn len(&self) -> usize {
        self.samples.nrows()
    }

    fn sample_width(&self) -> usize {
        self.samples.ncols()
    }

    fn samples(&self, range: Range<usize>) -> Result<Array2<f64>> {
        check_range(&range, self.len())?;
        Ok(self.samples.slice(s![range, ..]).to_owned())
    }

    fn metadata(&self, range: Range<usize>) -> Result<Metadata> {
        check_range(&range, self.len())?;
        let md = slice_metadata(&self.metadata, range);
        debug_assert!(metadata_rows(&md).is_some());
        Ok(md)
    }
}
