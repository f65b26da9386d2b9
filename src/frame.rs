use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use ndarray::{Array2, s};

use crate::error::{ContainerError, Result};

// ---------------------------------------------------------------------------
// Frame – sample-axis selector
// ---------------------------------------------------------------------------

/// Selection along the sample axis, applied identically to every trace.
///
/// Built from plain Rust values:
///
/// ```
/// use trace_container::Frame;
///
/// assert_eq!(Frame::from(3_usize), Frame::Index(3));
/// assert_eq!(Frame::from(..20_usize), Frame::Range { start: None, end: Some(20) });
/// assert_eq!(Frame::from(..), Frame::All);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Frame {
    /// Keep every sample.
    #[default]
    All,
    /// Keep one sample column.
    Index(usize),
    /// Keep `start..end`; a missing bound means the start / end of the trace.
    Range {
        start: Option<usize>,
        end: Option<usize>,
    },
}

impl Frame {
    /// Resolve against a raw trace width `width`.
    ///
    /// Range bounds are clamped into `[0, width]` and an inverted range
    /// becomes empty. An index is not clamped: `Index(i)` with `i >= width`
    /// is a [`ContainerError::Value`] rather than the empty range `width..width`.
    pub fn resolve(&self, width: usize) -> Result<ResolvedFrame> {
        match *self {
            Frame::All => Ok(ResolvedFrame { start: 0, end: width }),
            Frame::Index(i) if i < width => Ok(ResolvedFrame { start: i, end: i + 1 }),
            Frame::Index(i) => Err(ContainerError::value_error(format!(
                "frame index {i} is out of bounds for traces of {width} samples"
            ))),
            Frame::Range { start, end } => {
                let end = end.unwrap_or(width).min(width);
                let start = start.unwrap_or(0).min(end);
                Ok(ResolvedFrame { start, end })
            }
        }
    }
}

impl From<usize> for Frame {
    fn from(i: usize) -> Self {
        Frame::Index(i)
    }
}

impl From<Range<usize>> for Frame {
    fn from(r: Range<usize>) -> Self {
        Frame::Range { start: Some(r.start), end: Some(r.end) }
    }
}

impl From<RangeTo<usize>> for Frame {
    fn from(r: RangeTo<usize>) -> Self {
        Frame::Range { start: None, end: Some(r.end) }
    }
}

impl From<RangeFrom<usize>> for Frame {
    fn from(r: RangeFrom<usize>) -> Self {
        Frame::Range { start: Some(r.start), end: None }
    }
}

impl From<RangeFull> for Frame {
    fn from(_: RangeFull) -> Self {
        Frame::All
    }
}

impl From<Option<Frame>> for Frame {
    fn from(f: Option<Frame>) -> Self {
        f.unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// ResolvedFrame
// ---------------------------------------------------------------------------

/// A frame bound to a concrete trace width: the half-open column range
/// `start..end`, with `start <= end <= width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFrame {
    pub start: usize,
    pub end: usize,
}

impl ResolvedFrame {
    /// Number of samples kept per trace.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn columns(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Select the frame's columns of a raw `(rows, width)` block.
    ///
    /// A frame covering the full width hands the block back untouched.
    pub fn apply(&self, raw: Array2<f64>) -> Array2<f64> {
        if self.start == 0 && self.end == raw.ncols() {
            return raw;
        }
        raw.slice(s![.., self.start..self.end]).to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn absent_frame_keeps_full_width() {
        let r = Frame::All.resolve(1000).unwrap();
        assert_eq!(r.columns(), 0..1000);
        assert_eq!(r.len(), 1000);
    }

    #[test]
    fn range_is_clamped_to_width() {
        assert_eq!(Frame::from(..10_usize).resolve(1000).unwrap().len(), 10);
        assert_eq!(Frame::from(..2000_usize).resolve(1000).unwrap().len(), 1000);
        assert_eq!(Frame::from(990_usize..).resolve(1000).unwrap().columns(), 990..1000);
        assert_eq!(Frame::from(1200..1500_usize).resolve(1000).unwrap().len(), 0);
    }

    #[test]
    fn inverted_range_is_empty() {
        let r = Frame::from(30..10_usize).resolve(100).unwrap();
        assert!(r.is_empty());
        assert!(r.start <= r.end);
    }

    #[test]
    fn index_is_a_single_column() {
        let r = Frame::from(1_usize).resolve(1000).unwrap();
        assert_eq!(r.columns(), 1..2);
        assert!(matches!(Frame::from(1000_usize).resolve(1000), Err(ContainerError::Value(_))));
    }

    #[test]
    fn apply_selects_columns() {
        let raw = array![[0.0, 1.0, 2.0, 3.0], [4.0, 5.0, 6.0, 7.0]];
        let r = Frame::from(1..3_usize).resolve(4).unwrap();
        assert_eq!(r.apply(raw.clone()), array![[1.0, 2.0], [5.0, 6.0]]);
        assert_eq!(Frame::All.resolve(4).unwrap().apply(raw.clone()), raw);
        assert_eq!(Frame::from(2_usize).resolve(4).unwrap().apply(raw), array![[2.0], [6.0]]);
    }
}
