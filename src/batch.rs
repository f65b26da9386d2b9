use std::iter::FusedIterator;
use std::ops::Range;

use ndarray::Array2;

use crate::container::Container;
use crate::data::model::Metadata;
use crate::error::{ContainerError, Result};

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// One materialized slice of traces: framed and preprocessed samples plus the
/// metadata rows that go with them.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `(size, trace_size)` unless a preprocess changed the column count.
    pub samples: Array2<f64>,
    /// Metadata columns, `size` values each.
    pub metadatas: Metadata,
    /// Number of traces in the batch.
    pub size: usize,
    start: usize,
}

impl Batch {
    pub(crate) fn new(range: Range<usize>, samples: Array2<f64>, metadatas: Metadata) -> Self {
        Self {
            samples,
            metadatas,
            size: range.len(),
            start: range.start,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Trace indices covered, relative to the whole trace set.
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.size
    }
}

// ---------------------------------------------------------------------------
// BatchSequence
// ---------------------------------------------------------------------------

/// A lazy partition of a container's traces into contiguous batches.
///
/// Batch `k` covers `k * batch_size .. min((k + 1) * batch_size, len)`.
/// Neither [`get`](Self::get) nor iteration keeps any batch around; every
/// access reads just the traces it needs.
#[derive(Debug, Clone, Copy)]
pub struct BatchSequence<'a> {
    container: &'a Container,
    batch_size: usize,
    len: usize,
}

impl<'a> BatchSequence<'a> {
    pub(crate) fn new(container: &'a Container, batch_size: usize) -> Self {
        debug_assert!(batch_size > 0);
        Self {
            container,
            batch_size,
            len: container.len(),
        }
    }

    /// Number of traces covered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// `ceil(len / batch_size)`.
    pub fn num_batches(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    /// Trace range of batch `index`.
    pub fn range(&self, index: usize) -> Result<Range<usize>> {
        let count = self.num_batches();
        if index >= count {
            return Err(ContainerError::Range { index, count });
        }
        let start = index * self.batch_size;
        Ok(start..(start + self.batch_size).min(self.len))
    }

    /// Materialize batch `index`.
    pub fn get(&self, index: usize) -> Result<Batch> {
        let range = self.range(index)?;
        self.container.materialize(range)
    }

    /// Trace ranges of every batch, in order. Reads nothing.
    pub fn ranges(&self) -> impl ExactSizeIterator<Item = Range<usize>> + '_ {
        let (len, size) = (self.len, self.batch_size);
        (0..self.num_batches()).map(move |k| k * size..((k + 1) * size).min(len))
    }

    /// Iterate batches in ascending order. Every call starts from batch 0.
    pub fn iter(&self) -> Batches<'a> {
        Batches {
            seq: *self,
            front: 0,
            back: self.num_batches(),
        }
    }
}

impl<'a> IntoIterator for &BatchSequence<'a> {
    type Item = Result<Batch>;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for BatchSequence<'a> {
    type Item = Result<Batch>;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Batches – iterator
// ---------------------------------------------------------------------------

/// Iterator over a [`BatchSequence`], materializing one batch per step.
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    seq: BatchSequence<'a>,
    front: usize,
    back: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let k = self.front;
        self.front += 1;
        Some(self.seq.get(k))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.front = self.front.saturating_add(n).min(self.back);
        self.next()
    }
}

impl DoubleEndedIterator for Batches<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.seq.get(self.back))
    }
}

impl ExactSizeIterator for Batches<'_> {}

impl FusedIterator for Batches<'_> {}
