use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use log::{debug, trace};

use crate::batch::{Batch, BatchSequence};
use crate::data::ths::TraceHeaderSet;
use crate::error::{ContainerError, Result};
use crate::frame::{Frame, ResolvedFrame};
use crate::preprocess::Preprocesses;

// ---------------------------------------------------------------------------
// Default batch size
// ---------------------------------------------------------------------------

/// `(max trace size, batch size)` tiers used when no batch size is given.
/// Each tier keeps a batch around 25–50 M samples.
pub const DEFAULT_BATCH_TIERS: [(usize, usize); 5] = [
    (1_000, 25_000),
    (5_000, 5_000),
    (10_000, 2_500),
    (50_000, 1_000),
    (100_000, 250),
];

/// Largest default batch size for traces wider than every tier.
pub const DEFAULT_BATCH_CAP: usize = 100;

/// Samples one default batch may hold once traces are wider than every
/// tier (200 MB of `f64`).
pub const BUDGET_SAMPLES: usize = 25_000_000;

/// Batch size used when the caller does not pick one: the tier for
/// `trace_size`, or past the last tier as many traces as fit in
/// [`BUDGET_SAMPLES`] (at most [`DEFAULT_BATCH_CAP`]). Capped at the trace
/// count and never below 1.
pub fn default_batch_size(trace_size: usize, trace_count: usize) -> usize {
    let tier = DEFAULT_BATCH_TIERS
        .iter()
        .find(|(max_size, _)| trace_size <= *max_size)
        .map_or_else(
            || (BUDGET_SAMPLES / trace_size.max(1)).clamp(1, DEFAULT_BATCH_CAP),
            |(_, size)| *size,
        );
    tier.min(trace_count).max(1)
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// A trace set bound to a frame and a preprocess pipeline.
///
/// Construction validates everything up front; afterwards the container is
/// immutable and only hands out [`BatchSequence`]s.
#[derive(Clone)]
pub struct Container {
    ths: Arc<dyn TraceHeaderSet>,
    frame: ResolvedFrame,
    preprocesses: Preprocesses,
}

impl Container {
    /// Bind `ths` with a sample `frame` and ordered `preprocesses`.
    ///
    /// Fails with [`ContainerError::Value`] if the frame is an index past the
    /// end of the traces.
    pub fn new(
        ths: Arc<dyn TraceHeaderSet>,
        frame: impl Into<Frame>,
        preprocesses: impl Into<Preprocesses>,
    ) -> Result<Self> {
        let frame = frame.into().resolve(ths.sample_width())?;
        let preprocesses = preprocesses.into();
        debug!(
            "container: {} traces x {} samples, frame {:?}, preprocesses {:?}",
            ths.len(),
            ths.sample_width(),
            frame.columns(),
            preprocesses.names()
        );
        Ok(Self {
            ths,
            frame,
            preprocesses,
        })
    }

    /// No frame, no preprocessing.
    pub fn plain(ths: Arc<dyn TraceHeaderSet>) -> Self {
        let frame = ResolvedFrame {
            start: 0,
            end: ths.sample_width(),
        };
        Self {
            ths,
            frame,
            preprocesses: Preprocesses::none(),
        }
    }

    /// Samples per trace after the frame is applied.
    pub fn trace_size(&self) -> usize {
        self.frame.len()
    }

    /// Number of traces.
    pub fn len(&self) -> usize {
        self.ths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ths.is_empty()
    }

    pub fn frame(&self) -> ResolvedFrame {
        self.frame
    }

    pub fn preprocesses(&self) -> &Preprocesses {
        &self.preprocesses
    }

    pub fn ths(&self) -> &Arc<dyn TraceHeaderSet> {
        &self.ths
    }

    /// Partition the traces into batches of `batch_size` (or the default).
    ///
    /// Nothing is read here; batches are materialized on access.
    pub fn batches(&self, batch_size: Option<usize>) -> Result<BatchSequence<'_>> {
        let size = match batch_size {
            Some(0) => {
                return Err(ContainerError::value_error(
                    "batch size must be a strictly positive integer",
                ));
            }
            Some(n) => n,
            None => default_batch_size(self.trace_size(), self.len()),
        };
        let seq = BatchSequence::new(self, size);
        debug!(
            "batches: size {size}{} over {} traces -> {} batches",
            if batch_size.is_none() { " (default)" } else { "" },
            seq.len(),
            seq.num_batches()
        );
        Ok(seq)
    }

    /// Read, frame and preprocess traces `range`.
    pub(crate) fn materialize(&self, range: Range<usize>) -> Result<Batch> {
        trace!("materializing traces {}..{}", range.start, range.end);
        let read_err = |source: anyhow::Error| ContainerError::Read {
            start: range.start,
            end: range.end,
            source,
        };

        let raw = self.ths.samples(range.clone()).map_err(read_err)?;
        let expected = (range.len(), self.ths.sample_width());
        if raw.dim() != expected {
            return Err(read_err(anyhow::anyhow!(
                "trace set returned a {:?} block, expected {:?}",
                raw.dim(),
                expected
            )));
        }
        let samples = self.preprocesses.run(self.frame.apply(raw))?;
        let metadatas = self.ths.metadata(range.clone()).map_err(read_err)?;
        Ok(Batch::new(range, samples, metadatas))
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("traces", &self.ths.len())
            .field("sample_width", &self.ths.sample_width())
            .field("frame", &self.frame)
            .field("preprocesses", &self.preprocesses.names())
            .finish()
    }
}
