//! Lazy, memory-bounded batching over side-channel trace sets.
//!
//! A [`Container`] binds a [`TraceHeaderSet`] to an optional sample
//! [`Frame`] and an ordered list of [`Preprocess`] stages. Asking it for
//! [`batches`](Container::batches) returns a [`BatchSequence`] that reads,
//! frames and preprocesses one contiguous slice of traces at a time:
//!
//! ```
//! use std::sync::Arc;
//!
//! use ndarray::Array2;
//! use trace_container::data::model::Metadata;
//! use trace_container::preprocess::builtin;
//! use trace_container::{Container, InMemoryTraceHeaderSet};
//!
//! let samples = Array2::from_shape_fn((2000, 1000), |(i, j)| ((i + j) % 256) as f64);
//! let ths = InMemoryTraceHeaderSet::new(samples, Metadata::new()).unwrap();
//! let container = Container::new(Arc::new(ths), ..20_usize, builtin::square()).unwrap();
//!
//! let batches = container.batches(Some(10)).unwrap();
//! assert_eq!(batches.num_batches(), 200);
//! let first = batches.get(0).unwrap();
//! assert_eq!(first.samples.dim(), (10, 20));
//! ```

pub mod batch;
pub mod config;
pub mod container;
pub mod data;
pub mod error;
pub mod frame;
pub mod preprocess;

pub use batch::{Batch, BatchSequence, Batches};
pub use config::ContainerConfig;
pub use container::{Container, default_batch_size};
pub use data::model::{Metadata, MetadataValue};
pub use data::parquet::ParquetTraceHeaderSet;
pub use data::ths::{InMemoryTraceHeaderSet, TraceHeaderSet};
pub use error::{ContainerError, Result};
pub use frame::{Frame, ResolvedFrame};
pub use preprocess::{Preprocess, PreprocessRegistry, Preprocesses};
