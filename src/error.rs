use thiserror::Error;

/// Failures surfaced by container construction, batching and materialization.
///
/// `Type`, `Value` and `Range` are usage errors raised eagerly, before any
/// trace data is read. `Read` and `Preprocess` only occur while a batch is
/// being materialized; `Open` only while loading from configuration.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// An argument has the wrong shape or kind.
    #[error("type error: {0}")]
    Type(String),

    /// An argument has the right kind but an unusable value.
    #[error("value error: {0}")]
    Value(String),

    /// A batch index outside `0..num_batches`.
    #[error("batch index {index} out of range for {count} batches")]
    Range { index: usize, count: usize },

    /// The trace set failed to deliver samples or metadata.
    #[error("reading traces {start}..{end}: {source:#}")]
    Read {
        start: usize,
        end: usize,
        #[source]
        source: anyhow::Error,
    },

    /// A trace file or configuration file could not be opened or parsed.
    #[error("opening {what}: {source:#}")]
    Open {
        what: String,
        #[source]
        source: anyhow::Error,
    },

    /// A preprocess stage failed on a batch.
    #[error("preprocess '{stage}' failed: {source:#}")]
    Preprocess {
        stage: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ContainerError {
    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub(crate) fn value_error(msg: impl Into<String>) -> Self {
        Self::Value(msg.into())
    }
}

pub type Result<T, E = ContainerError> = std::result::Result<T, E>;
