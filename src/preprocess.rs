//! Preprocess stages: named, pure transforms over a batch's sample block.
//!
//! Wrapping a function in [`Preprocess::new`] is what makes it eligible for a
//! [`Container`](crate::Container) pipeline; the container accepts nothing
//! else. Stages run in list order, each receiving the previous stage's output.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use ndarray::Array2;

use crate::error::{ContainerError, Result as ContainerResult};

type StageFn = dyn Fn(Array2<f64>) -> Result<Array2<f64>> + Send + Sync;

// ---------------------------------------------------------------------------
// Preprocess – a tagged stage
// ---------------------------------------------------------------------------

/// A pipeline-eligible transform.
///
/// Stages must keep the row count; column count and values are their own
/// business and are not checked by the container.
#[derive(Clone)]
pub struct Preprocess {
    name: String,
    func: Arc<StageFn>,
}

impl Preprocess {
    /// Tag a fallible transform as a preprocess stage.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Array2<f64>) -> Result<Array2<f64>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Tag a transform that cannot fail.
    pub fn infallible<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Array2<f64>) -> Array2<f64> + Send + Sync + 'static,
    {
        Self::new(name, move |block| Ok(func(block)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the stage on its own, outside any container.
    pub fn apply(&self, block: Array2<f64>) -> Result<Array2<f64>> {
        (self.func)(block)
    }
}

impl fmt::Debug for Preprocess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preprocess").field("name", &self.name).finish()
    }
}

// ---------------------------------------------------------------------------
// Preprocesses – an ordered pipeline
// ---------------------------------------------------------------------------

/// Ordered list of stages. Empty is the identity.
#[derive(Debug, Clone, Default)]
pub struct Preprocesses(Vec<Preprocess>);

impl Preprocesses {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(Preprocess::name).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Preprocess> {
        self.0.iter()
    }

    /// Feed `block` through every stage in order.
    ///
    /// A failing stage stops the pipeline; its error is returned with the
    /// stage name attached.
    pub fn run(&self, block: Array2<f64>) -> ContainerResult<Array2<f64>> {
        self.0.iter().try_fold(block, |acc, stage| {
            stage.apply(acc).map_err(|source| ContainerError::Preprocess {
                stage: stage.name.clone(),
                source,
            })
        })
    }
}

impl From<Preprocess> for Preprocesses {
    fn from(p: Preprocess) -> Self {
        Self(vec![p])
    }
}

impl From<Vec<Preprocess>> for Preprocesses {
    fn from(v: Vec<Preprocess>) -> Self {
        Self(v)
    }
}

impl<const N: usize> From<[Preprocess; N]> for Preprocesses {
    fn from(a: [Preprocess; N]) -> Self {
        Self(a.into())
    }
}

impl From<Option<Preprocess>> for Preprocesses {
    fn from(p: Option<Preprocess>) -> Self {
        Self(p.into_iter().collect())
    }
}

impl FromIterator<Preprocess> for Preprocesses {
    fn from_iter<I: IntoIterator<Item = Preprocess>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Preprocesses {
    type Item = &'a Preprocess;
    type IntoIter = std::slice::Iter<'a, Preprocess>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Registry – stages addressable by name
// ---------------------------------------------------------------------------

/// Named stages available to configuration files.
#[derive(Debug, Clone, Default)]
pub struct PreprocessRegistry {
    stages: BTreeMap<String, Preprocess>,
}

impl PreprocessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every stage in [`builtin`].
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        for stage in builtin::all() {
            reg.register(stage);
        }
        reg
    }

    /// Add a stage under its own name, replacing any previous one.
    pub fn register(&mut self, stage: Preprocess) -> &mut Self {
        self.stages.insert(stage.name.clone(), stage);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Preprocess> {
        self.stages.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    /// Look up a stage, failing with a type error for unknown names.
    pub fn resolve(&self, name: &str) -> ContainerResult<Preprocess> {
        self.get(name).cloned().ok_or_else(|| {
            ContainerError::type_error(format!("'{name}' is not a registered preprocess"))
        })
    }
}

// ---------------------------------------------------------------------------
// Built-in stages
// ---------------------------------------------------------------------------

/// Per-trace stages shipped with the crate. Each works row by row, so a
/// trace's output never depends on the other traces in its batch.
pub mod builtin {
    use ndarray::{Array2, Axis};

    use super::Preprocess;

    /// Element-wise square.
    pub fn square() -> Preprocess {
        Preprocess::infallible("square", |block: Array2<f64>| block.mapv_into(|v| v * v))
    }

    /// Element-wise absolute value.
    pub fn absolute() -> Preprocess {
        Preprocess::infallible("absolute", |block: Array2<f64>| block.mapv_into(f64::abs))
    }

    /// Subtract each trace's mean.
    pub fn center() -> Preprocess {
        Preprocess::infallible("center", center_rows)
    }

    /// Center each trace and scale it to unit standard deviation. Constant
    /// traces are only centered.
    pub fn standardize() -> Preprocess {
        Preprocess::infallible("standardize", |block: Array2<f64>| {
            let mut block = center_rows(block);
            for mut row in block.axis_iter_mut(Axis(0)) {
                let n = row.len();
                if n == 0 {
                    continue;
                }
                let std = (row.iter().map(|v| v * v).sum::<f64>() / n as f64).sqrt();
                if std > 0.0 {
                    row.mapv_inplace(|v| v / std);
                }
            }
            block
        })
    }

    pub fn all() -> Vec<Preprocess> {
        vec![square(), absolute(), center(), standardize()]
    }

    fn center_rows(mut block: Array2<f64>) -> Array2<f64> {
        for mut row in block.axis_iter_mut(Axis(0)) {
            if let Some(mean) = row.mean() {
                row.mapv_inplace(|v| v - mean);
            }
        }
        block
    }
}
