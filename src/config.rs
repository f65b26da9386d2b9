//! Container configuration from JSON.
//!
//! ```json
//! {
//!   "ths": { "path": "traces.parquet" },
//!   "frame": [10, 30],
//!   "preprocesses": ["square", "center"],
//!   "batch_size": 500
//! }
//! ```
//!
//! This is the one place untyped values reach the container, so every field
//! is checked by hand: a wrongly-shaped value is a [`ContainerError::Type`],
//! a well-shaped but unusable one a [`ContainerError::Value`].

use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::container::Container;
use crate::data::loader::load_file;
use crate::error::{ContainerError, Result};
use crate::frame::Frame;
use crate::preprocess::{PreprocessRegistry, Preprocesses};

/// Top-level keys, each still untyped.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    ths: Option<Value>,
    frame: Option<Value>,
    preprocesses: Option<Value>,
    batch_size: Option<Value>,
}

/// Validated container settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Trace file to open.
    pub ths_path: PathBuf,
    pub frame: Frame,
    /// Registered stage names, in pipeline order.
    pub preprocesses: Vec<String>,
    /// `None` selects the default batch size.
    pub batch_size: Option<usize>,
}

impl ContainerConfig {
    /// Validate a parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ContainerError::type_error("configuration must be a JSON object"));
        }
        let raw: RawConfig = serde_json::from_value(value)
            .map_err(|e| ContainerError::type_error(e.to_string()))?;

        Ok(Self {
            ths_path: parse_ths(raw.ths.as_ref())?,
            frame: parse_frame(raw.frame.as_ref())?,
            preprocesses: parse_preprocess_names(raw.preprocesses.as_ref())?,
            batch_size: parse_batch_size(raw.batch_size.as_ref())?,
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ContainerError::type_error(format!("invalid configuration JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ContainerError::Open {
            what: path.display().to_string(),
            source: e.into(),
        })?;
        Self::from_json_str(&text)
    }

    /// Open the trace file and build the container, paired with the
    /// configured batch size (`None` for the default). Stage names are
    /// looked up in `registry`; an unknown name is a type error.
    pub fn build(&self, registry: &PreprocessRegistry) -> Result<(Container, Option<usize>)> {
        let preprocesses = self
            .preprocesses
            .iter()
            .map(|name| registry.resolve(name))
            .collect::<Result<Preprocesses>>()?;

        let ths = load_file(&self.ths_path).map_err(|source| ContainerError::Open {
            what: self.ths_path.display().to_string(),
            source,
        })?;
        debug!("config: building container for {}", self.ths_path.display());
        let container = Container::new(ths, self.frame, preprocesses)?;
        Ok((container, self.batch_size))
    }
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

/// `{"path": "<file>"}`; anything else is not a trace source.
fn parse_ths(value: Option<&Value>) -> Result<PathBuf> {
    let obj = value.and_then(Value::as_object).ok_or_else(|| {
        ContainerError::type_error("'ths' must be an object with a 'path' string")
    })?;
    obj.get("path")
        .and_then(Value::as_str)
        .map(PathBuf::from)
        .ok_or_else(|| ContainerError::type_error("'ths' must be an object with a 'path' string"))
}

/// `null` | integer | `[start, end]` | `{"start": .., "end": ..}`.
pub(crate) fn parse_frame(value: Option<&Value>) -> Result<Frame> {
    match value {
        None | Some(Value::Null) => Ok(Frame::All),
        Some(v) if v.is_number() => Ok(Frame::Index(as_index(v, "frame")?)),
        Some(Value::Array(items)) if items.len() == 2 => Ok(Frame::Range {
            start: optional_index(&items[0], "frame start")?,
            end: optional_index(&items[1], "frame end")?,
        }),
        Some(Value::Object(obj)) => parse_frame_object(obj),
        Some(other) => Err(ContainerError::type_error(format!(
            "frame must be an integer, a [start, end] pair or null, got {other}"
        ))),
    }
}

fn parse_frame_object(obj: &Map<String, Value>) -> Result<Frame> {
    let known = obj.keys().all(|k| k == "start" || k == "end");
    if obj.is_empty() || !known {
        return Err(ContainerError::type_error(
            "frame object must have only 'start' and/or 'end' keys",
        ));
    }
    let start = obj.get("start").map_or(Ok(None), |v| optional_index(v, "frame start"))?;
    let end = obj.get("end").map_or(Ok(None), |v| optional_index(v, "frame end"))?;
    Ok(Frame::Range { start, end })
}

fn optional_index(value: &Value, what: &str) -> Result<Option<usize>> {
    match value {
        Value::Null => Ok(None),
        v => as_index(v, what).map(Some),
    }
}

/// A non-negative integer. Non-integers are type errors, negatives value errors.
fn as_index(value: &Value, what: &str) -> Result<usize> {
    if let Some(u) = value.as_u64() {
        return usize::try_from(u)
            .map_err(|_| ContainerError::value_error(format!("{what} {u} is too large")));
    }
    if let Some(i) = value.as_i64() {
        return Err(ContainerError::value_error(format!(
            "{what} must not be negative, got {i}"
        )));
    }
    Err(ContainerError::type_error(format!(
        "{what} must be an integer, got {value}"
    )))
}

/// `null` | name | `[name, ...]`.
pub(crate) fn parse_preprocess_names(value: Option<&Value>) -> Result<Vec<String>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(name)) => Ok(vec![name.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ContainerError::type_error(format!(
                        "preprocess list entries must be stage names, got {item}"
                    ))
                })
            })
            .collect(),
        Some(other) => Err(ContainerError::type_error(format!(
            "preprocesses must be a stage name or a list of names, got {other}"
        ))),
    }
}

/// `null` or a strictly positive integer.
pub(crate) fn parse_batch_size(value: Option<&Value>) -> Result<Option<usize>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match as_index(v, "batch size")? {
            0 => Err(ContainerError::value_error("batch size must be strictly positive")),
            n => Ok(Some(n)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_type<T>(r: Result<T>) -> bool {
        matches!(r, Err(ContainerError::Type(_)))
    }

    fn is_value<T>(r: Result<T>) -> bool {
        matches!(r, Err(ContainerError::Value(_)))
    }

    #[test]
    fn ths_must_be_a_path_object() {
        for bad in [json!("foo"), json!(1235), json!({})] {
            assert!(is_type(parse_ths(Some(&bad))), "{bad}");
        }
        assert!(is_type(parse_ths(None)));
        assert_eq!(
            parse_ths(Some(&json!({"path": "t.parquet"}))).unwrap(),
            PathBuf::from("t.parquet")
        );
    }

    #[test]
    fn frame_shapes() {
        assert_eq!(parse_frame(None).unwrap(), Frame::All);
        assert_eq!(parse_frame(Some(&json!(1))).unwrap(), Frame::Index(1));
        assert_eq!(
            parse_frame(Some(&json!([null, 20]))).unwrap(),
            Frame::Range { start: None, end: Some(20) }
        );
        assert_eq!(
            parse_frame(Some(&json!({"start": 10, "end": 30}))).unwrap(),
            Frame::Range { start: Some(10), end: Some(30) }
        );
    }

    #[test]
    fn frame_rejects_wrong_types() {
        for bad in [json!("foo"), json!(2121.1), json!({}), json!([1, 2, 3]), json!({"step": 2})] {
            assert!(is_type(parse_frame(Some(&bad))), "{bad}");
        }
        assert!(is_value(parse_frame(Some(&json!(-1)))));
    }

    #[test]
    fn preprocess_shapes() {
        assert!(parse_preprocess_names(None).unwrap().is_empty());
        assert_eq!(parse_preprocess_names(Some(&json!("square"))).unwrap(), vec!["square"]);
        for bad in [json!(["foo", 123]), json!(134), json!({"square": true})] {
            assert!(is_type(parse_preprocess_names(Some(&bad))), "{bad}");
        }
    }

    #[test]
    fn batch_size_checks() {
        assert_eq!(parse_batch_size(Some(&json!(10))).unwrap(), Some(10));
        assert_eq!(parse_batch_size(Some(&Value::Null)).unwrap(), None);
        assert!(is_type(parse_batch_size(Some(&json!("foo")))));
        assert!(is_type(parse_batch_size(Some(&json!(2.5)))));
        assert!(is_value(parse_batch_size(Some(&json!(-12)))));
        assert!(is_value(parse_batch_size(Some(&json!(0)))));
    }

    #[test]
    fn whole_document() {
        let cfg = ContainerConfig::from_json_str(
            r#"{"ths": {"path": "t.json"}, "frame": [10, 30], "preprocesses": ["square"], "batch_size": 5}"#,
        )
        .unwrap();
        assert_eq!(cfg.ths_path, PathBuf::from("t.json"));
        assert_eq!(cfg.frame, Frame::Range { start: Some(10), end: Some(30) });
        assert_eq!(cfg.preprocesses, vec!["square"]);
        assert_eq!(cfg.batch_size, Some(5));

        assert!(is_type(ContainerConfig::from_json_str("[1, 2]")));
        assert!(is_type(ContainerConfig::from_json_str(r#"{"ths": {"path": "x"}, "bogus": 1}"#)));
    }

    #[test]
    fn unknown_stage_is_a_type_error() {
        let cfg = ContainerConfig {
            ths_path: PathBuf::from("does-not-matter.json"),
            frame: Frame::All,
            preprocesses: vec!["foo".into()],
            batch_size: None,
        };
        assert!(is_type(cfg.build(&PreprocessRegistry::with_builtins())));
    }
}
