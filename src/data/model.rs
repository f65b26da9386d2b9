use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MetadataValue – a single per-trace metadata cell
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value attached to one trace.
///
/// Plaintexts, ciphertexts and keys are carried as [`MetadataValue::Bytes`].
/// Downstream code keys `BTreeMap` / `BTreeSet` on values, so `MetadataValue`
/// must be `Ord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text for simplicity.
    Date(String),
    Bytes(Vec<u8>),
    Null,
}

// -- Manual Eq/Ord so we can put MetadataValue in BTreeSet --

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn discriminant(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
                Bytes(_) => 6,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Bytes(b) => b.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::Bytes(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Borrow the raw bytes of a `Bytes` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MetadataValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata – named per-trace columns
// ---------------------------------------------------------------------------

/// Metadata columns: field name → one value per trace, aligned by row with the
/// sample block it accompanies.
pub type Metadata = BTreeMap<String, Vec<MetadataValue>>;

/// Copy rows `range` out of every metadata column.
///
/// Columns shorter than `range.end` contribute only the rows they have.
pub fn slice_metadata(metadata: &Metadata, range: Range<usize>) -> Metadata {
    metadata
        .iter()
        .map(|(name, values)| {
            let end = range.end.min(values.len());
            let start = range.start.min(end);
            (name.clone(), values[start..end].to_vec())
        })
        .collect()
}

/// Number of rows shared by every column, or `None` if the columns disagree.
pub fn metadata_rows(metadata: &Metadata) -> Option<usize> {
    let mut lens = metadata.values().map(Vec::len);
    let first = lens.next().unwrap_or(0);
    lens.all(|l| l == first).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_display_as_hex() {
        let v = MetadataValue::Bytes(vec![0x00, 0xab, 0x10]);
        assert_eq!(v.to_string(), "00ab10");
    }

    #[test]
    fn ordering_groups_by_variant() {
        let mut vals = vec![
            MetadataValue::Bytes(vec![1]),
            MetadataValue::Integer(3),
            MetadataValue::Null,
            MetadataValue::Bool(true),
        ];
        vals.sort();
        assert_eq!(vals[0], MetadataValue::Null);
        assert_eq!(vals[3], MetadataValue::Bytes(vec![1]));
    }

    #[test]
    fn slice_keeps_columns_aligned() {
        let mut md = Metadata::new();
        md.insert(
            "plaintext".into(),
            (0..5u8).map(|i| MetadataValue::Bytes(vec![i; 2])).collect(),
        );
        md.insert("id".into(), (0..5).map(MetadataValue::Integer).collect());

        let s = slice_metadata(&md, 1..3);
        assert_eq!(s["id"], vec![MetadataValue::Integer(1), MetadataValue::Integer(2)]);
        assert_eq!(s["plaintext"][1].as_bytes(), Some(&[2u8, 2][..]));
        assert_eq!(metadata_rows(&s), Some(2));
    }

    #[test]
    fn rows_detects_misaligned_columns() {
        let mut md = Metadata::new();
        md.insert("a".into(), vec![MetadataValue::Null; 3]);
        md.insert("b".into(), vec![MetadataValue::Null; 2]);
        assert_eq!(metadata_rows(&md), None);
        assert_eq!(metadata_rows(&Metadata::new()), Some(0));
    }
}
