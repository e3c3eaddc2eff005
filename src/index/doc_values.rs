//! Per-document value columns used for sorting and grouping.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::index::DocId;

/// Numeric column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericType {
    Int,
    Long,
    Float,
    Double,
}

/// A single numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NumericValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl NumericValue {
    /// The column type this value belongs to.
    pub fn numeric_type(&self) -> NumericType {
        match self {
            NumericValue::Int(_) => NumericType::Int,
            NumericValue::Long(_) => NumericType::Long,
            NumericValue::Float(_) => NumericType::Float,
            NumericValue::Double(_) => NumericType::Double,
        }
    }

    /// Lossy conversion used by function values and scoring.
    pub fn as_f64(&self) -> f64 {
        match *self {
            NumericValue::Int(v) => v as f64,
            NumericValue::Long(v) => v as f64,
            NumericValue::Float(v) => v as f64,
            NumericValue::Double(v) => v,
        }
    }

    /// Total order. Values of the same type compare exactly, mixed types
    /// fall back to their `f64` representation.
    pub fn total_cmp(&self, other: &NumericValue) -> Ordering {
        match (self, other) {
            (NumericValue::Int(a), NumericValue::Int(b)) => a.cmp(b),
            (NumericValue::Long(a), NumericValue::Long(b)) => a.cmp(b),
            (NumericValue::Float(a), NumericValue::Float(b)) => a.total_cmp(b),
            (NumericValue::Double(a), NumericValue::Double(b)) => a.total_cmp(b),
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        }
    }

    /// The zero value of a column type, used for missing documents.
    pub fn zero(numeric_type: NumericType) -> Self {
        match numeric_type {
            NumericType::Int => NumericValue::Int(0),
            NumericType::Long => NumericValue::Long(0),
            NumericType::Float => NumericValue::Float(0.0),
            NumericType::Double => NumericValue::Double(0.0),
        }
    }
}

/// A value handed to [`SegmentBuilder`](crate::index::SegmentBuilder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl FieldValue {
    /// Numeric view of the value, `None` for strings.
    pub fn as_numeric(&self) -> Option<NumericValue> {
        match *self {
            FieldValue::Int(v) => Some(NumericValue::Int(v)),
            FieldValue::Long(v) => Some(NumericValue::Long(v)),
            FieldValue::Float(v) => Some(NumericValue::Float(v)),
            FieldValue::Double(v) => Some(NumericValue::Double(v)),
            FieldValue::Str(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Long(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

/// Numeric column of one segment.
#[derive(Debug, Clone)]
pub struct NumericDocValues {
    numeric_type: NumericType,
    values: Vec<Option<NumericValue>>,
}

impl NumericDocValues {
    /// Create a column. Every present value must be of `numeric_type`.
    pub fn new(numeric_type: NumericType, values: Vec<Option<NumericValue>>) -> Self {
        NumericDocValues {
            numeric_type,
            values,
        }
    }

    /// Column type.
    pub fn numeric_type(&self) -> NumericType {
        self.numeric_type
    }

    /// Value of a segment-local document.
    pub fn get(&self, doc: DocId) -> Option<NumericValue> {
        self.values.get(doc as usize).copied().flatten()
    }
}

/// String column of one segment: a sorted term dictionary plus one ordinal
/// per document.
#[derive(Debug, Clone)]
pub struct SortedDocValues {
    ords: Vec<Option<u32>>,
    terms: Vec<String>,
}

impl SortedDocValues {
    /// Build a column from per-document values.
    pub fn from_values(values: &[Option<String>]) -> Self {
        let mut terms: Vec<String> = values.iter().flatten().cloned().collect();
        terms.sort();
        terms.dedup();

        let ords = values
            .iter()
            .map(|value| {
                value.as_ref().and_then(|term| {
                    terms
                        .binary_search(term)
                        .ok()
                        .map(|ord| ord as u32)
                })
            })
            .collect();

        SortedDocValues { ords, terms }
    }

    /// Ordinal of a segment-local document, `None` when it has no value.
    pub fn ord(&self, doc: DocId) -> Option<u32> {
        self.ords.get(doc as usize).copied().flatten()
    }

    /// Term of an ordinal.
    pub fn lookup_ord(&self, ord: u32) -> &str {
        &self.terms[ord as usize]
    }

    /// Ordinal of a term, if the segment contains it.
    pub fn lookup_term(&self, term: &str) -> Option<u32> {
        self.terms
            .binary_search_by(|probe| probe.as_str().cmp(term))
            .ok()
            .map(|ord| ord as u32)
    }

    /// Term of a segment-local document.
    pub fn value(&self, doc: DocId) -> Option<&str> {
        self.ord(doc).map(|ord| self.lookup_ord(ord))
    }

    /// Number of distinct terms.
    pub fn value_count(&self) -> usize {
        self.terms.len()
    }
}

/// A column of one segment. Cheap to clone.
#[derive(Debug, Clone)]
pub enum DocValues {
    Numeric(Arc<NumericDocValues>),
    Sorted(Arc<SortedDocValues>),
}

impl DocValues {
    /// Short name of the column kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DocValues::Numeric(values) => match values.numeric_type() {
                NumericType::Int => "int",
                NumericType::Long => "long",
                NumericType::Float => "float",
                NumericType::Double => "double",
            },
            DocValues::Sorted(_) => "string",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_doc_values() {
        let values = vec![
            Some("pear".to_string()),
            None,
            Some("apple".to_string()),
            Some("pear".to_string()),
        ];
        let column = SortedDocValues::from_values(&values);

        assert_eq!(column.value_count(), 2);
        assert_eq!(column.ord(0), Some(1));
        assert_eq!(column.ord(1), None);
        assert_eq!(column.ord(2), Some(0));
        assert_eq!(column.value(3), Some("pear"));
        assert_eq!(column.lookup_term("apple"), Some(0));
        assert_eq!(column.lookup_term("plum"), None);
        assert_eq!(column.ord(99), None);
    }

    #[test]
    fn test_numeric_total_cmp() {
        assert_eq!(
            NumericValue::Int(3).total_cmp(&NumericValue::Int(7)),
            Ordering::Less
        );
        assert_eq!(
            NumericValue::Double(2.5).total_cmp(&NumericValue::Int(2)),
            Ordering::Greater
        );
        assert_eq!(NumericValue::zero(NumericType::Long), NumericValue::Long(0));
    }
}
