//! Multi-key sort descriptions.
//!
//! A [`Sort`] is an ordered list of [`SortField`]s. Each field resolves to a
//! [`FieldComparator`](crate::search::FieldComparator) once, when a collector
//! is created; comparisons never dispatch on the field type again.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PhalanxError, Result};
use crate::index::{DocId, DocValues, IndexReader, NumericType};

/// Kind of value a sort field orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortFieldType {
    /// Relevance, highest first.
    Score,
    /// Global document id, lowest first.
    Doc,
    Int,
    Long,
    Float,
    Double,
    /// Term order of a string field.
    String,
}

impl SortFieldType {
    /// Numeric column type backing this sort type.
    pub fn numeric_type(&self) -> Option<NumericType> {
        match self {
            SortFieldType::Int => Some(NumericType::Int),
            SortFieldType::Long => Some(NumericType::Long),
            SortFieldType::Float => Some(NumericType::Float),
            SortFieldType::Double => Some(NumericType::Double),
            _ => None,
        }
    }
}

/// One sort key value of a document.
///
/// A missing string is `Str(None)` and sorts before every present string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortValue {
    Score(f32),
    Doc(DocId),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Option<String>),
}

impl SortValue {
    /// Natural (non-reversed) order of two values of the same sort field.
    pub fn natural_cmp(&self, other: &SortValue) -> Result<Ordering> {
        Ok(match (self, other) {
            (SortValue::Score(a), SortValue::Score(b)) => b.total_cmp(a),
            (SortValue::Doc(a), SortValue::Doc(b)) => a.cmp(b),
            (SortValue::Int(a), SortValue::Int(b)) => a.cmp(b),
            (SortValue::Long(a), SortValue::Long(b)) => a.cmp(b),
            (SortValue::Float(a), SortValue::Float(b)) => a.total_cmp(b),
            (SortValue::Double(a), SortValue::Double(b)) => a.total_cmp(b),
            (SortValue::Str(a), SortValue::Str(b)) => a.cmp(b),
            (a, b) => {
                return Err(PhalanxError::internal(format!(
                    "cannot compare sort values {a:?} and {b:?}"
                )));
            }
        })
    }

    /// Whether this value can belong to a field of `field_type`.
    pub fn matches_type(&self, field_type: SortFieldType) -> bool {
        matches!(
            (self, field_type),
            (SortValue::Score(_), SortFieldType::Score)
                | (SortValue::Doc(_), SortFieldType::Doc)
                | (SortValue::Int(_), SortFieldType::Int)
                | (SortValue::Long(_), SortFieldType::Long)
                | (SortValue::Float(_), SortFieldType::Float)
                | (SortValue::Double(_), SortFieldType::Double)
                | (SortValue::Str(_), SortFieldType::String)
        )
    }

    /// JSON rendering used in responses.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SortValue::Score(v) | SortValue::Float(v) => serde_json::json!(v),
            SortValue::Doc(v) => serde_json::json!(v),
            SortValue::Int(v) => serde_json::json!(v),
            SortValue::Long(v) => serde_json::json!(v),
            SortValue::Double(v) => serde_json::json!(v),
            SortValue::Str(v) => serde_json::json!(v),
        }
    }
}

/// One key of a [`Sort`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    /// Field name; `None` for score and doc order.
    pub field: Option<String>,
    /// Value kind.
    pub field_type: SortFieldType,
    /// Invert the natural order.
    pub reverse: bool,
    /// Value used for documents without one. Numeric fields default to zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_value: Option<SortValue>,
}

impl SortField {
    /// Sort by relevance, highest first.
    pub fn score() -> Self {
        SortField {
            field: None,
            field_type: SortFieldType::Score,
            reverse: false,
            missing_value: None,
        }
    }

    /// Sort by index order.
    pub fn doc() -> Self {
        SortField {
            field: None,
            field_type: SortFieldType::Doc,
            reverse: false,
            missing_value: None,
        }
    }

    /// Sort by the values of a field.
    pub fn new<S: Into<String>>(field: S, field_type: SortFieldType) -> Self {
        SortField {
            field: Some(field.into()),
            field_type,
            reverse: false,
            missing_value: None,
        }
    }

    /// Set the reverse flag.
    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Set the value used for documents without one.
    pub fn with_missing_value(mut self, value: SortValue) -> Self {
        self.missing_value = Some(value);
        self
    }

    /// Whether comparing by this field requires the document score.
    pub fn needs_scores(&self) -> bool {
        self.field_type == SortFieldType::Score
    }

    /// Compare two values of this field, honoring `reverse`.
    pub fn compare_values(&self, a: &SortValue, b: &SortValue) -> Result<Ordering> {
        let ord = a.natural_cmp(b)?;
        Ok(if self.reverse { ord.reverse() } else { ord })
    }

    fn validate(&self, reader: &IndexReader) -> Result<()> {
        if let Some(missing) = &self.missing_value {
            if !missing.matches_type(self.field_type) {
                return Err(PhalanxError::configuration(format!(
                    "missing value {missing:?} does not match sort type {:?}",
                    self.field_type
                )));
            }
        }

        let field = match (self.field_type, &self.field) {
            (SortFieldType::Score | SortFieldType::Doc, _) => return Ok(()),
            (_, None) => {
                return Err(PhalanxError::configuration(format!(
                    "sort type {:?} requires a field name",
                    self.field_type
                )));
            }
            (_, Some(field)) => field,
        };

        if reader.leaves().is_empty() {
            return Ok(());
        }
        match (reader.field_kind(field), self.field_type.numeric_type()) {
            (None, _) => Err(PhalanxError::configuration(format!(
                "cannot sort on undefined field: {field}"
            ))),
            (Some(DocValues::Sorted(_)), None) => Ok(()),
            (Some(DocValues::Numeric(values)), Some(expected))
                if values.numeric_type() == expected =>
            {
                Ok(())
            }
            (Some(values), _) => Err(PhalanxError::configuration(format!(
                "cannot sort field '{field}' as {:?}, it holds {} values",
                self.field_type,
                values.kind()
            ))),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.field, self.field_type) {
            (_, SortFieldType::Score) => write!(f, "<score>")?,
            (_, SortFieldType::Doc) => write!(f, "<doc>")?,
            (Some(field), _) => write!(f, "{field}")?,
            (None, _) => write!(f, "<?>")?,
        }
        if self.reverse {
            write!(f, "!")?;
        }
        Ok(())
    }
}

/// An ordered list of sort keys; earlier keys take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    fields: Vec<SortField>,
}

impl Sort {
    /// Create a sort from its keys.
    pub fn new(fields: Vec<SortField>) -> Self {
        Sort { fields }
    }

    /// Relevance order: highest score first.
    pub fn relevance() -> Self {
        Sort::new(vec![SortField::score()])
    }

    /// Index order: lowest global doc id first.
    pub fn index_order() -> Self {
        Sort::new(vec![SortField::doc()])
    }

    /// Sort keys.
    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    /// Whether any key requires document scores.
    pub fn needs_scores(&self) -> bool {
        self.fields.iter().any(SortField::needs_scores)
    }

    /// Whether this is plain relevance order.
    pub fn is_relevance(&self) -> bool {
        matches!(self.fields.as_slice(), [field] if field.needs_scores() && !field.reverse)
    }

    /// Compare the sort values of two documents key by key.
    pub fn compare_values(&self, a: &[SortValue], b: &[SortValue]) -> Result<Ordering> {
        if a.len() != self.fields.len() || b.len() != self.fields.len() {
            return Err(PhalanxError::internal(format!(
                "sort {self} has {} keys, got values of length {} and {}",
                self.fields.len(),
                a.len(),
                b.len()
            )));
        }
        for ((field, a), b) in self.fields.iter().zip(a).zip(b) {
            let ord = field.compare_values(a, b)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }

    /// Check that `values` has one value of the right type per key.
    pub fn check_values(&self, values: &[SortValue]) -> Result<()> {
        let valid = values.len() == self.fields.len()
            && values
                .iter()
                .zip(&self.fields)
                .all(|(value, field)| value.matches_type(field.field_type));
        if valid {
            Ok(())
        } else {
            Err(PhalanxError::internal(format!(
                "sort values {values:?} do not match sort {self}"
            )))
        }
    }

    /// Check that every key can be resolved against a reader.
    pub fn validate(&self, reader: &IndexReader) -> Result<()> {
        if self.fields.is_empty() {
            return Err(PhalanxError::configuration("sort has no fields"));
        }
        self.fields
            .iter()
            .try_for_each(|field| field.validate(reader))
    }
}

impl Default for Sort {
    fn default() -> Self {
        Sort::relevance()
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, field) in self.fields.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}
