//! Value sources: per-document computed values used for function grouping
//! and function scoring.

use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PhalanxError, Result};
use crate::index::{
    DocId, DocValues, IndexReader, LeafReaderContext, NumericDocValues, NumericValue,
    SortedDocValues,
};
use crate::query::matcher::{AllMatcher, Matcher};
use crate::query::query::{Query, Weight};
use crate::query::scorer::Scorer;

/// A computed per-document value.
///
/// Floats compare by bit pattern so the value can key a hash map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FunctionValue {
    Missing,
    Int(i64),
    Float(f64),
    Str(String),
}

impl FunctionValue {
    /// Numeric view used for scoring; strings and missing values count as zero.
    pub fn as_f64(&self) -> f64 {
        match self {
            FunctionValue::Int(v) => *v as f64,
            FunctionValue::Float(v) => *v,
            FunctionValue::Missing | FunctionValue::Str(_) => 0.0,
        }
    }

    /// Whether the document produced no value.
    pub fn is_missing(&self) -> bool {
        matches!(self, FunctionValue::Missing)
    }
}

impl PartialEq for FunctionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FunctionValue::Missing, FunctionValue::Missing) => true,
            (FunctionValue::Int(a), FunctionValue::Int(b)) => a == b,
            (FunctionValue::Float(a), FunctionValue::Float(b)) => a.to_bits() == b.to_bits(),
            (FunctionValue::Str(a), FunctionValue::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FunctionValue {}

impl Hash for FunctionValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            FunctionValue::Missing => {}
            FunctionValue::Int(v) => v.hash(state),
            FunctionValue::Float(v) => v.to_bits().hash(state),
            FunctionValue::Str(v) => v.hash(state),
        }
    }
}

/// Values of one segment.
pub trait FunctionValues: Send + Debug {
    /// Value of a segment-local document.
    fn value(&self, doc: DocId) -> FunctionValue;

    /// Value as a float score.
    fn float_val(&self, doc: DocId) -> f32 {
        self.value(doc).as_f64() as f32
    }
}

/// Resolves per-segment [`FunctionValues`].
pub trait ValueSource: Send + Sync + Debug {
    /// Values of one segment.
    fn values(&self, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>>;

    /// Check that the source can be evaluated against a reader.
    fn validate(&self, _reader: &IndexReader) -> Result<()> {
        Ok(())
    }

    /// Human-readable description, e.g. `field(price)`.
    fn description(&self) -> String;
}

/// Reads the value of an indexed field.
#[derive(Debug, Clone)]
pub struct FieldValueSource {
    field: String,
}

impl FieldValueSource {
    /// Create a source over a field.
    pub fn new<S: Into<String>>(field: S) -> Self {
        FieldValueSource {
            field: field.into(),
        }
    }

    /// Field name.
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl ValueSource for FieldValueSource {
    fn values(&self, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(match leaf.reader().doc_values(&self.field) {
            Some(DocValues::Numeric(values)) => Box::new(NumericFunctionValues { values }),
            Some(DocValues::Sorted(values)) => Box::new(SortedFunctionValues { values }),
            None => Box::new(MissingFunctionValues),
        })
    }

    fn validate(&self, reader: &IndexReader) -> Result<()> {
        if reader.leaves().is_empty() || reader.field_kind(&self.field).is_some() {
            Ok(())
        } else {
            Err(PhalanxError::configuration(format!(
                "undefined field: {}",
                self.field
            )))
        }
    }

    fn description(&self) -> String {
        format!("field({})", self.field)
    }
}

#[derive(Debug)]
struct NumericFunctionValues {
    values: Arc<NumericDocValues>,
}

impl FunctionValues for NumericFunctionValues {
    fn value(&self, doc: DocId) -> FunctionValue {
        match self.values.get(doc) {
            None => FunctionValue::Missing,
            Some(NumericValue::Int(v)) => FunctionValue::Int(v as i64),
            Some(NumericValue::Long(v)) => FunctionValue::Int(v),
            Some(NumericValue::Float(v)) => FunctionValue::Float(v as f64),
            Some(NumericValue::Double(v)) => FunctionValue::Float(v),
        }
    }
}

#[derive(Debug)]
struct SortedFunctionValues {
    values: Arc<SortedDocValues>,
}

impl FunctionValues for SortedFunctionValues {
    fn value(&self, doc: DocId) -> FunctionValue {
        match self.values.value(doc) {
            Some(term) => FunctionValue::Str(term.to_string()),
            None => FunctionValue::Missing,
        }
    }
}

#[derive(Debug)]
struct MissingFunctionValues;

impl FunctionValues for MissingFunctionValues {
    fn value(&self, _doc: DocId) -> FunctionValue {
        FunctionValue::Missing
    }
}

/// `source * factor + offset` as a float.
#[derive(Debug, Clone)]
pub struct ScaledValueSource {
    source: Arc<dyn ValueSource>,
    factor: f64,
    offset: f64,
}

impl ScaledValueSource {
    /// Create a linear transform of another source.
    pub fn new(source: Arc<dyn ValueSource>, factor: f64, offset: f64) -> Self {
        ScaledValueSource {
            source,
            factor,
            offset,
        }
    }
}

impl ValueSource for ScaledValueSource {
    fn values(&self, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(MappedFunctionValues {
            inner: self.source.values(leaf)?,
            factor: self.factor,
            offset: self.offset,
            bucket: None,
        }))
    }

    fn validate(&self, reader: &IndexReader) -> Result<()> {
        self.source.validate(reader)
    }

    fn description(&self) -> String {
        format!(
            "linear({},{},{})",
            self.source.description(),
            self.factor,
            self.offset
        )
    }
}

/// `floor(source / width)` as an integer bucket number.
#[derive(Debug, Clone)]
pub struct BucketValueSource {
    source: Arc<dyn ValueSource>,
    width: f64,
}

impl BucketValueSource {
    /// Create fixed-width buckets over another source.
    pub fn new(source: Arc<dyn ValueSource>, width: f64) -> Self {
        BucketValueSource { source, width }
    }
}

impl ValueSource for BucketValueSource {
    fn values(&self, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(MappedFunctionValues {
            inner: self.source.values(leaf)?,
            factor: 1.0,
            offset: 0.0,
            bucket: Some(self.width),
        }))
    }

    fn validate(&self, reader: &IndexReader) -> Result<()> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(PhalanxError::configuration(format!(
                "bucket width must be positive, got {}",
                self.width
            )));
        }
        self.source.validate(reader)
    }

    fn description(&self) -> String {
        format!("bucket({},{})", self.source.description(), self.width)
    }
}

#[derive(Debug)]
struct MappedFunctionValues {
    inner: Box<dyn FunctionValues>,
    factor: f64,
    offset: f64,
    bucket: Option<f64>,
}

impl FunctionValues for MappedFunctionValues {
    fn value(&self, doc: DocId) -> FunctionValue {
        let raw = match self.inner.value(doc) {
            FunctionValue::Int(v) => v as f64,
            FunctionValue::Float(v) => v,
            FunctionValue::Missing | FunctionValue::Str(_) => return FunctionValue::Missing,
        };
        match self.bucket {
            Some(width) => FunctionValue::Int((raw / width).floor() as i64),
            None => FunctionValue::Float(raw * self.factor + self.offset),
        }
    }
}

/// Matches every document and scores it with a value source.
#[derive(Debug, Clone)]
pub struct FunctionQuery {
    source: Arc<dyn ValueSource>,
    boost: f32,
}

impl FunctionQuery {
    /// Create a function query.
    pub fn new(source: Arc<dyn ValueSource>) -> Self {
        FunctionQuery { source, boost: 1.0 }
    }
}

impl Query for FunctionQuery {
    fn create_weight(&self, reader: &IndexReader, _needs_scores: bool) -> Result<Box<dyn Weight>> {
        self.source.validate(reader)?;
        Ok(Box::new(FunctionWeight {
            source: Arc::clone(&self.source),
            boost: self.boost,
        }))
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        self.source.description()
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }
}

#[derive(Debug)]
struct FunctionWeight {
    source: Arc<dyn ValueSource>,
    boost: f32,
}

impl Weight for FunctionWeight {
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>> {
        if leaf.max_doc() == 0 {
            return Ok(None);
        }
        Ok(Some(Box::new(FunctionScorer {
            matcher: AllMatcher::new(leaf.max_doc()),
            values: self.source.values(leaf)?,
            boost: self.boost,
        })))
    }
}

#[derive(Debug)]
struct FunctionScorer {
    matcher: AllMatcher,
    values: Box<dyn FunctionValues>,
    boost: f32,
}

impl Matcher for FunctionScorer {
    fn doc_id(&self) -> DocId {
        self.matcher.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        self.matcher.next()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.matcher.skip_to(target)
    }

    fn cost(&self) -> u64 {
        self.matcher.cost()
    }

    fn is_exhausted(&self) -> bool {
        self.matcher.is_exhausted()
    }
}

impl Scorer for FunctionScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.values.float_val(self.matcher.doc_id()) * self.boost)
    }

    fn max_score(&self) -> f32 {
        f32::INFINITY
    }

    fn name(&self) -> &'static str {
        "Function"
    }
}
