//! Segment readers and an in-memory segment implementation.

use std::fmt::Debug;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::{PhalanxError, Result};
use crate::index::DocId;
use crate::index::doc_values::{
    DocValues, FieldValue, NumericDocValues, NumericType, NumericValue, SortedDocValues,
};

/// Read access to one immutable index segment.
pub trait LeafReader: Send + Sync + Debug {
    /// Number of documents in the segment. Local ids run from `0` to `max_doc - 1`.
    fn max_doc(&self) -> DocId;

    /// Value column of a field, `None` when no document of the segment has it.
    fn doc_values(&self, field: &str) -> Option<DocValues>;

    /// Numeric column of a field.
    fn numeric_doc_values(&self, field: &str) -> Result<Option<Arc<NumericDocValues>>> {
        match self.doc_values(field) {
            None => Ok(None),
            Some(DocValues::Numeric(values)) => Ok(Some(values)),
            Some(other) => Err(PhalanxError::configuration(format!(
                "field '{field}' holds {} values, a numeric column is required",
                other.kind()
            ))),
        }
    }

    /// String column of a field.
    fn sorted_doc_values(&self, field: &str) -> Result<Option<Arc<SortedDocValues>>> {
        match self.doc_values(field) {
            None => Ok(None),
            Some(DocValues::Sorted(values)) => Ok(Some(values)),
            Some(other) => Err(PhalanxError::configuration(format!(
                "field '{field}' holds {} values, a string column is required",
                other.kind()
            ))),
        }
    }
}

/// A fully materialized segment kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySegment {
    max_doc: DocId,
    columns: AHashMap<String, DocValues>,
}

impl MemorySegment {
    /// Names of the fields present in this segment.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

impl LeafReader for MemorySegment {
    fn max_doc(&self) -> DocId {
        self.max_doc
    }

    fn doc_values(&self, field: &str) -> Option<DocValues> {
        self.columns.get(field).cloned()
    }
}

#[derive(Debug)]
enum StagedColumn {
    Numeric(NumericType, Vec<Option<NumericValue>>),
    Sorted(Vec<Option<String>>),
}

/// Builds a [`MemorySegment`] one document at a time.
///
/// Each field keeps the type of the first value it receives; a value of a
/// different type for the same field is rejected.
#[derive(Debug, Default)]
pub struct SegmentBuilder {
    max_doc: DocId,
    columns: AHashMap<String, StagedColumn>,
}

impl SegmentBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents added so far.
    pub fn len(&self) -> usize {
        self.max_doc as usize
    }

    /// Whether no document was added yet.
    pub fn is_empty(&self) -> bool {
        self.max_doc == 0
    }

    /// Append a document and return its segment-local id.
    pub fn add_document<I, S>(&mut self, fields: I) -> Result<DocId>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: Into<String>,
    {
        let doc = self.max_doc;
        let slot = doc as usize;

        for (name, value) in fields {
            let name = name.into();
            let column = self
                .columns
                .entry(name.clone())
                .or_insert_with(|| match value.as_numeric() {
                    Some(numeric) => StagedColumn::Numeric(numeric.numeric_type(), Vec::new()),
                    None => StagedColumn::Sorted(Vec::new()),
                });

            match (column, value) {
                (StagedColumn::Sorted(values), FieldValue::Str(term)) => {
                    values.resize(slot + 1, None);
                    values[slot] = Some(term);
                }
                (StagedColumn::Numeric(numeric_type, values), other) => {
                    let numeric = other
                        .as_numeric()
                        .filter(|numeric| numeric.numeric_type() == *numeric_type)
                        .ok_or_else(|| {
                            PhalanxError::configuration(format!(
                                "field '{name}' expects {numeric_type:?} values"
                            ))
                        })?;
                    values.resize(slot + 1, None);
                    values[slot] = Some(numeric);
                }
                (StagedColumn::Sorted(_), _) => {
                    return Err(PhalanxError::configuration(format!(
                        "field '{name}' expects string values"
                    )));
                }
            }
        }

        self.max_doc += 1;
        Ok(doc)
    }

    /// Freeze the staged columns into a segment.
    pub fn build(self) -> MemorySegment {
        let max_doc = self.max_doc;
        let columns = self
            .columns
            .into_iter()
            .map(|(name, column)| {
                let values = match column {
                    StagedColumn::Numeric(numeric_type, mut values) => {
                        values.resize(max_doc as usize, None);
                        DocValues::Numeric(Arc::new(NumericDocValues::new(numeric_type, values)))
                    }
                    StagedColumn::Sorted(mut values) => {
                        values.resize(max_doc as usize, None);
                        DocValues::Sorted(Arc::new(SortedDocValues::from_values(&values)))
                    }
                };
                (name, values)
            })
            .collect();

        MemorySegment { max_doc, columns }
    }
}
