//! Slot based comparators.
//!
//! A comparator keeps the sort value of every competitive entry in a numbered
//! slot, so a collector can compare a new document against its queue without
//! reading values from the index twice. Values of the document being
//! collected are read from the segment bound by `set_next_reader`.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{PhalanxError, Result};
use crate::index::{DocId, LeafReaderContext, NumericDocValues, NumericValue, SortedDocValues};
use crate::search::sort::{Sort, SortField, SortFieldType, SortValue};

/// Comparator of one sort key, in natural (non-reversed) order.
#[derive(Debug)]
pub enum FieldComparator {
    /// Highest score first.
    Relevance { scores: Vec<f32>, bottom: f32 },
    /// Lowest global doc id first.
    Doc {
        docs: Vec<DocId>,
        doc_base: DocId,
        bottom: DocId,
    },
    /// Numeric column values; missing documents take `missing`.
    Numeric {
        field: String,
        missing: NumericValue,
        values: Vec<NumericValue>,
        current: Option<Arc<NumericDocValues>>,
        bottom: NumericValue,
    },
    /// Term order of a string column.
    TermOrd(TermOrdComparator),
}

impl FieldComparator {
    /// Resolve a sort field into a comparator with `num_slots` slots.
    pub fn new(field: &SortField, num_slots: usize) -> Result<Self> {
        Ok(match field.field_type {
            SortFieldType::Score => FieldComparator::Relevance {
                scores: vec![0.0; num_slots],
                bottom: 0.0,
            },
            SortFieldType::Doc => FieldComparator::Doc {
                docs: vec![0; num_slots],
                doc_base: 0,
                bottom: 0,
            },
            SortFieldType::String => {
                let missing = match &field.missing_value {
                    None => None,
                    Some(SortValue::Str(value)) => value.clone(),
                    Some(other) => {
                        return Err(PhalanxError::configuration(format!(
                            "invalid missing value {other:?} for string sort"
                        )));
                    }
                };
                FieldComparator::TermOrd(TermOrdComparator::new(
                    required_field(field)?,
                    missing,
                    num_slots,
                ))
            }
            numeric => {
                let numeric_type = numeric.numeric_type().ok_or_else(|| {
                    PhalanxError::internal(format!("{numeric:?} is not a numeric sort type"))
                })?;
                let missing = match &field.missing_value {
                    None => NumericValue::zero(numeric_type),
                    Some(SortValue::Int(v)) => NumericValue::Int(*v),
                    Some(SortValue::Long(v)) => NumericValue::Long(*v),
                    Some(SortValue::Float(v)) => NumericValue::Float(*v),
                    Some(SortValue::Double(v)) => NumericValue::Double(*v),
                    Some(other) => {
                        return Err(PhalanxError::configuration(format!(
                            "invalid missing value {other:?} for numeric sort"
                        )));
                    }
                };
                FieldComparator::Numeric {
                    field: required_field(field)?.to_string(),
                    missing,
                    values: vec![missing; num_slots],
                    current: None,
                    bottom: missing,
                }
            }
        })
    }

    /// Bind the segment whose documents are collected next.
    pub fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        match self {
            FieldComparator::Relevance { .. } => {}
            FieldComparator::Doc { doc_base, .. } => *doc_base = leaf.doc_base,
            FieldComparator::Numeric { field, current, .. } => {
                *current = leaf.reader().numeric_doc_values(field)?;
            }
            FieldComparator::TermOrd(comparator) => comparator.set_next_reader(leaf)?,
        }
        Ok(())
    }

    /// Compare two slots.
    pub fn compare(&self, slot1: usize, slot2: usize) -> Ordering {
        match self {
            FieldComparator::Relevance { scores, .. } => scores[slot2].total_cmp(&scores[slot1]),
            FieldComparator::Doc { docs, .. } => docs[slot1].cmp(&docs[slot2]),
            FieldComparator::Numeric { values, .. } => values[slot1].total_cmp(&values[slot2]),
            FieldComparator::TermOrd(comparator) => comparator.compare(slot1, slot2),
        }
    }

    /// Remember the slot of the weakest queue entry.
    pub fn set_bottom(&mut self, slot: usize) {
        match self {
            FieldComparator::Relevance { scores, bottom } => *bottom = scores[slot],
            FieldComparator::Doc { docs, bottom, .. } => *bottom = docs[slot],
            FieldComparator::Numeric { values, bottom, .. } => *bottom = values[slot],
            FieldComparator::TermOrd(comparator) => comparator.bottom_slot = Some(slot),
        }
    }

    /// Compare the bottom slot with a segment-local document.
    ///
    /// `Greater` means the bottom sorts after the document, i.e. the document
    /// is competitive.
    pub fn compare_bottom(&self, doc: DocId, score: f32) -> Ordering {
        match self {
            FieldComparator::Relevance { bottom, .. } => score.total_cmp(bottom),
            FieldComparator::Doc {
                doc_base, bottom, ..
            } => bottom.cmp(&(doc_base + doc)),
            FieldComparator::Numeric { bottom, .. } => bottom.total_cmp(&self.numeric_value(doc)),
            FieldComparator::TermOrd(comparator) => comparator.compare_bottom(doc),
        }
    }

    /// Store the value of a segment-local document in a slot.
    pub fn copy(&mut self, slot: usize, doc: DocId, score: f32) {
        let numeric = self.numeric_value(doc);
        match self {
            FieldComparator::Relevance { scores, .. } => scores[slot] = score,
            FieldComparator::Doc { docs, doc_base, .. } => docs[slot] = *doc_base + doc,
            FieldComparator::Numeric { values, .. } => values[slot] = numeric,
            FieldComparator::TermOrd(comparator) => comparator.copy(slot, doc),
        }
    }

    /// Sort value held by a slot.
    pub fn value(&self, slot: usize) -> SortValue {
        match self {
            FieldComparator::Relevance { scores, .. } => SortValue::Score(scores[slot]),
            FieldComparator::Doc { docs, .. } => SortValue::Doc(docs[slot]),
            FieldComparator::Numeric { values, .. } => numeric_sort_value(values[slot]),
            FieldComparator::TermOrd(comparator) => {
                SortValue::Str(comparator.slots[slot].value.clone())
            }
        }
    }

    /// Sort value of a segment-local document of the bound segment.
    pub fn doc_value(&self, doc: DocId, score: f32) -> SortValue {
        match self {
            FieldComparator::Relevance { .. } => SortValue::Score(score),
            FieldComparator::Doc { doc_base, .. } => SortValue::Doc(doc_base + doc),
            FieldComparator::Numeric { .. } => numeric_sort_value(self.numeric_value(doc)),
            FieldComparator::TermOrd(comparator) => SortValue::Str(comparator.doc_term(doc)),
        }
    }

    fn numeric_value(&self, doc: DocId) -> NumericValue {
        match self {
            FieldComparator::Numeric {
                missing, current, ..
            } => current
                .as_ref()
                .and_then(|values| values.get(doc))
                .unwrap_or(*missing),
            _ => NumericValue::Int(0),
        }
    }
}

fn required_field(field: &SortField) -> Result<&str> {
    field.field.as_deref().ok_or_else(|| {
        PhalanxError::configuration(format!(
            "sort type {:?} requires a field name",
            field.field_type
        ))
    })
}

fn numeric_sort_value(value: NumericValue) -> SortValue {
    match value {
        NumericValue::Int(v) => SortValue::Int(v),
        NumericValue::Long(v) => SortValue::Long(v),
        NumericValue::Float(v) => SortValue::Float(v),
        NumericValue::Double(v) => SortValue::Double(v),
    }
}

#[derive(Debug, Clone, Default)]
struct TermSlot {
    ord: Option<u32>,
    value: Option<String>,
    leaf: usize,
}

/// String comparator. Slots filled from the same segment compare by ordinal,
/// slots from different segments fall back to the terms themselves.
#[derive(Debug)]
pub struct TermOrdComparator {
    field: String,
    missing: Option<String>,
    slots: Vec<TermSlot>,
    current: Option<Arc<SortedDocValues>>,
    current_leaf: usize,
    bottom_slot: Option<usize>,
}

impl TermOrdComparator {
    fn new(field: &str, missing: Option<String>, num_slots: usize) -> Self {
        TermOrdComparator {
            field: field.to_string(),
            missing,
            slots: vec![TermSlot::default(); num_slots],
            current: None,
            current_leaf: 0,
            bottom_slot: None,
        }
    }

    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.current = leaf.reader().sorted_doc_values(&self.field)?;
        self.current_leaf = leaf.ord;
        Ok(())
    }

    fn doc_ord(&self, doc: DocId) -> Option<u32> {
        self.current.as_ref().and_then(|values| values.ord(doc))
    }

    fn doc_term(&self, doc: DocId) -> Option<String> {
        match self.current.as_ref().and_then(|values| values.value(doc)) {
            Some(term) => Some(term.to_string()),
            None => self.missing.clone(),
        }
    }

    fn compare(&self, slot1: usize, slot2: usize) -> Ordering {
        let (a, b) = (&self.slots[slot1], &self.slots[slot2]);
        match (a.ord, b.ord) {
            (Some(x), Some(y)) if a.leaf == b.leaf => x.cmp(&y),
            _ => a.value.cmp(&b.value),
        }
    }

    fn compare_bottom(&self, doc: DocId) -> Ordering {
        let Some(bottom) = self.bottom_slot.map(|slot| &self.slots[slot]) else {
            return Ordering::Greater;
        };
        match (bottom.ord, self.doc_ord(doc)) {
            (Some(x), Some(y)) if bottom.leaf == self.current_leaf => x.cmp(&y),
            _ => bottom.value.cmp(&self.doc_term(doc)),
        }
    }

    fn copy(&mut self, slot: usize, doc: DocId) {
        let ord = self.doc_ord(doc);
        let value = self.doc_term(doc);
        self.slots[slot] = TermSlot {
            ord,
            value,
            leaf: self.current_leaf,
        };
    }
}

/// The comparators of every key of a [`Sort`], with reverse flags applied.
#[derive(Debug)]
pub struct SortComparator {
    comparators: Vec<FieldComparator>,
    reverse: Vec<bool>,
}

impl SortComparator {
    /// Resolve every key of a sort into comparators with `num_slots` slots.
    pub fn new(sort: &Sort, num_slots: usize) -> Result<Self> {
        let comparators = sort
            .fields()
            .iter()
            .map(|field| FieldComparator::new(field, num_slots))
            .collect::<Result<Vec<_>>>()?;
        let reverse = sort.fields().iter().map(|field| field.reverse).collect();
        Ok(SortComparator {
            comparators,
            reverse,
        })
    }

    /// Bind the segment whose documents are collected next.
    pub fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.comparators
            .iter_mut()
            .try_for_each(|comparator| comparator.set_next_reader(leaf))
    }

    /// Compare two slots key by key. `Less` means `slot1` ranks better.
    pub fn compare(&self, slot1: usize, slot2: usize) -> Ordering {
        self.chain(|comparator| comparator.compare(slot1, slot2))
    }

    /// Remember the slot of the weakest queue entry.
    pub fn set_bottom(&mut self, slot: usize) {
        for comparator in &mut self.comparators {
            comparator.set_bottom(slot);
        }
    }

    /// `Greater` when the document ranks better than the bottom slot.
    pub fn compare_bottom(&self, doc: DocId, score: f32) -> Ordering {
        self.chain(|comparator| comparator.compare_bottom(doc, score))
    }

    /// Store the values of a segment-local document in a slot.
    pub fn copy(&mut self, slot: usize, doc: DocId, score: f32) {
        for comparator in &mut self.comparators {
            comparator.copy(slot, doc, score);
        }
    }

    /// Sort values held by a slot.
    pub fn values(&self, slot: usize) -> Vec<SortValue> {
        self.comparators
            .iter()
            .map(|comparator| comparator.value(slot))
            .collect()
    }

    /// Sort values of a segment-local document of the bound segment.
    pub fn doc_values(&self, doc: DocId, score: f32) -> Vec<SortValue> {
        self.comparators
            .iter()
            .map(|comparator| comparator.doc_value(doc, score))
            .collect()
    }

    fn chain<F>(&self, mut compare: F) -> Ordering
    where
        F: FnMut(&FieldComparator) -> Ordering,
    {
        for (comparator, reverse) in self.comparators.iter().zip(&self.reverse) {
            let ord = compare(comparator);
            if ord != Ordering::Equal {
                return if *reverse { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    }
}
