//! Group selectors: derive the group identity of a document.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::{PhalanxError, Result};
use crate::index::{DocId, DocValues, IndexReader, LeafReaderContext, SortedDocValues};
use crate::query::function::{FunctionValue, FunctionValues, ValueSource};

/// A group identity.
pub trait GroupValue: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// JSON rendering used in responses.
    fn to_json(&self) -> serde_json::Value;
}

impl GroupValue for Option<String> {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Some(term) => serde_json::Value::String(term.clone()),
            None => serde_json::Value::Null,
        }
    }
}

impl GroupValue for FunctionValue {
    fn to_json(&self) -> serde_json::Value {
        match self {
            FunctionValue::Missing => serde_json::Value::Null,
            FunctionValue::Int(v) => serde_json::json!(v),
            FunctionValue::Float(v) => serde_json::json!(v),
            FunctionValue::Str(v) => serde_json::json!(v),
        }
    }
}

/// Resolves the group of each collected document.
///
/// After [`set_groups`](GroupSelector::set_groups) the selector only accepts
/// documents of those groups and reports which one matched.
pub trait GroupSelector: Send + Debug + 'static {
    /// Group identity type.
    type Value: GroupValue;

    /// Check that the selector can be evaluated against a reader.
    fn validate(&self, reader: &IndexReader) -> Result<()>;

    /// Bind the segment whose documents are selected next.
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()>;

    /// Position on a segment-local document. Returns `false` when groups were
    /// restricted and the document belongs to none of them.
    fn advance_to(&mut self, doc: DocId) -> Result<bool>;

    /// Group of the current document.
    fn current_value(&self) -> Self::Value;

    /// Position of the current document's group in the restricted groups.
    fn selected_index(&self) -> Option<usize>;

    /// Restrict selection to `groups`.
    fn set_groups(&mut self, groups: &[Self::Value]);
}

/// Groups by the term of a string field. Documents without a term form the
/// `None` group.
#[derive(Debug)]
pub struct TermGroupSelector {
    field: String,
    values: Option<Arc<SortedDocValues>>,
    current_ord: Option<u32>,
    groups: Option<AHashMap<Option<String>, usize>>,
    ord_groups: AHashMap<Option<u32>, usize>,
    selected: Option<usize>,
}

impl TermGroupSelector {
    /// Create a selector over a string field.
    pub fn new<S: Into<String>>(field: S) -> Self {
        TermGroupSelector {
            field: field.into(),
            values: None,
            current_ord: None,
            groups: None,
            ord_groups: AHashMap::new(),
            selected: None,
        }
    }

    /// Field name.
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Clone for TermGroupSelector {
    fn clone(&self) -> Self {
        TermGroupSelector {
            field: self.field.clone(),
            values: None,
            current_ord: None,
            groups: self.groups.clone(),
            ord_groups: AHashMap::new(),
            selected: None,
        }
    }
}

impl GroupSelector for TermGroupSelector {
    type Value = Option<String>;

    fn validate(&self, reader: &IndexReader) -> Result<()> {
        if reader.leaves().is_empty() {
            return Ok(());
        }
        match reader.field_kind(&self.field) {
            Some(DocValues::Sorted(_)) => Ok(()),
            Some(other) => Err(PhalanxError::configuration(format!(
                "cannot group by field '{}', it holds {} values",
                self.field,
                other.kind()
            ))),
            None => Err(PhalanxError::configuration(format!(
                "cannot group by undefined field: {}",
                self.field
            ))),
        }
    }

    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.values = leaf.reader().sorted_doc_values(&self.field)?;
        self.ord_groups.clear();
        if let Some(groups) = &self.groups {
            for (value, &idx) in groups {
                let ord = match value {
                    None => None,
                    Some(term) => match self.values.as_ref().and_then(|v| v.lookup_term(term)) {
                        Some(ord) => Some(ord),
                        // The group has no document in this segment.
                        None => continue,
                    },
                };
                self.ord_groups.insert(ord, idx);
            }
        }
        Ok(())
    }

    fn advance_to(&mut self, doc: DocId) -> Result<bool> {
        self.current_ord = self.values.as_ref().and_then(|values| values.ord(doc));
        if self.groups.is_none() {
            return Ok(true);
        }
        self.selected = self.ord_groups.get(&self.current_ord).copied();
        Ok(self.selected.is_some())
    }

    fn current_value(&self) -> Option<String> {
        match (self.current_ord, &self.values) {
            (Some(ord), Some(values)) => Some(values.lookup_ord(ord).to_string()),
            _ => None,
        }
    }

    fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    fn set_groups(&mut self, groups: &[Option<String>]) {
        self.groups = Some(
            groups
                .iter()
                .enumerate()
                .map(|(idx, value)| (value.clone(), idx))
                .collect(),
        );
    }
}

/// Groups by the value a [`ValueSource`] computes for each document.
#[derive(Debug)]
pub struct ValueSourceGroupSelector {
    source: Arc<dyn ValueSource>,
    values: Option<Box<dyn FunctionValues>>,
    current: FunctionValue,
    groups: Option<AHashMap<FunctionValue, usize>>,
    selected: Option<usize>,
}

impl ValueSourceGroupSelector {
    /// Create a selector over a value source.
    pub fn new(source: Arc<dyn ValueSource>) -> Self {
        ValueSourceGroupSelector {
            source,
            values: None,
            current: FunctionValue::Missing,
            groups: None,
            selected: None,
        }
    }

    /// The value source.
    pub fn source(&self) -> &Arc<dyn ValueSource> {
        &self.source
    }
}

impl Clone for ValueSourceGroupSelector {
    fn clone(&self) -> Self {
        ValueSourceGroupSelector {
            source: Arc::clone(&self.source),
            values: None,
            current: FunctionValue::Missing,
            groups: self.groups.clone(),
            selected: None,
        }
    }
}

impl GroupSelector for ValueSourceGroupSelector {
    type Value = FunctionValue;

    fn validate(&self, reader: &IndexReader) -> Result<()> {
        self.source.validate(reader)
    }

    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.values = Some(self.source.values(leaf)?);
        Ok(())
    }

    fn advance_to(&mut self, doc: DocId) -> Result<bool> {
        self.current = match &self.values {
            Some(values) => values.value(doc),
            None => {
                return Err(PhalanxError::invalid_state(
                    "value source selector used before set_next_reader",
                ));
            }
        };
        match &self.groups {
            None => Ok(true),
            Some(groups) => {
                self.selected = groups.get(&self.current).copied();
                Ok(self.selected.is_some())
            }
        }
    }

    fn current_value(&self) -> FunctionValue {
        self.current.clone()
    }

    fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    fn set_groups(&mut self, groups: &[FunctionValue]) {
        self.groups = Some(
            groups
                .iter()
                .enumerate()
                .map(|(idx, value)| (value.clone(), idx))
                .collect(),
        );
    }
}
