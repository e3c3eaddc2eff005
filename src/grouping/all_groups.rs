//! Collectors that see every group rather than the top ones.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;

use ahash::{AHashMap, AHashSet};

use crate::error::Result;
use crate::grouping::selector::GroupSelector;
use crate::index::{DocId, DocSet, LeafReaderContext};
use crate::query::scorer::ScoreSource;
use crate::search::collector::Collector;
use crate::search::comparator::SortComparator;
use crate::search::sort::{Sort, SortValue};

/// Counts distinct groups.
#[derive(Debug)]
pub struct AllGroupsCollector<S: GroupSelector> {
    selector: S,
    seen: AHashSet<S::Value>,
    groups: Vec<S::Value>,
}

impl<S: GroupSelector> AllGroupsCollector<S> {
    /// Create a collector.
    pub fn new(selector: S) -> Self {
        AllGroupsCollector {
            selector,
            seen: AHashSet::new(),
            groups: Vec::new(),
        }
    }

    /// Number of distinct groups seen.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Distinct groups in order of first appearance.
    pub fn groups(&self) -> &[S::Value] {
        &self.groups
    }
}

impl<S: GroupSelector> Collector for AllGroupsCollector<S> {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.selector.set_next_reader(leaf)
    }

    fn collect(&mut self, doc: DocId, _scorer: &mut dyn ScoreSource) -> Result<()> {
        self.selector.advance_to(doc)?;
        let value = self.selector.current_value();
        if !self.seen.contains(&value) {
            self.seen.insert(value.clone());
            self.groups.push(value);
        }
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        false
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug)]
struct GroupHead {
    doc: DocId,
    values: Vec<SortValue>,
}

/// Finds the most relevant document of every group, its head, by a sort.
/// A later document replaces the head only when it sorts strictly before it.
#[derive(Debug)]
pub struct AllGroupHeadsCollector<S: GroupSelector> {
    selector: S,
    sort: Sort,
    comparator: SortComparator,
    heads: AHashMap<S::Value, GroupHead>,
    max_doc: DocId,
    doc_base: DocId,
}

impl<S: GroupSelector> AllGroupHeadsCollector<S> {
    /// Create a collector for an index of `max_doc` documents.
    pub fn new(selector: S, sort: Sort, max_doc: DocId) -> Result<Self> {
        let comparator = SortComparator::new(&sort, 0)?;
        Ok(AllGroupHeadsCollector {
            selector,
            sort,
            comparator,
            heads: AHashMap::new(),
            max_doc,
            doc_base: 0,
        })
    }

    /// Number of groups seen.
    pub fn group_count(&self) -> usize {
        self.heads.len()
    }

    /// Global ids of the group heads.
    pub fn retrieve_group_heads(&self) -> DocSet {
        DocSet::from_docs(self.max_doc, self.heads.values().map(|head| head.doc))
    }
}

impl<S: GroupSelector> Collector for AllGroupHeadsCollector<S> {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.doc_base = leaf.doc_base;
        self.comparator.set_next_reader(leaf)?;
        self.selector.set_next_reader(leaf)
    }

    fn collect(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<()> {
        self.selector.advance_to(doc)?;
        let score = if self.sort.needs_scores() {
            scorer.score()?
        } else {
            f32::NAN
        };
        let values = self.comparator.doc_values(doc, score);
        let global = self.doc_base + doc;

        match self.heads.entry(self.selector.current_value()) {
            Entry::Occupied(mut entry) => {
                let head = entry.get_mut();
                if self.sort.compare_values(&values, &head.values)? == Ordering::Less {
                    head.doc = global;
                    head.values = values;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(GroupHead {
                    doc: global,
                    values,
                });
            }
        }
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        self.sort.needs_scores()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
