//! First pass: find the top groups by the group sort.

use std::any::Any;
use std::cmp::Ordering;

use ahash::AHashMap;

use crate::error::{PhalanxError, Result};
use crate::grouping::search_group::SearchGroup;
use crate::grouping::selector::GroupSelector;
use crate::index::{DocId, LeafReaderContext};
use crate::query::scorer::ScoreSource;
use crate::search::collector::Collector;
use crate::search::comparator::SortComparator;
use crate::search::sort::Sort;

#[derive(Debug)]
struct CollectedGroup<T> {
    value: T,
    /// Global id of the document that currently represents the group.
    top_doc: DocId,
    /// Comparator slot holding the group's sort values.
    slot: usize,
}

/// Collects the `top_n` best groups, where a group ranks by its best
/// document under the group sort.
///
/// The comparator has one slot per group plus a spare slot used to evaluate
/// a document of an already known group. Ties between groups are won by the
/// group whose representative document was seen first.
#[derive(Debug)]
pub struct FirstPassGroupingCollector<S: GroupSelector> {
    selector: S,
    group_sort: Sort,
    top_n: usize,
    comparator: SortComparator,
    spare_slot: usize,
    groups: Vec<CollectedGroup<S::Value>>,
    group_map: AHashMap<S::Value, usize>,
    /// Group indices best first; built once `top_n` groups are known.
    ordered: Option<Vec<usize>>,
    needs_scores: bool,
    doc_base: DocId,
}

impl<S: GroupSelector> FirstPassGroupingCollector<S> {
    /// Create a collector finding the `top_n` best groups.
    pub fn new(selector: S, group_sort: Sort, top_n: usize) -> Result<Self> {
        if top_n < 1 {
            return Err(PhalanxError::invalid_argument(format!(
                "top_n must be >= 1 (got {top_n})"
            )));
        }
        let comparator = SortComparator::new(&group_sort, top_n + 1)?;
        let needs_scores = group_sort.needs_scores();
        Ok(FirstPassGroupingCollector {
            selector,
            group_sort,
            top_n,
            comparator,
            spare_slot: top_n,
            groups: Vec::with_capacity(top_n),
            group_map: AHashMap::with_capacity(top_n),
            ordered: None,
            needs_scores,
            doc_base: 0,
        })
    }

    /// The group sort.
    pub fn group_sort(&self) -> &Sort {
        &self.group_sort
    }

    /// Number of groups requested.
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Number of groups currently held.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// The best groups after skipping `group_offset`, best first. `None` when
    /// fewer groups than `group_offset + 1` were found.
    pub fn get_top_groups(&self, group_offset: usize) -> Option<Vec<SearchGroup<S::Value>>> {
        if self.groups.len() <= group_offset {
            return None;
        }
        let ordered = match &self.ordered {
            Some(ordered) => ordered.clone(),
            None => self.sorted_indices(),
        };
        Some(
            ordered
                .into_iter()
                .skip(group_offset)
                .map(|idx| {
                    let group = &self.groups[idx];
                    SearchGroup {
                        group_value: group.value.clone(),
                        sort_values: self.comparator.values(group.slot),
                    }
                })
                .collect(),
        )
    }

    fn group_order(&self, a: usize, b: usize) -> Ordering {
        let (a, b) = (&self.groups[a], &self.groups[b]);
        self.comparator
            .compare(a.slot, b.slot)
            .then_with(|| a.top_doc.cmp(&b.top_doc))
    }

    fn sorted_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.groups.len()).collect();
        indices.sort_by(|&a, &b| self.group_order(a, b));
        indices
    }

    fn insert_ordered(&mut self, idx: usize) {
        let Some(ordered) = &self.ordered else {
            return;
        };
        let pos = ordered
            .binary_search_by(|&probe| self.group_order(probe, idx))
            .unwrap_or_else(|pos| pos);
        if let Some(ordered) = &mut self.ordered {
            ordered.insert(pos, idx);
        }
    }

    fn remove_ordered(&mut self, idx: usize) {
        if let Some(ordered) = &mut self.ordered {
            if let Some(pos) = ordered.iter().position(|&probe| probe == idx) {
                ordered.remove(pos);
            }
        }
    }

    fn update_bottom(&mut self) {
        let bottom = self
            .ordered
            .as_ref()
            .and_then(|ordered| ordered.last())
            .map(|&idx| self.groups[idx].slot);
        if let Some(slot) = bottom {
            self.comparator.set_bottom(slot);
        }
    }
}

impl<S: GroupSelector> Collector for FirstPassGroupingCollector<S> {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.doc_base = leaf.doc_base;
        self.comparator.set_next_reader(leaf)?;
        self.selector.set_next_reader(leaf)
    }

    fn collect(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<()> {
        let score = if self.needs_scores {
            scorer.score()?
        } else {
            f32::NAN
        };

        // Once full, a document that does not beat the weakest group cannot
        // change anything, whatever its group.
        if self.groups.len() == self.top_n
            && self.comparator.compare_bottom(doc, score) != Ordering::Greater
        {
            return Ok(());
        }

        self.selector.advance_to(doc)?;
        let value = self.selector.current_value();
        let global = self.doc_base + doc;

        let Some(idx) = self.group_map.get(&value).copied() else {
            if self.groups.len() < self.top_n {
                let slot = self.groups.len();
                self.comparator.copy(slot, doc, score);
                self.group_map.insert(value.clone(), slot);
                self.groups.push(CollectedGroup {
                    value,
                    top_doc: global,
                    slot,
                });
                if self.groups.len() == self.top_n {
                    self.ordered = Some(self.sorted_indices());
                    self.update_bottom();
                }
                return Ok(());
            }

            // Replace the weakest group.
            let Some(bottom) = self.ordered.as_mut().and_then(|ordered| ordered.pop()) else {
                return Err(PhalanxError::internal("full group queue has no bottom"));
            };
            let slot = self.groups[bottom].slot;
            self.comparator.copy(slot, doc, score);
            let group = &mut self.groups[bottom];
            self.group_map.remove(&group.value);
            group.value = value.clone();
            group.top_doc = global;
            self.group_map.insert(value, bottom);
            self.insert_ordered(bottom);
            self.update_bottom();
            return Ok(());
        };

        // Known group: only a strictly better document takes over.
        self.comparator.copy(self.spare_slot, doc, score);
        if self.comparator.compare(self.spare_slot, self.groups[idx].slot) != Ordering::Less {
            return Ok(());
        }

        self.remove_ordered(idx);
        let group = &mut self.groups[idx];
        std::mem::swap(&mut group.slot, &mut self.spare_slot);
        group.top_doc = global;
        if self.ordered.is_some() {
            self.insert_ordered(idx);
            self.update_bottom();
        }
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        self.needs_scores
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
