//! Second pass: collect the best documents of each selected group.

use std::any::Any;

use crate::error::{PhalanxError, Result};
use crate::grouping::search_group::SearchGroup;
use crate::grouping::selector::GroupSelector;
use crate::grouping::top_groups::{GroupDocs, TopGroups};
use crate::index::{DocId, LeafReaderContext};
use crate::query::scorer::ScoreSource;
use crate::search::collector::{Collector, TopFieldCollector};
use crate::search::score_doc::max_of;
use crate::search::sort::Sort;

/// Routes every document of a selected group into that group's own
/// [`TopFieldCollector`].
#[derive(Debug)]
pub struct SecondPassGroupingCollector<S: GroupSelector> {
    selector: S,
    groups: Vec<SearchGroup<S::Value>>,
    group_sort: Sort,
    within_group_sort: Sort,
    collectors: Vec<TopFieldCollector>,
    needs_scores: bool,
    total_hit_count: u64,
    total_grouped_hit_count: u64,
}

impl<S: GroupSelector> SecondPassGroupingCollector<S> {
    /// Create a collector keeping `max_docs_per_group` documents for each of
    /// `groups`, ranked by `within_group_sort`.
    pub fn new(
        mut selector: S,
        groups: Vec<SearchGroup<S::Value>>,
        group_sort: Sort,
        within_group_sort: Sort,
        max_docs_per_group: usize,
        track_scores: bool,
        track_max_score: bool,
    ) -> Result<Self> {
        if groups.is_empty() {
            return Err(PhalanxError::invalid_argument("no groups to collect"));
        }

        let values: Vec<S::Value> = groups.iter().map(|group| group.group_value.clone()).collect();
        selector.set_groups(&values);

        let collectors = groups
            .iter()
            .map(|_| {
                TopFieldCollector::new(
                    within_group_sort.clone(),
                    max_docs_per_group,
                    track_scores,
                    track_max_score,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let needs_scores = collectors.iter().any(|collector| collector.needs_scores());

        Ok(SecondPassGroupingCollector {
            selector,
            groups,
            group_sort,
            within_group_sort,
            collectors,
            needs_scores,
            total_hit_count: 0,
            total_grouped_hit_count: 0,
        })
    }

    /// Number of documents seen.
    pub fn total_hit_count(&self) -> u64 {
        self.total_hit_count
    }

    /// Number of documents that belonged to a selected group.
    pub fn total_grouped_hit_count(&self) -> u64 {
        self.total_grouped_hit_count
    }

    /// The collected groups, skipping `within_group_offset` documents inside
    /// each group and keeping at most `docs_per_group` after them.
    pub fn get_top_groups(
        &self,
        within_group_offset: usize,
        docs_per_group: usize,
    ) -> TopGroups<S::Value> {
        let mut max_score = None;
        let groups = self
            .groups
            .iter()
            .zip(&self.collectors)
            .map(|(group, collector)| {
                let top = collector.top_docs_range(within_group_offset, docs_per_group);
                max_score = max_of(max_score, top.max_score);
                GroupDocs {
                    group_value: group.group_value.clone(),
                    group_sort_values: group.sort_values.clone(),
                    total_hits: top.total_hits,
                    max_score: top.max_score,
                    score_docs: top.field_docs,
                }
            })
            .collect();

        TopGroups {
            group_sort: self.group_sort.clone(),
            within_group_sort: self.within_group_sort.clone(),
            total_hit_count: self.total_hit_count,
            total_grouped_hit_count: self.total_grouped_hit_count,
            total_group_count: None,
            groups,
            max_score,
        }
    }
}

impl<S: GroupSelector> Collector for SecondPassGroupingCollector<S> {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.selector.set_next_reader(leaf)?;
        for collector in &mut self.collectors {
            collector.set_next_reader(leaf)?;
        }
        Ok(())
    }

    fn collect(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<()> {
        self.total_hit_count += 1;
        if !self.selector.advance_to(doc)? {
            return Ok(());
        }
        if let Some(idx) = self.selector.selected_index() {
            self.total_grouped_hit_count += 1;
            self.collectors[idx].collect(doc, scorer)?;
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
