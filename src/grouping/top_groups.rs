//! Fully realized groups produced by the second pass.

use crate::error::{PhalanxError, Result};
use crate::grouping::selector::GroupValue;
use crate::search::merger::merge_field_docs;
use crate::search::score_doc::{FieldDoc, max_of};
use crate::search::sort::{Sort, SortValue};

/// One group with its best documents.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDocs<T> {
    /// Group identity.
    pub group_value: T,
    /// Values that ranked the group.
    pub group_sort_values: Vec<SortValue>,
    /// Number of documents of the group that matched.
    pub total_hits: u64,
    /// Best score inside the group, when tracked.
    pub max_score: Option<f32>,
    /// Best documents of the group, ranked by the within-group sort.
    pub score_docs: Vec<FieldDoc>,
}

/// The grouped result of one command.
#[derive(Debug, Clone, PartialEq)]
pub struct TopGroups<T> {
    /// How groups are ranked.
    pub group_sort: Sort,
    /// How documents are ranked inside a group.
    pub within_group_sort: Sort,
    /// Number of documents that matched the query.
    pub total_hit_count: u64,
    /// Number of documents that matched and belong to a returned group.
    pub total_grouped_hit_count: u64,
    /// Number of distinct groups, when counted.
    pub total_group_count: Option<usize>,
    /// Groups in rank order.
    pub groups: Vec<GroupDocs<T>>,
    /// Best score across groups, when tracked.
    pub max_score: Option<f32>,
}

impl<T: GroupValue> TopGroups<T> {
    /// Merge the second-pass results of several shards.
    ///
    /// Every shard must have collected the same groups in the same order,
    /// which holds when they all ran with the output of
    /// [`SearchGroup::merge`](crate::grouping::SearchGroup::merge). Documents
    /// inside each group are merged by the within-group sort, skipping
    /// `doc_offset` and keeping `docs_per_group`.
    ///
    /// The merged `total_group_count` is the sum of the shard counts. A group
    /// present in several shards is counted once per shard, so the sum is an
    /// upper bound on the number of distinct groups.
    pub fn merge(
        shards: &[TopGroups<T>],
        doc_offset: usize,
        docs_per_group: usize,
    ) -> Result<Option<TopGroups<T>>> {
        let Some(first) = shards.first() else {
            return Ok(None);
        };

        for (shard, top) in shards.iter().enumerate().skip(1) {
            if top.group_sort != first.group_sort || top.within_group_sort != first.within_group_sort
            {
                return Err(PhalanxError::internal(format!(
                    "shard {shard} was grouped with different sorts"
                )));
            }
            let same_groups = top.groups.len() == first.groups.len()
                && top
                    .groups
                    .iter()
                    .zip(&first.groups)
                    .all(|(a, b)| a.group_value == b.group_value);
            if !same_groups {
                return Err(PhalanxError::internal(format!(
                    "shard {shard} collected different groups"
                )));
            }
        }

        let mut groups = Vec::with_capacity(first.groups.len());
        let mut max_score = None;
        for (idx, group) in first.groups.iter().enumerate() {
            let lists: Vec<&[FieldDoc]> = shards
                .iter()
                .map(|top| top.groups[idx].score_docs.as_slice())
                .collect();
            let group_max = shards
                .iter()
                .fold(None, |max, top| max_of(max, top.groups[idx].max_score));
            max_score = max_of(max_score, group_max);

            groups.push(GroupDocs {
                group_value: group.group_value.clone(),
                group_sort_values: group.group_sort_values.clone(),
                total_hits: shards.iter().map(|top| top.groups[idx].total_hits).sum(),
                max_score: group_max,
                score_docs: merge_field_docs(
                    &first.within_group_sort,
                    doc_offset,
                    docs_per_group,
                    &lists,
                )?,
            });
        }

        // Upper bound: groups spanning shards are counted more than once.
        let total_group_count = shards
            .iter()
            .map(|top| top.total_group_count)
            .sum::<Option<usize>>();

        Ok(Some(TopGroups {
            group_sort: first.group_sort.clone(),
            within_group_sort: first.within_group_sort.clone(),
            total_hit_count: shards.iter().map(|top| top.total_hit_count).sum(),
            total_grouped_hit_count: shards.iter().map(|top| top.total_grouped_hit_count).sum(),
            total_group_count,
            groups,
            max_score,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DocId;

    fn shard(docs: &[(&str, &[(DocId, f32)])]) -> TopGroups<Option<String>> {
        let groups: Vec<GroupDocs<Option<String>>> = docs
            .iter()
            .map(|(name, hits)| GroupDocs {
                group_value: Some(name.to_string()),
                group_sort_values: vec![SortValue::Score(hits[0].1)],
                total_hits: hits.len() as u64,
                max_score: Some(hits[0].1),
                score_docs: hits
                    .iter()
                    .map(|&(doc, score)| FieldDoc::new(doc, score, vec![SortValue::Score(score)]))
                    .collect(),
            })
            .collect();
        TopGroups {
            group_sort: Sort::relevance(),
            within_group_sort: Sort::relevance(),
            total_hit_count: 10,
            total_grouped_hit_count: groups.iter().map(|g| g.total_hits).sum(),
            total_group_count: Some(4),
            groups,
            max_score: None,
        }
    }

    #[test]
    fn test_merge_top_groups() -> Result<()> {
        let a = shard(&[("x", &[(0, 9.0), (1, 3.0)]), ("y", &[(2, 5.0)])]);
        let b = shard(&[("x", &[(0, 4.0)]), ("y", &[(1, 6.0), (3, 1.0)])]);

        let merged = TopGroups::merge(&[a, b], 0, 2)?.unwrap();
        assert_eq!(merged.total_hit_count, 20);
        // Each shard reports the same four groups; the merged count is their sum.
        assert_eq!(merged.total_group_count, Some(8));
        assert_eq!(merged.max_score, Some(9.0));

        let x = &merged.groups[0];
        assert_eq!(x.total_hits, 3);
        let scores: Vec<(f32, Option<usize>)> =
            x.score_docs.iter().map(|d| (d.score, d.shard_index)).collect();
        assert_eq!(scores, vec![(9.0, Some(0)), (4.0, Some(1))]);
        assert_eq!(merged.groups[1].max_score, Some(6.0));
        Ok(())
    }

    #[test]
    fn test_merge_rejects_different_groups() {
        let a = shard(&[("x", &[(0, 9.0)])]);
        let b = shard(&[("z", &[(0, 4.0)])]);
        assert!(TopGroups::merge(&[a, b], 0, 2).is_err());
        assert!(TopGroups::<Option<String>>::merge(&[], 0, 2).unwrap().is_none());
    }
}
