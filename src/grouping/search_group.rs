//! Groups discovered by the first pass.

use ahash::AHashSet;

use crate::error::{PhalanxError, Result};
use crate::grouping::selector::GroupValue;
use crate::search::merger::try_k_way_merge;
use crate::search::sort::{Sort, SortValue};

/// A group identity with the values that rank it against other groups.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchGroup<T> {
    /// Group identity.
    pub group_value: T,
    /// Values of the group's best document for each group sort field.
    pub sort_values: Vec<SortValue>,
}

impl<T: GroupValue> SearchGroup<T> {
    /// Merge the top groups of several shards.
    ///
    /// Each shard list must be ordered by `group_sort`. A group found by
    /// several shards keeps its best sort values. Returns `None` when no
    /// group is left after skipping `offset`.
    pub fn merge(
        shards: &[Vec<SearchGroup<T>>],
        offset: usize,
        top_n: usize,
        group_sort: &Sort,
    ) -> Result<Option<Vec<SearchGroup<T>>>> {
        for (shard, groups) in shards.iter().enumerate() {
            for group in groups {
                group_sort.check_values(&group.sort_values).map_err(|_| {
                    PhalanxError::internal(format!(
                        "group {:?} of shard {shard} has sort values {:?} that do not match sort {group_sort}",
                        group.group_value, group.sort_values
                    ))
                })?;
            }
        }

        let lists: Vec<&[SearchGroup<T>]> = shards.iter().map(Vec::as_slice).collect();
        let total = lists.iter().map(|groups| groups.len()).sum();
        let merged = try_k_way_merge(&lists, 0, total, |a, b| {
            group_sort.compare_values(&a.sort_values, &b.sort_values)
        })?;

        let mut seen = AHashSet::new();
        let groups: Vec<SearchGroup<T>> = merged
            .into_iter()
            .filter(|(_, group)| seen.insert(group.group_value.clone()))
            .skip(offset)
            .take(top_n)
            .map(|(_, group)| group.clone())
            .collect();

        Ok(if groups.is_empty() { None } else { Some(groups) })
    }
}
