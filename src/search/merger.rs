//! k-way merge of top-K lists produced independently by shards.
//!
//! Every input list is already ordered. The merge keeps one cursor per shard
//! in a priority queue and repeatedly takes the best head. Ties are broken by
//! the lower shard index, then by the earlier position inside the shard, so
//! the output is deterministic.

use std::cell::Cell;
use std::cmp::Ordering;

use crate::error::{PhalanxError, Result};
use crate::search::score_doc::{FieldDoc, ScoreDoc, TopDocs, TopFieldDocs, max_of};
use crate::search::sort::Sort;
use crate::util::PriorityQueue;

#[derive(Debug, Clone, Copy)]
struct Cursor {
    shard: usize,
    rank: usize,
}

/// Merge ordered lists, skipping the first `start` merged entries and
/// returning at most `top_n` entries with their shard index.
pub(crate) fn k_way_merge<'a, T, F>(lists: &[&'a [T]], start: usize, top_n: usize, order: F) -> Vec<(usize, &'a T)>
where
    F: Fn(&T, &T) -> Ordering,
{
    let better = |a: &Cursor, b: &Cursor| {
        order(&lists[a.shard][a.rank], &lists[b.shard][b.rank])
            .then(a.shard.cmp(&b.shard))
            .then(a.rank.cmp(&b.rank))
            == Ordering::Less
    };

    let mut queue = PriorityQueue::new(lists.len());
    for (shard, list) in lists.iter().enumerate() {
        if !list.is_empty() {
            queue.push(Cursor { shard, rank: 0 }, better);
        }
    }

    let wanted = start.saturating_add(top_n);
    let mut merged = Vec::with_capacity(top_n.min(lists.iter().map(|list| list.len()).sum()));
    let mut taken = 0;
    while taken < wanted {
        let Some(cursor) = queue.top_mut() else {
            break;
        };
        let (shard, rank) = (cursor.shard, cursor.rank);
        if taken >= start {
            merged.push((shard, &lists[shard][rank]));
        }
        taken += 1;

        if rank + 1 < lists[shard].len() {
            cursor.rank += 1;
            queue.update_top(better);
        } else {
            queue.pop(better);
        }
    }
    merged
}

/// [`k_way_merge`] with a fallible order. The first failed comparison is
/// returned instead of the merged lists.
pub(crate) fn try_k_way_merge<'a, T, F>(
    lists: &[&'a [T]],
    start: usize,
    top_n: usize,
    order: F,
) -> Result<Vec<(usize, &'a T)>>
where
    F: Fn(&T, &T) -> Result<Ordering>,
{
    let failure = Cell::new(None);
    let merged = k_way_merge(lists, start, top_n, |a, b| match order(a, b) {
        Ok(ord) => ord,
        Err(err) => {
            let first = failure.take().unwrap_or(err);
            failure.set(Some(first));
            Ordering::Equal
        }
    });
    match failure.into_inner() {
        Some(err) => Err(err),
        None => Ok(merged),
    }
}

/// Merge relevance-ranked shard results into the global top `top_n`.
///
/// Every returned hit carries the index of the shard it came from.
pub fn merge_top_docs(top_n: usize, shards: &[TopDocs]) -> TopDocs {
    let lists: Vec<&[ScoreDoc]> = shards.iter().map(|top| top.score_docs.as_slice()).collect();
    let score_docs = k_way_merge(&lists, 0, top_n, |a, b| b.score.total_cmp(&a.score))
        .into_iter()
        .map(|(shard, hit)| ScoreDoc {
            shard_index: Some(shard),
            ..hit.clone()
        })
        .collect();

    TopDocs {
        total_hits: shards.iter().map(|top| top.total_hits).sum(),
        score_docs,
        max_score: shards.iter().fold(None, |max, top| max_of(max, top.max_score)),
    }
}

/// Merge shard results ranked by `sort` into the global top `top_n`.
///
/// Fails with an internal error when a shard used another sort or a hit lacks
/// its sort values.
pub fn merge_shard_results(sort: &Sort, top_n: usize, shards: &[TopFieldDocs]) -> Result<TopFieldDocs> {
    for (shard, top) in shards.iter().enumerate() {
        if top.sort != *sort {
            return Err(PhalanxError::internal(format!(
                "shard {shard} is sorted by {} instead of {sort}",
                top.sort
            )));
        }
    }
    let lists: Vec<&[FieldDoc]> = shards.iter().map(|top| top.field_docs.as_slice()).collect();

    Ok(TopFieldDocs {
        total_hits: shards.iter().map(|top| top.total_hits).sum(),
        field_docs: merge_field_docs(sort, 0, top_n, &lists)?,
        sort: sort.clone(),
        max_score: shards.iter().fold(None, |max, top| max_of(max, top.max_score)),
    })
}

/// Merge lists of [`FieldDoc`]s ordered by `sort`, skipping `start` entries.
pub fn merge_field_docs(
    sort: &Sort,
    start: usize,
    top_n: usize,
    shards: &[&[FieldDoc]],
) -> Result<Vec<FieldDoc>> {
    check_sort_values(sort, shards)?;
    Ok(try_k_way_merge(shards, start, top_n, |a, b| {
        sort.compare_values(&a.fields, &b.fields)
    })?
    .into_iter()
    .map(|(shard, hit)| FieldDoc {
        shard_index: Some(shard),
        ..hit.clone()
    })
    .collect())
}

fn check_sort_values(sort: &Sort, shards: &[&[FieldDoc]]) -> Result<()> {
    for (shard, hits) in shards.iter().enumerate() {
        for hit in hits.iter() {
            sort.check_values(&hit.fields).map_err(|_| {
                PhalanxError::internal(format!(
                    "doc {} of shard {shard} has sort values {:?} that do not match sort {sort}",
                    hit.doc, hit.fields
                ))
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DocId;
    use crate::search::sort::{SortField, SortFieldType, SortValue};

    fn price_docs(hits: &[(DocId, f64)]) -> Vec<FieldDoc> {
        hits.iter()
            .map(|&(doc, price)| FieldDoc::new(doc, f32::NAN, vec![SortValue::Double(price)]))
            .collect()
    }

    #[test]
    fn test_merge_top_docs_ties_by_shard() {
        let shards = vec![
            TopDocs {
                total_hits: 10,
                score_docs: vec![ScoreDoc::new(4, 3.0), ScoreDoc::new(1, 1.0)],
                max_score: Some(3.0),
            },
            TopDocs {
                total_hits: 5,
                score_docs: vec![ScoreDoc::new(2, 3.0), ScoreDoc::new(0, 2.0)],
                max_score: Some(3.0),
            },
        ];

        let merged = merge_top_docs(3, &shards);
        assert_eq!(merged.total_hits, 15);
        let hits: Vec<(DocId, Option<usize>)> = merged
            .score_docs
            .iter()
            .map(|hit| (hit.doc, hit.shard_index))
            .collect();
        assert_eq!(hits, vec![(4, Some(0)), (2, Some(1)), (0, Some(1))]);
    }

    #[test]
    fn test_merge_shard_results_by_price() -> Result<()> {
        let sort = Sort::new(vec![SortField::new("price", SortFieldType::Double)]);
        let shards = vec![
            TopFieldDocs {
                total_hits: 5,
                field_docs: price_docs(&[(0, 1.0), (1, 3.0), (2, 5.0), (3, 7.0), (4, 9.0)]),
                sort: sort.clone(),
                max_score: None,
            },
            TopFieldDocs {
                total_hits: 5,
                field_docs: price_docs(&[(0, 2.0), (1, 3.0), (2, 4.0), (3, 8.0), (4, 10.0)]),
                sort: sort.clone(),
                max_score: None,
            },
        ];

        let merged = merge_shard_results(&sort, 7, &shards)?;
        let prices: Vec<(SortValue, Option<usize>)> = merged
            .field_docs
            .iter()
            .map(|hit| (hit.fields[0].clone(), hit.shard_index))
            .collect();
        assert_eq!(
            prices,
            vec![
                (SortValue::Double(1.0), Some(0)),
                (SortValue::Double(2.0), Some(1)),
                (SortValue::Double(3.0), Some(0)),
                (SortValue::Double(3.0), Some(1)),
                (SortValue::Double(4.0), Some(1)),
                (SortValue::Double(5.0), Some(0)),
                (SortValue::Double(7.0), Some(0)),
            ]
        );
        assert_eq!(merged.total_hits, 10);
        Ok(())
    }

    #[test]
    fn test_missing_sort_values_are_fatal() {
        let sort = Sort::new(vec![SortField::new("price", SortFieldType::Double)]);
        let shards = vec![TopFieldDocs {
            total_hits: 1,
            field_docs: vec![FieldDoc::new(0, 1.0, Vec::new())],
            sort: sort.clone(),
            max_score: None,
        }];
        assert!(matches!(
            merge_shard_results(&sort, 3, &shards),
            Err(PhalanxError::Internal(_))
        ));

        let other = TopFieldDocs::empty(Sort::relevance());
        assert!(merge_shard_results(&sort, 3, &[other]).is_err());
    }

    #[test]
    fn test_mistyped_sort_values_are_fatal() {
        let sort = Sort::new(vec![SortField::new("price", SortFieldType::Double)]);
        let a = price_docs(&[(0, 1.0), (1, 4.0)]);
        let b = vec![FieldDoc::new(0, 1.0, vec![SortValue::Int(2)])];
        assert!(matches!(
            merge_field_docs(&sort, 0, 3, &[a.as_slice(), b.as_slice()]),
            Err(PhalanxError::Internal(_))
        ));

        // A comparison failing inside the merge is reported too.
        let failed = try_k_way_merge(&[a.as_slice(), b.as_slice()], 0, 3, |x, y| {
            sort.compare_values(&x.fields, &y.fields)
        });
        assert!(matches!(failed, Err(PhalanxError::Internal(_))));
    }

    #[test]
    fn test_merge_with_start() -> Result<()> {
        let sort = Sort::new(vec![SortField::new("price", SortFieldType::Double)]);
        let a = price_docs(&[(0, 1.0), (1, 4.0)]);
        let b = price_docs(&[(0, 2.0), (1, 3.0)]);
        let merged = merge_field_docs(&sort, 1, 2, &[a.as_slice(), b.as_slice()])?;
        let prices: Vec<SortValue> = merged.into_iter().map(|hit| hit.fields[0].clone()).collect();
        assert_eq!(prices, vec![SortValue::Double(2.0), SortValue::Double(3.0)]);
        Ok(())
    }
}
