//! Merging results of independently searched shards.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use phalanx::error::Result;
use phalanx::grouping::{
    FirstPassGroupingCollector, SearchGroup, SecondPassGroupingCollector, TermGroupSelector,
    TopGroups,
};
use phalanx::index::{DocId, FieldValue, IndexReader, SegmentBuilder};
use phalanx::query::{FieldValueSource, FunctionQuery, MatchAllQuery};
use phalanx::search::{
    IndexSearcher, Sort, SortField, SortFieldType, SortValue, merge_shard_results, merge_top_docs,
};

struct Product {
    category: String,
    popularity: f32,
    price: f64,
}

fn products(seed: u64, count: usize) -> Vec<Product> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| Product {
            category: format!("cat{}", rng.random_range(0..4)),
            popularity: rng.random::<f32>(),
            price: (rng.random_range(100..10_000) as f64) / 100.0,
        })
        .collect()
}

fn searcher(products: &[&Product]) -> Result<IndexSearcher> {
    let mut segments = Vec::new();
    for chunk in products.chunks(64) {
        let mut builder = SegmentBuilder::new();
        for product in chunk {
            builder.add_document([
                ("category", FieldValue::from(product.category.as_str())),
                ("popularity", FieldValue::Float(product.popularity)),
                ("price", FieldValue::Double(product.price)),
            ])?;
        }
        segments.push(builder.build());
    }
    Ok(IndexSearcher::new(IndexReader::from_segments(segments)))
}

fn popularity() -> FunctionQuery {
    FunctionQuery::new(Arc::new(FieldValueSource::new("popularity")))
}

#[test]
fn test_merge_top_by_price() -> Result<()> {
    let shards = [products(1, 150), products(2, 90)];
    let searchers = [
        searcher(&shards[0].iter().collect::<Vec<_>>())?,
        searcher(&shards[1].iter().collect::<Vec<_>>())?,
    ];
    let sort = Sort::new(vec![SortField::new("price", SortFieldType::Double)]);
    let query = MatchAllQuery::new();

    let tops = searchers
        .iter()
        .map(|searcher| searcher.search_top_field_docs(&query, None, 5, &sort))
        .collect::<Result<Vec<_>>>()?;
    let merged = merge_shard_results(&sort, 7, &tops)?;

    assert_eq!(merged.total_hits, 240);
    assert_eq!(merged.field_docs.len(), 7);

    let mut all: Vec<(f64, usize, DocId)> = shards
        .iter()
        .enumerate()
        .flat_map(|(shard, products)| {
            products
                .iter()
                .enumerate()
                .map(move |(doc, product)| (product.price, shard, doc as DocId))
        })
        .collect();
    all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    // Five per shard are enough as long as no shard owns more than five of
    // the global seven.
    let owned = all[..7].iter().filter(|(_, shard, _)| *shard == 0).count();
    assert!((2..=5).contains(&owned), "shard 0 owns {owned} of the cheapest seven");
    let got: Vec<(usize, DocId)> = merged
        .field_docs
        .iter()
        .map(|hit| (hit.shard_index.unwrap_or(usize::MAX), hit.doc))
        .collect();
    let want: Vec<(usize, DocId)> = all[..7].iter().map(|&(_, shard, doc)| (shard, doc)).collect();
    assert_eq!(got, want);
    for pair in merged.field_docs.windows(2) {
        assert_eq!(sort.compare_values(&pair[0].fields, &pair[1].fields)?, std::cmp::Ordering::Less);
    }
    assert!(matches!(merged.field_docs[0].fields[0], SortValue::Double(_)));
    Ok(())
}

#[test]
fn test_merge_top_by_relevance() -> Result<()> {
    let shards = [products(3, 80), products(4, 120)];
    let union: Vec<&Product> = shards.iter().flatten().collect();
    let query = popularity();

    let tops = shards
        .iter()
        .map(|products| searcher(&products.iter().collect::<Vec<_>>())?.search_top_docs(&query, None, 10))
        .collect::<Result<Vec<_>>>()?;
    let merged = merge_top_docs(10, &tops);
    let single = searcher(&union)?.search_top_docs(&query, None, 10)?;

    assert_eq!(merged.total_hits, single.total_hits);
    assert_eq!(merged.max_score, single.max_score);
    let merged_docs: Vec<DocId> = merged
        .score_docs
        .iter()
        .map(|hit| match hit.shard_index {
            Some(1) => hit.doc + shards[0].len() as DocId,
            _ => hit.doc,
        })
        .collect();
    let single_docs: Vec<DocId> = single.score_docs.iter().map(|hit| hit.doc).collect();
    assert_eq!(merged_docs, single_docs);
    Ok(())
}

#[test]
fn test_distributed_grouping_matches_single_index() -> Result<()> {
    let shards = [products(5, 200), products(6, 170)];
    let union: Vec<&Product> = shards.iter().flatten().collect();
    let shard_searchers = [
        searcher(&shards[0].iter().collect::<Vec<_>>())?,
        searcher(&shards[1].iter().collect::<Vec<_>>())?,
    ];
    let single = searcher(&union)?;
    let query = popularity();
    let group_sort = Sort::relevance();
    let within = Sort::relevance();
    let top_n = 3;

    let first_pass = |searcher: &IndexSearcher| -> Result<Vec<SearchGroup<Option<String>>>> {
        let mut collector = FirstPassGroupingCollector::new(
            TermGroupSelector::new("category"),
            group_sort.clone(),
            top_n,
        )?;
        searcher.search(&query, None, &mut collector)?;
        Ok(collector.get_top_groups(0).unwrap_or_default())
    };
    let second_pass = |searcher: &IndexSearcher,
                       groups: Vec<SearchGroup<Option<String>>>|
     -> Result<TopGroups<Option<String>>> {
        let mut collector = SecondPassGroupingCollector::new(
            TermGroupSelector::new("category"),
            groups,
            group_sort.clone(),
            within.clone(),
            2,
            true,
            true,
        )?;
        searcher.search(&query, None, &mut collector)?;
        Ok(collector.get_top_groups(0, 2))
    };

    let shard_groups = shard_searchers
        .iter()
        .map(|searcher| first_pass(searcher))
        .collect::<Result<Vec<_>>>()?;
    let Some(groups) = SearchGroup::merge(&shard_groups, 0, top_n, &group_sort)? else {
        panic!("no groups were found");
    };
    assert_eq!(groups, first_pass(&single)?);

    let shard_tops = shard_searchers
        .iter()
        .map(|searcher| second_pass(searcher, groups.clone()))
        .collect::<Result<Vec<_>>>()?;
    let Some(merged) = TopGroups::merge(&shard_tops, 0, 2)? else {
        panic!("no shard results");
    };
    let expected = second_pass(&single, groups)?;

    assert_eq!(merged.total_hit_count, expected.total_hit_count);
    assert_eq!(merged.total_grouped_hit_count, expected.total_grouped_hit_count);
    assert_eq!(merged.groups.len(), expected.groups.len());
    for (got, want) in merged.groups.iter().zip(&expected.groups) {
        assert_eq!(got.group_value, want.group_value);
        assert_eq!(got.total_hits, want.total_hits);
        assert_eq!(got.max_score, want.max_score);
        let docs: Vec<DocId> = got
            .score_docs
            .iter()
            .map(|hit| match hit.shard_index {
                Some(1) => hit.doc + shards[0].len() as DocId,
                _ => hit.doc,
            })
            .collect();
        let want_docs: Vec<DocId> = want.score_docs.iter().map(|hit| hit.doc).collect();
        assert_eq!(docs, want_docs);
    }
    Ok(())
}

#[test]
fn test_merge_rejects_mismatched_sorts() -> Result<()> {
    let shard = products(7, 20);
    let searcher = searcher(&shard.iter().collect::<Vec<_>>())?;
    let query = MatchAllQuery::new();
    let by_price = Sort::new(vec![SortField::new("price", SortFieldType::Double)]);
    let by_doc = Sort::index_order();

    let tops = vec![
        searcher.search_top_field_docs(&query, None, 3, &by_price)?,
        searcher.search_top_field_docs(&query, None, 3, &by_doc)?,
    ];
    assert!(merge_shard_results(&by_price, 5, &tops).is_err());
    Ok(())
}
