//! Collector combinations driven by an index searcher.

use std::sync::Arc;

use phalanx::cli::{CorpusArgs, build_corpus};
use phalanx::error::{PhalanxError, Result};
use phalanx::index::IndexReader;
use phalanx::query::{FieldValueSource, FunctionQuery, MatchAllQuery, TermQuery};
use phalanx::search::*;

fn reader(docs: usize) -> Result<IndexReader> {
    build_corpus(&CorpusArgs {
        docs,
        segments: 5,
        categories: 6,
        seed: 11,
        category: None,
    })
}

fn popularity() -> FunctionQuery {
    FunctionQuery::new(Arc::new(FieldValueSource::new("popularity")))
}

#[test]
fn test_cached_scan_replays_into_top_docs() -> Result<()> {
    let searcher = IndexSearcher::new(reader(500)?);
    let query = popularity();

    let mut caching = CachingCollector::create(
        Box::new(TotalHitCountCollector::new()),
        true,
        CacheBudget::Megabytes(1.0),
    );
    searcher.search(&query, None, &mut caching)?;
    assert!(caching.is_cached());
    assert_eq!(caching.cached_docs(), 500);

    let mut replayed = TopScoreDocCollector::new(20);
    caching.replay(&mut replayed)?;
    assert_eq!(replayed.top_docs(), searcher.search_top_docs(&query, None, 20)?);

    let counted = downcast_collector::<TotalHitCountCollector>(caching.into_inner()?)?;
    assert_eq!(counted.total_hits(), 500);
    Ok(())
}

#[test]
fn test_cache_without_scores_refuses_scoring_replay() -> Result<()> {
    let searcher = IndexSearcher::new(reader(100)?);
    let query = popularity();

    let mut caching =
        CachingCollector::create(Box::new(TotalHitCountCollector::new()), false, CacheBudget::Docs(100));
    searcher.search(&query, None, &mut caching)?;
    assert!(!caching.caches_scores());

    let mut top = TopScoreDocCollector::new(5);
    assert!(matches!(caching.replay(&mut top), Err(PhalanxError::InvalidState(_))));

    let mut count = TotalHitCountCollector::new();
    caching.replay(&mut count)?;
    assert_eq!(count.total_hits(), 100);
    Ok(())
}

#[test]
fn test_filtered_and_fanned_out() -> Result<()> {
    let searcher = IndexSearcher::new(reader(400)?);
    let query = popularity();
    let by_price = Sort::new(vec![SortField::new("price", SortFieldType::Double)]);

    let threshold = FilterCollector::new(
        Box::new(TotalHitCountCollector::new()),
        CollectFilter::Post(Box::new(ScoreThresholdFilter::new(0.5))),
    );
    let mut root = MultiCollector::wrap(vec![
        Box::new(threshold),
        Box::new(TopFieldCollector::new(by_price.clone(), 3, false, false)?),
        Box::new(DocSetCollector::new(searcher.reader().max_doc())),
    ])?;
    searcher.search(&query, None, root.as_mut())?;

    let mut parts = MultiCollector::split(root, 3)?.into_iter();
    let (Some(threshold), Some(cheapest), Some(docs)) = (parts.next(), parts.next(), parts.next())
    else {
        panic!("fan-out lost a collector");
    };

    let popular = downcast_collector::<FilterCollector>(threshold)?.into_inner();
    let popular = downcast_collector::<TotalHitCountCollector>(popular)?.total_hits();
    let all = searcher.search_top_docs(&query, None, 400)?;
    let expected = all.score_docs.iter().filter(|hit| hit.score >= 0.5).count();
    assert_eq!(popular, expected as u64);

    let cheapest = downcast_collector::<TopFieldCollector>(cheapest)?.top_docs();
    let expected = searcher.search_top_field_docs(&query, None, 3, &by_price)?;
    let docs_of = |top: &TopFieldDocs| top.field_docs.iter().map(|hit| hit.doc).collect::<Vec<_>>();
    assert_eq!(docs_of(&cheapest), docs_of(&expected));
    assert_eq!(cheapest.total_hits, 400);
    assert_eq!(cheapest.max_score, None);

    let docs = downcast_collector::<DocSetCollector>(docs)?.into_doc_set();
    assert_eq!(docs.len(), 400);
    Ok(())
}

#[test]
fn test_time_limit_stops_the_scan() -> Result<()> {
    let searcher = IndexSearcher::new(reader(200)?);
    let query = MatchAllQuery::new();
    let deadline = Deadline::unbounded();

    let mut limited = TimeLimitingCollector::new(deadline.clone());
    limited.set_collector(Box::new(TotalHitCountCollector::new()));
    searcher.search(&query, None, &mut limited)?;
    let counted = limited
        .take_collector()
        .map(downcast_collector::<TotalHitCountCollector>)
        .transpose()?
        .map(|collector| collector.total_hits());
    assert_eq!(counted, Some(200));

    deadline.expire();
    limited.set_collector(Box::new(TotalHitCountCollector::new()));
    let err = searcher.search(&query, None, &mut limited).unwrap_err();
    assert!(err.is_time_exceeded());
    Ok(())
}

#[test]
fn test_parallel_search_matches_sequential() -> Result<()> {
    let sequential = IndexSearcher::new(reader(3000)?);
    let parallel = IndexSearcher::with_executor(
        reader(3000)?,
        SearcherConfig {
            thread_pool_size: Some(3),
            max_docs_per_slice: 500,
            max_segments_per_slice: 1,
            parallel: true,
        },
    )?;
    assert!(parallel.slices().len() > 1);

    let query = popularity();
    assert_eq!(
        parallel.search_top_docs(&query, None, 25)?,
        sequential.search_top_docs(&query, None, 25)?
    );

    let sort = Sort::new(vec![
        SortField::new("rating", SortFieldType::Int).with_reverse(true),
        SortField::new("price", SortFieldType::Double),
    ]);
    assert_eq!(
        parallel.search_top_field_docs(&query, None, 25, &sort)?,
        sequential.search_top_field_docs(&query, None, 25, &sort)?
    );

    let cat2 = TermQuery::new("category", "cat2");
    assert_eq!(
        parallel.search_top_docs(&cat2, None, 10)?.total_hits,
        sequential.doc_set(&cat2, None)?.len() as u64
    );
    Ok(())
}
