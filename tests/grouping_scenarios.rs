//! End-to-end grouping scenarios over a generated catalog.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use phalanx::error::Result;
use phalanx::grouping::*;
use phalanx::index::{DocId, DocSet, FieldValue, IndexReader, LeafReaderContext, SegmentBuilder};
use phalanx::query::*;
use phalanx::search::{Deadline, IndexSearcher, Sort, SortField, SortFieldType};

const DOCS: usize = 1000;
const CATEGORIES: usize = 5;
const SEGMENT_SIZE: usize = 300;

struct Product {
    category: String,
    popularity: f32,
    price: f64,
}

fn catalog() -> Vec<Product> {
    let mut rng = StdRng::seed_from_u64(2024);
    (0..DOCS)
        .map(|_| Product {
            category: format!("cat{}", rng.random_range(0..CATEGORIES)),
            popularity: rng.random::<f32>(),
            price: rng.random_range(1..500) as f64,
        })
        .collect()
}

fn searcher(products: &[Product]) -> Result<IndexSearcher> {
    let mut segments = Vec::new();
    for chunk in products.chunks(SEGMENT_SIZE) {
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

/// Categories ranked by their most popular product, each with its products
/// in relevance order. Ties go to the lower document id.
fn expected_groups(products: &[Product]) -> Vec<(String, Vec<DocId>)> {
    let mut ranked: Vec<DocId> = (0..products.len() as DocId).collect();
    ranked.sort_by(|&a, &b| {
        products[b as usize]
            .popularity
            .total_cmp(&products[a as usize].popularity)
            .then(a.cmp(&b))
    });

    let mut groups: Vec<(String, Vec<DocId>)> = Vec::new();
    for doc in ranked {
        let category = &products[doc as usize].category;
        match groups.iter_mut().find(|(name, _)| name == category) {
            Some((_, members)) => members.push(doc),
            None => groups.push((category.clone(), vec![doc])),
        }
    }
    groups
}

fn grouped<'a>(response: &'a GroupedResponse, key: &str) -> &'a GroupedCommandResponse {
    match response.command(key) {
        Some(CommandResponse::Grouped(grouped)) => grouped,
        other => panic!("expected a grouped result for {key}, got {other:?}"),
    }
}

fn doc_ids(slice: &DocSlice) -> Vec<DocId> {
    slice.docs.iter().map(|hit| hit.doc).collect()
}

#[test]
fn test_group_page_by_relevance() -> Result<()> {
    let products = catalog();
    let searcher = searcher(&products)?;
    let query = popularity();
    let expected = expected_groups(&products);
    assert_eq!(expected.len(), CATEGORIES);

    let mut grouping = Grouping::new(&searcher, &query, GroupingConfig::default());
    grouping.add_command(FieldCommand::field(
        GroupParams::new("category")
            .with_offset(2)
            .with_docs_per_group(2)
            .with_group_count(true),
        "category",
    ));
    let response = grouping.execute()?;
    let result = grouped(&response, "category");

    assert_eq!(result.matches, DOCS as u64);
    assert_eq!(result.ngroups, Some(CATEGORIES));
    assert_eq!(result.groups.len(), 3);
    for (group, (name, members)) in result.groups.iter().zip(expected.iter().skip(2)) {
        assert_eq!(group.group_value, json!(name));
        assert_eq!(doc_ids(&group.doc_list), members[..2].to_vec());
        assert_eq!(group.doc_list.num_found, members.len() as u64);

        let scores: Vec<f32> = group.doc_list.docs.iter().filter_map(|hit| hit.score).collect();
        assert_eq!(scores.len(), 2);
        assert!(scores[0] >= scores[1]);
        assert_eq!(group.doc_list.max_score, Some(scores[0]));
    }
    Ok(())
}

#[test]
fn test_offset_near_the_last_group() -> Result<()> {
    let products = catalog();
    let searcher = searcher(&products)?;
    let query = popularity();
    let expected = expected_groups(&products);

    for (offset, returned) in [(3, 2), (4, 1), (5, 0), (7, 0)] {
        let mut grouping = Grouping::new(&searcher, &query, GroupingConfig::default());
        grouping.add_command(FieldCommand::field(
            GroupParams::new("category").with_offset(offset),
            "category",
        ));
        let response = grouping.execute()?;
        let result = grouped(&response, "category");

        assert_eq!(result.groups.len(), returned, "offset {offset}");
        // Hits are counted even when no group is left to return.
        assert_eq!(result.matches, DOCS as u64);
        for (group, (name, members)) in result.groups.iter().zip(expected.iter().skip(offset)) {
            assert_eq!(group.group_value, json!(name));
            assert_eq!(doc_ids(&group.doc_list), vec![members[0]]);
        }
    }
    Ok(())
}

#[test]
fn test_main_command_pages_over_documents() -> Result<()> {
    let products = catalog();
    let searcher = searcher(&products)?;
    let query = popularity();
    let flattened: Vec<DocId> = expected_groups(&products)
        .iter()
        .flat_map(|(_, members)| members.iter().take(3).copied())
        .collect();

    let config = GroupingConfig::default()
        .with_main_command(0)
        .with_doc_list(true);
    let mut grouping = Grouping::new(&searcher, &query, config);
    grouping.add_command(FieldCommand::field(
        GroupParams::new("category")
            .with_offset(5)
            .with_limit(4)
            .with_docs_per_group(3),
        "category",
    ));
    let response = grouping.execute()?;

    assert!(response.commands.is_empty());
    let Some(CommandResponse::Simple(main)) = response.main.as_ref().map(|main| &main.response)
    else {
        panic!("main result must be flat: {:?}", response.main);
    };
    assert_eq!(main.matches, DOCS as u64);
    assert_eq!(main.doc_list.num_found, DOCS as u64);
    assert_eq!(main.doc_list.offset, 5);
    assert_eq!(doc_ids(&main.doc_list), flattened[5..9].to_vec());
    assert_eq!(response.doc_list, Some(flattened[5..9].to_vec()));
    Ok(())
}

#[test]
fn test_function_and_query_commands() -> Result<()> {
    let products = catalog();
    let searcher = searcher(&products)?;
    let query = popularity();
    let by_price = Sort::new(vec![SortField::new("price", SortFieldType::Double)]);

    let mut grouping = Grouping::new(&searcher, &query, GroupingConfig::default().with_cache_percentage(100));
    grouping
        .add_command(FunctionCommand::function(
            GroupParams::new("price_bucket")
                .with_group_sort(by_price.clone())
                .with_within_group_sort(by_price.clone())
                .with_group_count(true),
            Arc::new(BucketValueSource::new(
                Arc::new(FieldValueSource::new("price")),
                100.0,
            )),
        ))
        .add_command(QueryCommand::new(
            GroupParams::new("cat1").with_docs_per_group(2),
            Box::new(TermQuery::new("category", "cat1")),
        ));
    let response = grouping.execute()?;

    let buckets = grouped(&response, "price_bucket");
    assert_eq!(buckets.ngroups, Some(5));
    let values: Vec<serde_json::Value> =
        buckets.groups.iter().map(|group| group.group_value.clone()).collect();
    assert_eq!(values, vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
    let cheapest = buckets.groups[0].doc_list.docs[0].doc;
    let min_price = products.iter().map(|p| p.price).fold(f64::INFINITY, f64::min);
    assert_eq!(products[cheapest as usize].price, min_price);

    let cat1 = grouped(&response, "cat1");
    let members = expected_groups(&products)
        .into_iter()
        .find(|(name, _)| name == "cat1")
        .map(|(_, members)| members)
        .unwrap_or_default();
    assert_eq!(cat1.matches, DOCS as u64);
    assert_eq!(cat1.groups.len(), 1);
    assert_eq!(cat1.groups[0].group_value, json!("category:cat1"));
    assert_eq!(cat1.groups[0].doc_list.num_found, members.len() as u64);
    assert_eq!(doc_ids(&cat1.groups[0].doc_list), members[..2].to_vec());
    Ok(())
}

#[test]
fn test_filter_and_group_heads() -> Result<()> {
    let products = catalog();
    let searcher = searcher(&products)?;
    let query = popularity();
    let filter = QueryFilter::new(Box::new(TermQuery::new("category", "cat0")));

    let config = GroupingConfig::default()
        .with_doc_set(true)
        .with_group_heads_doc_set(true);
    let mut grouping = Grouping::new(&searcher, &query, config).with_filter(&filter);
    grouping.add_command(FieldCommand::field(
        GroupParams::new("category").with_group_count(true),
        "category",
    ));
    let response = grouping.execute()?;

    let result = grouped(&response, "category");
    let in_category = products.iter().filter(|p| p.category == "cat0").count();
    assert_eq!(result.matches, in_category as u64);
    assert_eq!(result.ngroups, Some(1));

    // The head of the only group is its most popular product.
    let heads: Vec<DocId> = response
        .doc_set
        .as_ref()
        .map(|set| set.iter().collect())
        .unwrap_or_default();
    assert_eq!(heads, vec![result.groups[0].doc_list.docs[0].doc]);
    Ok(())
}

/// Expires a deadline when the scan moves past its first `after` matches.
#[derive(Debug, Clone)]
struct ExpiringQuery {
    inner: FunctionQuery,
    deadline: Deadline,
    after: usize,
}

impl Query for ExpiringQuery {
    fn create_weight(&self, reader: &IndexReader, needs_scores: bool) -> Result<Box<dyn Weight>> {
        Ok(Box::new(ExpiringWeight {
            inner: self.inner.create_weight(reader, needs_scores)?,
            deadline: self.deadline.clone(),
            after: self.after,
            seen: Arc::new(AtomicUsize::new(0)),
        }))
    }

    fn boost(&self) -> f32 {
        self.inner.boost()
    }

    fn set_boost(&mut self, boost: f32) {
        self.inner.set_boost(boost);
    }

    fn description(&self) -> String {
        format!("expiring({})", self.inner.description())
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }
}

#[derive(Debug)]
struct ExpiringWeight {
    inner: Box<dyn Weight>,
    deadline: Deadline,
    after: usize,
    seen: Arc<AtomicUsize>,
}

impl Weight for ExpiringWeight {
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>> {
        Ok(self.inner.scorer(leaf)?.map(|inner| {
            Box::new(ExpiringScorer {
                inner,
                deadline: self.deadline.clone(),
                after: self.after,
                seen: Arc::clone(&self.seen),
            }) as Box<dyn Scorer>
        }))
    }
}

#[derive(Debug)]
struct ExpiringScorer {
    inner: Box<dyn Scorer>,
    deadline: Deadline,
    after: usize,
    seen: Arc<AtomicUsize>,
}

impl Matcher for ExpiringScorer {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        let more = self.inner.next()?;
        if more && self.seen.fetch_add(1, Ordering::SeqCst) >= self.after {
            self.deadline.expire();
        }
        Ok(more)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.inner.skip_to(target)
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }

    fn is_exhausted(&self) -> bool {
        self.inner.is_exhausted()
    }
}

impl Scorer for ExpiringScorer {
    fn score(&mut self) -> Result<f32> {
        self.inner.score()
    }

    fn max_score(&self) -> f32 {
        self.inner.max_score()
    }

    fn name(&self) -> &'static str {
        "Expiring"
    }
}

fn category_command() -> FieldCommand {
    FieldCommand::field(
        GroupParams::new("category")
            .with_docs_per_group(3)
            .with_group_count(true),
        "category",
    )
}

#[test]
fn test_timeout_returns_what_was_scanned() -> Result<()> {
    let products = catalog();
    let searcher = searcher(&products)?;
    let config = GroupingConfig::default()
        .with_cache_percentage(100)
        .with_doc_list(true);

    // Crosses a segment boundary.
    let scanned = 437;
    let deadline = Deadline::unbounded();
    let expiring = ExpiringQuery {
        inner: popularity(),
        deadline: deadline.clone(),
        after: scanned,
    };
    let mut grouping =
        Grouping::new(&searcher, &expiring, config.clone()).with_deadline(deadline);
    grouping.add_command(category_command());
    let partial = grouping.execute()?;

    let query = popularity();
    let first_docs = DocSetFilter::new(Arc::new(DocSet::from_docs(
        DOCS as DocId,
        0..scanned as DocId,
    )));
    let mut grouping = Grouping::new(&searcher, &query, config).with_filter(&first_docs);
    grouping.add_command(category_command());
    let filtered = grouping.execute()?;

    assert!(partial.partial_results);
    assert!(!partial.cache_overflow);
    assert!(!filtered.partial_results);
    assert_eq!(grouped(&partial, "category").matches, scanned as u64);
    assert_eq!(partial.commands, filtered.commands);
    assert_eq!(partial.doc_list, filtered.doc_list);
    Ok(())
}

#[test]
fn test_timeout_without_cache_skips_second_scan() -> Result<()> {
    let products = catalog();
    let searcher = searcher(&products)?;
    let deadline = Deadline::unbounded();
    let expiring = ExpiringQuery {
        inner: popularity(),
        deadline: deadline.clone(),
        after: 100,
    };

    let mut grouping = Grouping::new(&searcher, &expiring, GroupingConfig::default())
        .with_deadline(deadline);
    grouping.add_command(category_command());
    let response = grouping.execute()?;

    assert!(response.partial_results);
    assert!(!response.cache_overflow);
    let result = grouped(&response, "category");
    assert!(!result.groups.is_empty());
    assert!(result.groups.iter().all(|group| group.doc_list.docs.is_empty()));
    Ok(())
}
