//! Index searcher: drives a query over the segments of an index and feeds
//! the matches to collectors, optionally spreading flat top-K searches over
//! a thread pool.

use std::cell::Cell;
use std::cmp::Ordering;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{PhalanxError, Result};
use crate::index::{DocSet, IndexReader, LeafReaderContext};
use crate::query::filter::Filter;
use crate::query::query::{Query, Weight};
use crate::query::scorer::ScorerScoreSource;
use crate::search::collector::{
    Collector, DocSetCollector, TopFieldCollector, TopScoreDocCollector,
};
use crate::search::score_doc::{FieldDoc, ScoreDoc, TopDocs, TopFieldDocs, max_of};
use crate::search::sort::Sort;
use crate::util::PriorityQueue;

/// Configuration for the searcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearcherConfig {
    /// Thread pool size for parallel execution.
    /// If None, uses the number of CPU cores.
    pub thread_pool_size: Option<usize>,

    /// A slice stops growing once it holds more documents than this.
    pub max_docs_per_slice: u64,

    /// A slice stops growing once it holds more segments than this.
    pub max_segments_per_slice: usize,

    /// Whether top-K searches use the thread pool when there is more than one slice.
    pub parallel: bool,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: None,
            max_docs_per_slice: 250_000,
            max_segments_per_slice: 1,
            parallel: true,
        }
    }
}

/// The segments scanned by one worker.
#[derive(Debug, Clone)]
pub struct LeafSlice {
    leaves: Vec<LeafReaderContext>,
}

impl LeafSlice {
    /// Segments of the slice, in index order.
    pub fn leaves(&self) -> &[LeafReaderContext] {
        &self.leaves
    }

    /// Number of documents in the slice.
    pub fn max_doc(&self) -> u64 {
        self.leaves.iter().map(|leaf| leaf.max_doc() as u64).sum()
    }
}

/// Partition segments into slices.
///
/// Segments are visited largest first. A segment larger than
/// `max_docs_per_slice` gets a slice of its own; smaller ones are grouped
/// until a slice exceeds either bound. There are never more slices than
/// segments.
pub fn slices(
    leaves: &[LeafReaderContext],
    max_docs_per_slice: u64,
    max_segments_per_slice: usize,
) -> Vec<LeafSlice> {
    let mut sorted: Vec<&LeafReaderContext> = leaves.iter().collect();
    sorted.sort_by(|a, b| b.max_doc().cmp(&a.max_doc()).then(a.ord.cmp(&b.ord)));

    let mut groups: Vec<Vec<LeafReaderContext>> = Vec::new();
    let mut current: Vec<LeafReaderContext> = Vec::new();
    let mut doc_count = 0u64;

    for leaf in sorted {
        if leaf.max_doc() as u64 > max_docs_per_slice {
            groups.push(vec![leaf.clone()]);
            continue;
        }
        current.push(leaf.clone());
        doc_count += leaf.max_doc() as u64;
        if current.len() >= max_segments_per_slice.max(1) || doc_count > max_docs_per_slice {
            groups.push(std::mem::take(&mut current));
            doc_count = 0;
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
        .into_iter()
        .map(|mut leaves| {
            leaves.sort_by_key(|leaf| leaf.ord);
            LeafSlice { leaves }
        })
        .collect()
}

#[derive(Debug)]
struct MergeState<T> {
    queue: PriorityQueue<T>,
    total_hits: u64,
    max_score: Option<f32>,
    error: Option<PhalanxError>,
}

impl<T> MergeState<T> {
    fn new(num_hits: usize) -> Self {
        MergeState {
            queue: PriorityQueue::new(num_hits),
            total_hits: 0,
            max_score: None,
            error: None,
        }
    }
}

/// Runs queries against an [`IndexReader`].
#[derive(Debug)]
pub struct IndexSearcher {
    reader: IndexReader,
    config: SearcherConfig,
    slices: Vec<LeafSlice>,
    thread_pool: Option<Arc<ThreadPool>>,
}

impl IndexSearcher {
    /// Create a searcher that scans every segment on the calling thread.
    pub fn new(reader: IndexReader) -> Self {
        let config = SearcherConfig {
            parallel: false,
            ..SearcherConfig::default()
        };
        let slices = slices(
            reader.leaves(),
            config.max_docs_per_slice,
            config.max_segments_per_slice,
        );
        IndexSearcher {
            reader,
            config,
            slices,
            thread_pool: None,
        }
    }

    /// Create a searcher with its own thread pool for top-K searches.
    pub fn with_executor(reader: IndexReader, config: SearcherConfig) -> Result<Self> {
        let thread_pool_size = config.thread_pool_size.unwrap_or_else(num_cpus::get).max(1);

        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(thread_pool_size)
            .thread_name(|i| format!("phalanx-search-{i}"))
            .build()
            .map_err(|e| PhalanxError::thread_pool(format!("Failed to create thread pool: {e}")))?;

        let slices = slices(
            reader.leaves(),
            config.max_docs_per_slice,
            config.max_segments_per_slice,
        );
        debug!(
            "searcher over {} segments in {} slices, {thread_pool_size} threads",
            reader.leaves().len(),
            slices.len()
        );

        Ok(Self {
            reader,
            config,
            slices,
            thread_pool: Some(Arc::new(thread_pool)),
        })
    }

    /// The searched reader.
    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    /// The searcher configuration.
    pub fn config(&self) -> &SearcherConfig {
        &self.config
    }

    /// Segment partitions used by parallel searches.
    pub fn slices(&self) -> &[LeafSlice] {
        &self.slices
    }

    /// Feed every match of `query` accepted by `filter` to `collector`,
    /// segment by segment in index order.
    pub fn search(
        &self,
        query: &dyn Query,
        filter: Option<&dyn Filter>,
        collector: &mut dyn Collector,
    ) -> Result<()> {
        let weight = query.create_weight(&self.reader, collector.needs_scores())?;
        for leaf in self.reader.leaves() {
            search_leaf(&self.reader, weight.as_ref(), filter, leaf, collector)?;
        }
        Ok(())
    }

    /// Global ids of every match.
    pub fn doc_set(&self, query: &dyn Query, filter: Option<&dyn Filter>) -> Result<DocSet> {
        let mut collector = DocSetCollector::new(self.reader.max_doc());
        self.search(query, filter, &mut collector)?;
        Ok(collector.into_doc_set())
    }

    /// Best `num_hits` matches by relevance.
    pub fn search_top_docs(
        &self,
        query: &dyn Query,
        filter: Option<&dyn Filter>,
        num_hits: usize,
    ) -> Result<TopDocs> {
        let num_hits = num_hits.min(self.reader.max_doc() as usize);
        let Some(pool) = self.parallel_pool() else {
            let mut collector = TopScoreDocCollector::new(num_hits);
            self.search(query, filter, &mut collector)?;
            return Ok(collector.top_docs());
        };

        let weight = query.create_weight(&self.reader, true)?;
        let state = Mutex::new(MergeState::<ScoreDoc>::new(num_hits));
        self.run_slices(pool, |slice| {
            let mut collector = TopScoreDocCollector::new(num_hits);
            let result = slice.leaves().iter().try_for_each(|leaf| {
                search_leaf(&self.reader, weight.as_ref(), filter, leaf, &mut collector)
            });

            let mut state = state.lock();
            if let Err(err) = result {
                state.error.get_or_insert(err);
                return;
            }
            let top = collector.top_docs();
            state.total_hits += top.total_hits;
            state.max_score = max_of(state.max_score, top.max_score);
            for hit in top.score_docs {
                state.queue.insert_with_overflow(hit, score_doc_worse);
            }
        });

        let state = state.into_inner();
        if let Some(err) = state.error {
            return Err(err);
        }
        let mut score_docs = state.queue.into_sorted_vec(score_doc_worse);
        score_docs.reverse();
        Ok(TopDocs {
            total_hits: state.total_hits,
            score_docs,
            max_score: state.max_score,
        })
    }

    /// Best `num_hits` matches by `sort`, with scores tracked.
    pub fn search_top_field_docs(
        &self,
        query: &dyn Query,
        filter: Option<&dyn Filter>,
        num_hits: usize,
        sort: &Sort,
    ) -> Result<TopFieldDocs> {
        sort.validate(&self.reader)?;
        let num_hits = num_hits.min(self.reader.max_doc() as usize);
        let Some(pool) = self.parallel_pool() else {
            let mut collector = TopFieldCollector::new(sort.clone(), num_hits, true, true)?;
            self.search(query, filter, &mut collector)?;
            return Ok(collector.top_docs());
        };

        let weight = query.create_weight(&self.reader, true)?;
        let state = Mutex::new(MergeState::<FieldDoc>::new(num_hits));
        self.run_slices(pool, |slice| {
            let result = TopFieldCollector::new(sort.clone(), num_hits, true, true).and_then(
                |mut collector| {
                    slice.leaves().iter().try_for_each(|leaf| {
                        search_leaf(&self.reader, weight.as_ref(), filter, leaf, &mut collector)
                    })?;
                    Ok(collector.top_docs())
                },
            );

            let mut state = state.lock();
            match result {
                Ok(top) => {
                    state.total_hits += top.total_hits;
                    state.max_score = max_of(state.max_score, top.max_score);
                    let failure = Cell::new(None);
                    for hit in top.field_docs {
                        state
                            .queue
                            .insert_with_overflow(hit, |a, b| field_doc_worse(sort, a, b, &failure));
                    }
                    if let Some(err) = failure.take() {
                        state.error.get_or_insert(err);
                    }
                }
                Err(err) => {
                    state.error.get_or_insert(err);
                }
            }
        });

        let state = state.into_inner();
        if let Some(err) = state.error {
            return Err(err);
        }
        let failure = Cell::new(None);
        let mut field_docs = state
            .queue
            .into_sorted_vec(|a, b| field_doc_worse(sort, a, b, &failure));
        if let Some(err) = failure.take() {
            return Err(err);
        }
        field_docs.reverse();
        Ok(TopFieldDocs {
            total_hits: state.total_hits,
            field_docs,
            sort: sort.clone(),
            max_score: state.max_score,
        })
    }

    fn parallel_pool(&self) -> Option<&ThreadPool> {
        match &self.thread_pool {
            Some(pool) if self.config.parallel && self.slices.len() > 1 => Some(pool.as_ref()),
            _ => None,
        }
    }

    fn run_slices<F>(&self, pool: &ThreadPool, task: F)
    where
        F: Fn(&LeafSlice) + Sync,
    {
        debug!("searching {} slices in parallel", self.slices.len());
        let task = &task;
        pool.scope(|scope| {
            for slice in &self.slices {
                scope.spawn(move |_| task(slice));
            }
        });
    }
}

/// Scan one segment into a collector.
fn search_leaf(
    reader: &IndexReader,
    weight: &dyn Weight,
    filter: Option<&dyn Filter>,
    leaf: &LeafReaderContext,
    collector: &mut dyn Collector,
) -> Result<()> {
    let Some(mut scorer) = weight.scorer(leaf)? else {
        return Ok(());
    };
    let accepted = match filter {
        Some(filter) => match filter.doc_set(reader, leaf)? {
            Some(bits) => Some(bits),
            None => return Ok(()),
        },
        None => None,
    };

    collector.set_next_reader(leaf)?;
    while scorer.next()? {
        let doc = scorer.doc_id();
        if let Some(bits) = &accepted {
            if !bits.get(doc as usize).unwrap_or(false) {
                continue;
            }
        }
        collector.collect(doc, &mut ScorerScoreSource::new(scorer.as_mut()))?;
    }
    Ok(())
}

fn score_doc_worse(a: &ScoreDoc, b: &ScoreDoc) -> bool {
    a.score
        .total_cmp(&b.score)
        .then_with(|| b.doc.cmp(&a.doc))
        == Ordering::Less
}

/// Whether `a` ranks after `b`. A failed comparison is left in `failure`.
fn field_doc_worse(
    sort: &Sort,
    a: &FieldDoc,
    b: &FieldDoc,
    failure: &Cell<Option<PhalanxError>>,
) -> bool {
    match sort.compare_values(&a.fields, &b.fields) {
        Ok(ord) => ord.then_with(|| a.doc.cmp(&b.doc)) == Ordering::Greater,
        Err(err) => {
            failure.set(Some(err));
            false
        }
    }
}
