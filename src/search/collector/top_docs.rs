//! Bounded top-K collectors.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::index::{DocId, LeafReaderContext};
use crate::query::scorer::ScoreSource;
use crate::search::collector::Collector;
use crate::search::comparator::SortComparator;
use crate::search::score_doc::{FieldDoc, ScoreDoc, TopDocs, TopFieldDocs};
use crate::search::sort::Sort;
use crate::util::PriorityQueue;

/// A collector that keeps the top N documents by score.
///
/// Ties are won by the lower document id.
#[derive(Debug)]
pub struct TopScoreDocCollector {
    /// Maximum number of documents to collect.
    max_docs: usize,
    /// Collected hits; the weakest hit is on top.
    hits: BinaryHeap<ScoredDoc>,
    /// Total number of documents processed.
    total_hits: u64,
    max_score: Option<f32>,
    doc_base: DocId,
}

/// A scored document for use in the heap.
#[derive(Debug, Clone, Copy)]
struct ScoredDoc {
    doc: DocId,
    score: f32,
}

impl PartialEq for ScoredDoc {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredDoc {}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredDoc {
    fn cmp(&self, other: &Self) -> Ordering {
        // Greater means weaker: lower score, then higher doc id.
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.doc.cmp(&other.doc))
    }
}

impl TopScoreDocCollector {
    /// Create a new top docs collector.
    pub fn new(max_docs: usize) -> Self {
        TopScoreDocCollector {
            max_docs,
            hits: BinaryHeap::with_capacity(max_docs.min(1024) + 1),
            total_hits: 0,
            max_score: None,
            doc_base: 0,
        }
    }

    /// Get the maximum number of documents to collect.
    pub fn max_docs(&self) -> usize {
        self.max_docs
    }

    /// Total number of documents processed.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Best hits, best first.
    pub fn top_docs(&self) -> TopDocs {
        self.top_docs_range(0, self.max_docs)
    }

    /// Hits ranked `start..start + howmany`, best first.
    pub fn top_docs_range(&self, start: usize, howmany: usize) -> TopDocs {
        let mut hits: Vec<ScoredDoc> = self.hits.iter().copied().collect();
        hits.sort();
        TopDocs {
            total_hits: self.total_hits,
            score_docs: hits
                .into_iter()
                .skip(start)
                .take(howmany)
                .map(|hit| ScoreDoc::new(hit.doc, hit.score))
                .collect(),
            max_score: self.max_score,
        }
    }
}

impl Collector for TopScoreDocCollector {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.doc_base = leaf.doc_base;
        Ok(())
    }

    fn collect(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<()> {
        self.total_hits += 1;
        let score = scorer.score()?;
        self.max_score = Some(self.max_score.map_or(score, |max| max.max(score)));

        let scored_doc = ScoredDoc {
            doc: self.doc_base + doc,
            score,
        };

        if self.hits.len() < self.max_docs {
            // We have space, just add it
            self.hits.push(scored_doc);
        } else if let Some(mut worst) = self.hits.peek_mut() {
            if scored_doc < *worst {
                *worst = scored_doc;
            }
        }

        Ok(())
    }

    fn needs_scores(&self) -> bool {
        true
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    slot: usize,
    doc: DocId,
    score: f32,
}

/// Keeps the top N documents by a [`Sort`].
///
/// Every returned [`FieldDoc`] carries its sort values so results can be
/// merged across shards.
#[derive(Debug)]
pub struct TopFieldCollector {
    sort: Sort,
    num_hits: usize,
    comparator: SortComparator,
    queue: PriorityQueue<Entry>,
    track_scores: bool,
    track_max_score: bool,
    needs_scores: bool,
    total_hits: u64,
    max_score: Option<f32>,
    doc_base: DocId,
}

impl TopFieldCollector {
    /// Create a collector keeping `num_hits` documents.
    ///
    /// `track_scores` fills [`FieldDoc::score`] even when the sort does not
    /// use scores; `track_max_score` records the highest score seen.
    pub fn new(sort: Sort, num_hits: usize, track_scores: bool, track_max_score: bool) -> Result<Self> {
        let comparator = SortComparator::new(&sort, num_hits)?;
        let needs_scores = sort.needs_scores() || track_scores || track_max_score;
        Ok(TopFieldCollector {
            sort,
            num_hits,
            comparator,
            queue: PriorityQueue::new(num_hits),
            track_scores,
            track_max_score,
            needs_scores,
            total_hits: 0,
            max_score: None,
            doc_base: 0,
        })
    }

    /// The sort of this collector.
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Total number of documents processed.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Best hits, best first.
    pub fn top_docs(&self) -> TopFieldDocs {
        self.top_docs_range(0, self.num_hits)
    }

    /// Hits ranked `start..start + howmany`, best first.
    pub fn top_docs_range(&self, start: usize, howmany: usize) -> TopFieldDocs {
        let mut entries: Vec<Entry> = self.queue.iter().copied().collect();
        entries.sort_by(|a, b| self.rank(a, b));

        let field_docs = entries
            .into_iter()
            .skip(start)
            .take(howmany)
            .map(|entry| {
                let score = if self.track_scores || self.sort.needs_scores() {
                    entry.score
                } else {
                    f32::NAN
                };
                FieldDoc::new(entry.doc, score, self.comparator.values(entry.slot))
            })
            .collect();

        TopFieldDocs {
            total_hits: self.total_hits,
            field_docs,
            sort: self.sort.clone(),
            max_score: self.max_score,
        }
    }

    fn rank(&self, a: &Entry, b: &Entry) -> Ordering {
        self.comparator
            .compare(a.slot, b.slot)
            .then_with(|| a.doc.cmp(&b.doc))
    }
}

impl Collector for TopFieldCollector {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.doc_base = leaf.doc_base;
        self.comparator.set_next_reader(leaf)
    }

    fn collect(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<()> {
        self.total_hits += 1;
        let score = if self.needs_scores {
            scorer.score()?
        } else {
            f32::NAN
        };
        if self.track_max_score {
            self.max_score = Some(self.max_score.map_or(score, |max| max.max(score)));
        }
        if self.num_hits == 0 {
            return Ok(());
        }

        let global = self.doc_base + doc;
        let comparator = &mut self.comparator;
        if self.queue.is_full() {
            // Documents arrive in ascending order, so a tie with the bottom loses.
            if comparator.compare_bottom(doc, score) != Ordering::Greater {
                return Ok(());
            }
            let Some(bottom) = self.queue.top_mut() else {
                return Ok(());
            };
            comparator.copy(bottom.slot, doc, score);
            bottom.doc = global;
            bottom.score = score;
            self.queue.update_top(|a, b| worse(&*comparator, a, b));
        } else {
            let slot = self.queue.len();
            comparator.copy(slot, doc, score);
            self.queue.push(
                Entry {
                    slot,
                    doc: global,
                    score,
                },
                |a, b| worse(&*comparator, a, b),
            );
        }

        if self.queue.is_full() {
            if let Some(bottom) = self.queue.top() {
                comparator.set_bottom(bottom.slot);
            }
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

fn worse(comparator: &SortComparator, a: &Entry, b: &Entry) -> bool {
    comparator
        .compare(a.slot, b.slot)
        .then_with(|| a.doc.cmp(&b.doc))
        == Ordering::Greater
}
