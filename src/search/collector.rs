//! Collector implementations for gathering search results.
//!
//! A collector receives the matches of one segment at a time. Before the
//! first document of a segment, [`Collector::set_next_reader`] binds the
//! segment; [`Collector::collect`] then receives segment-local ids in
//! ascending order together with a lazily evaluated score.

pub mod caching;
pub mod filter;
pub mod multi;
pub mod time_limit;
pub mod top_docs;

use std::any::Any;
use std::fmt::Debug;

use crate::error::{PhalanxError, Result};
use crate::index::{DocId, DocSet, LeafReaderContext};
use crate::query::scorer::ScoreSource;

pub use caching::{CacheBudget, CachingCollector};
pub use filter::{CollectFilter, FilterCollector, PostFilter, ScoreThresholdFilter};
pub use multi::MultiCollector;
pub use time_limit::{Deadline, TimeLimitingCollector};
pub use top_docs::{TopFieldCollector, TopScoreDocCollector};

/// Trait for collecting search results.
pub trait Collector: Send + Debug {
    /// Bind the segment whose documents are delivered next.
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()>;

    /// Collect a segment-local document.
    fn collect(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<()>;

    /// Whether this collector will ask for scores.
    fn needs_scores(&self) -> bool;

    /// Convert into `Any` to recover the concrete collector after a scan.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Recover a concrete collector from a boxed one.
pub fn downcast_collector<T: Collector + 'static>(collector: Box<dyn Collector>) -> Result<Box<T>> {
    collector.into_any().downcast::<T>().map_err(|_| {
        PhalanxError::internal(format!(
            "collector is not a {}",
            std::any::type_name::<T>()
        ))
    })
}

/// A collector that just counts the number of matching documents.
#[derive(Debug, Default)]
pub struct TotalHitCountCollector {
    /// Total number of documents that matched.
    count: u64,
}

impl TotalHitCountCollector {
    /// Create a new count collector.
    pub fn new() -> Self {
        TotalHitCountCollector { count: 0 }
    }

    /// Number of documents collected.
    pub fn total_hits(&self) -> u64 {
        self.count
    }
}

impl Collector for TotalHitCountCollector {
    fn set_next_reader(&mut self, _leaf: &LeafReaderContext) -> Result<()> {
        Ok(())
    }

    fn collect(&mut self, _doc: DocId, _scorer: &mut dyn ScoreSource) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        false
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Collects the global ids of every match into a [`DocSet`].
#[derive(Debug)]
pub struct DocSetCollector {
    docs: DocSet,
    doc_base: DocId,
}

impl DocSetCollector {
    /// Create a collector for an index of `max_doc` documents.
    pub fn new(max_doc: DocId) -> Self {
        DocSetCollector {
            docs: DocSet::with_max_doc(max_doc),
            doc_base: 0,
        }
    }

    /// Documents collected so far.
    pub fn doc_set(&self) -> &DocSet {
        &self.docs
    }

    /// Take the collected set.
    pub fn into_doc_set(self) -> DocSet {
        self.docs
    }
}

impl Collector for DocSetCollector {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        self.doc_base = leaf.doc_base;
        Ok(())
    }

    fn collect(&mut self, doc: DocId, _scorer: &mut dyn ScoreSource) -> Result<()> {
        self.docs.insert(self.doc_base + doc);
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        false
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
