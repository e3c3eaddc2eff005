//! Collector decorators that drop documents before they reach the wrapped
//! collector.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use bit_vec::BitVec;

use crate::error::Result;
use crate::index::{DocId, DocSet, LeafReaderContext};
use crate::query::scorer::{CachedScore, ScoreSource};
use crate::search::collector::Collector;

/// A dynamic per-document acceptance test.
pub trait PostFilter: Send + Debug {
    /// Bind the segment whose documents are tested next.
    fn set_next_reader(&mut self, _leaf: &LeafReaderContext) -> Result<()> {
        Ok(())
    }

    /// Whether a segment-local document passes.
    fn accept(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<bool>;
}

/// Accepts documents scoring at least a threshold.
#[derive(Debug, Clone, Copy)]
pub struct ScoreThresholdFilter {
    min_score: f32,
}

impl ScoreThresholdFilter {
    /// Create a filter with a minimum score.
    pub fn new(min_score: f32) -> Self {
        ScoreThresholdFilter { min_score }
    }
}

impl PostFilter for ScoreThresholdFilter {
    fn accept(&mut self, _doc: DocId, scorer: &mut dyn ScoreSource) -> Result<bool> {
        Ok(scorer.score()? >= self.min_score)
    }
}

/// What a [`FilterCollector`] accepts.
#[derive(Debug)]
pub enum CollectFilter {
    /// A fixed set of global document ids.
    DocSet(Arc<DocSet>),
    /// A test evaluated per document.
    Post(Box<dyn PostFilter>),
}

/// Forwards only accepted documents to the wrapped collector.
#[derive(Debug)]
pub struct FilterCollector {
    inner: Box<dyn Collector>,
    filter: CollectFilter,
    leaf_bits: Option<BitVec>,
}

impl FilterCollector {
    /// Wrap a collector.
    pub fn new(inner: Box<dyn Collector>, filter: CollectFilter) -> Self {
        FilterCollector {
            inner,
            filter,
            leaf_bits: None,
        }
    }

    /// Unwrap the filtered collector.
    pub fn into_inner(self) -> Box<dyn Collector> {
        self.inner
    }
}

impl Collector for FilterCollector {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        match &mut self.filter {
            CollectFilter::DocSet(docs) => self.leaf_bits = Some(docs.leaf_bits(leaf)),
            CollectFilter::Post(filter) => filter.set_next_reader(leaf)?,
        }
        self.inner.set_next_reader(leaf)
    }

    fn collect(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<()> {
        let mut score = CachedScore::new(scorer);
        let accepted = match &mut self.filter {
            CollectFilter::DocSet(_) => self
                .leaf_bits
                .as_ref()
                .and_then(|bits| bits.get(doc as usize))
                .unwrap_or(false),
            CollectFilter::Post(filter) => filter.accept(doc, &mut score)?,
        };
        if accepted {
            self.inner.collect(doc, &mut score)?;
        }
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        self.inner.needs_scores() || matches!(self.filter, CollectFilter::Post(_))
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FieldValue, IndexReader, SegmentBuilder};
    use crate::query::scorer::FixedScore;
    use crate::search::collector::{TotalHitCountCollector, downcast_collector};

    fn reader() -> Result<IndexReader> {
        let mut segments = Vec::new();
        for size in [3, 3] {
            let mut builder = SegmentBuilder::new();
            for _ in 0..size {
                builder.add_document([("category", FieldValue::from("a"))])?;
            }
            segments.push(builder.build());
        }
        Ok(IndexReader::from_segments(segments))
    }

    #[test]
    fn test_doc_set_filter() -> Result<()> {
        let reader = reader()?;
        let docs = Arc::new(DocSet::from_docs(reader.max_doc(), [0, 4, 5]));
        let mut collector = FilterCollector::new(
            Box::new(TotalHitCountCollector::new()),
            CollectFilter::DocSet(docs),
        );
        for leaf in reader.leaves() {
            collector.set_next_reader(leaf)?;
            for doc in 0..leaf.max_doc() {
                collector.collect(doc, &mut FixedScore(1.0))?;
            }
        }

        let count = downcast_collector::<TotalHitCountCollector>(collector.into_inner())?;
        assert_eq!(count.total_hits(), 3);
        Ok(())
    }

    #[test]
    fn test_score_threshold() -> Result<()> {
        let reader = reader()?;
        let mut collector = FilterCollector::new(
            Box::new(TotalHitCountCollector::new()),
            CollectFilter::Post(Box::new(ScoreThresholdFilter::new(0.5))),
        );
        assert!(collector.needs_scores());
        collector.set_next_reader(&reader.leaves()[0])?;
        for (doc, score) in [0.1, 0.5, 0.9].into_iter().enumerate() {
            collector.collect(doc as DocId, &mut FixedScore(score))?;
        }

        let count = downcast_collector::<TotalHitCountCollector>(collector.into_inner())?;
        assert_eq!(count.total_hits(), 2);
        Ok(())
    }
}
