//! Fan-out of one match stream into several collectors.

use std::any::Any;

use crate::error::{PhalanxError, Result};
use crate::index::{DocId, LeafReaderContext};
use crate::query::scorer::{CachedScore, ScoreSource};
use crate::search::collector::{Collector, downcast_collector};

/// Delivers every document to each child collector.
///
/// All children see a document before the call returns, even when one of
/// them fails; the first error is reported afterwards. The score of a
/// document is computed at most once no matter how many children ask.
#[derive(Debug)]
pub struct MultiCollector {
    collectors: Vec<Box<dyn Collector>>,
    needs_scores: bool,
}

impl MultiCollector {
    /// Combine collectors. A single collector is returned unwrapped.
    pub fn wrap(mut collectors: Vec<Box<dyn Collector>>) -> Result<Box<dyn Collector>> {
        match collectors.len() {
            0 => Err(PhalanxError::invalid_argument(
                "at least one collector is required",
            )),
            1 => collectors
                .pop()
                .ok_or_else(|| PhalanxError::internal("collector list is empty")),
            _ => {
                let needs_scores = collectors.iter().any(|collector| collector.needs_scores());
                Ok(Box::new(MultiCollector {
                    collectors,
                    needs_scores,
                }))
            }
        }
    }

    /// Undo [`wrap`](Self::wrap) for a wrapping of `expected` collectors,
    /// returning the children in their original order.
    pub fn split(collector: Box<dyn Collector>, expected: usize) -> Result<Vec<Box<dyn Collector>>> {
        if expected == 1 {
            return Ok(vec![collector]);
        }
        let multi = downcast_collector::<MultiCollector>(collector)?;
        if multi.collectors.len() != expected {
            return Err(PhalanxError::internal(format!(
                "expected {expected} collectors, found {}",
                multi.collectors.len()
            )));
        }
        Ok(multi.collectors)
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    /// Whether there are no children.
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl Collector for MultiCollector {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        let mut first_error = None;
        for collector in &mut self.collectors {
            if let Err(err) = collector.set_next_reader(leaf) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn collect(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<()> {
        let mut score = CachedScore::new(scorer);
        let mut first_error = None;
        for collector in &mut self.collectors {
            if let Err(err) = collector.collect(doc, &mut score) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn needs_scores(&self) -> bool {
        self.needs_scores
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FieldValue, IndexReader, SegmentBuilder};
    use crate::search::collector::{TopScoreDocCollector, TotalHitCountCollector};

    struct CountingScore {
        calls: usize,
    }

    impl ScoreSource for CountingScore {
        fn score(&mut self) -> Result<f32> {
            self.calls += 1;
            Ok(1.0)
        }
    }

    #[derive(Debug)]
    struct FailingCollector;

    impl Collector for FailingCollector {
        fn set_next_reader(&mut self, _leaf: &LeafReaderContext) -> Result<()> {
            Ok(())
        }

        fn collect(&mut self, _doc: DocId, _scorer: &mut dyn ScoreSource) -> Result<()> {
            Err(PhalanxError::internal("boom"))
        }

        fn needs_scores(&self) -> bool {
            false
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }
    }

    fn reader() -> Result<IndexReader> {
        let mut builder = SegmentBuilder::new();
        builder.add_document([("category", FieldValue::from("a"))])?;
        Ok(IndexReader::from_segments(vec![builder.build()]))
    }

    #[test]
    fn test_wrap_and_split() -> Result<()> {
        assert!(MultiCollector::wrap(Vec::new()).is_err());

        let single = MultiCollector::wrap(vec![Box::new(TotalHitCountCollector::new())])?;
        assert!(!single.needs_scores());
        let parts = MultiCollector::split(single, 1)?;
        downcast_collector::<TotalHitCountCollector>(parts.into_iter().next().unwrap())?;

        let reader = reader()?;
        let mut multi = MultiCollector::wrap(vec![
            Box::new(TopScoreDocCollector::new(5)),
            Box::new(TopScoreDocCollector::new(5)),
            Box::new(TotalHitCountCollector::new()),
        ])?;
        assert!(multi.needs_scores());

        let mut score = CountingScore { calls: 0 };
        multi.set_next_reader(&reader.leaves()[0])?;
        multi.collect(0, &mut score)?;
        assert_eq!(score.calls, 1);

        let mut parts = MultiCollector::split(multi, 3)?.into_iter();
        let top = downcast_collector::<TopScoreDocCollector>(parts.next().unwrap())?;
        assert_eq!(top.top_docs().score_docs.len(), 1);
        Ok(())
    }

    #[test]
    fn test_all_children_see_document_on_error() -> Result<()> {
        let reader = reader()?;
        let mut multi = MultiCollector::wrap(vec![
            Box::new(FailingCollector),
            Box::new(TotalHitCountCollector::new()),
        ])?;
        multi.set_next_reader(&reader.leaves()[0])?;
        assert!(multi.collect(0, &mut CountingScore { calls: 0 }).is_err());

        let parts = MultiCollector::split(multi, 2)?;
        let count = downcast_collector::<TotalHitCountCollector>(parts.into_iter().nth(1).unwrap())?;
        assert_eq!(count.total_hits(), 1);
        Ok(())
    }
}
