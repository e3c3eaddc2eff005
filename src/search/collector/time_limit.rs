//! Deadline enforcement for scans.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{PhalanxError, Result};
use crate::index::{DocId, LeafReaderContext};
use crate::query::scorer::ScoreSource;
use crate::search::collector::Collector;

#[derive(Debug)]
struct DeadlineState {
    start: Instant,
    allowed: Duration,
    expired: AtomicBool,
}

/// A time budget shared by every scan of one execution. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Deadline {
    state: Arc<DeadlineState>,
}

impl Deadline {
    /// Start a budget of `allowed` from now.
    pub fn new(allowed: Duration) -> Self {
        Deadline {
            state: Arc::new(DeadlineState {
                start: Instant::now(),
                allowed,
                expired: AtomicBool::new(false),
            }),
        }
    }

    /// A budget that only expires through [`expire`](Self::expire).
    pub fn unbounded() -> Self {
        Deadline::new(Duration::MAX)
    }

    /// The time budget.
    pub fn allowed(&self) -> Duration {
        self.state.allowed
    }

    /// Time since the budget started.
    pub fn elapsed(&self) -> Duration {
        self.state.start.elapsed()
    }

    /// Whether the budget is used up or was expired explicitly.
    pub fn is_expired(&self) -> bool {
        self.state.expired.load(Ordering::Relaxed) || self.elapsed() >= self.state.allowed
    }

    /// Expire the budget immediately.
    pub fn expire(&self) {
        self.state.expired.store(true, Ordering::Relaxed);
    }
}

/// Aborts a scan with [`PhalanxError::TimeExceeded`] once its deadline passes.
///
/// The wrapped collector keeps what it gathered before the abort. The same
/// instance serves several passes by swapping the wrapped collector with
/// [`set_collector`](Self::set_collector), so all passes share one clock.
#[derive(Debug)]
pub struct TimeLimitingCollector {
    deadline: Deadline,
    collector: Option<Box<dyn Collector>>,
    greedy: bool,
    check_interval: u32,
    ticks: u32,
    doc_base: DocId,
}

impl TimeLimitingCollector {
    /// Create a collector bound to a deadline, without a wrapped collector.
    pub fn new(deadline: Deadline) -> Self {
        TimeLimitingCollector {
            deadline,
            collector: None,
            greedy: false,
            check_interval: 1,
            ticks: 0,
            doc_base: 0,
        }
    }

    /// In greedy mode the document that detects expiry is still collected.
    pub fn with_greedy(mut self, greedy: bool) -> Self {
        self.greedy = greedy;
        self
    }

    /// Check the clock every `interval` documents.
    pub fn with_check_interval(mut self, interval: u32) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    /// The shared deadline.
    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Whether greedy mode is on.
    pub fn is_greedy(&self) -> bool {
        self.greedy
    }

    /// Documents between clock checks.
    pub fn check_interval(&self) -> u32 {
        self.check_interval
    }

    /// Replace the wrapped collector, returning the previous one.
    pub fn set_collector(&mut self, collector: Box<dyn Collector>) -> Option<Box<dyn Collector>> {
        self.collector.replace(collector)
    }

    /// Remove the wrapped collector.
    pub fn take_collector(&mut self) -> Option<Box<dyn Collector>> {
        self.collector.take()
    }

    fn exceeded(&self, last_doc: DocId) -> PhalanxError {
        PhalanxError::time_exceeded(self.deadline.allowed(), self.deadline.elapsed(), last_doc)
    }

    fn inner(&mut self) -> Result<&mut Box<dyn Collector>> {
        self.collector
            .as_mut()
            .ok_or_else(|| PhalanxError::invalid_state("no collector to time limit"))
    }
}

impl Collector for TimeLimitingCollector {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        if self.deadline.is_expired() {
            return Err(self.exceeded(leaf.doc_base));
        }
        self.doc_base = leaf.doc_base;
        self.inner()?.set_next_reader(leaf)
    }

    fn collect(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<()> {
        self.ticks += 1;
        if self.ticks >= self.check_interval {
            self.ticks = 0;
            if self.deadline.is_expired() {
                if self.greedy {
                    self.inner()?.collect(doc, scorer)?;
                }
                return Err(self.exceeded(self.doc_base + doc));
            }
        }
        self.inner()?.collect(doc, scorer)
    }

    fn needs_scores(&self) -> bool {
        self.collector
            .as_ref()
            .is_some_and(|collector| collector.needs_scores())
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
        let mut builder = SegmentBuilder::new();
        for _ in 0..10 {
            builder.add_document([("category", FieldValue::from("a"))])?;
        }
        Ok(IndexReader::from_segments(vec![builder.build()]))
    }

    fn run(collector: &mut TimeLimitingCollector, reader: &IndexReader, expire_at: DocId) -> Result<()> {
        let leaf = &reader.leaves()[0];
        collector.set_next_reader(leaf)?;
        for doc in 0..leaf.max_doc() {
            if doc == expire_at {
                collector.deadline().expire();
            }
            collector.collect(doc, &mut FixedScore(1.0))?;
        }
        Ok(())
    }

    #[test]
    fn test_expiry_keeps_partial_results() -> Result<()> {
        let reader = reader()?;
        let mut collector = TimeLimitingCollector::new(Deadline::unbounded());
        assert!(collector.set_collector(Box::new(TotalHitCountCollector::new())).is_none());

        let err = run(&mut collector, &reader, 4).unwrap_err();
        match err {
            PhalanxError::TimeExceeded { last_doc, .. } => assert_eq!(last_doc, 4),
            other => panic!("unexpected error: {other}"),
        }

        let count = downcast_collector::<TotalHitCountCollector>(collector.take_collector().unwrap())?;
        assert_eq!(count.total_hits(), 4);
        Ok(())
    }

    #[test]
    fn test_greedy_collects_detecting_doc() -> Result<()> {
        let reader = reader()?;
        let mut collector = TimeLimitingCollector::new(Deadline::unbounded()).with_greedy(true);
        collector.set_collector(Box::new(TotalHitCountCollector::new()));

        assert!(run(&mut collector, &reader, 4).unwrap_err().is_time_exceeded());
        let count = downcast_collector::<TotalHitCountCollector>(collector.take_collector().unwrap())?;
        assert_eq!(count.total_hits(), 5);
        Ok(())
    }

    #[test]
    fn test_deadline_shared_across_passes() -> Result<()> {
        let reader = reader()?;
        let deadline = Deadline::unbounded();
        let mut collector = TimeLimitingCollector::new(deadline.clone());
        collector.set_collector(Box::new(TotalHitCountCollector::new()));
        run(&mut collector, &reader, DocId::MAX)?;

        deadline.expire();
        let first = collector.set_collector(Box::new(TotalHitCountCollector::new()));
        assert!(first.is_some());
        let err = collector.set_next_reader(&reader.leaves()[0]).unwrap_err();
        assert!(err.is_time_exceeded());
        assert!(Deadline::new(Duration::ZERO).is_expired());
        Ok(())
    }
}
