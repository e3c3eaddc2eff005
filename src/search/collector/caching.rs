//! Record and replay of a scan.

use std::any::Any;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{PhalanxError, Result};
use crate::index::{DocId, LeafReaderContext};
use crate::query::scorer::{CachedScore, FixedScore, ScoreSource};
use crate::search::collector::Collector;

const BYTES_PER_DOC: usize = 4;
const BYTES_PER_SCORE: usize = 4;

/// Upper bound of what a [`CachingCollector`] may record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CacheBudget {
    /// Maximum number of documents.
    Docs(usize),
    /// Maximum RAM in megabytes.
    Megabytes(f64),
}

impl CacheBudget {
    /// Number of documents the budget allows.
    pub fn max_docs(&self, cache_scores: bool) -> usize {
        match *self {
            CacheBudget::Docs(docs) => docs,
            CacheBudget::Megabytes(mb) => {
                let per_doc = BYTES_PER_DOC + if cache_scores { BYTES_PER_SCORE } else { 0 };
                let bytes = (mb.max(0.0) * 1024.0 * 1024.0) as usize;
                bytes / per_doc
            }
        }
    }
}

#[derive(Debug)]
struct CachedSegment {
    leaf: LeafReaderContext,
    docs: Vec<DocId>,
    scores: Vec<f32>,
}

/// Delegates to a wrapped collector while recording every document (and
/// optionally its score) so the scan can be replayed into another collector.
///
/// When the budget is exceeded the recording is dropped and the collector
/// keeps delegating; [`is_cached`](Self::is_cached) then reports `false` for
/// the whole scan.
#[derive(Debug)]
pub struct CachingCollector {
    inner: Option<Box<dyn Collector>>,
    cache_scores: bool,
    max_docs: usize,
    segments: Vec<CachedSegment>,
    cached_docs: usize,
    cached: bool,
}

impl CachingCollector {
    /// Wrap `inner`, recording up to what `budget` allows.
    pub fn create(inner: Box<dyn Collector>, cache_scores: bool, budget: CacheBudget) -> Self {
        let max_docs = budget.max_docs(cache_scores);
        debug!("caching up to {max_docs} docs (scores: {cache_scores})");
        CachingCollector {
            inner: Some(inner),
            cache_scores,
            max_docs,
            segments: Vec::new(),
            cached_docs: 0,
            cached: true,
        }
    }

    /// Whether the whole scan was recorded.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Whether scores were recorded.
    pub fn caches_scores(&self) -> bool {
        self.cache_scores
    }

    /// Number of recorded documents.
    pub fn cached_docs(&self) -> usize {
        self.cached_docs
    }

    /// Deliver the recorded scan to `collector`, segment by segment.
    pub fn replay(&self, collector: &mut dyn Collector) -> Result<()> {
        if !self.cached {
            return Err(PhalanxError::invalid_state(
                "cannot replay: the scan exceeded the cache budget",
            ));
        }
        if collector.needs_scores() && !self.cache_scores {
            return Err(PhalanxError::invalid_state(
                "cannot replay scores that were not cached",
            ));
        }

        for segment in &self.segments {
            collector.set_next_reader(&segment.leaf)?;
            for (idx, &doc) in segment.docs.iter().enumerate() {
                let score = segment.scores.get(idx).copied().unwrap_or(f32::NAN);
                collector.collect(doc, &mut FixedScore(score))?;
            }
        }
        Ok(())
    }

    /// Take the wrapped collector.
    pub fn take_inner(&mut self) -> Option<Box<dyn Collector>> {
        self.inner.take()
    }

    /// Unwrap the wrapped collector.
    pub fn into_inner(mut self) -> Result<Box<dyn Collector>> {
        self.take_inner()
            .ok_or_else(|| PhalanxError::invalid_state("wrapped collector was already taken"))
    }

    fn inner(&mut self) -> Result<&mut Box<dyn Collector>> {
        self.inner
            .as_mut()
            .ok_or_else(|| PhalanxError::invalid_state("wrapped collector was already taken"))
    }

    fn overflow(&mut self) {
        debug!(
            "cache budget of {} docs exceeded, disabling replay",
            self.max_docs
        );
        self.cached = false;
        self.cached_docs = 0;
        self.segments.clear();
    }
}

impl Collector for CachingCollector {
    fn set_next_reader(&mut self, leaf: &LeafReaderContext) -> Result<()> {
        if self.cached {
            self.segments.push(CachedSegment {
                leaf: leaf.clone(),
                docs: Vec::new(),
                scores: Vec::new(),
            });
        }
        self.inner()?.set_next_reader(leaf)
    }

    fn collect(&mut self, doc: DocId, scorer: &mut dyn ScoreSource) -> Result<()> {
        let mut score = CachedScore::new(scorer);
        if self.cached {
            if self.cached_docs >= self.max_docs {
                self.overflow();
            } else if let Some(segment) = self.segments.last_mut() {
                segment.docs.push(doc);
                if self.cache_scores {
                    segment.scores.push(score.score()?);
                }
                self.cached_docs += 1;
            }
        }
        self.inner
            .as_mut()
            .ok_or_else(|| PhalanxError::invalid_state("wrapped collector was already taken"))?
            .collect(doc, &mut score)
    }

    fn needs_scores(&self) -> bool {
        self.cache_scores
            || self
                .inner
                .as_ref()
                .is_some_and(|inner| inner.needs_scores())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
