//! Query matching every document.

use crate::error::Result;
use crate::index::{IndexReader, LeafReaderContext};
use crate::query::matcher::AllMatcher;
use crate::query::query::{Query, Weight};
use crate::query::scorer::{ConstantScorer, Scorer};

/// Matches all documents with a constant score equal to the boost.
#[derive(Debug, Clone)]
pub struct MatchAllQuery {
    boost: f32,
}

impl MatchAllQuery {
    /// Create a new match-all query.
    pub fn new() -> Self {
        MatchAllQuery { boost: 1.0 }
    }
}

impl Default for MatchAllQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl Query for MatchAllQuery {
    fn create_weight(&self, _reader: &IndexReader, _needs_scores: bool) -> Result<Box<dyn Weight>> {
        Ok(Box::new(MatchAllWeight { boost: self.boost }))
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        "*:*".to_string()
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }
}

#[derive(Debug)]
struct MatchAllWeight {
    boost: f32,
}

impl Weight for MatchAllWeight {
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>> {
        if leaf.max_doc() == 0 {
            return Ok(None);
        }
        Ok(Some(Box::new(ConstantScorer::new(
            Box::new(AllMatcher::new(leaf.max_doc())),
            self.boost,
        ))))
    }
}
