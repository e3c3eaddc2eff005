//! Term query implementation for exact value matching.

use bit_vec::BitVec;

use crate::error::Result;
use crate::index::{IndexReader, LeafReaderContext};
use crate::query::matcher::BitSetMatcher;
use crate::query::query::{Query, Weight};
use crate::query::scorer::{ConstantScorer, Scorer};

/// A query that matches documents whose string field equals a term.
///
/// Matching is exact; the term is not analyzed.
/// Every match gets the query boost as its score.
#[derive(Debug, Clone)]
pub struct TermQuery {
    /// The field to search in.
    field: String,
    /// The term to search for.
    term: String,
    /// The boost factor for this query.
    boost: f32,
}

impl TermQuery {
    /// Create a new term query.
    pub fn new<F, T>(field: F, term: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        TermQuery {
            field: field.into(),
            term: term.into(),
            boost: 1.0,
        }
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Get the term.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Set the boost factor.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

impl Query for TermQuery {
    fn create_weight(&self, _reader: &IndexReader, _needs_scores: bool) -> Result<Box<dyn Weight>> {
        Ok(Box::new(TermWeight {
            field: self.field.clone(),
            term: self.term.clone(),
            boost: self.boost,
        }))
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        format!("{}:{}", self.field, self.term)
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }
}

#[derive(Debug)]
struct TermWeight {
    field: String,
    term: String,
    boost: f32,
}

impl Weight for TermWeight {
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>> {
        let Some(values) = leaf.reader().sorted_doc_values(&self.field)? else {
            return Ok(None);
        };
        let Some(target) = values.lookup_term(&self.term) else {
            return Ok(None);
        };

        let max_doc = leaf.max_doc();
        let mut bits = BitVec::from_elem(max_doc as usize, false);
        for doc in 0..max_doc {
            if values.ord(doc) == Some(target) {
                bits.set(doc as usize, true);
            }
        }

        Ok(Some(Box::new(ConstantScorer::new(
            Box::new(BitSetMatcher::new(bits)),
            self.boost,
        ))))
    }
}
