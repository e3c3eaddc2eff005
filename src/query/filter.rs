//! Filters restricting the documents a search visits without affecting scores.

use std::fmt::Debug;
use std::sync::Arc;

use bit_vec::BitVec;

use crate::error::Result;
use crate::index::{DocSet, IndexReader, LeafReaderContext};
use crate::query::query::Query;

/// A per-segment document filter.
pub trait Filter: Send + Sync + Debug {
    /// Accepted segment-local documents of `leaf`, `None` when none are accepted.
    fn doc_set(&self, reader: &IndexReader, leaf: &LeafReaderContext) -> Result<Option<BitVec>>;
}

/// Accepts the documents matched by a query.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    query: Box<dyn Query>,
}

impl QueryFilter {
    /// Create a filter from a query; its scores are ignored.
    pub fn new(query: Box<dyn Query>) -> Self {
        QueryFilter { query }
    }
}

impl Filter for QueryFilter {
    fn doc_set(&self, reader: &IndexReader, leaf: &LeafReaderContext) -> Result<Option<BitVec>> {
        let weight = self.query.create_weight(reader, false)?;
        let Some(mut scorer) = weight.scorer(leaf)? else {
            return Ok(None);
        };

        let mut bits = BitVec::from_elem(leaf.max_doc() as usize, false);
        while scorer.next()? {
            bits.set(scorer.doc_id() as usize, true);
        }
        Ok(Some(bits))
    }
}

/// Accepts the members of a precomputed [`DocSet`].
#[derive(Debug, Clone)]
pub struct DocSetFilter {
    docs: Arc<DocSet>,
}

impl DocSetFilter {
    /// Create a filter over global document ids.
    pub fn new(docs: Arc<DocSet>) -> Self {
        DocSetFilter { docs }
    }
}

impl Filter for DocSetFilter {
    fn doc_set(&self, _reader: &IndexReader, leaf: &LeafReaderContext) -> Result<Option<BitVec>> {
        let bits = self.docs.leaf_bits(leaf);
        if bits.none() {
            return Ok(None);
        }
        Ok(Some(bits))
    }
}
