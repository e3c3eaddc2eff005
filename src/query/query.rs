//! Base query traits.

use std::fmt::Debug;

use crate::error::Result;
use crate::index::{IndexReader, LeafReaderContext};
use crate::query::scorer::Scorer;

/// Trait for search queries.
///
/// A query is immutable for the duration of one execution; the per-execution
/// state lives in the [`Weight`] it creates.
pub trait Query: Send + Sync + Debug {
    /// Prepare the query against a reader.
    ///
    /// `needs_scores` is false when no collector will ask for scores, which
    /// lets implementations skip relevance statistics.
    fn create_weight(&self, reader: &IndexReader, needs_scores: bool) -> Result<Box<dyn Weight>>;

    /// Get the boost factor for this query.
    fn boost(&self) -> f32;

    /// Set the boost factor for this query.
    fn set_boost(&mut self, boost: f32);

    /// Get a human-readable description of this query.
    fn description(&self) -> String;

    /// Clone this query.
    fn clone_box(&self) -> Box<dyn Query>;
}

/// A query prepared for one reader. Shared by the slices of a parallel search.
pub trait Weight: Send + Sync + Debug {
    /// Scorer over the matches of one segment, `None` when the segment has none.
    fn scorer(&self, leaf: &LeafReaderContext) -> Result<Option<Box<dyn Scorer>>>;
}

impl Clone for Box<dyn Query> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
