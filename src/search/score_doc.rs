//! Result primitives produced by collectors and shard merges.

use serde::{Deserialize, Serialize};

use crate::index::DocId;
use crate::search::sort::{Sort, SortValue};

/// A scored match.
///
/// `score` is NaN when the collector did not track scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDoc {
    /// Global document id.
    pub doc: DocId,
    /// Relevance score.
    pub score: f32,
    /// Shard the match came from, set by shard merges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_index: Option<usize>,
}

impl ScoreDoc {
    /// Create a match without shard attribution.
    pub fn new(doc: DocId, score: f32) -> Self {
        ScoreDoc {
            doc,
            score,
            shard_index: None,
        }
    }
}

/// A match ranked by a [`Sort`], carrying one value per sort field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDoc {
    /// Global document id.
    pub doc: DocId,
    /// Relevance score, NaN when not tracked.
    pub score: f32,
    /// Shard the match came from, set by shard merges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_index: Option<usize>,
    /// Sort values in the order of the sort fields.
    pub fields: Vec<SortValue>,
}

impl FieldDoc {
    /// Create a sorted match without shard attribution.
    pub fn new(doc: DocId, score: f32, fields: Vec<SortValue>) -> Self {
        FieldDoc {
            doc,
            score,
            shard_index: None,
            fields,
        }
    }

    /// The match without its sort values.
    pub fn to_score_doc(&self) -> ScoreDoc {
        ScoreDoc {
            doc: self.doc,
            score: self.score,
            shard_index: self.shard_index,
        }
    }
}

/// A bounded top-K result ranked by relevance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopDocs {
    /// Number of matches seen, which can exceed `score_docs.len()`.
    pub total_hits: u64,
    /// Best matches, best first.
    pub score_docs: Vec<ScoreDoc>,
    /// Highest score seen, `None` when there were no matches or scores were not tracked.
    pub max_score: Option<f32>,
}

impl TopDocs {
    /// An empty result.
    pub fn empty() -> Self {
        TopDocs::default()
    }
}

/// A bounded top-K result ranked by a [`Sort`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopFieldDocs {
    /// Number of matches seen.
    pub total_hits: u64,
    /// Best matches, best first.
    pub field_docs: Vec<FieldDoc>,
    /// The ordering of `field_docs`.
    pub sort: Sort,
    /// Highest score seen, when tracked.
    pub max_score: Option<f32>,
}

impl TopFieldDocs {
    /// An empty result for a sort.
    pub fn empty(sort: Sort) -> Self {
        TopFieldDocs {
            total_hits: 0,
            field_docs: Vec::new(),
            sort,
            max_score: None,
        }
    }
}

/// Larger of two optional maxima.
pub(crate) fn max_of(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
