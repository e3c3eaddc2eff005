//! Index-level reader: an ordered list of segments with global doc id bases.

use std::fmt;
use std::sync::Arc;

use crate::index::DocId;
use crate::index::doc_values::DocValues;
use crate::index::segment::LeafReader;

/// A segment together with its position in the index.
#[derive(Clone)]
pub struct LeafReaderContext {
    /// Position of the segment in [`IndexReader::leaves`].
    pub ord: usize,
    /// Global id of the segment's first document.
    pub doc_base: DocId,
    reader: Arc<dyn LeafReader>,
}

impl LeafReaderContext {
    /// Create a context for a segment.
    pub fn new(ord: usize, doc_base: DocId, reader: Arc<dyn LeafReader>) -> Self {
        LeafReaderContext {
            ord,
            doc_base,
            reader,
        }
    }

    /// The segment reader.
    pub fn reader(&self) -> &dyn LeafReader {
        self.reader.as_ref()
    }

    /// Number of documents in the segment.
    pub fn max_doc(&self) -> DocId {
        self.reader.max_doc()
    }
}

impl fmt::Debug for LeafReaderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafReaderContext")
            .field("ord", &self.ord)
            .field("doc_base", &self.doc_base)
            .field("max_doc", &self.max_doc())
            .finish()
    }
}

/// Read-only view over all segments of an index. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct IndexReader {
    leaves: Vec<LeafReaderContext>,
    max_doc: DocId,
}

impl IndexReader {
    /// Create a reader over segments in index order.
    pub fn new(segments: Vec<Arc<dyn LeafReader>>) -> Self {
        let mut doc_base = 0;
        let leaves = segments
            .into_iter()
            .enumerate()
            .map(|(ord, segment)| {
                let context = LeafReaderContext::new(ord, doc_base, segment);
                doc_base += context.max_doc();
                context
            })
            .collect();

        IndexReader {
            leaves,
            max_doc: doc_base,
        }
    }

    /// Convenience constructor from concrete segments.
    pub fn from_segments<L>(segments: Vec<L>) -> Self
    where
        L: LeafReader + 'static,
    {
        IndexReader::new(
            segments
                .into_iter()
                .map(|segment| Arc::new(segment) as Arc<dyn LeafReader>)
                .collect(),
        )
    }

    /// Segments in index order.
    pub fn leaves(&self) -> &[LeafReaderContext] {
        &self.leaves
    }

    /// Total number of documents.
    pub fn max_doc(&self) -> DocId {
        self.max_doc
    }

    /// Column kind of a field across segments, `None` when no segment has it.
    pub fn field_kind(&self, field: &str) -> Option<DocValues> {
        self.leaves
            .iter()
            .find_map(|leaf| leaf.reader().doc_values(field))
    }

    /// Segment holding a global document id.
    pub fn leaf_for_doc(&self, doc: DocId) -> Option<&LeafReaderContext> {
        if doc >= self.max_doc {
            return None;
        }
        let idx = self
            .leaves
            .partition_point(|leaf| leaf.doc_base <= doc)
            .saturating_sub(1);
        self.leaves.get(idx)
    }
}
