//! In-memory index collaborators consumed by the search core.
//!
//! The grouping engine never reads postings or segment files itself. It only
//! needs ascending per-segment document ids, per-document sort/group values
//! and a way to address segments; this module provides exactly that surface.

pub mod doc_set;
pub mod doc_values;
pub mod reader;
pub mod segment;

pub use self::doc_set::DocSet;
pub use self::doc_values::{
    DocValues, FieldValue, NumericDocValues, NumericType, NumericValue, SortedDocValues,
};
pub use self::reader::{IndexReader, LeafReaderContext};
pub use self::segment::{LeafReader, MemorySegment, SegmentBuilder};

/// Document identifier. Segment-local inside collectors, global (segment
/// `doc_base` added) in results.
pub type DocId = u32;
