//! Search module: result primitives, sorting, collectors, the index searcher
//! and shard merging.

pub mod collector;
pub mod comparator;
pub mod merger;
pub mod score_doc;
pub mod searcher;
pub mod sort;

pub use collector::{
    CacheBudget, CachingCollector, CollectFilter, Collector, Deadline, DocSetCollector,
    FilterCollector, MultiCollector, PostFilter, ScoreThresholdFilter, TimeLimitingCollector,
    TopFieldCollector, TopScoreDocCollector, TotalHitCountCollector, downcast_collector,
};
pub use comparator::{FieldComparator, SortComparator};
pub use merger::{merge_field_docs, merge_shard_results, merge_top_docs};
pub use score_doc::{FieldDoc, ScoreDoc, TopDocs, TopFieldDocs};
pub use searcher::{IndexSearcher, LeafSlice, SearcherConfig};
pub use sort::{Sort, SortField, SortFieldType, SortValue};
