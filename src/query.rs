//! Query module: queries, per-segment matchers and scorers, filters and
//! value sources.

pub mod filter;
pub mod function;
pub mod match_all;
pub mod matcher;
#[allow(clippy::module_inception)]
pub mod query;
pub mod scorer;
pub mod term;

pub use filter::{DocSetFilter, Filter, QueryFilter};
pub use function::{
    BucketValueSource, FieldValueSource, FunctionQuery, FunctionValue, FunctionValues,
    ScaledValueSource, ValueSource,
};
pub use match_all::MatchAllQuery;
pub use matcher::{AllMatcher, BitSetMatcher, EmptyMatcher, Matcher, NO_MORE_DOCS};
pub use query::{Query, Weight};
pub use scorer::{CachedScore, ConstantScorer, FixedScore, ScoreSource, Scorer, ScorerScoreSource};
pub use term::TermQuery;
