//! # Phalanx
//!
//! Grouping and top-K collection for inverted-index search.
//!
//! ## Features
//!
//! - Two-pass grouping by field, function or query
//! - Multi-key sorting by relevance, index order and doc values
//! - Collector combinators: caching with replay, time limits, filtering
//! - Parallel top-K search over segment slices
//! - Shard result merging

pub mod cli;
pub mod error;
pub mod grouping;
pub mod index;
pub mod query;
pub mod search;
pub mod util;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
