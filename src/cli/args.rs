//! Command line argument parsing for Phalanx CLI using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Phalanx - grouping and top-K collection over a synthetic catalog
#[derive(Parser, Debug, Clone)]
#[command(name = "phalanx")]
#[command(about = "Grouping and top-K collection engine for inverted-index search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Phalanx Contributors")]
#[command(long_about = None)]
pub struct PhalanxArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl PhalanxArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Group the matches of a query
    Group(GroupArgs),

    /// Collect the top matches of a query
    Search(SearchArgs),
}

/// Shape of the generated catalog.
///
/// Every document carries `category` (string, occasionally missing),
/// `price` (double), `popularity` (float, also the relevance score) and
/// `rating` (int, 1 to 5).
#[derive(Args, Debug, Clone)]
pub struct CorpusArgs {
    /// Number of documents
    #[arg(long, default_value = "1000")]
    pub docs: usize,

    /// Number of segments the documents are spread over
    #[arg(long, default_value = "4")]
    pub segments: usize,

    /// Number of distinct categories
    #[arg(long, default_value = "5")]
    pub categories: usize,

    /// Seed of the generator
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Only match documents of this category
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<String>,
}

/// Arguments for grouping
#[derive(Parser, Debug, Clone)]
pub struct GroupArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Field to group by
    #[arg(long, default_value = "category")]
    pub field: String,

    /// Group by price buckets of this width instead of a field
    #[arg(long, value_name = "WIDTH", conflicts_with = "field")]
    pub price_bucket: Option<f64>,

    /// Also add one query group per category
    #[arg(long = "query-group", value_name = "CATEGORY")]
    pub query_groups: Vec<String>,

    /// Group sort, comma separated keys, '-' prefix reverses (e.g. "-price,doc")
    #[arg(long, default_value = "score")]
    pub sort: String,

    /// Sort inside each group, defaults to the group sort
    #[arg(long)]
    pub group_sort: Option<String>,

    /// Rank of the first returned group
    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Number of returned groups
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Rank of the first document returned in each group
    #[arg(long, default_value = "0")]
    pub group_offset: usize,

    /// Documents returned per group
    #[arg(long, default_value = "1")]
    pub group_limit: usize,

    /// Count the distinct groups
    #[arg(long)]
    pub ngroups: bool,

    /// Flatten the groups into one document list
    #[arg(long)]
    pub simple: bool,

    /// Mark the first command as the main result
    #[arg(long)]
    pub main: bool,

    /// Share of the index, in percent, cached for the second pass
    #[arg(long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub cache: u8,

    /// Time budget of the execution in milliseconds
    #[arg(long, value_name = "MILLIS")]
    pub time_allowed: Option<u64>,

    /// Report the deduplicated ids of every returned document
    #[arg(long)]
    pub doc_list: bool,

    /// Report the number of matching documents, or of group heads with --heads
    #[arg(long)]
    pub doc_set: bool,

    /// Build the doc set from group heads
    #[arg(long, requires = "doc_set")]
    pub heads: bool,
}

/// Arguments for top-K search
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Sort keys, comma separated, '-' prefix reverses; relevance when omitted
    #[arg(long)]
    pub sort: Option<String>,

    /// Number of returned documents
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Spread the search over a thread pool
    #[arg(long)]
    pub parallel: bool,

    /// Number of threads, defaults to the number of cores
    #[arg(long, requires = "parallel")]
    pub threads: Option<usize>,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
