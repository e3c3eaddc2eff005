//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{OutputFormat, PhalanxArgs};
use crate::error::Result;
use crate::grouping::{CommandResponse, DocSlice, GroupedResponse, ResponseDoc};

/// Result structure for grouping executions.
#[derive(Debug, Serialize)]
pub struct GroupingResult {
    pub response: GroupedResponse,
    /// Size of the requested doc set, which is not serialized itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_set_size: Option<usize>,
    pub duration_ms: u64,
}

/// One hit of a top-K search.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub doc: ResponseDoc,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort_values: Vec<serde_json::Value>,
}

/// Result structure for top-K searches.
#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub total_hits: u64,
    pub max_score: Option<f32>,
    pub hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    pub duration_ms: u64,
}

/// Output a grouping result in the specified format.
pub fn output_grouping(result: &GroupingResult, args: &PhalanxArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => output_json(result, args),
        OutputFormat::Human => {
            output_grouping_human(result, args);
            Ok(())
        }
    }
}

/// Output a search result in the specified format.
pub fn output_search(result: &SearchResult, args: &PhalanxArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => output_json(result, args),
        OutputFormat::Human => {
            output_search_human(result, args);
            Ok(())
        }
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &PhalanxArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

fn output_grouping_human(result: &GroupingResult, args: &PhalanxArgs) {
    let response = &result.response;
    println!("Grouping Results:");
    println!("═════════════════");

    if let Some(main) = &response.main {
        println!();
        println!("Main result ({}):", main.key);
        output_command_human(&main.response);
    }
    for named in &response.commands {
        println!();
        println!("Command: {}", named.key);
        println!("─────────");
        output_command_human(&named.response);
    }

    println!();
    if response.partial_results {
        println!("Partial results: the time budget expired");
    }
    if response.cache_overflow {
        println!("Cache overflow: the index was scanned twice");
    }
    if let Some(doc_list) = &response.doc_list {
        println!("Returned documents: {}", format_ids(doc_list.iter()));
    }
    if let Some(size) = result.doc_set_size {
        println!("Doc set size: {size}");
    }
    if args.verbosity() > 1 {
        println!("Grouping time: {}ms", result.duration_ms);
    }
}

fn output_command_human(response: &CommandResponse) {
    println!("  Matches: {}", response.matches());
    if let Some(ngroups) = response.ngroups() {
        println!("  Groups: {ngroups}");
    }
    match response {
        CommandResponse::Grouped(grouped) => {
            for group in &grouped.groups {
                println!("  [{}] {}", group.group_value, format_slice(&group.doc_list));
            }
        }
        CommandResponse::Simple(simple) => {
            println!("  {}", format_slice(&simple.doc_list));
        }
    }
}

fn output_search_human(result: &SearchResult, args: &PhalanxArgs) {
    println!("Search Results:");
    println!("═══════════════");
    if let Some(sort) = &result.sort {
        println!("Sorted by: {sort}");
    }
    println!();

    for (i, hit) in result.hits.iter().enumerate() {
        let values: Vec<String> = hit.sort_values.iter().map(format_value).collect();
        println!(
            "{:>3}. doc {} {}{}",
            i + 1,
            hit.doc.doc,
            format_score(hit.doc.score),
            if values.is_empty() {
                String::new()
            } else {
                format!(" [{}]", values.join(", "))
            }
        );
    }

    println!();
    println!("Total hits: {}", result.total_hits);
    if let Some(max_score) = result.max_score {
        println!("Max score: {max_score:.3}");
    }
    if args.verbosity() > 1 {
        println!("Search time: {}ms", result.duration_ms);
    }
}

fn format_slice(slice: &DocSlice) -> String {
    let docs: Vec<String> = slice
        .docs
        .iter()
        .map(|doc| format!("{}{}", doc.doc, format_score(doc.score)))
        .collect();
    format!("{} of {}: {}", docs.len(), slice.num_found, docs.join(", "))
}

fn format_score(score: Option<f32>) -> String {
    score.map(|score| format!(" ({score:.3})")).unwrap_or_default()
}

fn format_ids<'a>(ids: impl Iterator<Item = &'a u32>) -> String {
    ids.map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
