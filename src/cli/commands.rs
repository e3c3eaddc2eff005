//! Command implementations for Phalanx CLI.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::error::{PhalanxError, Result};
use crate::grouping::{
    FieldCommand, FunctionCommand, GroupFormat, GroupParams, Grouping, GroupingConfig,
    QueryCommand, ResponseDoc,
};
use crate::index::{DocValues, FieldValue, IndexReader, NumericType, SegmentBuilder};
use crate::query::{
    BucketValueSource, FieldValueSource, Filter, FunctionQuery, QueryFilter, TermQuery,
};
use crate::search::{IndexSearcher, SearcherConfig, Sort, SortField, SortFieldType};

/// Field scoring the documents of the generated catalog.
const SCORE_FIELD: &str = "popularity";

/// Execute a CLI command.
pub fn execute_command(args: PhalanxArgs) -> Result<()> {
    match &args.command {
        Command::Group(group_args) => group(group_args.clone(), &args),
        Command::Search(search_args) => search(search_args.clone(), &args),
    }
}

/// Generate the catalog described by `args`.
pub fn build_corpus(args: &CorpusArgs) -> Result<IndexReader> {
    if args.segments == 0 {
        return Err(PhalanxError::invalid_argument("at least one segment is required"));
    }
    if args.categories == 0 {
        return Err(PhalanxError::invalid_argument("at least one category is required"));
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    let per_segment = args.docs.div_ceil(args.segments).max(1);
    let mut segments = Vec::with_capacity(args.segments);
    let mut builder = SegmentBuilder::new();

    for _ in 0..args.docs {
        let mut fields = vec![
            ("price", FieldValue::Double((rng.random_range(100..100_000) as f64) / 100.0)),
            (SCORE_FIELD, FieldValue::Float(rng.random::<f32>())),
            ("rating", FieldValue::Int(rng.random_range(1..=5))),
        ];
        // One document in fifty has no category.
        if rng.random_ratio(49, 50) {
            let category = rng.random_range(0..args.categories);
            fields.push(("category", FieldValue::from(format!("cat{category}"))));
        }
        builder.add_document(fields)?;

        if builder.len() == per_segment {
            segments.push(std::mem::take(&mut builder).build());
        }
    }
    if !builder.is_empty() {
        segments.push(builder.build());
    }

    debug!(
        "generated {} documents in {} segments",
        args.docs,
        segments.len()
    );
    Ok(IndexReader::from_segments(segments))
}

/// Parse comma separated sort keys such as `-price,doc`.
///
/// `score` and `doc` are the relevance and index orders; any other key is a
/// field whose type is read from the index. A leading `-` reverses a key.
pub fn parse_sort(spec: &str, reader: &IndexReader) -> Result<Sort> {
    let mut fields = Vec::new();
    for key in spec.split(',').map(str::trim).filter(|key| !key.is_empty()) {
        let (name, reverse) = match key.strip_prefix('-') {
            Some(name) => (name, true),
            None => (key, false),
        };
        let field = match name {
            "score" => SortField::score(),
            "doc" => SortField::doc(),
            field => {
                let field_type = match reader.field_kind(field) {
                    Some(DocValues::Sorted(_)) => SortFieldType::String,
                    Some(DocValues::Numeric(values)) => match values.numeric_type() {
                        NumericType::Int => SortFieldType::Int,
                        NumericType::Long => SortFieldType::Long,
                        NumericType::Float => SortFieldType::Float,
                        NumericType::Double => SortFieldType::Double,
                    },
                    None => {
                        return Err(PhalanxError::configuration(format!(
                            "unknown sort field: {field}"
                        )));
                    }
                };
                SortField::new(field, field_type)
            }
        };
        fields.push(field.with_reverse(reverse));
    }

    if fields.is_empty() {
        return Err(PhalanxError::invalid_argument(format!("empty sort: '{spec}'")));
    }
    Ok(Sort::new(fields))
}

fn base_query() -> FunctionQuery {
    FunctionQuery::new(Arc::new(FieldValueSource::new(SCORE_FIELD)))
}

fn category_filter(corpus: &CorpusArgs) -> Option<QueryFilter> {
    corpus
        .category
        .as_ref()
        .map(|category| QueryFilter::new(Box::new(TermQuery::new("category", category.clone()))))
}

/// Group the matches of the catalog query.
fn group(args: GroupArgs, cli_args: &PhalanxArgs) -> Result<()> {
    let reader = build_corpus(&args.corpus)?;
    let searcher = IndexSearcher::new(reader);
    let group_sort = parse_sort(&args.sort, searcher.reader())?;
    let within_group_sort = match &args.group_sort {
        Some(spec) => parse_sort(spec, searcher.reader())?,
        None => group_sort.clone(),
    };
    let format = if args.simple {
        GroupFormat::Simple
    } else {
        GroupFormat::Grouped
    };
    let params = |key: &str| {
        GroupParams::new(key)
            .with_group_sort(group_sort.clone())
            .with_within_group_sort(within_group_sort.clone())
            .with_offset(args.offset)
            .with_limit(args.limit)
            .with_group_offset(args.group_offset)
            .with_docs_per_group(args.group_limit)
            .with_group_count(args.ngroups)
            .with_format(format)
    };

    let mut config = GroupingConfig::default()
        .with_cache_percentage(args.cache)
        .with_doc_list(args.doc_list)
        .with_doc_set(args.doc_set)
        .with_group_heads_doc_set(args.heads);
    if let Some(millis) = args.time_allowed {
        config = config.with_time_allowed(Duration::from_millis(millis));
    }
    if args.main {
        config = config.with_main_command(0);
    }

    let query = base_query();
    let filter = category_filter(&args.corpus);
    let mut grouping = Grouping::new(&searcher, &query, config);
    if let Some(filter) = &filter {
        grouping = grouping.with_filter(filter as &dyn Filter);
    }

    match args.price_bucket {
        Some(width) => {
            let source = Arc::new(BucketValueSource::new(
                Arc::new(FieldValueSource::new("price")),
                width,
            ));
            grouping.add_command(FunctionCommand::function(params("price_bucket"), source));
        }
        None => {
            grouping.add_command(FieldCommand::field(params(&args.field), args.field.clone()));
        }
    }
    for category in &args.query_groups {
        let query = TermQuery::new("category", category.clone());
        grouping.add_command(QueryCommand::new(
            params(&format!("category:{category}")),
            Box::new(query),
        ));
    }

    info!(
        "grouping {} documents with {} commands",
        searcher.reader().max_doc(),
        grouping.command_count()
    );
    let start_time = Instant::now();
    let response = grouping.execute()?;
    let duration = start_time.elapsed();

    output_grouping(
        &GroupingResult {
            doc_set_size: response.doc_set.as_ref().map(|docs| docs.len()),
            response,
            duration_ms: duration.as_millis() as u64,
        },
        cli_args,
    )
}

/// Collect the top matches of the catalog query.
fn search(args: SearchArgs, cli_args: &PhalanxArgs) -> Result<()> {
    let reader = build_corpus(&args.corpus)?;
    let searcher = if args.parallel {
        IndexSearcher::with_executor(
            reader,
            SearcherConfig {
                thread_pool_size: args.threads,
                ..SearcherConfig::default()
            },
        )?
    } else {
        IndexSearcher::new(reader)
    };

    let query = base_query();
    let filter = category_filter(&args.corpus);
    let filter = filter.as_ref().map(|filter| filter as &dyn Filter);
    let start_time = Instant::now();

    let result = match &args.sort {
        Some(spec) => {
            let sort = parse_sort(spec, searcher.reader())?;
            let top = searcher.search_top_field_docs(&query, filter, args.limit, &sort)?;
            SearchResult {
                total_hits: top.total_hits,
                max_score: top.max_score,
                hits: top
                    .field_docs
                    .iter()
                    .map(|hit| SearchHit {
                        doc: ResponseDoc::from(hit),
                        sort_values: hit.fields.iter().map(|value| value.to_json()).collect(),
                    })
                    .collect(),
                sort: Some(sort.to_string()),
                duration_ms: 0,
            }
        }
        None => {
            let top = searcher.search_top_docs(&query, filter, args.limit)?;
            SearchResult {
                total_hits: top.total_hits,
                max_score: top.max_score,
                hits: top
                    .score_docs
                    .iter()
                    .map(|hit| SearchHit {
                        doc: ResponseDoc::new(hit.doc, Some(hit.score)),
                        sort_values: Vec::new(),
                    })
                    .collect(),
                sort: None,
                duration_ms: 0,
            }
        }
    };

    output_search(
        &SearchResult {
            duration_ms: start_time.elapsed().as_millis() as u64,
            ..result
        },
        cli_args,
    )
}
