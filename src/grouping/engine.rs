//! The grouping orchestrator.

use ahash::AHashSet;
use log::{debug, warn};

use crate::error::{PhalanxError, Result};
use crate::grouping::command::{GroupingCommand, GroupingContext};
use crate::grouping::config::GroupingConfig;
use crate::grouping::response::{GroupedResponse, NamedCommandResponse};
use crate::query::filter::Filter;
use crate::query::query::Query;
use crate::search::collector::{
    CacheBudget, CachingCollector, Collector, Deadline, DocSetCollector, MultiCollector,
    TimeLimitingCollector, downcast_collector,
};
use crate::search::searcher::IndexSearcher;

/// Where the doc set of the response comes from.
#[derive(Debug, Clone, Copy)]
enum DocSetSource {
    Matches,
    /// Group heads of the command at this index.
    GroupHeads(usize),
}

/// Runs several grouping commands over shared scans of one query.
///
/// Every command is first asked for its first pass collector; all of them see
/// a single scan. Commands that need a second pass then see either a replay
/// of that scan, when it fit in the cache, or a second scan. One deadline
/// governs both scans; when it expires the scan in flight stops and the
/// response is flagged as partial.
#[derive(Debug)]
pub struct Grouping<'a> {
    searcher: &'a IndexSearcher,
    query: &'a dyn Query,
    filter: Option<&'a dyn Filter>,
    config: GroupingConfig,
    deadline: Option<Deadline>,
    commands: Vec<Box<dyn GroupingCommand + 'a>>,
}

impl<'a> Grouping<'a> {
    /// Create an execution of `query` over `searcher`.
    pub fn new(searcher: &'a IndexSearcher, query: &'a dyn Query, config: GroupingConfig) -> Self {
        Grouping {
            searcher,
            query,
            filter: None,
            config,
            deadline: None,
            commands: Vec::new(),
        }
    }

    /// Restrict matches to a filter.
    pub fn with_filter(mut self, filter: &'a dyn Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Use an existing deadline instead of one derived from
    /// [`GroupingConfig::time_allowed`].
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Register a command. Results keep registration order.
    pub fn add_command<C: GroupingCommand + 'a>(&mut self, command: C) -> &mut Self {
        self.commands.push(Box::new(command));
        self
    }

    /// Number of registered commands.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Run every command and assemble the response.
    pub fn execute(mut self) -> Result<GroupedResponse> {
        self.validate()?;
        let config = self.config.clone();
        let ctx = GroupingContext {
            searcher: self.searcher,
            query: self.query,
            filter: self.filter,
            config: &config,
        };

        for (idx, command) in self.commands.iter_mut().enumerate() {
            command.prepare(&ctx, config.main_command == Some(idx))?;
        }

        let deadline = self.deadline.clone().unwrap_or_else(|| match config.time_allowed {
            Some(allowed) => Deadline::new(allowed),
            None => Deadline::unbounded(),
        });
        let mut time_limit =
            TimeLimitingCollector::new(deadline).with_check_interval(config.check_interval);
        let mut response = GroupedResponse::default();

        // First pass.
        let mut first: Vec<Box<dyn Collector>> = Vec::with_capacity(self.commands.len() + 1);
        for command in &mut self.commands {
            first.push(command.create_first_pass_collector(&ctx)?);
        }
        let doc_set_source = if config.need_doc_set {
            let heads = if config.group_heads_doc_set {
                self.group_heads_collector(&ctx)?
            } else {
                None
            };
            Some(match heads {
                Some((idx, collector)) => {
                    first.push(collector);
                    DocSetSource::GroupHeads(idx)
                }
                None => {
                    first.push(Box::new(DocSetCollector::new(ctx.reader().max_doc())));
                    DocSetSource::Matches
                }
            })
        } else {
            None
        };
        let first_count = first.len();
        let root = MultiCollector::wrap(first)?;

        let needs_second_pass = self.commands.iter().any(|command| command.has_second_pass());
        let cache_scores = self.commands.iter().any(|command| command.needs_scores());
        let max_docs_to_cache = ctx.max_doc() * usize::from(config.cache_percentage) / 100;
        let caching = needs_second_pass && max_docs_to_cache > 0;
        let root = if caching {
            debug!("caching up to {max_docs_to_cache} docs of the first pass (scores: {cache_scores})");
            Box::new(CachingCollector::create(
                root,
                cache_scores,
                CacheBudget::Docs(max_docs_to_cache),
            )) as Box<dyn Collector>
        } else {
            root
        };

        time_limit.set_collector(root);
        self.scan(&mut time_limit, &mut response)?;
        let root = time_limit
            .take_collector()
            .ok_or_else(|| PhalanxError::internal("first pass collector was lost"))?;

        let (cache, root) = if caching {
            let mut cache = downcast_collector::<CachingCollector>(root)?;
            let inner = cache
                .take_inner()
                .ok_or_else(|| PhalanxError::internal("cached collector was lost"))?;
            (Some(cache), inner)
        } else {
            (None, root)
        };
        let mut first = MultiCollector::split(root, first_count)?;

        if let Some(source) = doc_set_source {
            let collector = first
                .pop()
                .ok_or_else(|| PhalanxError::internal("doc set collector was lost"))?;
            response.doc_set = Some(match source {
                DocSetSource::Matches => {
                    downcast_collector::<DocSetCollector>(collector)?.into_doc_set()
                }
                DocSetSource::GroupHeads(idx) => self.commands[idx].retrieve_group_heads(collector)?,
            });
        }

        // Second pass.
        let mut second_slots: Vec<bool> = Vec::with_capacity(self.commands.len());
        let mut second: Vec<Box<dyn Collector>> = Vec::new();
        for (command, first) in self.commands.iter_mut().zip(first) {
            match command.create_second_pass_collector(first, &ctx)? {
                Some(collector) => {
                    second.push(collector);
                    second_slots.push(true);
                }
                None => second_slots.push(false),
            }
        }

        let mut second_results = Vec::with_capacity(second.len());
        if !second.is_empty() {
            let second_count = second.len();
            let mut root = MultiCollector::wrap(second)?;
            match cache {
                Some(cache) if cache.is_cached() => {
                    debug!("replaying {} cached docs", cache.cached_docs());
                    cache.replay(root.as_mut())?;
                }
                cache => {
                    if cache.is_some() {
                        response.cache_overflow = true;
                        warn!(
                            "first pass exceeded the cache of {max_docs_to_cache} docs, scanning again"
                        );
                    }
                    time_limit.set_collector(root);
                    self.scan(&mut time_limit, &mut response)?;
                    root = time_limit
                        .take_collector()
                        .ok_or_else(|| PhalanxError::internal("second pass collector was lost"))?;
                }
            }
            second_results = MultiCollector::split(root, second_count)?;
        }

        // Results.
        let mut second_results = second_results.into_iter();
        let mut doc_list = config.need_doc_list.then(Vec::new);
        let mut seen = AHashSet::new();
        for (idx, (command, has_second)) in self.commands.iter_mut().zip(second_slots).enumerate() {
            let second = if has_second { second_results.next() } else { None };
            let result = command.finish(second, &ctx)?;
            if let Some(doc_list) = doc_list.as_mut() {
                for hit in result.docs() {
                    if seen.insert(hit.doc) {
                        doc_list.push(hit.doc);
                    }
                }
            }
            let named = NamedCommandResponse {
                key: command.key().to_string(),
                response: result,
            };
            if config.main_command == Some(idx) {
                response.main = Some(named);
            } else {
                response.commands.push(named);
            }
        }
        response.doc_list = doc_list;
        Ok(response)
    }

    fn validate(&self) -> Result<()> {
        if self.commands.is_empty() {
            return Err(PhalanxError::configuration(
                "at least one grouping command is required",
            ));
        }
        if self.config.cache_percentage > 100 {
            return Err(PhalanxError::configuration(format!(
                "cache percentage must be between 0 and 100 (got {})",
                self.config.cache_percentage
            )));
        }
        if let Some(main) = self.config.main_command {
            if main >= self.commands.len() {
                return Err(PhalanxError::configuration(format!(
                    "main command {main} does not exist, {} commands are registered",
                    self.commands.len()
                )));
            }
        }
        Ok(())
    }

    fn group_heads_collector(
        &self,
        ctx: &GroupingContext<'_>,
    ) -> Result<Option<(usize, Box<dyn Collector>)>> {
        let idx = self.config.main_command.unwrap_or(0);
        Ok(self.commands[idx]
            .create_all_group_heads_collector(ctx)?
            .map(|collector| (idx, collector)))
    }

    /// Scan through the time limit. An expired deadline ends the scan and
    /// flags the response; other errors abort the execution.
    fn scan(&self, time_limit: &mut TimeLimitingCollector, response: &mut GroupedResponse) -> Result<()> {
        match self.searcher.search(self.query, self.filter, time_limit) {
            Ok(()) => Ok(()),
            Err(PhalanxError::TimeExceeded {
                allowed,
                elapsed,
                last_doc,
            }) => {
                warn!(
                    "grouping exceeded its time budget of {} ms after {} ms at doc {last_doc}, returning partial results",
                    allowed.as_millis(),
                    elapsed.as_millis()
                );
                response.partial_results = true;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::command::{FieldCommand, GroupParams};
    use crate::grouping::response::CommandResponse;
    use crate::index::{FieldValue, IndexReader, SegmentBuilder};
    use crate::query::match_all::MatchAllQuery;
    use crate::search::sort::Sort;

    fn searcher() -> Result<IndexSearcher> {
        let mut segments = Vec::new();
        for categories in [["a", "b", "a"], ["c", "b", "a"]] {
            let mut builder = SegmentBuilder::new();
            for category in categories {
                builder.add_document([("category", FieldValue::from(category))])?;
            }
            segments.push(builder.build());
        }
        Ok(IndexSearcher::new(IndexReader::from_segments(segments)))
    }

    fn params(key: &str) -> GroupParams {
        GroupParams::new(key)
            .with_group_sort(Sort::index_order())
            .with_within_group_sort(Sort::index_order())
            .with_docs_per_group(3)
    }

    #[test]
    fn test_requires_a_command() -> Result<()> {
        let searcher = searcher()?;
        let query = MatchAllQuery::new();
        let grouping = Grouping::new(&searcher, &query, GroupingConfig::default());
        assert!(grouping.execute().unwrap_err().is_client_error());

        let mut grouping = Grouping::new(
            &searcher,
            &query,
            GroupingConfig::default().with_main_command(3),
        );
        grouping.add_command(FieldCommand::field(params("category"), "category"));
        assert!(grouping.execute().is_err());
        Ok(())
    }

    #[test]
    fn test_replay_matches_rescan() -> Result<()> {
        let searcher = searcher()?;
        let query = MatchAllQuery::new();

        let mut responses = Vec::new();
        for percentage in [0, 100] {
            let config = GroupingConfig::default()
                .with_cache_percentage(percentage)
                .with_doc_list(true);
            let mut grouping = Grouping::new(&searcher, &query, config);
            grouping.add_command(FieldCommand::field(params("category"), "category"));
            responses.push(grouping.execute()?);
        }

        assert_eq!(responses[0].commands, responses[1].commands);
        assert!(!responses[1].cache_overflow);
        assert_eq!(responses[1].doc_list, Some(vec![0, 2, 5, 1, 4, 3]));
        Ok(())
    }

    #[test]
    fn test_cache_overflow_rescans() -> Result<()> {
        let searcher = searcher()?;
        let query = MatchAllQuery::new();
        // 20% of 6 docs caches one doc, far less than the scan.
        let config = GroupingConfig::default().with_cache_percentage(20);
        let mut grouping = Grouping::new(&searcher, &query, config);
        grouping.add_command(FieldCommand::field(params("category"), "category"));
        let response = grouping.execute()?;

        assert!(response.cache_overflow);
        assert!(!response.partial_results);
        assert_eq!(response.command("category").map(CommandResponse::matches), Some(6));
        Ok(())
    }

    #[test]
    fn test_main_command_and_doc_set() -> Result<()> {
        let searcher = searcher()?;
        let query = MatchAllQuery::new();
        let config = GroupingConfig::default()
            .with_main_command(0)
            .with_doc_set(true)
            .with_group_heads_doc_set(true);
        let mut grouping = Grouping::new(&searcher, &query, config);
        grouping.add_command(FieldCommand::field(params("category").with_limit(2), "category"));
        let response = grouping.execute()?;

        assert!(response.commands.is_empty());
        let Some(main) = &response.main else {
            panic!("main result is missing");
        };
        let CommandResponse::Simple(simple) = &main.response else {
            panic!("main result must be flat");
        };
        let docs: Vec<u32> = simple.doc_list.docs.iter().map(|hit| hit.doc).collect();
        assert_eq!(docs, vec![0, 2]);

        let heads: Vec<u32> = response.doc_set.map(|set| set.iter().collect()).unwrap_or_default();
        assert_eq!(heads, vec![0, 1, 3]);
        Ok(())
    }

    #[test]
    fn test_expired_deadline_is_partial() -> Result<()> {
        let searcher = searcher()?;
        let query = MatchAllQuery::new();
        let deadline = Deadline::unbounded();
        deadline.expire();

        let mut grouping = Grouping::new(&searcher, &query, GroupingConfig::default())
            .with_deadline(deadline);
        grouping.add_command(FieldCommand::field(params("category"), "category"));
        let response = grouping.execute()?;

        assert!(response.partial_results);
        assert_eq!(response.command("category").map(CommandResponse::matches), Some(0));
        Ok(())
    }
}
