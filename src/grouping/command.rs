//! Grouping commands: one per grouping dimension of a request.
//!
//! A command owns the collectors of its dimension and turns what they
//! gathered into a [`CommandResponse`]. The orchestrator drives every command
//! through the same lifecycle: `prepare`, `create_first_pass_collector`,
//! `create_second_pass_collector` and `finish`, each exactly once and in that
//! order.

use std::fmt::Debug;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{PhalanxError, Result};
use crate::grouping::all_groups::{AllGroupHeadsCollector, AllGroupsCollector};
use crate::grouping::config::GroupingConfig;
use crate::grouping::first_pass::FirstPassGroupingCollector;
use crate::grouping::response::{
    CommandResponse, DocSlice, GroupResponse, GroupedCommandResponse, ResponseDoc,
    SimpleCommandResponse,
};
use crate::grouping::second_pass::SecondPassGroupingCollector;
use crate::grouping::selector::{
    GroupSelector, GroupValue, TermGroupSelector, ValueSourceGroupSelector,
};
use crate::grouping::top_groups::TopGroups;
use crate::index::{DocSet, IndexReader};
use crate::query::filter::Filter;
use crate::query::function::ValueSource;
use crate::query::query::Query;
use crate::search::collector::{
    CollectFilter, Collector, FilterCollector, MultiCollector, TopFieldCollector,
    TotalHitCountCollector, downcast_collector,
};
use crate::search::searcher::IndexSearcher;
use crate::search::sort::Sort;

/// Shape of a command's result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupFormat {
    /// One entry per group, each with its own document list.
    #[default]
    Grouped,
    /// The documents of every group flattened into one list.
    Simple,
}

/// Parameters of one grouping command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupParams {
    /// Name the result is reported under.
    pub key: String,
    /// Ranks groups against each other.
    pub group_sort: Sort,
    /// Ranks documents inside a group.
    pub within_group_sort: Sort,
    /// Groups to skip (documents to skip in the simple format).
    pub offset: usize,
    /// Groups to return (documents to return in the simple format).
    pub limit: usize,
    /// Documents to skip inside each group.
    pub group_offset: usize,
    /// Documents to return for each group.
    pub docs_per_group: usize,
    /// Also count distinct groups.
    pub include_group_count: bool,
    pub format: GroupFormat,
}

impl Default for GroupParams {
    fn default() -> Self {
        GroupParams {
            key: String::new(),
            group_sort: Sort::relevance(),
            within_group_sort: Sort::relevance(),
            offset: 0,
            limit: 10,
            group_offset: 0,
            docs_per_group: 1,
            include_group_count: false,
            format: GroupFormat::Grouped,
        }
    }
}

impl GroupParams {
    /// Default parameters under `key`.
    pub fn new<S: Into<String>>(key: S) -> Self {
        GroupParams {
            key: key.into(),
            ..GroupParams::default()
        }
    }

    pub fn with_group_sort(mut self, sort: Sort) -> Self {
        self.group_sort = sort;
        self
    }

    pub fn with_within_group_sort(mut self, sort: Sort) -> Self {
        self.within_group_sort = sort;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_group_offset(mut self, group_offset: usize) -> Self {
        self.group_offset = group_offset;
        self
    }

    pub fn with_docs_per_group(mut self, docs_per_group: usize) -> Self {
        self.docs_per_group = docs_per_group;
        self
    }

    pub fn with_group_count(mut self, include: bool) -> Self {
        self.include_group_count = include;
        self
    }

    pub fn with_format(mut self, format: GroupFormat) -> Self {
        self.format = format;
        self
    }
}

/// What one execution shares with its commands. Created per execution and
/// never stored by a command.
#[derive(Debug, Clone, Copy)]
pub struct GroupingContext<'a> {
    pub searcher: &'a IndexSearcher,
    pub query: &'a dyn Query,
    pub filter: Option<&'a dyn Filter>,
    pub config: &'a GroupingConfig,
}

impl GroupingContext<'_> {
    /// The searched reader.
    pub fn reader(&self) -> &IndexReader {
        self.searcher.reader()
    }

    /// Number of documents in the index.
    pub fn max_doc(&self) -> usize {
        self.reader().max_doc() as usize
    }
}

/// A grouping dimension of a request.
pub trait GroupingCommand: Send + Debug {
    /// Name the result is reported under.
    fn key(&self) -> &str;

    /// Parameters of the command.
    fn params(&self) -> &GroupParams;

    /// Validate against the index and size the collectors. `main` marks the
    /// command whose result is the page's main result.
    fn prepare(&mut self, ctx: &GroupingContext<'_>, main: bool) -> Result<()>;

    /// Whether the collectors after the first scan need scores.
    fn needs_scores(&self) -> bool;

    /// Collector of the first scan.
    fn create_first_pass_collector(&mut self, ctx: &GroupingContext<'_>) -> Result<Box<dyn Collector>>;

    /// Whether the command needs a second scan. Known once the first pass
    /// collector exists.
    fn has_second_pass(&self) -> bool;

    /// Take back the first pass collector and return the collector of the
    /// second scan, if any.
    fn create_second_pass_collector(
        &mut self,
        first: Box<dyn Collector>,
        ctx: &GroupingContext<'_>,
    ) -> Result<Option<Box<dyn Collector>>>;

    /// Take back the second pass collector and build the result.
    fn finish(
        &mut self,
        second: Option<Box<dyn Collector>>,
        ctx: &GroupingContext<'_>,
    ) -> Result<CommandResponse>;

    /// Collector finding the head document of every group, when the command
    /// partitions documents into groups.
    fn create_all_group_heads_collector(
        &self,
        _ctx: &GroupingContext<'_>,
    ) -> Result<Option<Box<dyn Collector>>> {
        Ok(None)
    }

    /// Global ids of the heads found by the collector from
    /// [`create_all_group_heads_collector`](Self::create_all_group_heads_collector).
    fn retrieve_group_heads(&self, _collector: Box<dyn Collector>) -> Result<DocSet> {
        Err(PhalanxError::invalid_state(format!(
            "command '{}' does not collect group heads",
            self.key()
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    New,
    Prepared,
    FirstPass,
    SecondPass,
    Finished,
}

fn transition(phase: &mut Phase, from: Phase, to: Phase, key: &str) -> Result<()> {
    if *phase != from {
        return Err(PhalanxError::invalid_state(format!(
            "command '{key}' cannot move to {to:?} from {phase:?}"
        )));
    }
    *phase = to;
    Ok(())
}

/// Documents to collect per group, or per page, bounded by the index size.
fn docs_to_collect(offset: usize, limit: usize, max_doc: usize) -> usize {
    offset.saturating_add(limit).max(1).min(max_doc)
}

#[derive(Debug)]
enum SecondPassPlan {
    /// The group window is empty; only hits (and groups) were counted.
    CountOnly,
    /// No group survived the offset; the second scan only counts hits.
    Fallback,
    /// The selected groups are collected.
    Groups,
}

/// Groups by the value a [`GroupSelector`] derives from each document.
#[derive(Debug)]
pub struct SelectorCommand<S: GroupSelector + Clone> {
    params: GroupParams,
    selector: S,
    phase: Phase,
    format: GroupFormat,
    actual_groups_to_find: usize,
    first_group_offset: usize,
    docs_to_collect: usize,
    needs_scores: bool,
    plan: Option<SecondPassPlan>,
    matches: u64,
    group_count: Option<usize>,
}

/// Groups by the term of a string field.
pub type FieldCommand = SelectorCommand<TermGroupSelector>;

/// Groups by a computed value.
pub type FunctionCommand = SelectorCommand<ValueSourceGroupSelector>;

impl FieldCommand {
    /// Group by the terms of `field`.
    pub fn field<F: Into<String>>(params: GroupParams, field: F) -> Self {
        SelectorCommand::new(params, TermGroupSelector::new(field))
    }
}

impl FunctionCommand {
    /// Group by the values of `source`.
    pub fn function(params: GroupParams, source: Arc<dyn ValueSource>) -> Self {
        SelectorCommand::new(params, ValueSourceGroupSelector::new(source))
    }
}

impl<S: GroupSelector + Clone> SelectorCommand<S> {
    /// Create a command grouping with `selector`.
    pub fn new(params: GroupParams, selector: S) -> Self {
        let format = params.format;
        SelectorCommand {
            params,
            selector,
            phase: Phase::New,
            format,
            actual_groups_to_find: 0,
            first_group_offset: 0,
            docs_to_collect: 0,
            needs_scores: false,
            plan: None,
            matches: 0,
            group_count: None,
        }
    }

    /// Effective result format.
    pub fn format(&self) -> GroupFormat {
        self.format
    }

    /// Number of groups the first pass looks for.
    pub fn actual_groups_to_find(&self) -> usize {
        self.actual_groups_to_find
    }

    fn first_pass_parts(&self) -> usize {
        if self.params.include_group_count { 2 } else { 1 }
    }

    fn take_group_count(&mut self, parts: &mut Vec<Box<dyn Collector>>) -> Result<()> {
        if self.params.include_group_count {
            if let Some(all_groups) = parts.pop() {
                let all_groups = downcast_collector::<AllGroupsCollector<S>>(all_groups)?;
                self.group_count = Some(all_groups.group_count());
            }
        }
        Ok(())
    }

    fn response(&self, top: Option<TopGroups<S::Value>>) -> CommandResponse {
        match self.format {
            GroupFormat::Grouped => CommandResponse::Grouped(GroupedCommandResponse {
                matches: self.matches,
                ngroups: self.group_count,
                groups: top
                    .map(|top| {
                        top.groups
                            .into_iter()
                            .map(|group| GroupResponse {
                                group_value: group.group_value.to_json(),
                                doc_list: DocSlice {
                                    offset: self.params.group_offset,
                                    num_found: group.total_hits,
                                    max_score: group.max_score,
                                    docs: group
                                        .score_docs
                                        .iter()
                                        .map(ResponseDoc::from)
                                        .collect(),
                                },
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            }),
            GroupFormat::Simple => {
                let (max_score, docs) = match top {
                    Some(top) => (
                        top.max_score,
                        top.groups
                            .iter()
                            .flat_map(|group| group.score_docs.iter())
                            .skip(self.params.offset)
                            .take(self.params.limit)
                            .map(ResponseDoc::from)
                            .collect(),
                    ),
                    None => (None, Vec::new()),
                };
                CommandResponse::Simple(SimpleCommandResponse {
                    matches: self.matches,
                    ngroups: self.group_count,
                    doc_list: DocSlice {
                        offset: self.params.offset,
                        num_found: self.matches,
                        max_score,
                        docs,
                    },
                })
            }
        }
    }
}

impl<S: GroupSelector + Clone> GroupingCommand for SelectorCommand<S> {
    fn key(&self) -> &str {
        &self.params.key
    }

    fn params(&self) -> &GroupParams {
        &self.params
    }

    fn prepare(&mut self, ctx: &GroupingContext<'_>, main: bool) -> Result<()> {
        transition(&mut self.phase, Phase::New, Phase::Prepared, &self.params.key)?;
        let reader = ctx.reader();
        self.selector.validate(reader)?;
        self.params.group_sort.validate(reader)?;
        self.params.within_group_sort.validate(reader)?;

        if main {
            self.format = GroupFormat::Simple;
        }
        let max_doc = ctx.max_doc();
        self.actual_groups_to_find = self.params.offset.saturating_add(self.params.limit).min(max_doc);
        // The simple format pages over documents, so it needs the groups above
        // the offset too.
        self.first_group_offset = match self.format {
            GroupFormat::Simple => 0,
            GroupFormat::Grouped => self.params.offset,
        };
        self.docs_to_collect =
            docs_to_collect(self.params.group_offset, self.params.docs_per_group, max_doc);
        self.needs_scores = self.params.within_group_sort.needs_scores() || ctx.config.need_scores;
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        self.needs_scores
    }

    fn create_first_pass_collector(&mut self, ctx: &GroupingContext<'_>) -> Result<Box<dyn Collector>> {
        transition(&mut self.phase, Phase::Prepared, Phase::FirstPass, &self.params.key)?;
        let mut collectors: Vec<Box<dyn Collector>> = Vec::with_capacity(2);
        if self.actual_groups_to_find == 0 {
            debug!(
                "command '{}' has an empty group window, counting hits only",
                self.params.key
            );
            self.plan = Some(SecondPassPlan::CountOnly);
            collectors.push(Box::new(TotalHitCountCollector::new()));
        } else {
            collectors.push(Box::new(FirstPassGroupingCollector::new(
                self.selector.clone(),
                self.params.group_sort.clone(),
                self.actual_groups_to_find,
            )?));
        }
        if self.params.include_group_count {
            collectors.push(Box::new(AllGroupsCollector::new(self.selector.clone())));
        }
        debug!(
            "command '{}' first pass over {} docs looks for {} groups",
            self.params.key,
            ctx.max_doc(),
            self.actual_groups_to_find
        );
        MultiCollector::wrap(collectors)
    }

    fn has_second_pass(&self) -> bool {
        !matches!(self.plan, Some(SecondPassPlan::CountOnly))
    }

    fn create_second_pass_collector(
        &mut self,
        first: Box<dyn Collector>,
        _ctx: &GroupingContext<'_>,
    ) -> Result<Option<Box<dyn Collector>>> {
        transition(&mut self.phase, Phase::FirstPass, Phase::SecondPass, &self.params.key)?;
        let mut parts = MultiCollector::split(first, self.first_pass_parts())?;
        self.take_group_count(&mut parts)?;
        let first = parts
            .pop()
            .ok_or_else(|| PhalanxError::internal("first pass collector is missing"))?;

        if matches!(self.plan, Some(SecondPassPlan::CountOnly)) {
            self.matches = downcast_collector::<TotalHitCountCollector>(first)?.total_hits();
            return Ok(None);
        }

        let first = downcast_collector::<FirstPassGroupingCollector<S>>(first)?;
        let Some(groups) = first.get_top_groups(self.first_group_offset) else {
            debug!(
                "command '{}' found {} groups, none past offset {}",
                self.params.key,
                first.group_count(),
                self.first_group_offset
            );
            self.plan = Some(SecondPassPlan::Fallback);
            return Ok(Some(Box::new(TotalHitCountCollector::new())));
        };

        self.plan = Some(SecondPassPlan::Groups);
        Ok(Some(Box::new(SecondPassGroupingCollector::new(
            self.selector.clone(),
            groups,
            self.params.group_sort.clone(),
            self.params.within_group_sort.clone(),
            self.docs_to_collect,
            self.needs_scores,
            self.needs_scores,
        )?)))
    }

    fn finish(
        &mut self,
        second: Option<Box<dyn Collector>>,
        _ctx: &GroupingContext<'_>,
    ) -> Result<CommandResponse> {
        transition(&mut self.phase, Phase::SecondPass, Phase::Finished, &self.params.key)?;
        let top = match (&self.plan, second) {
            (Some(SecondPassPlan::CountOnly), _) => None,
            (Some(SecondPassPlan::Fallback), Some(second)) => {
                self.matches = downcast_collector::<TotalHitCountCollector>(second)?.total_hits();
                None
            }
            (Some(SecondPassPlan::Groups), Some(second)) => {
                let second = downcast_collector::<SecondPassGroupingCollector<S>>(second)?;
                let mut top = second.get_top_groups(self.params.group_offset, self.params.docs_per_group);
                top.total_group_count = self.group_count;
                self.matches = top.total_hit_count;
                Some(top)
            }
            (plan, _) => {
                return Err(PhalanxError::internal(format!(
                    "command '{}' has no second pass collector for plan {plan:?}",
                    self.params.key
                )));
            }
        };
        Ok(self.response(top))
    }

    fn create_all_group_heads_collector(
        &self,
        ctx: &GroupingContext<'_>,
    ) -> Result<Option<Box<dyn Collector>>> {
        Ok(Some(Box::new(AllGroupHeadsCollector::new(
            self.selector.clone(),
            self.params.within_group_sort.clone(),
            ctx.reader().max_doc(),
        )?)))
    }

    fn retrieve_group_heads(&self, collector: Box<dyn Collector>) -> Result<DocSet> {
        let heads = downcast_collector::<AllGroupHeadsCollector<S>>(collector)?;
        Ok(heads.retrieve_group_heads())
    }
}

/// Collapses the matches of an auxiliary query into a single group. One
/// scan suffices: the main query's hits are filtered by the auxiliary
/// query's doc set.
#[derive(Debug)]
pub struct QueryCommand {
    params: GroupParams,
    query: Box<dyn Query>,
    phase: Phase,
    format: GroupFormat,
    docs_to_collect: usize,
    needs_scores: bool,
    doc_set: Option<Arc<DocSet>>,
    collected: Option<Box<dyn Collector>>,
}

impl QueryCommand {
    /// Create a command grouping the matches of `query`.
    pub fn new(params: GroupParams, query: Box<dyn Query>) -> Self {
        let format = params.format;
        QueryCommand {
            params,
            query,
            phase: Phase::New,
            format,
            docs_to_collect: 0,
            needs_scores: false,
            doc_set: None,
            collected: None,
        }
    }

    /// The auxiliary query.
    pub fn query(&self) -> &dyn Query {
        self.query.as_ref()
    }

    fn page(&self) -> (usize, usize) {
        match self.format {
            GroupFormat::Grouped => (self.params.group_offset, self.params.docs_per_group),
            GroupFormat::Simple => (self.params.offset, self.params.limit),
        }
    }
}

impl GroupingCommand for QueryCommand {
    fn key(&self) -> &str {
        &self.params.key
    }

    fn params(&self) -> &GroupParams {
        &self.params
    }

    fn prepare(&mut self, ctx: &GroupingContext<'_>, main: bool) -> Result<()> {
        transition(&mut self.phase, Phase::New, Phase::Prepared, &self.params.key)?;
        self.params.within_group_sort.validate(ctx.reader())?;
        if main {
            self.format = GroupFormat::Simple;
        }
        let (offset, limit) = self.page();
        self.docs_to_collect = docs_to_collect(offset, limit, ctx.max_doc());
        self.needs_scores = self.params.within_group_sort.needs_scores() || ctx.config.need_scores;

        let doc_set = ctx.searcher.doc_set(self.query.as_ref(), None)?;
        debug!(
            "command '{}' groups the {} matches of {}",
            self.params.key,
            doc_set.len(),
            self.query.description()
        );
        self.doc_set = Some(Arc::new(doc_set));
        Ok(())
    }

    fn needs_scores(&self) -> bool {
        self.needs_scores
    }

    fn create_first_pass_collector(&mut self, _ctx: &GroupingContext<'_>) -> Result<Box<dyn Collector>> {
        transition(&mut self.phase, Phase::Prepared, Phase::FirstPass, &self.params.key)?;
        let doc_set = self
            .doc_set
            .clone()
            .ok_or_else(|| PhalanxError::invalid_state("query command was not prepared"))?;
        let top = TopFieldCollector::new(
            self.params.within_group_sort.clone(),
            self.docs_to_collect,
            self.needs_scores,
            self.needs_scores,
        )?;
        MultiCollector::wrap(vec![
            Box::new(TotalHitCountCollector::new()),
            Box::new(FilterCollector::new(Box::new(top), CollectFilter::DocSet(doc_set))),
        ])
    }

    fn has_second_pass(&self) -> bool {
        false
    }

    fn create_second_pass_collector(
        &mut self,
        first: Box<dyn Collector>,
        _ctx: &GroupingContext<'_>,
    ) -> Result<Option<Box<dyn Collector>>> {
        transition(&mut self.phase, Phase::FirstPass, Phase::SecondPass, &self.params.key)?;
        self.collected = Some(first);
        Ok(None)
    }

    fn finish(
        &mut self,
        _second: Option<Box<dyn Collector>>,
        _ctx: &GroupingContext<'_>,
    ) -> Result<CommandResponse> {
        transition(&mut self.phase, Phase::SecondPass, Phase::Finished, &self.params.key)?;
        let collected = self
            .collected
            .take()
            .ok_or_else(|| PhalanxError::internal("query command lost its collector"))?;
        let mut parts = MultiCollector::split(collected, 2)?.into_iter();
        let (Some(total), Some(filtered)) = (parts.next(), parts.next()) else {
            return Err(PhalanxError::internal("query command collectors are missing"));
        };
        let matches = downcast_collector::<TotalHitCountCollector>(total)?.total_hits();
        let filtered = downcast_collector::<FilterCollector>(filtered)?;
        let top = downcast_collector::<TopFieldCollector>(filtered.into_inner())?;

        let (offset, limit) = self.page();
        let top = top.top_docs_range(offset, limit);
        let ngroups = self
            .params
            .include_group_count
            .then_some(usize::from(top.total_hits > 0));
        let doc_list = DocSlice {
            offset,
            num_found: top.total_hits,
            max_score: top.max_score,
            docs: top.field_docs.iter().map(ResponseDoc::from).collect(),
        };

        Ok(match self.format {
            GroupFormat::Grouped => CommandResponse::Grouped(GroupedCommandResponse {
                matches,
                ngroups,
                groups: vec![GroupResponse {
                    group_value: serde_json::Value::String(self.query.description()),
                    doc_list,
                }],
            }),
            GroupFormat::Simple => CommandResponse::Simple(SimpleCommandResponse {
                matches,
                ngroups,
                doc_list,
            }),
        })
    }
}
