//! Execution-wide grouping settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of documents between two deadline checks.
pub const DEFAULT_CHECK_INTERVAL: u32 = 1;

/// Settings shared by every command of one grouping execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Share of the index, in percent, that may be cached to replay the
    /// first scan into the second one. `0` disables caching.
    pub cache_percentage: u8,

    /// Time budget of the whole execution, both scans included.
    pub time_allowed: Option<Duration>,

    /// Documents between two deadline checks.
    pub check_interval: u32,

    /// Also return the set of every matching document.
    pub need_doc_set: bool,

    /// Build the doc set from group heads instead of every match.
    pub group_heads_doc_set: bool,

    /// Also return the deduplicated ids of every returned document.
    pub need_doc_list: bool,

    /// Fill scores of returned documents even when no sort uses them.
    pub need_scores: bool,

    /// Index of the command whose result is the page's main result.
    pub main_command: Option<usize>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        GroupingConfig {
            cache_percentage: 0,
            time_allowed: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
            need_doc_set: false,
            group_heads_doc_set: false,
            need_doc_list: false,
            need_scores: false,
            main_command: None,
        }
    }
}

impl GroupingConfig {
    pub fn with_cache_percentage(mut self, percentage: u8) -> Self {
        self.cache_percentage = percentage;
        self
    }

    pub fn with_time_allowed(mut self, allowed: Duration) -> Self {
        self.time_allowed = Some(allowed);
        self
    }

    pub fn with_check_interval(mut self, interval: u32) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    pub fn with_doc_set(mut self, need_doc_set: bool) -> Self {
        self.need_doc_set = need_doc_set;
        self
    }

    pub fn with_group_heads_doc_set(mut self, group_heads: bool) -> Self {
        self.group_heads_doc_set = group_heads;
        self
    }

    pub fn with_doc_list(mut self, need_doc_list: bool) -> Self {
        self.need_doc_list = need_doc_list;
        self
    }

    pub fn with_scores(mut self, need_scores: bool) -> Self {
        self.need_scores = need_scores;
        self
    }

    pub fn with_main_command(mut self, index: usize) -> Self {
        self.main_command = Some(index);
        self
    }
}
