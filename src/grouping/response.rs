//! Serializable grouping results.

use serde::{Deserialize, Serialize};

use crate::index::{DocId, DocSet};
use crate::search::score_doc::FieldDoc;

/// A returned document. The score is only present when it was computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseDoc {
    pub doc: DocId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl ResponseDoc {
    pub fn new(doc: DocId, score: Option<f32>) -> Self {
        ResponseDoc { doc, score }
    }
}

impl From<&FieldDoc> for ResponseDoc {
    fn from(hit: &FieldDoc) -> Self {
        ResponseDoc {
            doc: hit.doc,
            score: (!hit.score.is_nan()).then_some(hit.score),
        }
    }
}

/// A page of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSlice {
    /// Rank of the first document of the page.
    pub offset: usize,
    /// Number of documents the page was cut from.
    pub num_found: u64,
    pub max_score: Option<f32>,
    pub docs: Vec<ResponseDoc>,
}

/// One group of a grouped response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResponse {
    pub group_value: serde_json::Value,
    pub doc_list: DocSlice,
}

/// Result of a command rendered one entry per group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedCommandResponse {
    pub matches: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ngroups: Option<usize>,
    pub groups: Vec<GroupResponse>,
}

/// Result of a command flattened into one document list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleCommandResponse {
    pub matches: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ngroups: Option<usize>,
    pub doc_list: DocSlice,
}

/// Result of one grouping command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandResponse {
    Grouped(GroupedCommandResponse),
    Simple(SimpleCommandResponse),
}

impl CommandResponse {
    /// Number of documents that matched the query.
    pub fn matches(&self) -> u64 {
        match self {
            CommandResponse::Grouped(response) => response.matches,
            CommandResponse::Simple(response) => response.matches,
        }
    }

    /// Number of distinct groups, when counted.
    pub fn ngroups(&self) -> Option<usize> {
        match self {
            CommandResponse::Grouped(response) => response.ngroups,
            CommandResponse::Simple(response) => response.ngroups,
        }
    }

    /// Every returned document in response order.
    pub fn docs(&self) -> Vec<&ResponseDoc> {
        match self {
            CommandResponse::Grouped(response) => response
                .groups
                .iter()
                .flat_map(|group| group.doc_list.docs.iter())
                .collect(),
            CommandResponse::Simple(response) => response.doc_list.docs.iter().collect(),
        }
    }
}

/// A command result with the key it was requested under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCommandResponse {
    pub key: String,
    pub response: CommandResponse,
}

/// Result of a whole grouping execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupedResponse {
    /// Results of every command except the main one, in request order.
    pub commands: Vec<NamedCommandResponse>,
    /// Result of the command marked as main.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<NamedCommandResponse>,
    /// The deadline expired during a scan.
    pub partial_results: bool,
    /// The first scan did not fit in the cache and was run again.
    pub cache_overflow: bool,
    /// Deduplicated ids of every returned document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_list: Option<Vec<DocId>>,
    #[serde(skip)]
    pub doc_set: Option<DocSet>,
}

impl GroupedResponse {
    /// Result of a command by key, the main command included.
    pub fn command(&self, key: &str) -> Option<&CommandResponse> {
        self.commands
            .iter()
            .chain(self.main.iter())
            .find(|named| named.key == key)
            .map(|named| &named.response)
    }
}
