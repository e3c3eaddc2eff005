//! Two-pass grouping of search results.
//!
//! The first pass finds the top groups by a group sort, the second pass
//! collects the top documents of each of those groups by a within-group
//! sort. [`Grouping`] runs any number of [`GroupingCommand`]s over shared
//! scans of one query.

pub mod all_groups;
pub mod command;
pub mod config;
pub mod engine;
pub mod first_pass;
pub mod response;
pub mod search_group;
pub mod second_pass;
pub mod selector;
pub mod top_groups;

pub use all_groups::{AllGroupHeadsCollector, AllGroupsCollector};
pub use command::{
    FieldCommand, FunctionCommand, GroupFormat, GroupParams, GroupingCommand, GroupingContext,
    QueryCommand, SelectorCommand,
};
pub use config::GroupingConfig;
pub use engine::Grouping;
pub use first_pass::FirstPassGroupingCollector;
pub use response::{
    CommandResponse, DocSlice, GroupResponse, GroupedCommandResponse, GroupedResponse,
    NamedCommandResponse, ResponseDoc, SimpleCommandResponse,
};
pub use search_group::SearchGroup;
pub use second_pass::SecondPassGroupingCollector;
pub use selector::{GroupSelector, GroupValue, TermGroupSelector, ValueSourceGroupSelector};
pub use top_groups::{GroupDocs, TopGroups};
