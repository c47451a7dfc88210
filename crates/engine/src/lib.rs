//! `engine` crate: workflow domain models, graph validation, and the
//! record lifecycle.

pub mod condition;
pub mod cron;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod models;
pub mod node;

pub use condition::{Condition, ConditionError};
pub use cron::{CronError, CronSchedule};
pub use error::EngineError;
pub use graph::{
    is_all_nodes_validated, summarize, validate_graph, GraphIssue, GraphReport, NodeReport,
    NodeSummary, WorkflowGraph,
};
pub use lifecycle::{access_record, access_records, Transition, WorkflowService};
pub use models::{LastRun, Trigger, WorkflowModel, WorkflowReport, WorkflowRun};
pub use node::{
    is_node_validated, validate_node, AccessLookup, NodeIssue, NodeType, ReferenceError,
    WorkflowNode,
};
