//! Workflow graph: an arena of nodes keyed by id, and its validator.
//!
//! Rules enforced by [`validate_graph`]:
//! 1. There is a root, and it is a `start` node; no other node is.
//! 2. Every `next`/`branches` id names a node in the arena.
//! 3. Every node has at most one parent, and there are no cycles.
//! 4. Only fan-out nodes have branches; conditions and result branches hang
//!    off the matching fan-out node; `end` has no successor.
//! 5. Every node reachable from the root validates on its own.
//!
//! Nodes the root cannot reach are reported as warnings only.
//!
//! Edits never mutate a graph in place: each returns a new graph that shares
//! the untouched nodes, so a validation pass always sees one snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use providers::ProviderRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::Trigger;
use crate::node::{
    validate_node, AccessLookup, ApplyConfig, ConditionConfig, DeployConfig, NodeIssue, NodeType,
    NotifyConfig, StartConfig, WorkflowNode,
};
use crate::EngineError;

// ---------------------------------------------------------------------------
// WorkflowGraph
// ---------------------------------------------------------------------------

/// The node arena of one workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphDoc", into = "GraphDoc")]
pub struct WorkflowGraph {
    root: Option<String>,
    nodes: BTreeMap<String, Arc<WorkflowNode>>,
}

/// Wire shape: `{"root": "<id>", "nodes": [ ... ]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GraphDoc {
    #[serde(default)]
    root: Option<String>,
    #[serde(default)]
    nodes: Vec<WorkflowNode>,
}

impl TryFrom<GraphDoc> for WorkflowGraph {
    type Error = EngineError;

    fn try_from(doc: GraphDoc) -> Result<Self, Self::Error> {
        let mut nodes = BTreeMap::new();
        for node in doc.nodes {
            if nodes.contains_key(&node.id) {
                return Err(EngineError::DuplicateNodeId(node.id));
            }
            nodes.insert(node.id.clone(), Arc::new(node));
        }
        Ok(Self { root: doc.root, nodes })
    }
}

impl From<WorkflowGraph> for GraphDoc {
    fn from(graph: WorkflowGraph) -> Self {
        Self {
            root: graph.root,
            nodes: graph
                .nodes
                .into_values()
                .map(|n| Arc::try_unwrap(n).unwrap_or_else(|shared| (*shared).clone()))
                .collect(),
        }
    }
}

impl WorkflowGraph {
    /// Build an arena from loose nodes.
    pub fn from_nodes(
        root: impl Into<String>,
        nodes: impl IntoIterator<Item = WorkflowNode>,
    ) -> Result<Self, EngineError> {
        GraphDoc { root: Some(root.into()), nodes: nodes.into_iter().collect() }.try_into()
    }

    /// Decode stored workflow content.
    ///
    /// Accepts the arena shape, the nested tree shape older records use
    /// (`next` and `branches` holding whole nodes), or `null` for "empty".
    pub fn from_content(content: &Value) -> Result<Self, EngineError> {
        match content {
            Value::Null => Ok(Self::default()),
            Value::Object(map) if map.contains_key("nodes") && map.contains_key("type") => Err(
                EngineError::MalformedContent("content mixes the arena and tree shapes".into()),
            ),
            Value::Object(map) if map.contains_key("nodes") || map.is_empty() => {
                serde_json::from_value(content.clone())
                    .map_err(|e| EngineError::MalformedContent(e.to_string()))
            }
            Value::Object(map) if map.contains_key("type") => Self::from_tree(content),
            _ => Err(EngineError::MalformedContent("expected a node arena or node tree".into())),
        }
    }

    fn from_tree(tree: &Value) -> Result<Self, EngineError> {
        let malformed = |msg: &str| EngineError::MalformedContent(msg.to_string());
        let child_id = |v: &Value| {
            v.get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| malformed("tree node without an id"))
        };

        let root = child_id(tree)?;
        let mut nodes = BTreeMap::new();
        let mut stack = vec![tree];
        while let Some(value) = stack.pop() {
            let Some(members) = value.as_object() else {
                return Err(malformed("tree node is not an object"));
            };

            let next = members.get("next").filter(|v| !v.is_null());
            let branches: Vec<&Value> = members
                .get("branches")
                .and_then(Value::as_array)
                .map(|b| b.iter().collect())
                .unwrap_or_default();

            let mut flat = members.clone();
            flat.remove("next");
            flat.remove("branches");
            let mut node: WorkflowNode = serde_json::from_value(Value::Object(flat))
                .map_err(|e| EngineError::MalformedContent(e.to_string()))?;
            node.next = next.map(child_id).transpose()?;
            node.branches = branches.iter().copied().map(child_id).collect::<Result<_, _>>()?;

            if nodes.contains_key(&node.id) {
                return Err(EngineError::DuplicateNodeId(node.id));
            }
            nodes.insert(node.id.clone(), Arc::new(node));

            stack.extend(next);
            stack.extend(branches);
        }
        Ok(Self { root: Some(root), nodes })
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn root_node(&self) -> Option<&WorkflowNode> {
        self.root.as_deref().and_then(|id| self.node(id))
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id).map(Arc::as_ref)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `other` holds the very same node allocation for `id`.
    pub fn shares_node(&self, other: &WorkflowGraph, id: &str) -> bool {
        match (self.nodes.get(id), other.nodes.get(id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The parent of `id` and whether `id` is its `next` (as opposed to a branch).
    fn parent_of(&self, id: &str) -> Option<(&WorkflowNode, bool)> {
        self.nodes().find_map(|n| {
            if n.next.as_deref() == Some(id) {
                Some((n, true))
            } else if n.branches.iter().any(|b| b == id) {
                Some((n, false))
            } else {
                None
            }
        })
    }

    /// Every node reachable from `id` through `next` and `branches`, `id` included.
    fn descendants(&self, id: &str) -> HashSet<&str> {
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else { continue };
            if seen.insert(node.id.as_str()) {
                stack.extend(node.children());
            }
        }
        seen
    }

    /// Nodes that run before `id` on the way from the root.
    ///
    /// Walking up from `id`: every ancestor runs first, and when `id` is
    /// reached through an ancestor's `next`, that ancestor's branches
    /// have already run too. Sibling branches are not upstream.
    pub fn upstream_of(&self, id: &str) -> HashSet<&str> {
        let mut upstream = HashSet::new();
        let mut walked = HashSet::new();
        let mut current = id.to_string();
        while walked.insert(current.clone()) {
            let Some((parent, via_next)) = self.parent_of(&current) else { break };
            upstream.insert(parent.id.as_str());
            if via_next {
                for branch in &parent.branches {
                    upstream.extend(self.descendants(branch));
                }
            }
            current = parent.id.clone();
        }
        upstream.remove(id);
        upstream
    }

    /// Access ids named by apply/deploy nodes.
    pub fn referenced_access_ids(&self) -> BTreeSet<Uuid> {
        self.nodes().filter_map(WorkflowNode::access_id).collect()
    }

    // -----------------------------------------------------------------------
    // Copy-on-write edits
    // -----------------------------------------------------------------------

    /// Insert or replace a node.
    pub fn with_node(&self, node: WorkflowNode) -> Self {
        let mut next = self.clone();
        next.nodes.insert(node.id.clone(), Arc::new(node));
        next
    }

    pub fn with_root(&self, id: impl Into<String>) -> Self {
        Self { root: Some(id.into()), nodes: self.nodes.clone() }
    }

    /// Replace one node's config.
    pub fn with_config(&self, id: &str, config: Value) -> Result<Self, EngineError> {
        let mut next = self.clone();
        let node = next
            .nodes
            .get_mut(id)
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))?;
        Arc::make_mut(node).config = config;
        Ok(next)
    }

    /// Insert `node` right after `after`, taking over its old successor.
    pub fn append_next(&self, after: &str, mut node: WorkflowNode) -> Result<Self, EngineError> {
        if self.nodes.contains_key(&node.id) {
            return Err(EngineError::DuplicateNodeId(node.id));
        }
        let mut next = self.clone();
        let anchor = next
            .nodes
            .get_mut(after)
            .ok_or_else(|| EngineError::NodeNotFound(after.to_string()))?;
        let anchor = Arc::make_mut(anchor);
        node.next = anchor.next.replace(node.id.clone());
        next.nodes.insert(node.id.clone(), Arc::new(node));
        Ok(next)
    }

    /// Remove `id` and everything after it (its branches and its `next`
    /// chain), and detach it from its parent.
    pub fn remove_subtree(&self, id: &str) -> Result<Self, EngineError> {
        if !self.nodes.contains_key(id) {
            return Err(EngineError::NodeNotFound(id.to_string()));
        }
        let doomed: HashSet<String> = self.descendants(id).into_iter().map(String::from).collect();

        let mut next = self.clone();
        next.nodes.retain(|k, _| !doomed.contains(k));
        for node in next.nodes.values_mut() {
            let points_at = node.next.as_deref() == Some(id) || node.branches.iter().any(|b| b == id);
            if points_at {
                let node = Arc::make_mut(node);
                if node.next.as_deref() == Some(id) {
                    node.next = None;
                }
                node.branches.retain(|b| b != id);
            }
        }
        if next.root.as_ref().is_some_and(|r| doomed.contains(r)) {
            next.root = None;
        }
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A structural problem with the graph as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphIssue {
    #[error("workflow has no root node")]
    MissingRoot,

    #[error("root '{id}' is a {node_type} node, not a start node")]
    RootNotStart { id: String, node_type: NodeType },

    #[error("start node '{id}' is not the root")]
    MisplacedStart { id: String },

    #[error("node '{parent}' points at missing node '{child}'")]
    DanglingChild { parent: String, child: String },

    #[error("node '{id}' is reached from more than one parent")]
    MultipleParents { id: String },

    #[error("node '{id}' leads back into its own ancestry")]
    Cycle { id: String },

    #[error("node '{id}': {message}")]
    Placement { id: String, message: String },
}

/// Issues found on one reachable node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub id: String,
    pub issues: Vec<NodeIssue>,
}

impl NodeReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Result of one [`validate_graph`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphReport {
    pub issues: Vec<GraphIssue>,
    /// Reachable nodes in visit order.
    pub nodes: Vec<NodeReport>,
    /// Arena nodes the root cannot reach. Warnings only.
    pub unreachable: Vec<String>,
    /// Node visits the pass performed.
    pub visits: usize,
}

impl GraphReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty() && self.nodes.iter().all(NodeReport::is_valid)
    }

    pub fn node(&self, id: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the whole graph from its root.
pub fn validate_graph(graph: &WorkflowGraph, accesses: &dyn AccessLookup) -> GraphReport {
    let mut report = GraphReport::default();

    let Some(root) = graph.root_node() else {
        report.issues.push(GraphIssue::MissingRoot);
        report.unreachable = graph.nodes().map(|n| n.id.clone()).collect();
        return report;
    };
    if root.node_type != NodeType::Start {
        report.issues.push(GraphIssue::RootNotStart { id: root.id.clone(), node_type: root.node_type });
    }

    // Every node is pushed at most once, so the pass is bounded even when
    // the stored graph is cyclic.
    let budget = graph.len() + 1;
    let mut parent: HashMap<&str, &str> = HashMap::from([(root.id.as_str(), "")]);
    let mut stack: Vec<(&WorkflowNode, Option<(&WorkflowNode, bool)>)> = vec![(root, None)];

    while let Some((node, via)) = stack.pop() {
        report.visits += 1;
        if report.visits > budget {
            break;
        }

        check_placement(node, via, root, &mut report.issues);
        report.nodes.push(NodeReport {
            id: node.id.clone(),
            issues: validate_node(node, graph, accesses),
        });

        // Push `next` first so branches are visited before it.
        let children = node
            .next
            .iter()
            .map(|id| (id, true))
            .chain(node.branches.iter().rev().map(|id| (id, false)));
        for (child_id, is_next) in children {
            let Some(child) = graph.node(child_id) else {
                report.issues.push(GraphIssue::DanglingChild {
                    parent: node.id.clone(),
                    child: child_id.clone(),
                });
                continue;
            };
            if parent.contains_key(child.id.as_str()) {
                report.issues.push(if is_ancestor(&parent, &child.id, &node.id) {
                    GraphIssue::Cycle { id: child.id.clone() }
                } else {
                    GraphIssue::MultipleParents { id: child.id.clone() }
                });
                continue;
            }
            parent.insert(child.id.as_str(), node.id.as_str());
            stack.push((child, Some((node, is_next))));
        }
    }

    report.unreachable = graph
        .nodes()
        .filter(|n| !parent.contains_key(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();

    debug!(
        valid = report.is_valid(),
        visits = report.visits,
        issues = report.issues.len(),
        unreachable = report.unreachable.len(),
        "validated workflow graph"
    );
    report
}

pub fn is_all_nodes_validated(graph: &WorkflowGraph, accesses: &dyn AccessLookup) -> bool {
    validate_graph(graph, accesses).is_valid()
}

/// Whether `candidate` is `from` or one of its ancestors.
fn is_ancestor(parent: &HashMap<&str, &str>, candidate: &str, from: &str) -> bool {
    let mut current = from;
    for _ in 0..=parent.len() {
        if current == candidate {
            return true;
        }
        match parent.get(current) {
            Some(&up) if !up.is_empty() => current = up,
            _ => return false,
        }
    }
    false
}

fn check_placement(
    node: &WorkflowNode,
    via: Option<(&WorkflowNode, bool)>,
    root: &WorkflowNode,
    issues: &mut Vec<GraphIssue>,
) {
    let placement = |message: &str| GraphIssue::Placement { id: node.id.clone(), message: message.into() };

    if node.node_type == NodeType::Start && node.id != root.id {
        issues.push(GraphIssue::MisplacedStart { id: node.id.clone() });
    }
    if !node.branches.is_empty() && !node.node_type.fans_out() {
        issues.push(placement("only branch nodes may have branches"));
    }
    if node.node_type == NodeType::End && node.next.is_some() {
        issues.push(placement("an end node cannot have a successor"));
    }
    if let Some(required) = node.node_type.required_parent() {
        let placed = matches!(via, Some((p, false)) if p.node_type == required);
        if !placed {
            issues.push(placement(&format!("a {} node must be a branch of a {required} node", node.node_type)));
        }
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// What the editor shows on a node's card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub validated: bool,
    pub summary: String,
}

pub const NOT_CONFIGURED: &str = "not configured";

/// Summaries for every node: reachable ones in visit order, then the rest.
pub fn summarize(graph: &WorkflowGraph, accesses: &dyn AccessLookup) -> Vec<NodeSummary> {
    let report = validate_graph(graph, accesses);
    let reachable = report.nodes.iter().map(|r| (r.id.as_str(), r.is_valid()));
    let stray = report
        .unreachable
        .iter()
        .map(|id| (id.as_str(), graph.node(id).is_some_and(|n| validate_node(n, graph, accesses).is_empty())));

    reachable
        .chain(stray)
        .filter_map(|(id, validated)| {
            let node = graph.node(id)?;
            let summary = if validated { describe(node) } else { NOT_CONFIGURED.to_string() };
            Some(NodeSummary {
                id: node.id.clone(),
                name: node.name.clone(),
                node_type: node.node_type,
                validated,
                summary,
            })
        })
        .collect()
}

/// One-line description of a validated node.
fn describe(node: &WorkflowNode) -> String {
    let registry = ProviderRegistry::global();
    match node.node_type {
        NodeType::Start => match node.decode_config::<StartConfig>() {
            Ok(StartConfig { trigger: Trigger::Auto, trigger_cron: Some(cron) }) => format!("Auto: {cron}"),
            _ => "Manual".to_string(),
        },
        NodeType::Apply => {
            let config: ApplyConfig = node.decode_config().unwrap_or_default();
            let provider = registry.apply_dns(config.provider.trim()).map(|d| d.name).unwrap_or_default();
            format!("{} via {provider}", config.domain_list().join(", "))
        }
        NodeType::Deploy => {
            let config: DeployConfig = node.decode_config().unwrap_or_default();
            registry
                .deploy(config.provider.trim())
                .map(|d| d.name.to_string())
                .unwrap_or_default()
        }
        NodeType::Notify => {
            let config: NotifyConfig = node.decode_config().unwrap_or_default();
            format!("{}: {}", config.channel.trim(), config.subject.trim())
        }
        NodeType::Condition => {
            let config: ConditionConfig = node.decode_config().unwrap_or_default();
            config.expression().unwrap_or("Default").to_string()
        }
        NodeType::Branch | NodeType::ExecuteResultBranch => format!("{} branches", node.branches.len()),
        NodeType::End | NodeType::ExecuteSuccess | NodeType::ExecuteFailure => node.name.clone(),
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn start() -> WorkflowNode {
        WorkflowNode::new("start", NodeType::Start, "Start").with_config(json!({ "trigger": "manual" }))
    }

    fn end(id: &str) -> WorkflowNode {
        WorkflowNode::new(id, NodeType::End, "End")
    }

    fn no_accesses() -> Vec<providers::AccessRecord> {
        Vec::new()
    }

    #[test]
    fn linear_manual_graph_is_valid() {
        // start → end
        let graph = WorkflowGraph::from_nodes("start", [start().with_next("end"), end("end")]).unwrap();
        let report = validate_graph(&graph, &no_accesses());
        assert!(report.is_valid(), "{report:?}");
        assert_eq!(report.visits, 2);
        assert!(report.unreachable.is_empty());
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let err = WorkflowGraph::from_nodes("start", [start(), start()]).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateNodeId(id) if id == "start"));
    }

    #[test]
    fn missing_or_wrong_root_is_structural() {
        let report = validate_graph(&WorkflowGraph::default(), &no_accesses());
        assert_eq!(report.issues, vec![GraphIssue::MissingRoot]);

        let graph = WorkflowGraph::from_nodes("end", [end("end")]).unwrap();
        let report = validate_graph(&graph, &no_accesses());
        assert!(matches!(report.issues[..], [GraphIssue::RootNotStart { .. }]));
    }

    #[test]
    fn dangling_child_is_reported() {
        let graph = WorkflowGraph::from_nodes("start", [start().with_next("ghost")]).unwrap();
        let report = validate_graph(&graph, &no_accesses());
        assert_eq!(
            report.issues,
            vec![GraphIssue::DanglingChild { parent: "start".into(), child: "ghost".into() }]
        );
    }

    #[test]
    fn cycle_is_detected_within_bounded_visits() {
        // start → a → b → a
        let graph = WorkflowGraph::from_nodes(
            "start",
            [
                start().with_next("a"),
                WorkflowNode::new("a", NodeType::End, "a").with_next("b"),
                end("b").with_next("a"),
            ],
        )
        .unwrap();
        let report = validate_graph(&graph, &no_accesses());
        assert!(!report.is_valid());
        assert!(report.issues.contains(&GraphIssue::Cycle { id: "a".into() }));
        assert!(report.visits <= graph.len() + 1);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let graph = WorkflowGraph::from_nodes(
            "start",
            [start().with_next("n"), WorkflowNode::new("n", NodeType::End, "n").with_next("n")],
        )
        .unwrap();
        let report = validate_graph(&graph, &no_accesses());
        assert!(report.issues.contains(&GraphIssue::Cycle { id: "n".into() }));
    }

    #[test]
    fn shared_child_is_multiple_parents_not_cycle() {
        //   start
        //   /    \
        //  c1    c2   (conditions of branch b)
        //   \    /
        //    end
        let graph = WorkflowGraph::from_nodes(
            "start",
            [
                start().with_next("b"),
                WorkflowNode::new("b", NodeType::Branch, "b").with_branches(["c1", "c2"]),
                WorkflowNode::new("c1", NodeType::Condition, "c1")
                    .with_config(json!({ "expression": "a == 1" }))
                    .with_next("end"),
                WorkflowNode::new("c2", NodeType::Condition, "c2").with_next("end"),
                end("end"),
            ],
        )
        .unwrap();
        let report = validate_graph(&graph, &no_accesses());
        assert_eq!(report.issues, vec![GraphIssue::MultipleParents { id: "end".into() }]);
    }

    #[test]
    fn second_start_and_stray_conditions_are_misplaced() {
        let graph = WorkflowGraph::from_nodes(
            "start",
            [
                start().with_next("s2"),
                WorkflowNode::new("s2", NodeType::Start, "s2")
                    .with_config(json!({ "trigger": "manual" }))
                    .with_next("c"),
                WorkflowNode::new("c", NodeType::Condition, "c"),
            ],
        )
        .unwrap();
        let report = validate_graph(&graph, &no_accesses());
        assert!(report.issues.contains(&GraphIssue::MisplacedStart { id: "s2".into() }));
        assert!(report.issues.iter().any(|i| matches!(i, GraphIssue::Placement { id, .. } if id == "c")));
    }

    #[test]
    fn invalid_reachable_node_invalidates_graph() {
        let graph = WorkflowGraph::from_nodes(
            "start",
            [start().with_next("n"), WorkflowNode::new("n", NodeType::Notify, "Notify")],
        )
        .unwrap();
        let report = validate_graph(&graph, &no_accesses());
        assert!(report.issues.is_empty());
        assert!(!report.is_valid());
        assert!(!report.node("n").unwrap().is_valid());
        assert!(!is_all_nodes_validated(&graph, &no_accesses()));
    }

    #[test]
    fn unreachable_nodes_are_warnings_only() {
        let graph = WorkflowGraph::from_nodes(
            "start",
            [start(), WorkflowNode::new("orphan", NodeType::Notify, "Orphan")],
        )
        .unwrap();
        let report = validate_graph(&graph, &no_accesses());
        assert!(report.is_valid());
        assert_eq!(report.unreachable, vec!["orphan".to_string()]);
    }

    #[test]
    fn upstream_includes_earlier_branches_but_not_siblings() {
        // start → b{c1 → x, c2 → y} → z
        let graph = WorkflowGraph::from_nodes(
            "start",
            [
                start().with_next("b"),
                WorkflowNode::new("b", NodeType::Branch, "b").with_branches(["c1", "c2"]).with_next("z"),
                WorkflowNode::new("c1", NodeType::Condition, "c1").with_next("x"),
                WorkflowNode::new("c2", NodeType::Condition, "c2").with_next("y"),
                WorkflowNode::new("x", NodeType::Apply, "x"),
                WorkflowNode::new("y", NodeType::Apply, "y"),
                end("z"),
            ],
        )
        .unwrap();

        let of_z = graph.upstream_of("z");
        for id in ["start", "b", "c1", "c2", "x", "y"] {
            assert!(of_z.contains(id), "{id}");
        }
        let of_y = graph.upstream_of("y");
        assert!(of_y.contains("c2") && of_y.contains("b") && of_y.contains("start"));
        assert!(!of_y.contains("x") && !of_y.contains("c1"));
    }

    #[test]
    fn edits_share_untouched_nodes() {
        let graph = WorkflowGraph::from_nodes("start", [start().with_next("end"), end("end")]).unwrap();
        let edited = graph
            .append_next("start", WorkflowNode::new("n", NodeType::Notify, "Notify"))
            .unwrap();

        assert_eq!(edited.node("start").unwrap().next.as_deref(), Some("n"));
        assert_eq!(edited.node("n").unwrap().next.as_deref(), Some("end"));
        assert!(edited.shares_node(&graph, "end"));
        assert!(!edited.shares_node(&graph, "start"));
        // The original snapshot is untouched.
        assert_eq!(graph.node("start").unwrap().next.as_deref(), Some("end"));

        let configured = edited
            .with_config("n", json!({ "channel": "email", "subject": "s", "message": "m" }))
            .unwrap();
        assert!(configured.shares_node(&edited, "start"));
        assert!(is_all_nodes_validated(&configured, &no_accesses()));
        assert!(!is_all_nodes_validated(&edited, &no_accesses()));
    }

    #[test]
    fn remove_subtree_detaches_and_drops_descendants() {
        let graph = WorkflowGraph::from_nodes(
            "start",
            [
                start().with_next("b"),
                WorkflowNode::new("b", NodeType::Branch, "b").with_branches(["c1"]).with_next("z"),
                WorkflowNode::new("c1", NodeType::Condition, "c1").with_next("x"),
                end("x"),
                end("z"),
            ],
        )
        .unwrap();

        let pruned = graph.remove_subtree("b").unwrap();
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned.node("start").unwrap().next, None);

        let pruned = graph.remove_subtree("c1").unwrap();
        assert!(pruned.node("b").unwrap().branches.is_empty());
        assert!(pruned.node("x").is_none());
        assert!(pruned.node("z").is_some());

        assert!(matches!(graph.remove_subtree("ghost"), Err(EngineError::NodeNotFound(_))));
        assert_eq!(graph.remove_subtree("start").unwrap().root(), None);
    }

    #[test]
    fn nested_tree_content_is_flattened() {
        let content = json!({
            "id": "start", "type": "start", "name": "Start",
            "config": { "trigger": "manual" },
            "validated": true,
            "next": {
                "id": "b", "type": "branch", "name": "Branch",
                "branches": [
                    { "id": "c1", "type": "condition", "name": "c1", "config": { "expression": "a == 1" }, "next": null },
                    { "id": "c2", "type": "condition", "name": "c2" }
                ],
                "next": { "id": "end", "type": "end", "name": "End" }
            }
        });
        let graph = WorkflowGraph::from_content(&content).unwrap();
        assert_eq!(graph.root(), Some("start"));
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.node("b").unwrap().branches, vec!["c1", "c2"]);
        assert!(is_all_nodes_validated(&graph, &no_accesses()));

        let arena = serde_json::to_value(&graph).unwrap();
        assert_eq!(WorkflowGraph::from_content(&arena).unwrap(), graph);
    }

    #[test]
    fn content_mixing_arena_and_tree_is_rejected() {
        let mixed = json!({
            "root": "start",
            "nodes": [{ "id": "start", "type": "start" }],
            "id": "start", "type": "start", "next": { "id": "n", "type": "notify" }
        });
        assert!(matches!(WorkflowGraph::from_content(&mixed), Err(EngineError::MalformedContent(_))));
    }

    #[test]
    fn summaries_hide_invalid_nodes() {
        let graph = WorkflowGraph::from_nodes(
            "start",
            [
                start().with_next("n"),
                WorkflowNode::new("n", NodeType::Notify, "Notify").with_next("end"),
                end("end"),
            ],
        )
        .unwrap();
        let summaries = summarize(&graph, &no_accesses());
        let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["start", "n", "end"]);
        assert_eq!(summaries[0].summary, "Manual");
        assert!(!summaries[1].validated);
        assert_eq!(summaries[1].summary, NOT_CONFIGURED);
    }

    #[test]
    fn referenced_access_ids_skip_malformed_ids() {
        let id = Uuid::new_v4();
        let graph = WorkflowGraph::from_nodes(
            "start",
            [
                start().with_next("a"),
                WorkflowNode::new("a", NodeType::Apply, "a")
                    .with_config(json!({ "providerAccessId": id.to_string() }))
                    .with_next("d"),
                WorkflowNode::new("d", NodeType::Deploy, "d")
                    .with_config(json!({ "providerAccessId": "not-a-uuid" })),
            ],
        )
        .unwrap();
        assert_eq!(graph.referenced_access_ids(), BTreeSet::from([id]));
    }
}
