//! Workflow nodes, their typed configs, and per-node validation.
//!
//! A node's `config` is kept as raw JSON so half-configured nodes can be
//! stored while the user is still editing. Validation checks the raw value
//! against a field schema first, then decodes it into the node type's typed
//! config and runs the semantic rules (provider lookup, access resolution,
//! certificate source, cron and condition parsing).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::IpAddr;

use providers::schema::{check_fields, FieldKind, FieldSpec};
use providers::{
    AccessProvider, AccessRecord, AccessUsage, ProviderRegistry, UnknownProviderError,
    ValidationError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::condition::Condition;
use crate::cron::CronSchedule;
use crate::graph::WorkflowGraph;
use crate::models::Trigger;

// ---------------------------------------------------------------------------
// NodeType / WorkflowNode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Start,
    End,
    Apply,
    Deploy,
    Notify,
    Branch,
    Condition,
    ExecuteResultBranch,
    ExecuteSuccess,
    ExecuteFailure,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Apply => "apply",
            Self::Deploy => "deploy",
            Self::Notify => "notify",
            Self::Branch => "branch",
            Self::Condition => "condition",
            Self::ExecuteResultBranch => "execute_result_branch",
            Self::ExecuteSuccess => "execute_success",
            Self::ExecuteFailure => "execute_failure",
        }
    }

    /// Node types whose `branches` fan out.
    pub fn fans_out(self) -> bool {
        matches!(self, Self::Branch | Self::ExecuteResultBranch)
    }

    /// The fan-out node type a node of this type must hang off, if any.
    pub fn required_parent(self) -> Option<NodeType> {
        match self {
            Self::Condition => Some(Self::Branch),
            Self::ExecuteSuccess | Self::ExecuteFailure => Some(Self::ExecuteResultBranch),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the workflow arena.
///
/// `next` and `branches` hold node ids. A `validated` flag sent by a client
/// is ignored on input; validity is always recomputed. Members the engine
/// does not interpret (`inputs`, `outputs`, editor state) ride along in
/// `extra` and are written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "NodeDoc")]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Input shape of [`WorkflowNode`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeDoc {
    id: String,
    #[serde(rename = "type")]
    node_type: NodeType,
    #[serde(default)]
    name: String,
    #[serde(default)]
    config: Value,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    branches: Vec<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<NodeDoc> for WorkflowNode {
    fn from(mut doc: NodeDoc) -> Self {
        doc.extra.remove("validated");
        Self {
            id: doc.id,
            node_type: doc.node_type,
            name: doc.name,
            config: doc.config,
            next: doc.next,
            branches: doc.branches,
            extra: doc.extra,
        }
    }
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            name: name.into(),
            config: Value::Null,
            next: None,
            branches: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn with_branches<I, S>(mut self, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.branches = branches.into_iter().map(Into::into).collect();
        self
    }

    /// Child ids in execution order: branches first, then `next`.
    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(String::as_str).chain(self.next.as_deref())
    }

    /// Decode `config` into a typed config, treating `null` members as absent.
    pub fn decode_config<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let config = match &self.config {
            Value::Null => Value::Object(Map::new()),
            Value::Object(members) => Value::Object(
                members
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        };
        serde_json::from_value(config)
    }

    /// The access this node points at, if it names one by a well-formed id.
    pub fn access_id(&self) -> Option<Uuid> {
        if !matches!(self.node_type, NodeType::Apply | NodeType::Deploy) {
            return None;
        }
        self.config
            .get("providerAccessId")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    }
}

// ---------------------------------------------------------------------------
// Typed configs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConfig {
    pub trigger: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_cron: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[serde(rename = "RSA2048")]
    Rsa2048,
    #[serde(rename = "RSA3072")]
    Rsa3072,
    #[serde(rename = "RSA4096")]
    Rsa4096,
    #[serde(rename = "RSA8192")]
    Rsa8192,
    #[serde(rename = "EC256")]
    Ec256,
    #[serde(rename = "EC384")]
    Ec384,
}

const KEY_ALGORITHMS: &[&str] = &["RSA2048", "RSA3072", "RSA4096", "RSA8192", "EC256", "EC384"];

/// Days before expiry at which renewal stops being skipped, when unset.
pub const DEFAULT_SKIP_BEFORE_EXPIRY_DAYS: u32 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyConfig {
    /// `;`- or `,`-separated domain list.
    #[serde(default)]
    pub domains: String,
    #[serde(default)]
    pub contact_email: String,
    /// Apply-DNS provider tag, legacy aliases allowed.
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub provider_access_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_algorithm: Option<KeyAlgorithm>,
    /// `;`- or `,`-separated resolver list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_propagation_timeout: Option<u32>,
    #[serde(default, rename = "dnsTTL", skip_serializing_if = "Option::is_none")]
    pub dns_ttl: Option<u32>,
    #[serde(default, rename = "disableFollowCNAME")]
    pub disable_follow_cname: bool,
    #[serde(default, rename = "disableARI")]
    pub disable_ari: bool,
    #[serde(default)]
    pub skip_before_expiry_days: u32,
}

impl ApplyConfig {
    pub fn domain_list(&self) -> Vec<&str> {
        split_list(&self.domains)
    }

    pub fn nameserver_list(&self) -> Vec<&str> {
        self.nameservers.as_deref().map(split_list).unwrap_or_default()
    }

    pub fn effective_skip_before_expiry_days(&self) -> u32 {
        match self.skip_before_expiry_days {
            0 => DEFAULT_SKIP_BEFORE_EXPIRY_DAYS,
            days => days,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// `"<applyNodeId>#certificate"`.
    #[serde(default)]
    pub certificate: String,
    /// Deploy provider tag, legacy aliases allowed.
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_access_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<Map<String, Value>>,
    #[serde(default)]
    pub skip_on_last_succeeded: bool,
}

impl DeployConfig {
    /// The apply node whose certificate this deploy consumes.
    pub fn certificate_source(&self) -> Option<&str> {
        match self.certificate.trim().split_once('#') {
            Some((node, "certificate")) if !node.is_empty() => Some(node),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl ConditionConfig {
    /// The expression, unless this is the default branch.
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

fn split_list(list: &str) -> Vec<&str> {
    list.split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

const START_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("trigger", FieldKind::OneOf { allowed: &["manual", "auto"] }),
    FieldSpec::required_when("triggerCron", FieldKind::Text { min: 1, max: 256 }, "trigger", &["auto"]),
];

const APPLY_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("domains", FieldKind::Text { min: 1, max: 10240 }),
    FieldSpec::required("contactEmail", FieldKind::Text { min: 1, max: 256 }),
    FieldSpec::required("provider", FieldKind::Text { min: 1, max: 64 }),
    FieldSpec::required("providerAccessId", FieldKind::Text { min: 1, max: 64 }),
    FieldSpec::optional("providerConfig", FieldKind::Object),
    FieldSpec::required("keyAlgorithm", FieldKind::OneOf { allowed: KEY_ALGORITHMS }),
    FieldSpec::optional("nameservers", FieldKind::Text { min: 0, max: 1024 }),
    FieldSpec::optional("dnsPropagationTimeout", FieldKind::Integer { min: 0, max: 3600 }),
    FieldSpec::optional("dnsTTL", FieldKind::Integer { min: 0, max: 86400 }),
    FieldSpec::optional("disableFollowCNAME", FieldKind::Bool),
    FieldSpec::optional("disableARI", FieldKind::Bool),
    FieldSpec::optional("skipBeforeExpiryDays", FieldKind::Integer { min: 0, max: 365 }),
];

const DEPLOY_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("certificate", FieldKind::Text { min: 1, max: 256 }),
    FieldSpec::required("provider", FieldKind::Text { min: 1, max: 64 }),
    FieldSpec::required("providerAccessId", FieldKind::Text { min: 1, max: 64 }),
    FieldSpec::optional("providerConfig", FieldKind::Object),
    FieldSpec::optional("skipOnLastSucceeded", FieldKind::Bool),
];

const NOTIFY_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("channel", FieldKind::Text { min: 1, max: 64 }),
    FieldSpec::required("subject", FieldKind::Text { min: 1, max: 1000 }),
    FieldSpec::required("message", FieldKind::Text { min: 1, max: 1000 }),
];

const CONDITION_FIELDS: &[FieldSpec] =
    &[FieldSpec::optional("expression", FieldKind::Text { min: 0, max: 1024 })];

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// A reference from a node to something that is not there, or not usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ReferenceError {
    #[error("field '{field}' holds '{value}', which is not an id")]
    MalformedId { field: String, value: String },

    #[error("field '{field}' names access {id}, which does not exist")]
    MissingAccess { field: String, id: Uuid },

    #[error("access {id} holds '{actual}' credentials, expected '{expected}'")]
    ProviderMismatch { field: String, id: Uuid, expected: AccessProvider, actual: String },

    #[error("access {id} is classified '{usage}' and cannot be used to {need}")]
    UsageNotPermitted { field: String, id: Uuid, usage: AccessUsage, need: AccessUsage },

    #[error("certificate source '{value}' is not an apply node upstream of this node")]
    CertificateSource { field: String, value: String },
}

/// Anything that keeps a node from being validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum NodeIssue {
    #[error(transparent)]
    Validation(ValidationError),

    #[error(transparent)]
    Reference(ReferenceError),

    #[error(transparent)]
    UnknownProvider(UnknownProviderError),
}

impl From<ValidationError> for NodeIssue {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<ReferenceError> for NodeIssue {
    fn from(e: ReferenceError) -> Self {
        Self::Reference(e)
    }
}

impl From<UnknownProviderError> for NodeIssue {
    fn from(e: UnknownProviderError) -> Self {
        Self::UnknownProvider(e)
    }
}

// ---------------------------------------------------------------------------
// Access lookup
// ---------------------------------------------------------------------------

/// Where node validation resolves `providerAccessId`s.
pub trait AccessLookup {
    fn access(&self, id: Uuid) -> Option<&AccessRecord>;
}

impl AccessLookup for HashMap<Uuid, AccessRecord> {
    fn access(&self, id: Uuid) -> Option<&AccessRecord> {
        self.get(&id)
    }
}

impl AccessLookup for Vec<AccessRecord> {
    fn access(&self, id: Uuid) -> Option<&AccessRecord> {
        self.iter().find(|a| a.id == id)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate one node in the context of its graph.
///
/// Returns every issue found; an empty list means the node is validated.
pub fn validate_node(
    node: &WorkflowNode,
    graph: &WorkflowGraph,
    accesses: &dyn AccessLookup,
) -> Vec<NodeIssue> {
    let mut issues = Vec::new();
    match node.node_type {
        NodeType::Start => validate_start(node, &mut issues),
        NodeType::Apply => validate_apply(node, accesses, &mut issues),
        NodeType::Deploy => validate_deploy(node, graph, accesses, &mut issues),
        NodeType::Notify => {
            issues.extend(check_fields(&node.config, NOTIFY_FIELDS).into_iter().map(NodeIssue::from));
        }
        NodeType::Branch => validate_branch(node, graph, &mut issues),
        NodeType::Condition => validate_condition(node, &mut issues),
        NodeType::ExecuteResultBranch => validate_result_branch(node, graph, &mut issues),
        NodeType::End | NodeType::ExecuteSuccess | NodeType::ExecuteFailure => {}
    }
    issues
}

pub fn is_node_validated(
    node: &WorkflowNode,
    graph: &WorkflowGraph,
    accesses: &dyn AccessLookup,
) -> bool {
    validate_node(node, graph, accesses).is_empty()
}

/// Run the schema, then decode. `None` means the schema already failed.
fn schema_then_decode<T: DeserializeOwned>(
    node: &WorkflowNode,
    fields: &[FieldSpec],
    issues: &mut Vec<NodeIssue>,
) -> Option<T> {
    let errors = check_fields(&node.config, fields);
    let clean = errors.is_empty();
    issues.extend(errors.into_iter().map(NodeIssue::from));

    match node.decode_config::<T>() {
        Ok(config) => Some(config),
        Err(e) => {
            if clean {
                issues.push(ValidationError::invalid("config", e.to_string()).into());
            }
            None
        }
    }
}

/// Names of the fields that already carry an issue.
fn flagged(issues: &[NodeIssue]) -> HashSet<String> {
    issues
        .iter()
        .filter_map(|i| match i {
            NodeIssue::Validation(e) => Some(e.field.clone()),
            _ => None,
        })
        .collect()
}

fn validate_start(node: &WorkflowNode, issues: &mut Vec<NodeIssue>) {
    let Some(config) = schema_then_decode::<StartConfig>(node, START_FIELDS, issues) else {
        return;
    };
    if config.trigger == Trigger::Auto {
        if let Some(cron) = config.trigger_cron.as_deref().filter(|c| !c.trim().is_empty()) {
            if let Err(e) = CronSchedule::parse(cron) {
                issues.push(ValidationError::invalid("triggerCron", e.to_string()).into());
            }
        }
    }
}

fn validate_apply(node: &WorkflowNode, accesses: &dyn AccessLookup, issues: &mut Vec<NodeIssue>) {
    let Some(config) = schema_then_decode::<ApplyConfig>(node, APPLY_FIELDS, issues) else {
        return;
    };
    let flagged = flagged(issues);

    if !flagged.contains("domains") {
        let domains = config.domain_list();
        if domains.is_empty() {
            issues.push(ValidationError::invalid("domains", "no domain given").into());
        }
        for domain in domains {
            let bare = domain.strip_prefix("*.").unwrap_or(domain);
            if !is_hostname(bare) {
                issues.push(
                    ValidationError::invalid("domains", format!("'{domain}' is not a valid domain"))
                        .into(),
                );
            }
        }
    }

    if !flagged.contains("contactEmail") && !is_email(config.contact_email.trim()) {
        issues.push(ValidationError::invalid("contactEmail", "not a valid email address").into());
    }

    if !flagged.contains("nameservers") {
        for ns in config.nameserver_list() {
            if ns.parse::<IpAddr>().is_err() && !is_hostname(ns) {
                issues.push(
                    ValidationError::invalid("nameservers", format!("'{ns}' is not a hostname or IP"))
                        .into(),
                );
            }
        }
    }

    if flagged.contains("provider") {
        return;
    }
    match ProviderRegistry::global().apply_dns(config.provider.trim()) {
        Ok(descriptor) if !flagged.contains("providerAccessId") => check_access(
            "providerAccessId",
            &config.provider_access_id,
            descriptor.access_provider,
            AccessUsage::Apply,
            accesses,
            issues,
        ),
        Ok(_) => {}
        Err(e) => issues.push(e.into()),
    }
}

fn validate_deploy(
    node: &WorkflowNode,
    graph: &WorkflowGraph,
    accesses: &dyn AccessLookup,
    issues: &mut Vec<NodeIssue>,
) {
    let Some(config) = schema_then_decode::<DeployConfig>(node, DEPLOY_FIELDS, issues) else {
        return;
    };
    let flagged = flagged(issues);

    if !flagged.contains("certificate") {
        let upstream_apply = config.certificate_source().filter(|source| {
            graph.node(source).is_some_and(|n| n.node_type == NodeType::Apply)
                && graph.upstream_of(&node.id).contains(source)
        });
        if upstream_apply.is_none() {
            issues.push(
                ReferenceError::CertificateSource {
                    field: "certificate".into(),
                    value: config.certificate.clone(),
                }
                .into(),
            );
        }
    }

    if flagged.contains("provider") {
        return;
    }
    let descriptor = match ProviderRegistry::global().deploy(config.provider.trim()) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            issues.push(e.into());
            return;
        }
    };

    let provider_config = Value::Object(config.provider_config.clone().unwrap_or_default());
    issues.extend(check_fields(&provider_config, descriptor.fields).into_iter().map(|e| {
        NodeIssue::Validation(ValidationError::new(format!("providerConfig.{}", e.field), e.reason))
    }));

    if let Some(access_id) = config.provider_access_id.as_deref() {
        if !flagged.contains("providerAccessId") {
            check_access(
                "providerAccessId",
                access_id,
                descriptor.access_provider,
                AccessUsage::Deploy,
                accesses,
                issues,
            );
        }
    }
}

/// Resolve `raw` to an access of `expected` provider usable for `need`.
///
/// The access payload is re-validated; its field errors land on the node.
fn check_access(
    field: &str,
    raw: &str,
    expected: AccessProvider,
    need: AccessUsage,
    accesses: &dyn AccessLookup,
    issues: &mut Vec<NodeIssue>,
) {
    let Ok(id) = Uuid::parse_str(raw.trim()) else {
        issues.push(
            ReferenceError::MalformedId { field: field.into(), value: raw.to_string() }.into(),
        );
        return;
    };
    let Some(record) = accesses.access(id) else {
        issues.push(ReferenceError::MissingAccess { field: field.into(), id }.into());
        return;
    };
    if record.provider != expected.as_str() {
        issues.push(
            ReferenceError::ProviderMismatch {
                field: field.into(),
                id,
                expected,
                actual: record.provider.clone(),
            }
            .into(),
        );
        return;
    }

    match record.validate() {
        Ok(access) if !access.usage.permits(need) => issues.push(
            ReferenceError::UsageNotPermitted { field: field.into(), id, usage: access.usage, need }
                .into(),
        ),
        Ok(_) => {}
        Err(errors) => issues.extend(errors.into_iter().map(NodeIssue::from)),
    }
}

fn validate_condition(node: &WorkflowNode, issues: &mut Vec<NodeIssue>) {
    let Some(config) = schema_then_decode::<ConditionConfig>(node, CONDITION_FIELDS, issues) else {
        return;
    };
    if let Some(expression) = config.expression() {
        if let Err(e) = Condition::parse(expression) {
            issues.push(ValidationError::invalid("expression", e.to_string()).into());
        }
    }
}

fn validate_branch(node: &WorkflowNode, graph: &WorkflowGraph, issues: &mut Vec<NodeIssue>) {
    if node.branches.is_empty() {
        issues.push(ValidationError::invalid("branches", "at least one branch is required").into());
        return;
    }

    let mut seen = HashSet::new();
    let mut default_at = None;
    let last = node.branches.len() - 1;
    for (index, child_id) in node.branches.iter().enumerate() {
        // Dangling ids are a structural problem reported by the graph.
        let Some(child) = graph.node(child_id) else { continue };
        if child.node_type != NodeType::Condition {
            issues.push(
                ValidationError::invalid(
                    "branches",
                    format!("branch '{child_id}' is a {} node, not a condition", child.node_type),
                )
                .into(),
            );
            continue;
        }

        let Ok(config) = child.decode_config::<ConditionConfig>() else { continue };
        match config.expression() {
            None => {
                if default_at.is_some() {
                    issues.push(
                        ValidationError::invalid("branches", "more than one default branch").into(),
                    );
                } else if index != last {
                    issues.push(
                        ValidationError::invalid(
                            "branches",
                            format!("default branch '{child_id}' must be the last branch"),
                        )
                        .into(),
                    );
                }
                default_at = Some(index);
            }
            Some(expression) => match Condition::parse(expression) {
                Ok(condition) => {
                    if !seen.insert(condition.to_string()) {
                        issues.push(
                            ValidationError::invalid(
                                "branches",
                                format!("branch '{child_id}' repeats '{condition}' and can never be taken"),
                            )
                            .into(),
                        );
                    }
                }
                Err(e) => issues.push(
                    ValidationError::invalid("branches", format!("branch '{child_id}': {e}")).into(),
                ),
            },
        }
    }
}

fn validate_result_branch(node: &WorkflowNode, graph: &WorkflowGraph, issues: &mut Vec<NodeIssue>) {
    if node.branches.is_empty() || node.branches.len() > 2 {
        issues.push(
            ValidationError::invalid("branches", "expected one or two result branches").into(),
        );
    }

    let mut kinds = HashSet::new();
    for child_id in &node.branches {
        let Some(child) = graph.node(child_id) else { continue };
        match child.node_type {
            NodeType::ExecuteSuccess | NodeType::ExecuteFailure => {
                if !kinds.insert(child.node_type) {
                    issues.push(
                        ValidationError::invalid(
                            "branches",
                            format!("more than one {} branch", child.node_type),
                        )
                        .into(),
                    );
                }
            }
            other => issues.push(
                ValidationError::invalid(
                    "branches",
                    format!("branch '{child_id}' is a {other} node, not a result branch"),
                )
                .into(),
            ),
        }
    }
}

fn is_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > 253 || !host.contains('.') {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

fn is_email(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && local.len() <= 64
                && !local.chars().any(|c| c.is_whitespace() || c == '@')
                && is_hostname(domain)
        }
        None => false,
    }
}
