//! Domain models for workflows and their runs.
//!
//! These wrap the persistence rows from the `db` crate with parsed, typed
//! fields. A stored row that does not parse (bad trigger tag, malformed
//! content) is an [`EngineError`], not a panic.

use chrono::{DateTime, Duration, Utc};
use db::{RunRow, RunStatus, WorkflowRow};
use providers::{ValidationError, ValidationErrors};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cron::CronSchedule;
use crate::graph::{validate_graph, GraphReport, WorkflowGraph};
use crate::node::{AccessLookup, NodeType, StartConfig};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// How a workflow is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Started by a user from the console.
    Manual,
    /// Started on the workflow's cron schedule.
    Auto,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for Trigger {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown trigger: {other}")),
        }
    }
}

/// Longest workflow name accepted.
pub const MAX_NAME_LEN: usize = 256;

// ---------------------------------------------------------------------------
// LastRun
// ---------------------------------------------------------------------------

/// The workflow's cached view of its newest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRun {
    pub id: Uuid,
    pub status: RunStatus,
    pub time: DateTime<Utc>,
}

impl LastRun {
    /// The cache as stored on `row`, if it is complete and parses.
    pub fn from_row(row: &WorkflowRow) -> Option<Self> {
        Some(Self {
            id: row.last_run_id?,
            status: row.last_run_status.as_deref()?.parse().ok()?,
            time: row.last_run_time?,
        })
    }

    /// Merge-patch that writes this run into a workflow's `lastRun*` fields.
    pub fn to_patch(&self) -> Value {
        json!({
            "lastRunId": self.id,
            "lastRunStatus": self.status.to_string(),
            "lastRunTime": self.time,
        })
    }
}

// ---------------------------------------------------------------------------
// WorkflowModel
// ---------------------------------------------------------------------------

/// A workflow with its trigger parsed and its content decoded into a graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowModel {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub trigger: Trigger,
    pub trigger_cron: Option<String>,
    pub enabled: bool,
    #[serde(rename = "content")]
    pub graph: WorkflowGraph,
    pub last_run: Option<LastRun>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl WorkflowModel {
    pub fn from_row(row: WorkflowRow) -> Result<Self, EngineError> {
        let mut errors = Vec::new();

        let trigger = row
            .trigger
            .parse::<Trigger>()
            .map_err(|e| errors.push(ValidationError::invalid("trigger", e)))
            .ok();

        let last_run = match (row.last_run_id, row.last_run_status.as_deref(), row.last_run_time) {
            (Some(id), Some(status), Some(time)) => status
                .parse::<RunStatus>()
                .map_err(|e| errors.push(ValidationError::invalid("lastRunStatus", e)))
                .ok()
                .map(|status| LastRun { id, status, time }),
            _ => None,
        };

        let graph = WorkflowGraph::from_content(&row.content)?;

        match trigger {
            Some(trigger) if errors.is_empty() => Ok(Self {
                id: row.id,
                name: row.name,
                description: row.description,
                trigger,
                trigger_cron: row.trigger_cron.filter(|c| !c.trim().is_empty()),
                enabled: row.enabled,
                graph,
                last_run,
                created: row.created,
                updated: row.updated,
            }),
            _ => Err(EngineError::InvalidRecord(ValidationErrors(errors))),
        }
    }

    /// Back to the persistence shape, with content in arena form.
    pub fn into_row(self) -> Result<WorkflowRow, EngineError> {
        let content = serde_json::to_value(&self.graph)
            .map_err(|e| EngineError::MalformedContent(e.to_string()))?;
        let last_run = self.last_run;
        Ok(WorkflowRow {
            id: self.id,
            name: self.name,
            description: self.description,
            trigger: self.trigger.to_string(),
            trigger_cron: self.trigger_cron,
            enabled: self.enabled,
            content,
            last_run_id: last_run.as_ref().map(|r| r.id),
            last_run_status: last_run.as_ref().map(|r| r.status.to_string()),
            last_run_time: last_run.as_ref().map(|r| r.time),
            created: self.created,
            updated: self.updated,
        })
    }

    /// Check the workflow-level fields and the whole graph.
    pub fn validate(&self, accesses: &dyn AccessLookup) -> WorkflowReport {
        let mut fields = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            fields.push(ValidationError::missing("name"));
        } else if name.chars().count() > MAX_NAME_LEN {
            fields.push(ValidationError::new(
                "name",
                providers::Reason::TooLong { max: MAX_NAME_LEN },
            ));
        }

        if self.trigger == Trigger::Auto {
            match self.trigger_cron.as_deref() {
                None => fields.push(ValidationError::missing("triggerCron")),
                Some(cron) => {
                    if let Err(e) = CronSchedule::parse(cron) {
                        fields.push(ValidationError::invalid("triggerCron", e.to_string()));
                    }
                }
            }
        }

        let start = self
            .graph
            .root_node()
            .filter(|n| n.node_type == NodeType::Start)
            .and_then(|n| n.decode_config::<StartConfig>().ok());
        if let Some(start) = start {
            if start.trigger != self.trigger {
                fields.push(ValidationError::invalid(
                    "trigger",
                    format!("workflow is '{}' but its start node is '{}'", self.trigger, start.trigger),
                ));
            } else if self.trigger == Trigger::Auto {
                let ours = non_blank(self.trigger_cron.as_deref());
                let theirs = non_blank(start.trigger_cron.as_deref());
                if ours != theirs {
                    fields.push(ValidationError::invalid(
                        "triggerCron",
                        format!(
                            "workflow runs on '{}' but its start node on '{}'",
                            ours.unwrap_or_default(),
                            theirs.unwrap_or_default()
                        ),
                    ));
                }
            }
        }

        WorkflowReport { fields, graph: validate_graph(&self.graph, accesses) }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Everything that keeps a workflow from being enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    /// Problems with the workflow's own fields.
    pub fields: Vec<ValidationError>,
    pub graph: GraphReport,
}

impl WorkflowReport {
    pub fn is_valid(&self) -> bool {
        self.fields.is_empty() && self.graph.is_valid()
    }
}

// ---------------------------------------------------------------------------
// WorkflowRun
// ---------------------------------------------------------------------------

/// One execution of a workflow, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub logs: Value,
}

impl WorkflowRun {
    pub fn from_row(row: RunRow) -> Result<Self, EngineError> {
        let mut errors = Vec::new();
        let status = row
            .status
            .parse::<RunStatus>()
            .map_err(|e| errors.push(ValidationError::invalid("status", e)))
            .ok();
        let trigger = row
            .trigger
            .parse::<Trigger>()
            .map_err(|e| errors.push(ValidationError::invalid("trigger", e)))
            .ok();
        if row.ended_at.is_some_and(|end| end < row.started_at) {
            errors.push(ValidationError::invalid("endedAt", "run ends before it starts"));
        }

        match (status, trigger) {
            (Some(status), Some(trigger)) if errors.is_empty() => Ok(Self {
                id: row.id,
                workflow_id: row.workflow_id,
                status,
                trigger,
                started_at: row.started_at,
                ended_at: row.ended_at,
                error: row.error,
                logs: row.logs,
            }),
            _ => Err(EngineError::InvalidRecord(ValidationErrors(errors))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock time of a finished run.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }

    pub fn as_last_run(&self) -> LastRun {
        LastRun { id: self.id, status: self.status, time: self.started_at }
    }

    /// Whether this run should replace `current` as the workflow's last run.
    ///
    /// A later report about the same run always wins; otherwise only a run
    /// that started later does.
    pub fn supersedes(&self, current: Option<&LastRun>) -> bool {
        match current {
            None => true,
            Some(last) if last.id == self.id => true,
            Some(last) => self.started_at > last.time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::WorkflowNode;

    fn row(trigger: &str, cron: Option<&str>, content: Value) -> WorkflowRow {
        WorkflowRow {
            id: Uuid::new_v4(),
            name: "renew example.com".into(),
            description: String::new(),
            trigger: trigger.into(),
            trigger_cron: cron.map(String::from),
            enabled: false,
            content,
            last_run_id: None,
            last_run_status: None,
            last_run_time: None,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    fn start_only(trigger: Trigger, cron: Option<&str>) -> Value {
        let graph = WorkflowGraph::from_nodes(
            "start",
            [WorkflowNode::new("start", NodeType::Start, "Start")
                .with_config(json!({ "trigger": trigger, "triggerCron": cron }))],
        )
        .unwrap();
        serde_json::to_value(graph).unwrap()
    }

    fn run(started: DateTime<Utc>, status: &str) -> RunRow {
        RunRow {
            id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            status: status.into(),
            trigger: "manual".into(),
            started_at: started,
            ended_at: Some(started + Duration::seconds(42)),
            error: None,
            logs: Value::Null,
        }
    }

    #[test]
    fn trigger_round_trips_through_strings() {
        for trigger in [Trigger::Manual, Trigger::Auto] {
            assert_eq!(trigger.to_string().parse::<Trigger>(), Ok(trigger));
        }
        assert!("webhook".parse::<Trigger>().is_err());
    }

    #[test]
    fn auto_workflow_with_three_field_cron_is_invalid() {
        let model = WorkflowModel::from_row(row(
            "auto",
            Some("* * *"),
            start_only(Trigger::Auto, Some("* * *")),
        ))
        .unwrap();
        let report = model.validate(&Vec::new());
        assert!(!report.is_valid());
        assert!(report.fields.iter().any(|e| e.field == "triggerCron"));
    }

    #[test]
    fn manual_workflow_with_configured_start_is_valid() {
        let model =
            WorkflowModel::from_row(row("manual", None, start_only(Trigger::Manual, None))).unwrap();
        assert!(model.validate(&Vec::new()).is_valid());
    }

    #[test]
    fn trigger_must_agree_with_start_node() {
        let model = WorkflowModel::from_row(row(
            "manual",
            None,
            start_only(Trigger::Auto, Some("0 0 * * *")),
        ))
        .unwrap();
        let report = model.validate(&Vec::new());
        assert_eq!(report.fields.len(), 1);
        assert_eq!(report.fields[0].field, "trigger");
    }

    #[test]
    fn cron_must_agree_with_start_node() {
        let model = WorkflowModel::from_row(row(
            "auto",
            Some("0 3 * * *"),
            start_only(Trigger::Auto, Some("0 4 * * *")),
        ))
        .unwrap();
        let report = model.validate(&Vec::new());
        assert_eq!(report.fields.len(), 1);
        assert_eq!(report.fields[0].field, "triggerCron");

        // Surrounding whitespace is not a disagreement.
        let model = WorkflowModel::from_row(row(
            "auto",
            Some("0 3 * * *"),
            start_only(Trigger::Auto, Some(" 0 3 * * * ")),
        ))
        .unwrap();
        assert!(model.validate(&Vec::new()).fields.is_empty());
    }

    #[test]
    fn blank_or_long_names_are_rejected() {
        let mut r = row("manual", None, start_only(Trigger::Manual, None));
        r.name = "   ".into();
        let report = WorkflowModel::from_row(r.clone()).unwrap().validate(&Vec::new());
        assert_eq!(report.fields[0].field, "name");

        r.name = "x".repeat(MAX_NAME_LEN + 1);
        let report = WorkflowModel::from_row(r).unwrap().validate(&Vec::new());
        assert_eq!(report.fields[0].field, "name");
    }

    #[test]
    fn rows_round_trip_through_the_model() {
        let mut r = row("auto", Some("0 3 * * *"), start_only(Trigger::Auto, Some("0 3 * * *")));
        r.last_run_id = Some(Uuid::new_v4());
        r.last_run_status = Some("failed".into());
        r.last_run_time = Some(Utc::now());
        assert_eq!(WorkflowModel::from_row(r.clone()).unwrap().into_row().unwrap(), r);
    }

    #[test]
    fn unparsable_rows_are_errors() {
        let err = WorkflowModel::from_row(row("webhook", None, Value::Null)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRecord(e) if e.field("trigger").is_some()));

        let err = WorkflowModel::from_row(row("manual", None, json!([1, 2]))).unwrap_err();
        assert!(matches!(err, EngineError::MalformedContent(_)));
    }

    #[test]
    fn run_helpers() {
        let started = Utc::now();
        let done = WorkflowRun::from_row(run(started, "succeeded")).unwrap();
        assert!(done.is_terminal());
        assert_eq!(done.duration(), Some(Duration::seconds(42)));

        let mut pending = run(started, "pending");
        pending.ended_at = None;
        let pending = WorkflowRun::from_row(pending).unwrap();
        assert!(!pending.is_terminal());
        assert_eq!(pending.duration(), None);

        assert!(WorkflowRun::from_row(run(started, "cancelled")).is_err());
    }

    #[test]
    fn only_newer_runs_replace_the_cache() {
        let now = Utc::now();
        let newer = WorkflowRun::from_row(run(now, "succeeded")).unwrap();
        let older = WorkflowRun::from_row(run(now - Duration::hours(1), "failed")).unwrap();

        assert!(newer.supersedes(None));
        let cached = newer.as_last_run();
        assert!(!older.supersedes(Some(&cached)));
        assert!(newer.supersedes(Some(&cached)));
        assert!(older.supersedes(Some(&older.as_last_run())));

        let patch = cached.to_patch();
        assert_eq!(patch["lastRunStatus"], "succeeded");
        assert_eq!(patch["lastRunId"], json!(newer.id));
    }
}
