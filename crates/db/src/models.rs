//! Row structs, one per collection.
//!
//! These are *persistence* models: they carry no domain behaviour and are
//! never validated here. Domain types live in the `engine` and `providers`
//! crates. Wire names are camelCase so a row can be served as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRow {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `manual` or `auto`.
    pub trigger: String,
    #[serde(default)]
    pub trigger_cron: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    /// The node arena as submitted by the editor.
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub last_run_id: Option<Uuid>,
    #[serde(default)]
    pub last_run_status: Option<String>,
    #[serde(default)]
    pub last_run_time: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// accesses
// ---------------------------------------------------------------------------

/// A persisted access (credential) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRow {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub config: serde_json::Value,
    pub usage: String,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_runs
// ---------------------------------------------------------------------------

/// Possible statuses for a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending"   => Ok(Self::Pending),
            "running"   => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed"    => Ok(Self::Failed),
            other       => Err(format!("unknown run status: {other}")),
        }
    }
}

/// A persisted workflow run, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRow {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub trigger: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
    /// Opaque per-node log entries.
    #[serde(default)]
    pub logs: serde_json::Value,
}

// ---------------------------------------------------------------------------
// seed
// ---------------------------------------------------------------------------

/// Initial contents for a fresh store, e.g. loaded from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub accesses: Vec<AccessRow>,
    pub workflows: Vec<WorkflowRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_round_trips_through_strings() {
        for status in [RunStatus::Pending, RunStatus::Running, RunStatus::Succeeded, RunStatus::Failed] {
            assert_eq!(status.to_string().parse::<RunStatus>(), Ok(status));
        }
        assert!("cancelled".parse::<RunStatus>().is_err());
    }

    #[test]
    fn seed_rows_fill_in_identity_and_timestamps() {
        let seed: Seed = serde_json::from_str(
            r#"{ "workflows": [{ "name": "renew", "trigger": "manual" }] }"#,
        )
        .unwrap();
        assert!(seed.accesses.is_empty());
        let row = &seed.workflows[0];
        assert!(!row.enabled);
        assert!(row.content.is_null());
        assert!(row.created <= Utc::now());
    }
}
