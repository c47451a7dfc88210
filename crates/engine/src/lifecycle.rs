//! Record lifecycle on top of a [`Store`].
//!
//! `WorkflowService` owns the rules that span more than one record:
//! 1. Enabling a workflow re-validates it against the current accesses and
//!    writes nothing when it fails.
//! 2. Every write is conditional on the `updated` stamp read beforehand;
//!    a write that matches no row is reported as [`Transition::Stale`].
//! 3. A reported run is stored and folded into the workflow's `lastRun*`
//!    cache when it is the newest one.
//! 4. An access is only deleted when no workflow points at it; the store
//!    checks and deletes under one write.
//!
//! Workflow content is always stored in arena form, so what a write returns
//! is what a later read returns.

use std::collections::HashMap;
use std::sync::Arc;

use db::{AccessDeletion, AccessRow, RunRow, Store, WorkflowRow, WORKFLOW_DOCUMENTS};
use providers::AccessRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::graph::{summarize, NodeSummary, WorkflowGraph};
use crate::models::{LastRun, WorkflowModel, WorkflowReport, WorkflowRun};
use crate::EngineError;

/// How often the `lastRun*` fold is retried when the workflow moves underneath it.
const CACHE_ATTEMPTS: usize = 3;

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T = WorkflowModel> {
    /// The write landed; carries the record as stored.
    Applied(T),
    /// The record changed or vanished since it was read; nothing was written.
    Stale,
}

impl<T> Transition<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Stale => None,
        }
    }
}

/// An access row as the record the validators resolve.
pub fn access_record(row: &AccessRow) -> AccessRecord {
    AccessRecord {
        id: row.id,
        name: row.name.clone(),
        provider: row.provider.clone(),
        config: row.config.clone(),
        usage: row.usage.clone(),
    }
}

/// Whether the graph stored in `row` names `access_id`.
fn references(row: &WorkflowRow, access_id: Uuid) -> bool {
    match WorkflowGraph::from_content(&row.content) {
        Ok(graph) => graph.referenced_access_ids().contains(&access_id),
        Err(e) => {
            warn!(id = %row.id, error = %e, "skipping workflow with unreadable content");
            false
        }
    }
}

/// Every access row keyed by id.
pub fn access_records(rows: Vec<AccessRow>) -> HashMap<Uuid, AccessRecord> {
    rows.iter().map(|row| (row.id, access_record(row))).collect()
}

/// Apply `patch` to a copy of `row` without touching the store, the same way
/// the store will.
fn merged<T: Serialize + DeserializeOwned>(
    row: &T,
    patch: &Value,
    documents: &[&str],
) -> Result<T, EngineError> {
    if !patch.is_object() {
        return Err(EngineError::InvalidPatch("patch must be a JSON object".into()));
    }
    let mut doc = serde_json::to_value(row).map_err(|e| EngineError::InvalidPatch(e.to_string()))?;
    db::patch_record(&mut doc, patch, documents);
    serde_json::from_value(doc).map_err(|e| EngineError::InvalidPatch(e.to_string()))
}

// ---------------------------------------------------------------------------
// WorkflowService
// ---------------------------------------------------------------------------

/// Cheap to clone; every clone talks to the same store.
#[derive(Clone)]
pub struct WorkflowService {
    store: Arc<dyn Store>,
}

impl WorkflowService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Every stored access, keyed by id.
    pub async fn load_accesses(&self) -> Result<HashMap<Uuid, AccessRecord>, EngineError> {
        Ok(access_records(self.store.list_accesses().await?))
    }

    async fn ensure_valid(&self, model: &WorkflowModel) -> Result<(), EngineError> {
        let accesses = self.load_accesses().await?;
        let report = model.validate(&accesses);
        if report.is_valid() {
            return Ok(());
        }
        warn!(
            id = %model.id,
            field_issues = report.fields.len(),
            graph_issues = report.graph.issues.len(),
            "refused to enable workflow that does not validate"
        );
        Err(EngineError::NotValidated(Box::new(report)))
    }

    // -----------------------------------------------------------------------
    // Workflows
    // -----------------------------------------------------------------------

    pub async fn get_workflow(&self, id: Uuid) -> Result<WorkflowModel, EngineError> {
        WorkflowModel::from_row(self.store.get_workflow(id).await?)
    }

    /// Store a new workflow. One created enabled must validate first.
    #[instrument(skip(self, row), fields(workflow = %row.name))]
    pub async fn create_workflow(&self, row: WorkflowRow) -> Result<WorkflowModel, EngineError> {
        let candidate = WorkflowModel::from_row(row)?;
        if candidate.enabled {
            self.ensure_valid(&candidate).await?;
        }
        let row = self.store.insert_workflow(candidate.into_row()?).await?;
        info!(id = %row.id, enabled = row.enabled, "created workflow");
        WorkflowModel::from_row(row)
    }

    /// Merge `patch` into the workflow. A `content` member replaces the graph
    /// whole.
    ///
    /// A patch that sets `enabled: true` is the enable transition: the merged
    /// candidate must validate, otherwise [`EngineError::NotValidated`] is
    /// returned and nothing is written. Content may change freely while a
    /// workflow is enabled; the next enable checks it again.
    #[instrument(skip(self, patch))]
    pub async fn update_workflow(&self, id: Uuid, patch: &Value) -> Result<Transition, EngineError> {
        let current = self.store.get_workflow(id).await?;
        let candidate = WorkflowModel::from_row(merged(&current, patch, WORKFLOW_DOCUMENTS)?)?;

        if patch.get("enabled") == Some(&Value::Bool(true)) {
            self.ensure_valid(&candidate).await?;
        }

        let mut write = patch.clone();
        if let Some(content) = write.get_mut("content").filter(|c| !c.is_null()) {
            *content = candidate.into_row()?.content;
        }

        match self.store.update_workflow(id, &write, Some(current.updated)).await? {
            Some(row) => {
                info!(%id, enabled = row.enabled, "updated workflow");
                Ok(Transition::Applied(WorkflowModel::from_row(row)?))
            }
            None => {
                info!(%id, "workflow changed since it was read; update dropped");
                Ok(Transition::Stale)
            }
        }
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<Transition, EngineError> {
        self.update_workflow(id, &serde_json::json!({ "enabled": enabled })).await
    }

    #[instrument(skip(self))]
    pub async fn delete_workflow(&self, id: Uuid) -> Result<bool, EngineError> {
        let removed = self.store.delete_workflow(id).await?;
        if removed {
            info!(%id, "deleted workflow");
        }
        Ok(removed)
    }

    /// Full validation report for a stored workflow.
    pub async fn validate_workflow(&self, id: Uuid) -> Result<WorkflowReport, EngineError> {
        let model = self.get_workflow(id).await?;
        let accesses = self.load_accesses().await?;
        let report = model.validate(&accesses);
        debug!(%id, valid = report.is_valid(), "validated workflow");
        Ok(report)
    }

    /// Node cards for a stored workflow, with `validated` derived fresh.
    pub async fn node_summaries(&self, id: Uuid) -> Result<Vec<NodeSummary>, EngineError> {
        let model = self.get_workflow(id).await?;
        let accesses = self.load_accesses().await?;
        Ok(summarize(&model.graph, &accesses))
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    pub async fn list_runs(&self, workflow_id: Uuid) -> Result<Vec<WorkflowRun>, EngineError> {
        self.store.get_workflow(workflow_id).await?;
        self.store
            .list_runs(workflow_id)
            .await?
            .into_iter()
            .map(WorkflowRun::from_row)
            .collect()
    }

    /// Store a run reported by the executor and refresh the workflow's cache.
    #[instrument(skip(self, row), fields(workflow_id = %row.workflow_id, run_id = %row.id))]
    pub async fn record_run(&self, row: RunRow) -> Result<WorkflowRun, EngineError> {
        let run = WorkflowRun::from_row(row.clone())?;
        self.store.insert_run(row).await?;
        info!(status = %run.status, "recorded run");

        for attempt in 1..=CACHE_ATTEMPTS {
            let workflow = self.store.get_workflow(run.workflow_id).await?;
            if !run.supersedes(LastRun::from_row(&workflow).as_ref()) {
                debug!("run is older than the cached last run");
                return Ok(run);
            }
            let patch = run.as_last_run().to_patch();
            let written = self
                .store
                .update_workflow(run.workflow_id, &patch, Some(workflow.updated))
                .await?;
            if written.is_some() {
                debug!(attempt, "refreshed last run cache");
                return Ok(run);
            }
        }
        warn!(
            attempts = CACHE_ATTEMPTS,
            "workflow kept changing; last run cache not refreshed"
        );
        Ok(run)
    }

    // -----------------------------------------------------------------------
    // Accesses
    // -----------------------------------------------------------------------

    #[instrument(skip(self, row), fields(provider = %row.provider))]
    pub async fn create_access(&self, row: AccessRow) -> Result<AccessRow, EngineError> {
        access_record(&row).validate().map_err(EngineError::InvalidRecord)?;
        let row = self.store.insert_access(row).await?;
        info!(id = %row.id, "created access");
        Ok(row)
    }

    /// Merge `patch` into the access; the merged record must validate.
    #[instrument(skip(self, patch))]
    pub async fn update_access(
        &self,
        id: Uuid,
        patch: &Value,
    ) -> Result<Transition<AccessRow>, EngineError> {
        let current = self.store.get_access(id).await?;
        let candidate: AccessRow = merged(&current, patch, &[])?;
        access_record(&candidate).validate().map_err(EngineError::InvalidRecord)?;

        match self.store.update_access(id, patch, Some(current.updated)).await? {
            Some(row) => {
                info!(%id, "updated access");
                Ok(Transition::Applied(row))
            }
            None => {
                info!(%id, "access changed since it was read; update dropped");
                Ok(Transition::Stale)
            }
        }
    }

    /// Delete an access no workflow points at.
    ///
    /// The reference scan runs inside the store's delete, so a workflow saved
    /// concurrently either blocks the delete or is saved after it and fails
    /// validation on its dangling reference.
    #[instrument(skip(self))]
    pub async fn delete_access(&self, id: Uuid) -> Result<bool, EngineError> {
        let in_use = move |row: &WorkflowRow| references(row, id);
        match self.store.delete_access_unless(id, &in_use).await? {
            AccessDeletion::Deleted => {
                info!(%id, "deleted access");
                Ok(true)
            }
            AccessDeletion::Missing => Ok(false),
            AccessDeletion::InUse(workflows) => {
                warn!(%id, workflows = workflows.len(), "refused to delete access still in use");
                Err(EngineError::AccessInUse { id, workflows })
            }
        }
    }
}
