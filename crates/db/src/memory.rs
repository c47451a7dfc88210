//! In-memory [`Store`] behind a single `tokio` read/write lock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AccessRow, RunRow, Seed, WorkflowRow};
use crate::store::{patch_record, AccessDeletion, ListQuery, Page, Store, WORKFLOW_DOCUMENTS};
use crate::DbError;

const WORKFLOWS: &str = "workflow";
const ACCESSES: &str = "access";
const RUNS: &str = "run";

/// Members a patch may never touch.
const IMMUTABLE: [&str; 3] = ["id", "created", "updated"];

#[derive(Debug, Default)]
struct Tables {
    // Insertion order; listings reverse it where newest-first is wanted.
    workflows: Vec<WorkflowRow>,
    accesses: Vec<AccessRow>,
    runs: Vec<RunRow>,
}

/// A process-local store. Cloning is not supported; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `seed`, keeping the seed's own timestamps.
    pub fn with_seed(seed: Seed) -> Result<Self, DbError> {
        let mut tables = Tables::default();
        for row in seed.accesses {
            ensure_unique(&tables.accesses, ACCESSES, row.id, |r| r.id)?;
            tables.accesses.push(row);
        }
        for row in seed.workflows {
            ensure_unique(&tables.workflows, WORKFLOWS, row.id, |r| r.id)?;
            tables.workflows.push(row);
        }
        debug!(
            accesses = tables.accesses.len(),
            workflows = tables.workflows.len(),
            "seeded memory store"
        );
        Ok(Self { tables: RwLock::new(tables) })
    }
}

fn ensure_unique<T>(
    rows: &[T],
    collection: &'static str,
    id: Uuid,
    key: impl Fn(&T) -> Uuid,
) -> Result<(), DbError> {
    if rows.iter().any(|r| key(r) == id) {
        Err(DbError::Duplicate { collection, id })
    } else {
        Ok(())
    }
}

/// Next `updated` stamp; strictly after `previous` so staleness is detectable.
fn next_stamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous + Duration::microseconds(1))
}

fn patched<T: Serialize + DeserializeOwned>(
    row: &T,
    patch: &Value,
    documents: &[&str],
) -> Result<T, DbError> {
    let Value::Object(members) = patch else {
        return Err(serde_json::Error::custom("patch must be a JSON object").into());
    };
    let mut members = members.clone();
    for key in IMMUTABLE {
        members.remove(key);
    }

    let mut doc = serde_json::to_value(row)?;
    patch_record(&mut doc, &Value::Object(members), documents);
    Ok(serde_json::from_value(doc)?)
}

/// Shared body of the `update_*` methods.
fn apply_update<T: Serialize + DeserializeOwned + Clone>(
    rows: &mut [T],
    id: Uuid,
    patch: &Value,
    documents: &[&str],
    expected_updated: Option<DateTime<Utc>>,
    key: impl Fn(&T) -> (Uuid, DateTime<Utc>),
    stamp: impl Fn(&mut T, DateTime<Utc>),
) -> Result<Option<T>, DbError> {
    let Some(slot) = rows.iter_mut().find(|r| key(r).0 == id) else {
        return Ok(None);
    };
    let current = key(slot).1;
    if expected_updated.is_some_and(|expected| expected != current) {
        return Ok(None);
    }

    let mut next = patched(&*slot, patch, documents)?;
    stamp(&mut next, next_stamp(current));
    *slot = next.clone();
    Ok(Some(next))
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_workflows(&self, query: ListQuery) -> Result<Page<WorkflowRow>, DbError> {
        let tables = self.tables.read().await;
        let rows: Vec<WorkflowRow> = tables
            .workflows
            .iter()
            .rev()
            .filter(|r| query.enabled.map_or(true, |enabled| r.enabled == enabled))
            .cloned()
            .collect();
        Ok(query.paginate(rows))
    }

    async fn scan_workflows(&self) -> Result<Vec<WorkflowRow>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables.workflows.iter().rev().cloned().collect())
    }

    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError> {
        let tables = self.tables.read().await;
        tables
            .workflows
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| DbError::not_found(WORKFLOWS, id))
    }

    async fn insert_workflow(&self, mut row: WorkflowRow) -> Result<WorkflowRow, DbError> {
        let mut tables = self.tables.write().await;
        ensure_unique(&tables.workflows, WORKFLOWS, row.id, |r| r.id)?;
        let now = Utc::now();
        row.created = now;
        row.updated = now;
        tables.workflows.push(row.clone());
        debug!(id = %row.id, "inserted workflow");
        Ok(row)
    }

    async fn update_workflow(
        &self,
        id: Uuid,
        patch: &Value,
        expected_updated: Option<DateTime<Utc>>,
    ) -> Result<Option<WorkflowRow>, DbError> {
        let mut tables = self.tables.write().await;
        let updated = apply_update(
            &mut tables.workflows,
            id,
            patch,
            WORKFLOW_DOCUMENTS,
            expected_updated,
            |r| (r.id, r.updated),
            |r, at| r.updated = at,
        )?;
        if updated.is_none() {
            debug!(%id, "workflow update matched 0 rows");
        }
        Ok(updated)
    }

    async fn delete_workflow(&self, id: Uuid) -> Result<bool, DbError> {
        let mut tables = self.tables.write().await;
        let before = tables.workflows.len();
        tables.workflows.retain(|r| r.id != id);
        let removed = tables.workflows.len() != before;
        if removed {
            tables.runs.retain(|r| r.workflow_id != id);
        }
        Ok(removed)
    }

    async fn list_accesses(&self) -> Result<Vec<AccessRow>, DbError> {
        Ok(self.tables.read().await.accesses.clone())
    }

    async fn get_access(&self, id: Uuid) -> Result<AccessRow, DbError> {
        let tables = self.tables.read().await;
        tables
            .accesses
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| DbError::not_found(ACCESSES, id))
    }

    async fn insert_access(&self, mut row: AccessRow) -> Result<AccessRow, DbError> {
        let mut tables = self.tables.write().await;
        ensure_unique(&tables.accesses, ACCESSES, row.id, |r| r.id)?;
        let now = Utc::now();
        row.created = now;
        row.updated = now;
        tables.accesses.push(row.clone());
        debug!(id = %row.id, "inserted access");
        Ok(row)
    }

    async fn update_access(
        &self,
        id: Uuid,
        patch: &Value,
        expected_updated: Option<DateTime<Utc>>,
    ) -> Result<Option<AccessRow>, DbError> {
        let mut tables = self.tables.write().await;
        apply_update(
            &mut tables.accesses,
            id,
            patch,
            &[],
            expected_updated,
            |r| (r.id, r.updated),
            |r, at| r.updated = at,
        )
    }

    async fn delete_access(&self, id: Uuid) -> Result<bool, DbError> {
        let mut tables = self.tables.write().await;
        let before = tables.accesses.len();
        tables.accesses.retain(|r| r.id != id);
        Ok(tables.accesses.len() != before)
    }

    async fn delete_access_unless(
        &self,
        id: Uuid,
        in_use: &(dyn for<'w> Fn(&'w WorkflowRow) -> bool + Send + Sync),
    ) -> Result<AccessDeletion, DbError> {
        let mut tables = self.tables.write().await;
        let users: Vec<Uuid> = tables.workflows.iter().rev().filter(|r| in_use(*r)).map(|r| r.id).collect();
        if !users.is_empty() {
            return Ok(AccessDeletion::InUse(users));
        }
        let before = tables.accesses.len();
        tables.accesses.retain(|r| r.id != id);
        if tables.accesses.len() == before {
            return Ok(AccessDeletion::Missing);
        }
        debug!(%id, "deleted access");
        Ok(AccessDeletion::Deleted)
    }

    async fn list_runs(&self, workflow_id: Uuid) -> Result<Vec<RunRow>, DbError> {
        let tables = self.tables.read().await;
        let mut runs: Vec<RunRow> = tables
            .runs
            .iter()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn insert_run(&self, row: RunRow) -> Result<RunRow, DbError> {
        let mut tables = self.tables.write().await;
        if !tables.workflows.iter().any(|w| w.id == row.workflow_id) {
            return Err(DbError::not_found(WORKFLOWS, row.workflow_id));
        }
        ensure_unique(&tables.runs, RUNS, row.id, |r| r.id)?;
        tables.runs.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workflow(name: &str, enabled: bool) -> WorkflowRow {
        WorkflowRow {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            trigger: "manual".into(),
            trigger_cron: None,
            enabled,
            content: json!({}),
            last_run_id: None,
            last_run_status: None,
            last_run_time: None,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn list_filters_pages_and_orders_newest_first() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.insert_workflow(workflow(&format!("wf-{i}"), i % 2 == 0)).await.unwrap();
        }

        let page = store
            .list_workflows(ListQuery { page: 1, per_page: 2, enabled: Some(true) })
            .await
            .unwrap();
        assert_eq!(page.total_items, 3);
        let names: Vec<&str> = page.items.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["wf-4", "wf-2"]);
    }

    #[tokio::test]
    async fn update_merges_and_protects_identity() {
        let store = MemoryStore::new();
        let row = store.insert_workflow(workflow("a", false)).await.unwrap();

        let patched = store
            .update_workflow(row.id, &json!({ "name": "b", "id": Uuid::nil(), "description": "d" }), None)
            .await
            .unwrap()
            .expect("row exists");
        assert_eq!(patched.id, row.id);
        assert_eq!(patched.name, "b");
        assert_eq!(patched.description, "d");
        assert!(patched.updated > row.updated);
    }

    #[tokio::test]
    async fn stale_or_missing_update_matches_no_rows() {
        let store = MemoryStore::new();
        let row = store.insert_workflow(workflow("a", false)).await.unwrap();
        store.update_workflow(row.id, &json!({ "name": "b" }), Some(row.updated)).await.unwrap();

        let stale = store
            .update_workflow(row.id, &json!({ "enabled": true }), Some(row.updated))
            .await
            .unwrap();
        assert!(stale.is_none());

        let missing = store.update_workflow(Uuid::new_v4(), &json!({}), None).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn bad_patch_is_rejected_without_writing() {
        let store = MemoryStore::new();
        let row = store.insert_workflow(workflow("a", false)).await.unwrap();

        let err = store.update_workflow(row.id, &json!({ "enabled": "yes" }), None).await;
        assert!(matches!(err, Err(DbError::InvalidPatch(_))));
        assert_eq!(store.get_workflow(row.id).await.unwrap(), row);
    }

    #[tokio::test]
    async fn deleting_a_workflow_drops_its_runs() {
        let store = MemoryStore::new();
        let row = store.insert_workflow(workflow("a", false)).await.unwrap();
        store
            .insert_run(RunRow {
                id: Uuid::new_v4(),
                workflow_id: row.id,
                status: "succeeded".into(),
                trigger: "manual".into(),
                started_at: Utc::now(),
                ended_at: None,
                error: None,
                logs: Value::Null,
            })
            .await
            .unwrap();

        assert!(store.delete_workflow(row.id).await.unwrap());
        assert!(store.list_runs(row.id).await.unwrap().is_empty());
        assert!(!store.delete_workflow(row.id).await.unwrap());
        assert!(store.get_workflow(row.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn content_patch_replaces_the_stored_graph() {
        let store = MemoryStore::new();
        let mut row = workflow("a", false);
        row.content = json!({ "root": "start", "nodes": [{ "id": "start", "type": "start" }] });
        let row = store.insert_workflow(row).await.unwrap();

        let tree = json!({ "id": "start", "type": "start", "next": { "id": "n", "type": "notify" } });
        let patched = store
            .update_workflow(row.id, &json!({ "content": tree }), Some(row.updated))
            .await
            .unwrap()
            .expect("row exists");
        assert_eq!(patched.content, tree);
    }

    #[tokio::test]
    async fn guarded_access_delete_checks_workflows_under_the_same_write() {
        let store = MemoryStore::new();
        let access = store
            .insert_access(AccessRow {
                id: Uuid::new_v4(),
                name: "host".into(),
                provider: "local".into(),
                config: json!({}),
                usage: "deploy".into(),
                created: Utc::now(),
                updated: Utc::now(),
            })
            .await
            .unwrap();
        let user = store.insert_workflow(workflow("uses it", false)).await.unwrap();
        let user_id = user.id;

        let refused = store.delete_access_unless(access.id, &move |r: &WorkflowRow| r.id == user_id).await.unwrap();
        assert_eq!(refused, AccessDeletion::InUse(vec![user.id]));
        assert!(store.get_access(access.id).await.is_ok());

        let deleted = store.delete_access_unless(access.id, &|_: &WorkflowRow| false).await.unwrap();
        assert_eq!(deleted, AccessDeletion::Deleted);
        let missing = store.delete_access_unless(access.id, &|_: &WorkflowRow| false).await.unwrap();
        assert_eq!(missing, AccessDeletion::Missing);
    }

    #[tokio::test]
    async fn seed_rejects_duplicate_ids() {
        let row = workflow("a", false);
        let seed = Seed { accesses: vec![], workflows: vec![row.clone(), row] };
        assert!(matches!(MemoryStore::with_seed(seed), Err(DbError::Duplicate { .. })));
    }
}
