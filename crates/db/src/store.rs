//! The [`Store`] trait and the query/page types shared by implementations.
//!
//! A store is a dumb record keeper: it pages, filters by equality, applies
//! JSON merge patches and reports 0-row updates. It never validates.
//!
//! A workflow's `content` is one document: a patch that carries it replaces
//! the stored graph whole rather than merging into it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{AccessRow, RunRow, WorkflowRow};
use crate::DbError;

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 500;

/// Workflow members a patch replaces whole instead of merging into.
pub const WORKFLOW_DOCUMENTS: &[&str] = &["content"];

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// Paging and filter parameters for a workflow listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// 1-based page number; `0` is read as `1`.
    #[serde(default)]
    pub page: u32,
    /// `0` means [`DEFAULT_PER_PAGE`]; capped at [`MAX_PER_PAGE`].
    #[serde(default)]
    pub per_page: u32,
    /// Equality filter on `enabled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl ListQuery {
    /// Clamp `page` and `per_page` into their accepted ranges.
    pub fn normalized(self) -> Self {
        let per_page = match self.per_page {
            0 => DEFAULT_PER_PAGE,
            n => n.min(MAX_PER_PAGE),
        };
        Self { page: self.page.max(1), per_page, enabled: self.enabled }
    }

    fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.per_page as usize)
    }

    /// Slice one page out of already ordered, already filtered rows.
    pub fn paginate<T>(&self, rows: Vec<T>) -> Page<T> {
        let query = self.normalized();
        let total_items = rows.len();
        let items = rows
            .into_iter()
            .skip(query.offset())
            .take(query.per_page as usize)
            .collect();
        Page { page: query.page, per_page: query.per_page, total_items, items }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub page: u32,
    pub per_page: u32,
    pub total_items: usize,
    pub items: Vec<T>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Storage trait for workflows, accesses and runs.
///
/// `update_*` methods return `Ok(None)` when no row matched, either because
/// the record is gone or because `expected_updated` no longer matches its
/// `updated` stamp. Callers treat that as "someone else changed it".
#[async_trait]
pub trait Store: Send + Sync {
    /// Page through workflows, newest first.
    async fn list_workflows(&self, query: ListQuery) -> Result<Page<WorkflowRow>, DbError>;

    /// Every workflow, newest first.
    async fn scan_workflows(&self) -> Result<Vec<WorkflowRow>, DbError>;

    /// Fetch a single workflow by id.
    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError>;

    /// Insert a new workflow, stamping `created` and `updated`.
    async fn insert_workflow(&self, row: WorkflowRow) -> Result<WorkflowRow, DbError>;

    /// Merge-patch a workflow.
    async fn update_workflow(
        &self,
        id: Uuid,
        patch: &Value,
        expected_updated: Option<DateTime<Utc>>,
    ) -> Result<Option<WorkflowRow>, DbError>;

    /// Delete a workflow and its runs. Returns whether a row was removed.
    async fn delete_workflow(&self, id: Uuid) -> Result<bool, DbError>;

    /// Every access, oldest first.
    async fn list_accesses(&self) -> Result<Vec<AccessRow>, DbError>;

    async fn get_access(&self, id: Uuid) -> Result<AccessRow, DbError>;

    async fn insert_access(&self, row: AccessRow) -> Result<AccessRow, DbError>;

    async fn update_access(
        &self,
        id: Uuid,
        patch: &Value,
        expected_updated: Option<DateTime<Utc>>,
    ) -> Result<Option<AccessRow>, DbError>;

    async fn delete_access(&self, id: Uuid) -> Result<bool, DbError>;

    /// Delete an access unless some workflow satisfies `in_use`.
    ///
    /// The scan and the delete happen under one write, so a workflow saved
    /// in between cannot end up pointing at a deleted access.
    async fn delete_access_unless(
        &self,
        id: Uuid,
        in_use: &(dyn for<'w> Fn(&'w WorkflowRow) -> bool + Send + Sync),
    ) -> Result<AccessDeletion, DbError>;

    /// Runs of one workflow, newest first.
    async fn list_runs(&self, workflow_id: Uuid) -> Result<Vec<RunRow>, DbError>;

    async fn insert_run(&self, row: RunRow) -> Result<RunRow, DbError>;
}

/// Outcome of [`Store::delete_access_unless`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDeletion {
    Deleted,
    Missing,
    /// Refused; carries the ids of the workflows that matched.
    InUse(Vec<Uuid>),
}

// ---------------------------------------------------------------------------
// Merge patch
// ---------------------------------------------------------------------------

/// Apply an RFC 7396 JSON merge patch to `target` in place.
///
/// Object members merge recursively, `null` removes a member and any other
/// patch value replaces the target outright.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// [`merge_patch`] on a record, except that the top-level members named in
/// `documents` are replaced outright (`null` still removes them).
pub fn patch_record(target: &mut Value, patch: &Value, documents: &[&str]) {
    let Value::Object(members) = patch else {
        merge_patch(target, patch);
        return;
    };
    let mut members = members.clone();
    let replaced: Vec<(String, Value)> =
        documents.iter().filter_map(|key| members.remove_entry(*key)).collect();

    merge_patch(target, &Value::Object(members));
    if let Value::Object(target) = target {
        for (key, value) in replaced {
            if value.is_null() {
                target.remove(&key);
            } else {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_patch_follows_rfc_7396() {
        let mut doc = json!({ "a": "b", "c": { "d": "e", "f": "g" } });
        merge_patch(&mut doc, &json!({ "a": "z", "c": { "f": null } }));
        assert_eq!(doc, json!({ "a": "z", "c": { "d": "e" } }));

        let mut doc = json!({ "list": [1, 2] });
        merge_patch(&mut doc, &json!({ "list": [3] }));
        assert_eq!(doc, json!({ "list": [3] }));

        let mut doc = json!("scalar");
        merge_patch(&mut doc, &json!({ "k": 1 }));
        assert_eq!(doc, json!({ "k": 1 }));
    }

    #[test]
    fn documents_are_replaced_not_merged() {
        let mut doc = json!({
            "name": "a",
            "content": { "root": "start", "nodes": [{ "id": "start" }] }
        });
        let tree = json!({ "id": "start", "type": "start", "next": { "id": "n", "type": "notify" } });
        patch_record(&mut doc, &json!({ "name": "b", "content": tree }), WORKFLOW_DOCUMENTS);
        assert_eq!(doc, json!({ "name": "b", "content": tree }));

        patch_record(&mut doc, &json!({ "content": null }), WORKFLOW_DOCUMENTS);
        assert_eq!(doc, json!({ "name": "b" }));

        // Members outside `documents` still merge.
        let mut doc = json!({ "config": { "a": 1, "b": 2 } });
        patch_record(&mut doc, &json!({ "config": { "b": null } }), &[]);
        assert_eq!(doc, json!({ "config": { "a": 1 } }));
    }

    #[test]
    fn per_page_is_clamped() {
        let q = ListQuery { page: 0, per_page: 0, enabled: None }.normalized();
        assert_eq!((q.page, q.per_page), (1, DEFAULT_PER_PAGE));

        let q = ListQuery { page: 3, per_page: 10_000, enabled: None }.normalized();
        assert_eq!((q.page, q.per_page), (3, MAX_PER_PAGE));
    }

    #[test]
    fn paginate_reports_total_and_slices() {
        let query = ListQuery { page: 2, per_page: 3, enabled: None };
        let page = query.paginate((1..=7).collect::<Vec<_>>());
        assert_eq!(page.total_items, 7);
        assert_eq!(page.items, vec![4, 5, 6]);

        let past_end = ListQuery { page: 9, ..query }.paginate((1..=7).collect::<Vec<_>>());
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total_items, 7);
    }
}
