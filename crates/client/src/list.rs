//! Locally held workflow listing.
//!
//! Refreshed pages and optimistic edits are merged by record id. A row with
//! an edit in flight keeps its local version, a row deleted locally is not
//! resurrected by a page fetched before the delete landed, and otherwise the
//! copy with the newer `updated` stamp wins.

use std::collections::{HashMap, HashSet};

use db::{ListQuery, Page, WorkflowRow};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::{BackendClient, ClientResult};

#[derive(Debug, Default)]
pub struct WorkflowList {
    order: Vec<Uuid>,
    rows: HashMap<Uuid, WorkflowRow>,
    pending: HashSet<Uuid>,
    removed: HashSet<Uuid>,
    total_items: usize,
}

impl WorkflowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows in display order.
    pub fn items(&self) -> impl Iterator<Item = &WorkflowRow> {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }

    pub fn get(&self, id: Uuid) -> Option<&WorkflowRow> {
        self.rows.get(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Server-side total of the last merged page.
    pub fn total_items(&self) -> usize {
        self.total_items
    }

    /// Replace the listing with `page`, keeping local state where it is newer.
    pub fn merge_page(&mut self, page: Page<WorkflowRow>) {
        let listed: HashSet<Uuid> = page.items.iter().map(|row| row.id).collect();
        let mut hidden = 0;
        let mut order = Vec::with_capacity(page.items.len());
        let mut rows = HashMap::with_capacity(page.items.len());

        for incoming in page.items {
            let id = incoming.id;
            if self.removed.contains(&id) {
                hidden += 1;
                continue;
            }
            let row = match self.rows.remove(&id) {
                Some(local) if self.pending.contains(&id) || local.updated > incoming.updated => local,
                _ => incoming,
            };
            order.push(id);
            rows.insert(id, row);
        }

        // Rows being edited stay visible even when the page no longer has them.
        for id in self.order.iter().filter(|id| self.pending.contains(*id) && !listed.contains(*id)) {
            if let Some(row) = self.rows.remove(id) {
                order.push(*id);
                rows.insert(*id, row);
            }
        }

        self.removed.retain(|id| listed.contains(id));
        self.total_items = page.total_items.saturating_sub(hidden);
        self.order = order;
        self.rows = rows;
    }

    /// Insert or replace a row as the server returned it.
    pub fn upsert(&mut self, row: WorkflowRow) {
        let id = row.id;
        self.pending.remove(&id);
        self.removed.remove(&id);
        if self.rows.insert(id, row).is_none() {
            self.order.insert(0, id);
            self.total_items += 1;
        }
    }

    /// Drop a row locally. Returns its position and value for [`Self::restore`].
    pub fn remove(&mut self, id: Uuid) -> Option<(usize, WorkflowRow)> {
        let row = self.rows.remove(&id)?;
        let index = self.order.iter().position(|entry| *entry == id).unwrap_or(self.order.len());
        self.order.retain(|entry| *entry != id);
        self.pending.remove(&id);
        self.removed.insert(id);
        self.total_items = self.total_items.saturating_sub(1);
        Some((index, row))
    }

    /// Put back a row taken out by [`Self::remove`].
    pub fn restore(&mut self, index: usize, row: WorkflowRow) {
        let id = row.id;
        self.removed.remove(&id);
        if self.rows.insert(id, row).is_none() {
            self.order.insert(index.min(self.order.len()), id);
            self.total_items += 1;
        }
    }

    /// Apply `patch` to the local row and mark it as having an edit in flight.
    ///
    /// Returns the row as it was, for [`Self::rollback`]. `None` when the row
    /// is not listed or the patch does not fit it.
    pub fn stage(&mut self, id: Uuid, patch: &Value) -> Option<WorkflowRow> {
        let current = self.rows.get(&id)?;
        let mut doc = serde_json::to_value(current).ok()?;
        db::patch_record(&mut doc, patch, db::WORKFLOW_DOCUMENTS);
        let staged: WorkflowRow = serde_json::from_value(doc).ok()?;
        self.pending.insert(id);
        self.rows.insert(id, staged)
    }

    /// Undo a staged edit.
    pub fn rollback(&mut self, previous: WorkflowRow) {
        let id = previous.id;
        self.pending.remove(&id);
        if let Some(row) = self.rows.get_mut(&id) {
            *row = previous;
        }
    }

    pub fn is_pending(&self, id: Uuid) -> bool {
        self.pending.contains(&id)
    }

    // -----------------------------------------------------------------------
    // Round trips
    // -----------------------------------------------------------------------

    /// Fetch a page and merge it.
    ///
    /// Returns `Ok(false)` without touching the list when `cancel` fired
    /// first.
    pub async fn refresh(
        &mut self,
        client: &BackendClient,
        query: &ListQuery,
        cancel: &CancellationToken,
    ) -> ClientResult<bool> {
        match client.list_workflows(query, cancel).await {
            Ok(page) => {
                self.merge_page(page);
                Ok(true)
            }
            Err(e) if e.is_cancelled() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Optimistically toggle `enabled`, then reconcile with the server.
    ///
    /// Returns `Ok(false)` when the record had changed underneath; the list
    /// then holds the server's current copy, or drops the row if it is gone.
    /// Any error rolls the local edit back.
    pub async fn set_enabled(&mut self, client: &BackendClient, id: Uuid, enabled: bool) -> ClientResult<bool> {
        let patch = json!({ "enabled": enabled });
        let previous = self.stage(id, &patch);

        let outcome = match client.save_workflow(id, &patch).await {
            Ok(Some(row)) => {
                self.upsert(row);
                return Ok(true);
            }
            Ok(None) => client.get_workflow(id).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(row) => {
                debug!(%id, "workflow changed elsewhere; took server copy");
                self.upsert(row);
                Ok(false)
            }
            Err(e) if e.is_not_found() => {
                debug!(%id, "workflow deleted elsewhere");
                self.remove(id);
                Ok(false)
            }
            Err(e) => {
                if let Some(previous) = previous {
                    self.rollback(previous);
                }
                Err(e)
            }
        }
    }

    /// Optimistically delete, restoring the row if the server refuses.
    pub async fn delete(&mut self, client: &BackendClient, id: Uuid) -> ClientResult<()> {
        let taken = self.remove(id);
        if let Err(e) = client.delete_workflow(id).await {
            if let Some((index, row)) = taken {
                self.restore(index, row);
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn row(name: &str) -> WorkflowRow {
        serde_json::from_value(json!({ "name": name, "trigger": "manual" })).unwrap()
    }

    fn page(items: Vec<WorkflowRow>) -> Page<WorkflowRow> {
        Page { page: 1, per_page: 10, total_items: items.len(), items }
    }

    fn names(list: &WorkflowList) -> Vec<&str> {
        list.items().map(|row| row.name.as_str()).collect()
    }

    #[test]
    fn page_order_wins_but_newer_local_rows_survive() {
        let a = row("a");
        let b = row("b");
        let mut list = WorkflowList::new();
        list.merge_page(page(vec![a.clone(), b.clone()]));

        let mut fresher = b.clone();
        fresher.name = "b (renamed)".into();
        fresher.updated = b.updated + Duration::seconds(5);
        list.upsert(fresher);

        list.merge_page(page(vec![b, a]));
        assert_eq!(names(&list), vec!["b (renamed)", "a"]);
    }

    #[test]
    fn staged_edit_outlives_an_older_page_until_rolled_back() {
        let a = row("a");
        let mut list = WorkflowList::new();
        list.merge_page(page(vec![a.clone()]));

        let previous = list.stage(a.id, &json!({ "enabled": true })).unwrap();
        list.merge_page(page(vec![a.clone()]));
        assert!(list.get(a.id).unwrap().enabled);
        assert!(list.is_pending(a.id));

        list.rollback(previous);
        assert!(!list.get(a.id).unwrap().enabled);
        assert!(!list.is_pending(a.id));
    }

    #[test]
    fn removed_rows_stay_gone_until_the_server_agrees() {
        let a = row("a");
        let b = row("b");
        let mut list = WorkflowList::new();
        list.merge_page(page(vec![a.clone(), b.clone()]));

        let (index, _) = list.remove(a.id).unwrap();
        assert_eq!(index, 0);
        list.merge_page(page(vec![a.clone(), b.clone()]));
        assert_eq!(names(&list), vec!["b"]);
        assert_eq!(list.total_items(), 1);

        list.merge_page(page(vec![b.clone()]));
        list.merge_page(page(vec![a.clone(), b]));
        assert_eq!(names(&list), vec!["a", "b"]);
    }

    #[test]
    fn restore_puts_a_row_back_in_place() {
        let rows = vec![row("a"), row("b"), row("c")];
        let mut list = WorkflowList::new();
        list.merge_page(page(rows.clone()));

        let (index, taken) = list.remove(rows[1].id).unwrap();
        list.restore(index, taken);
        assert_eq!(names(&list), vec!["a", "b", "c"]);
        assert_eq!(list.total_items(), 3);
    }

    #[test]
    fn upsert_prepends_unknown_rows() {
        let mut list = WorkflowList::new();
        list.merge_page(page(vec![row("a")]));
        list.upsert(row("new"));
        assert_eq!(names(&list), vec!["new", "a"]);
        assert_eq!(list.len(), 2);
    }
}
