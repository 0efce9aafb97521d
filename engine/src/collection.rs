//! The locally held page of a server-side paginated set.
//!
//! A [`LiveList`] holds at most `page_size` records with unique ids, the
//! server-side total `count`, the view scope used to decide whether live
//! inserts belong on this page, and the pending-write bookkeeping of its rows.

use crate::pending::{restore_into, FailurePolicy, PendingWrites, RowSync};
use crate::{error::Result, EntityKind, Error, Fields, PartialUpdate, Record, RecordId};
use std::collections::HashSet;

/// Which slice of the server-side set the list is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewScope {
    /// 1-based page number
    pub page: u32,
    /// Tag partition the view is scoped to, if any
    pub tag: Option<String>,
    /// Whether a date range or text search narrows the view
    pub filtered: bool,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self {
            page: 1,
            tag: None,
            filtered: false,
        }
    }
}

impl ViewScope {
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Whether the record belongs to this view's tag partition.
    pub fn admits(&self, record: &Record) -> bool {
        match &self.tag {
            None => true,
            Some(tag) => record.tags() == Some(tag.as_str()),
        }
    }

    /// Live-created records are only shown on the first page of an unfiltered view.
    pub fn shows_live_inserts(&self) -> bool {
        self.page == 1 && !self.filtered
    }
}

/// A page of records kept live against the server.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveList {
    kind: EntityKind,
    records: Vec<Record>,
    count: u64,
    page_size: usize,
    scope: ViewScope,
    pending: PendingWrites,
}

impl LiveList {
    /// Create an empty list. A zero page size is treated as one.
    pub fn new(kind: EntityKind, page_size: usize) -> Self {
        Self {
            kind,
            records: Vec::new(),
            count: 0,
            page_size: page_size.max(1),
            scope: ViewScope::default(),
            pending: PendingWrites::new(),
        }
    }

    /// Builder-style method to set the view scope.
    pub fn with_scope(mut self, scope: ViewScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Total matching records on the server (not `len()`).
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    pub fn set_scope(&mut self, scope: ViewScope) {
        self.scope = scope;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.iter().map(Record::id)
    }

    pub fn row_sync(&self, id: &RecordId) -> RowSync {
        self.pending.state(id)
    }

    pub fn pending(&self) -> &PendingWrites {
        &self.pending
    }

    /// Replace the page with a fresh server response.
    ///
    /// Duplicate ids keep their first occurrence and the page is cut at
    /// `page_size`. Pending bookkeeping is dropped since the server state is
    /// authoritative.
    pub fn replace_page(&mut self, records: Vec<Record>, count: u64) {
        let mut seen = HashSet::new();
        self.records = records
            .into_iter()
            .filter(|r| seen.insert(r.id().clone()))
            .take(self.page_size)
            .collect();
        self.count = count;
        self.pending.clear();
    }

    /// Merge `patch` into the record locally and return the fields that
    /// actually changed. `None` means nothing changed and no write is needed.
    pub fn apply_local_edit(
        &mut self,
        id: &RecordId,
        patch: &Fields,
    ) -> Result<Option<PartialUpdate>> {
        let index = self
            .position(id)
            .ok_or_else(|| Error::RecordNotInView(id.clone()))?;

        let before = &self.records[index];
        let after = before.merged(patch);
        let update = before.diff(&after);
        if update.is_empty() {
            return Ok(None);
        }

        self.pending.begin(before, &update);
        self.records[index] = after;
        Ok(Some(update))
    }

    /// Remove records locally ahead of a delete request.
    pub fn remove_local(&mut self, ids: &[RecordId]) -> Vec<Record> {
        let mut removed = Vec::new();
        for id in ids {
            if let Some(index) = self.position(id) {
                removed.push(self.records.remove(index));
                self.count = self.count.saturating_sub(1);
                self.pending.settle(id);
            }
        }
        removed
    }

    /// The server acknowledged a write to `id`.
    pub fn confirm_write(&mut self, id: &RecordId) -> RowSync {
        self.pending.confirm(id)
    }

    /// The server rejected a write to `id`.
    pub fn fail_write(&mut self, id: &RecordId, policy: FailurePolicy) -> RowSync {
        let (state, restore) = self.pending.fail(id, policy);
        if let Some(restore) = restore {
            if let Some(index) = self.position(id) {
                restore_into(&mut self.records[index], restore);
            }
        }
        state
    }

    // Reconciler access

    pub(crate) fn prepend(&mut self, record: Record) -> Option<Record> {
        self.records.insert(0, record);
        if self.records.len() <= self.page_size {
            return None;
        }
        let evicted = self.records.pop()?;
        self.pending.settle(evicted.id());
        Some(evicted)
    }

    pub(crate) fn merge_at(&mut self, index: usize, patch: &Fields) {
        let id = self.records[index].id().clone();
        self.records[index].merge(patch);
        self.pending.settle(&id);
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> Record {
        let record = self.records.remove(index);
        self.pending.settle(record.id());
        record
    }

    pub(crate) fn bump_count(&mut self) {
        self.count += 1;
    }

    pub(crate) fn drop_count(&mut self) {
        self.count = self.count.saturating_sub(1);
    }
}
