//! Tracking of optimistic writes that the server has not confirmed yet.
//!
//! Every locally committed edit marks its row `Pending` and remembers the
//! field values it overwrote. The server answer settles the row: an ack makes
//! it `Synced` again, a failure either reverts the fields or leaves the row
//! visibly `OutOfSync`, depending on the table's [`FailurePolicy`].

use crate::{PartialUpdate, Record, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Synchronisation state of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowSync {
    /// Local state matches the last known server state
    #[default]
    Synced,
    /// A write is in flight
    Pending,
    /// A write failed and the local values were kept
    OutOfSync,
}

/// What to do with local values when a write is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Restore the values the edit overwrote
    Revert,
    /// Keep the local values and flag the row until the next successful write
    #[default]
    MarkOutOfSync,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingWrite {
    /// Values before the first unconfirmed write; `None` means the field was absent
    prior: HashMap<String, Option<Value>>,
    inflight: u32,
    state: RowSync,
}

/// Field values to put back after a reverted write.
pub type Restore = Vec<(String, Option<Value>)>;

/// Unconfirmed writes per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingWrites {
    rows: HashMap<RecordId, PendingWrite>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a write of `update` over `before`.
    pub fn begin(&mut self, before: &Record, update: &PartialUpdate) {
        let entry = self
            .rows
            .entry(before.id().clone())
            .or_insert_with(|| PendingWrite {
                prior: HashMap::new(),
                inflight: 0,
                state: RowSync::Pending,
            });

        // Keep the oldest value so a revert goes back to server state.
        for key in update.fields.keys() {
            entry
                .prior
                .entry(key.clone())
                .or_insert_with(|| before.get(key).cloned());
        }
        entry.inflight += 1;
        entry.state = RowSync::Pending;
    }

    /// The server acknowledged one write for `id`.
    pub fn confirm(&mut self, id: &RecordId) -> RowSync {
        let Some(entry) = self.rows.get_mut(id) else {
            return RowSync::Synced;
        };

        entry.inflight = entry.inflight.saturating_sub(1);
        if entry.inflight == 0 {
            self.rows.remove(id);
            RowSync::Synced
        } else {
            entry.state
        }
    }

    /// The server rejected one write for `id`.
    ///
    /// Returns the fields to restore when the policy is [`FailurePolicy::Revert`].
    pub fn fail(&mut self, id: &RecordId, policy: FailurePolicy) -> (RowSync, Option<Restore>) {
        match policy {
            FailurePolicy::Revert => match self.rows.remove(id) {
                Some(entry) => (RowSync::Synced, Some(entry.prior.into_iter().collect())),
                None => (RowSync::Synced, None),
            },
            FailurePolicy::MarkOutOfSync => match self.rows.get_mut(id) {
                Some(entry) => {
                    entry.inflight = entry.inflight.saturating_sub(1);
                    entry.state = RowSync::OutOfSync;
                    (RowSync::OutOfSync, None)
                }
                None => (RowSync::Synced, None),
            },
        }
    }

    /// Authoritative server state arrived for `id`; forget local bookkeeping.
    pub fn settle(&mut self, id: &RecordId) {
        self.rows.remove(id);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn state(&self, id: &RecordId) -> RowSync {
        self.rows.get(id).map(|e| e.state).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Apply a restore list to a record.
pub(crate) fn restore_into(record: &mut Record, restore: Restore) {
    for (key, value) in restore {
        match value {
            Some(v) => record.set(key, v),
            None => {
                record.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Record {
        Record::from_value(json!({"id": 1, "comment": "a", "sum": 10})).unwrap()
    }

    #[test]
    fn confirm_settles_row() {
        let mut pending = PendingWrites::new();
        let update = PartialUpdate::new(RecordId::Int(1)).with("comment", json!("b"));
        pending.begin(&doc(), &update);

        assert_eq!(pending.state(&RecordId::Int(1)), RowSync::Pending);
        assert_eq!(pending.confirm(&RecordId::Int(1)), RowSync::Synced);
        assert!(pending.is_empty());
    }

    #[test]
    fn two_writes_need_two_acks() {
        let mut pending = PendingWrites::new();
        let id = RecordId::Int(1);
        pending.begin(&doc(), &PartialUpdate::new(id.clone()).with("comment", json!("b")));
        pending.begin(&doc(), &PartialUpdate::new(id.clone()).with("sum", json!(11)));

        assert_eq!(pending.confirm(&id), RowSync::Pending);
        assert_eq!(pending.confirm(&id), RowSync::Synced);
    }

    #[test]
    fn revert_returns_oldest_values() {
        let mut pending = PendingWrites::new();
        let id = RecordId::Int(1);
        let first = doc();
        pending.begin(&first, &PartialUpdate::new(id.clone()).with("comment", json!("b")));
        let second = first.merged(json!({"comment": "b"}).as_object().unwrap());
        pending.begin(
            &second,
            &PartialUpdate::new(id.clone())
                .with("comment", json!("c"))
                .with("tax", json!(5)),
        );

        let (state, restore) = pending.fail(&id, FailurePolicy::Revert);
        assert_eq!(state, RowSync::Synced);

        let mut restore = restore.unwrap();
        restore.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            restore,
            vec![
                ("comment".to_string(), Some(json!("a"))),
                ("tax".to_string(), None),
            ]
        );
    }

    #[test]
    fn out_of_sync_clears_on_next_ack() {
        let mut pending = PendingWrites::new();
        let id = RecordId::Int(1);
        pending.begin(&doc(), &PartialUpdate::new(id.clone()).with("sum", json!(1)));
        assert_eq!(
            pending.fail(&id, FailurePolicy::MarkOutOfSync),
            (RowSync::OutOfSync, None)
        );
        assert_eq!(pending.state(&id), RowSync::OutOfSync);

        pending.begin(&doc(), &PartialUpdate::new(id.clone()).with("sum", json!(2)));
        assert_eq!(pending.confirm(&id), RowSync::Synced);
    }

    #[test]
    fn restore_removes_fields_that_were_absent() {
        let mut record = Record::from_value(json!({"id": 1, "tax": 5, "sum": 3})).unwrap();
        restore_into(
            &mut record,
            vec![("tax".into(), None), ("sum".into(), Some(json!(2)))],
        );
        assert_eq!(record.to_value(), json!({"id": 1, "sum": 2}));
    }
}
