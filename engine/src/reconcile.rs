//! Folding realtime change notifications into a live list.
//!
//! # Rules
//!
//! - `create`: records outside the view's tag are ignored. A record whose id
//!   is already on the page is merged in place. Otherwise the server total is
//!   bumped and, on page 1 of an unfiltered view, the record is prepended; the
//!   last row is evicted once the page is full. Records are processed in the
//!   order they appear in the notification.
//! - `edit`: the matching row is shallow-merged, notification fields winning.
//!   Rows not on this page are left alone.
//! - `delete`: the matching row is removed and the total decremented.
//!
//! Notifications for another entity type are ignored. None of the rules can
//! grow the page past `page_size` or introduce a duplicate id.

use crate::{Action, ChangeNotification, LiveList, Record};
use serde::{Deserialize, Serialize};

/// What a notification did to a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// Records prepended to the page
    pub inserted: usize,
    /// Existing rows merged with notification fields
    pub merged: usize,
    /// Rows removed
    pub removed: usize,
    /// Rows pushed off the end of a full page
    pub evicted: usize,
    /// Entries that did not affect the page
    pub ignored: usize,
}

impl ReconcileSummary {
    /// True when the visible rows did not change.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.merged == 0 && self.removed == 0
    }
}

/// Pure form: return the list that results from applying `notification`.
pub fn apply(list: &LiveList, notification: &ChangeNotification) -> LiveList {
    let mut next = list.clone();
    apply_in_place(&mut next, notification);
    next
}

/// Apply `notification` to `list` and report what changed.
pub fn apply_in_place(list: &mut LiveList, notification: &ChangeNotification) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();

    if notification.target != list.kind() {
        summary.ignored = notification.result.len();
        return summary;
    }

    let mut used = 0;
    match notification.action {
        Action::Create => {
            for record in notification.records() {
                used += 1;
                apply_create(list, record, &mut summary);
            }
        }
        Action::Edit => {
            for record in notification.records() {
                used += 1;
                apply_edit(list, &record, &mut summary);
            }
        }
        Action::Delete => {
            for id in notification.ids() {
                used += 1;
                match list.position(&id) {
                    Some(index) => {
                        list.remove_at(index);
                        list.drop_count();
                        summary.removed += 1;
                    }
                    None => summary.ignored += 1,
                }
            }
        }
    }
    // Entries without a usable id.
    summary.ignored += notification.result.len() - used;

    summary
}

fn apply_create(list: &mut LiveList, record: Record, summary: &mut ReconcileSummary) {
    if !list.scope().admits(&record) {
        summary.ignored += 1;
        return;
    }

    // Our own write echoed back, or a replayed frame.
    if let Some(index) = list.position(record.id()) {
        list.merge_at(index, record.fields());
        summary.merged += 1;
        return;
    }

    if list.scope().filtered {
        summary.ignored += 1;
        return;
    }

    list.bump_count();
    if !list.scope().shows_live_inserts() {
        summary.ignored += 1;
        return;
    }

    if list.prepend(record).is_some() {
        summary.evicted += 1;
    }
    summary.inserted += 1;
}

fn apply_edit(list: &mut LiveList, record: &Record, summary: &mut ReconcileSummary) {
    match list.position(record.id()) {
        Some(index) => {
            list.merge_at(index, record.fields());
            summary.merged += 1;
        }
        None => summary.ignored += 1,
    }
}

impl LiveList {
    /// Apply a change notification in place.
    pub fn apply(&mut self, notification: &ChangeNotification) -> ReconcileSummary {
        apply_in_place(self, notification)
    }
}
