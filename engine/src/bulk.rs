//! Bulk posting ("find and process").
//!
//! Every record matching the current filters is marked posted in one batched
//! update. The batch is best-effort: it is not transactional and individual
//! failures are not tracked.

use crate::{PartialUpdate, Record};

/// One `{id, status: true}` entry per record, in input order.
pub fn posting_batch<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<PartialUpdate> {
    records
        .into_iter()
        .map(|r| PartialUpdate::posting(r.id().clone()))
        .collect()
}

/// Outcome of a bulk posting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkPosting {
    /// Records found and sent in the batch
    pub matched: usize,
}

impl BulkPosting {
    /// Completion message shown once per run.
    pub fn message(&self) -> String {
        if self.matched == 0 {
            "No documents found for the selected period".to_string()
        } else {
            format!("Posted {} documents for the selected period", self.matched)
        }
    }
}
