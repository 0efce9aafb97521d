//! Paginated query controller.
//!
//! Tracks page, page size and filters, and turns every state change into a
//! [`FetchRequest`]. The controller never performs IO: the caller runs the
//! request and reports back with [`QueryController::complete`].
//!
//! Each request carries a sequence number and only the latest one is
//! accepted, so a slow response for an old page cannot overwrite a newer one.
//! Text search is debounced against caller-supplied millisecond clocks;
//! page and date-range changes fetch immediately.

use crate::{error::Result, Error, FilterState, ViewScope};
use serde::{Deserialize, Serialize};

/// Page size of document tables.
pub const DEFAULT_PAGE_SIZE: usize = 35;

/// Upper bound of records fetched for a bulk action.
pub const BULK_FETCH_LIMIT: u64 = 100_000;

/// Chunk size when pulling a whole resource.
pub const FETCH_ALL_CHUNK: u64 = 500;

/// Default quiet period before a typed search is sent.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;

/// One list call: window plus filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub offset: u64,
    pub limit: u64,
    pub filters: FilterState,
}

impl ListQuery {
    pub fn new(offset: u64, limit: u64, filters: FilterState) -> Self {
        Self {
            offset,
            limit,
            filters,
        }
    }

    /// Query parameters without the credential.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("offset".to_string(), self.offset.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        params.extend(self.filters.to_params());
        params
    }
}

/// A list call issued by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub seq: u64,
    pub query: ListQuery,
}

/// Loading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading {
        seq: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSearch {
    text: String,
    due_at_ms: u64,
}

/// Page, filters and request sequencing of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryController {
    page: u32,
    page_size: usize,
    filters: FilterState,
    partition: Option<String>,
    phase: Phase,
    last_seq: u64,
    debounce_ms: u64,
    pending_search: Option<PendingSearch>,
    last_failed: bool,
}

impl QueryController {
    /// A zero page size is treated as one.
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            filters: FilterState::default(),
            partition: None,
            phase: Phase::Idle,
            last_seq: 0,
            debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            pending_search: None,
            last_failed: false,
        }
    }

    /// Builder-style method to set the search debounce.
    pub fn with_debounce(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    /// Builder-style method to start from given filters.
    pub fn with_filters(mut self, filters: FilterState) -> Self {
        self.filters = filters;
        self
    }

    /// Pin every list call to one tag partition. User filters never clear it.
    pub fn with_partition(mut self, tag: Option<String>) -> Self {
        self.partition = tag;
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// User-chosen filters, without the partition tag.
    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    /// Filters sent with list calls: the user's, with the partition tag
    /// taking the place of any tag filter.
    pub fn effective_filters(&self) -> FilterState {
        match &self.partition {
            Some(tag) => self.filters.clone().with_tags([tag.as_str()]),
            None => self.filters.clone(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading { .. })
    }

    /// Whether the last completed fetch failed.
    pub fn last_failed(&self) -> bool {
        self.last_failed
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * self.page_size as u64
    }

    pub fn limit(&self) -> u64 {
        self.page_size as u64
    }

    /// View scope for live inserts, given the table's tag partition.
    pub fn scope(&self, tag: Option<&str>) -> ViewScope {
        ViewScope {
            page: self.page,
            tag: tag.map(str::to_string),
            filtered: self.filters.narrows(),
        }
    }

    /// Number of pages needed for `count` records.
    pub fn page_count(&self, count: u64) -> u64 {
        count.div_ceil(self.page_size as u64)
    }

    /// Fetch the current page again.
    pub fn refresh(&mut self) -> FetchRequest {
        self.issue()
    }

    /// Go to `page` (1-based).
    pub fn set_page(&mut self, page: u32) -> Result<FetchRequest> {
        if page == 0 {
            return Err(Error::InvalidPage(page));
        }
        self.page = page;
        Ok(self.issue())
    }

    /// Replace all filters. Resets to page 1 and fetches immediately.
    pub fn set_filters(&mut self, filters: FilterState) -> FetchRequest {
        self.filters = filters;
        self.pending_search = None;
        self.page = 1;
        self.issue()
    }

    /// Change the date range. Not debounced.
    pub fn set_date_range(&mut self, from: Option<i64>, to: Option<i64>) -> FetchRequest {
        let mut filters = self.filters.clone();
        filters.date_from = from;
        filters.date_to = to;
        self.page = 1;
        self.filters = filters;
        self.issue()
    }

    /// Change the tag filter. Not debounced.
    pub fn set_tags<I, S>(&mut self, tags: I) -> FetchRequest
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filters = self.filters.clone().with_tags(tags);
        self.page = 1;
        self.issue()
    }

    /// Record a keystroke in the search box. Returns when the search is due.
    pub fn type_search(&mut self, text: impl Into<String>, now_ms: u64) -> u64 {
        let due_at_ms = now_ms.saturating_add(self.debounce_ms);
        self.pending_search = Some(PendingSearch {
            text: text.into(),
            due_at_ms,
        });
        due_at_ms
    }

    /// Fire the debounced search once its quiet period has passed.
    pub fn poll_search(&mut self, now_ms: u64) -> Option<FetchRequest> {
        match &self.pending_search {
            Some(pending) if now_ms >= pending.due_at_ms => {
                let text = pending.text.clone();
                self.pending_search = None;
                self.filters = self.filters.clone().with_search(text);
                self.page = 1;
                Some(self.issue())
            }
            _ => None,
        }
    }

    /// Whether a typed search is waiting for its quiet period.
    pub fn search_pending(&self) -> bool {
        self.pending_search.is_some()
    }

    /// Report the outcome of request `seq`.
    ///
    /// Returns `false` for a stale response, which the caller must discard.
    pub fn complete(&mut self, seq: u64, ok: bool) -> bool {
        if seq != self.last_seq {
            return false;
        }
        self.phase = Phase::Idle;
        self.last_failed = !ok;
        true
    }

    /// Query for a bulk action: every matching record, ignoring pagination.
    pub fn bulk_query(&self) -> ListQuery {
        ListQuery::new(0, BULK_FETCH_LIMIT, self.effective_filters())
    }

    fn issue(&mut self) -> FetchRequest {
        self.last_seq += 1;
        self.phase = Phase::Loading { seq: self.last_seq };
        FetchRequest {
            seq: self.last_seq,
            query: ListQuery::new(self.offset(), self.limit(), self.effective_filters()),
        }
    }
}

/// Offsets of the follow-up chunks needed after a first chunk at offset 0
/// reported `count` records in total.
pub fn remaining_chunk_offsets(count: u64, chunk: u64) -> Vec<u64> {
    if chunk == 0 {
        return Vec::new();
    }
    (1..count.div_ceil(chunk)).map(|i| i * chunk).collect()
}
