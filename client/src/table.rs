//! Live table store unit.
//!
//! A [`LiveTable`] ties one entity type's [`LiveList`] and
//! [`QueryController`] to the gateway and the realtime channel. It is owned
//! by a single task and every mutation goes through `&mut self`.
//!
//! User-facing outcomes are queued as [`Notice`]s for the UI to drain.

use chrono::{DateTime, Utc};
use stockroom_engine::{
    posting_batch, BulkPosting, ChangeNotification, CommitOutcome, EditCell, EntityKind,
    FailurePolicy, FetchRequest, Fields, FilterState, LiveList, PartialUpdate, QueryController,
    ReconcileSummary, Record, RecordId, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE_MS,
};

use crate::config::Config;
use crate::error::Result;
use crate::gateway::{Gateway, ListPage};
use crate::notice::Notice;
use crate::realtime::Subscription;

/// Shown when a commit leaves the record unchanged.
pub const NO_CHANGES_MESSAGE: &str = "No changes made";

/// Per-table options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    pub kind: EntityKind,
    pub page_size: usize,
    /// Tag partition the table is scoped to
    pub tag: Option<String>,
    pub failure_policy: FailurePolicy,
    pub search_debounce_ms: u64,
    /// Filters the table opens with
    pub filters: FilterState,
}

impl TableOptions {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            page_size: DEFAULT_PAGE_SIZE,
            tag: None,
            failure_policy: FailurePolicy::default(),
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            filters: FilterState::default(),
        }
    }

    /// Page size and debounce from configuration.
    pub fn from_config(kind: EntityKind, config: &Config) -> Self {
        Self::new(kind)
            .with_page_size(config.page_size)
            .with_debounce(config.search_debounce_ms)
    }

    /// Report views open on the calendar month containing `now`.
    pub fn report(kind: EntityKind, now: DateTime<Utc>) -> Self {
        Self::new(kind).with_filters(FilterState::current_month(now))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Scope the table to one tag. Only live creates carrying it are shown,
    /// and every list call is filtered by it.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_debounce(mut self, debounce_ms: u64) -> Self {
        self.search_debounce_ms = debounce_ms;
        self
    }

    pub fn with_filters(mut self, filters: FilterState) -> Self {
        self.filters = filters;
        self
    }
}

/// One table kept live against the server.
#[derive(Debug)]
pub struct LiveTable {
    options: TableOptions,
    gateway: Gateway,
    list: LiveList,
    query: QueryController,
    subscription: Option<Subscription>,
    notices: Vec<Notice>,
}

impl LiveTable {
    pub fn new(gateway: Gateway, options: TableOptions) -> Self {
        let query = QueryController::new(options.page_size)
            .with_debounce(options.search_debounce_ms)
            .with_filters(options.filters.clone())
            .with_partition(options.tag.clone());
        let list = LiveList::new(options.kind, options.page_size)
            .with_scope(query.scope(options.tag.as_deref()));

        Self {
            options,
            gateway,
            list,
            query,
            subscription: None,
            notices: Vec::new(),
        }
    }

    /// Start receiving realtime notifications for this table's entity type.
    pub fn attach(&mut self, subscription: Subscription) {
        if subscription.target() != self.options.kind {
            tracing::warn!(
                entity = %self.options.kind,
                subscribed = %subscription.target(),
                "Subscription target does not match table"
            );
        }
        self.subscription = Some(subscription);
    }

    /// Stop receiving notifications.
    pub fn detach(&mut self) {
        self.subscription = None;
    }

    pub fn kind(&self) -> EntityKind {
        self.options.kind
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    pub fn list(&self) -> &LiveList {
        &self.list
    }

    pub fn records(&self) -> &[Record] {
        self.list.records()
    }

    pub fn count(&self) -> u64 {
        self.list.count()
    }

    pub fn query(&self) -> &QueryController {
        &self.query
    }

    pub fn is_loading(&self) -> bool {
        self.query.is_loading()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Take every queued notice.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------

    /// Fetch the current page again.
    pub async fn refresh(&mut self) -> Result<()> {
        let request = self.query.refresh();
        self.fetch(request).await
    }

    pub async fn set_page(&mut self, page: u32) -> Result<()> {
        let request = self.query.set_page(page)?;
        self.fetch(request).await
    }

    pub async fn set_filters(&mut self, filters: FilterState) -> Result<()> {
        let request = self.query.set_filters(filters);
        self.fetch(request).await
    }

    pub async fn set_date_range(&mut self, from: Option<i64>, to: Option<i64>) -> Result<()> {
        let request = self.query.set_date_range(from, to);
        self.fetch(request).await
    }

    /// Record a keystroke in the search box. Returns when to call
    /// [`poll_search`](Self::poll_search).
    pub fn type_search(&mut self, text: impl Into<String>, now_ms: u64) -> u64 {
        self.query.type_search(text, now_ms)
    }

    /// Run the debounced search if it is due. Returns whether a fetch ran.
    pub async fn poll_search(&mut self, now_ms: u64) -> Result<bool> {
        match self.query.poll_search(now_ms) {
            Some(request) => self.fetch(request).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Filters encoded for the page URL.
    pub fn filters_query_string(&self) -> Result<String> {
        Ok(self.query.filters().to_query_string()?)
    }

    /// Restore filters from a page URL and fetch.
    pub async fn restore_filters(&mut self, query_string: &str) -> Result<()> {
        let filters = FilterState::from_query_string(query_string)?;
        self.set_filters(filters).await
    }

    /// Run a fetch issued by the query controller and apply its result.
    pub async fn fetch(&mut self, request: FetchRequest) -> Result<()> {
        let outcome = self.gateway.list(self.options.kind, &request.query).await;
        self.finish_fetch(request.seq, outcome)
    }

    /// Apply the result of fetch `seq`. Stale results are discarded.
    ///
    /// A failed fetch leaves the table empty and queues an error notice.
    pub fn finish_fetch(&mut self, seq: u64, outcome: Result<ListPage>) -> Result<()> {
        let ok = outcome.is_ok();
        if !self.query.complete(seq, ok) {
            tracing::debug!(entity = %self.options.kind, seq = seq, "Discarding stale page");
            return Ok(());
        }

        self.list
            .set_scope(self.query.scope(self.options.tag.as_deref()));

        match outcome {
            Ok(page) => {
                tracing::info!(
                    entity = %self.options.kind,
                    page = self.query.page(),
                    rows = page.result.len(),
                    count = page.count,
                    "Page loaded"
                );
                self.list.replace_page(page.result, page.count);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(entity = %self.options.kind, "Fetch failed: {}", e);
                self.list.replace_page(Vec::new(), 0);
                self.notices.push(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Realtime
    // ------------------------------------------------------------------

    /// Apply every notification already queued. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let Some(notification) = self.subscription.as_mut().and_then(Subscription::try_recv)
            else {
                break;
            };
            self.apply_notification(&notification);
            applied += 1;
        }
        applied
    }

    /// Wait for the next notification and apply it. `None` once the channel
    /// has closed or no subscription is attached.
    pub async fn next_change(&mut self) -> Option<ReconcileSummary> {
        let notification = self.subscription.as_mut()?.recv().await?;
        Some(self.apply_notification(&notification))
    }

    pub fn apply_notification(&mut self, notification: &ChangeNotification) -> ReconcileSummary {
        let summary = self.list.apply(notification);
        tracing::debug!(
            entity = %self.options.kind,
            action = ?notification.action,
            inserted = summary.inserted,
            merged = summary.merged,
            removed = summary.removed,
            evicted = summary.evicted,
            ignored = summary.ignored,
            "Applied notification"
        );
        summary
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Commit an inline cell edit: merge locally, then send the diff.
    ///
    /// An unchanged value sends nothing and queues an error notice.
    pub async fn commit_cell(&mut self, cell: &mut EditCell) -> Result<CommitOutcome> {
        let outcome = match cell.commit(&mut self.list) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.notices.push(Notice::error(e.to_string()));
                return Err(e.into());
            }
        };

        match &outcome {
            CommitOutcome::Unchanged => self.notices.push(Notice::error(NO_CHANGES_MESSAGE)),
            CommitOutcome::Changed(update) => self.send_update(update.clone()).await?,
        }
        Ok(outcome)
    }

    /// Edit several fields of one row, as a modal form does.
    ///
    /// Returns the update that was sent, or `None` when nothing changed.
    pub async fn edit_record(
        &mut self,
        id: &RecordId,
        patch: &Fields,
    ) -> Result<Option<PartialUpdate>> {
        match self.list.apply_local_edit(id, patch)? {
            Some(update) => {
                self.send_update(update.clone()).await?;
                Ok(Some(update))
            }
            None => {
                self.notices.push(Notice::error(NO_CHANGES_MESSAGE));
                Ok(None)
            }
        }
    }

    async fn send_update(&mut self, update: PartialUpdate) -> Result<()> {
        let kind = self.options.kind;
        match self
            .gateway
            .update(kind, std::slice::from_ref(&update))
            .await
        {
            Ok(()) => {
                self.list.confirm_write(&update.id);
                self.notices.push(Notice::success("Saved"));
                Ok(())
            }
            Err(e) => {
                let state = self
                    .list
                    .fail_write(&update.id, self.options.failure_policy);
                tracing::warn!(
                    entity = %kind,
                    id = %update.id,
                    state = ?state,
                    "Update failed: {}",
                    e
                );
                self.notices.push(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Create records. They appear on the page when the server's create
    /// notification arrives.
    pub async fn create(&mut self, payload: Vec<Fields>) -> Result<Vec<Record>> {
        match self.gateway.create(self.options.kind, &payload).await {
            Ok(created) => {
                self.notices.push(Notice::success("Created"));
                Ok(created)
            }
            Err(e) => {
                self.notices.push(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Delete records on the server, then drop them from the page.
    pub async fn delete(&mut self, ids: &[RecordId]) -> Result<()> {
        match self.gateway.remove(self.options.kind, ids).await {
            Ok(()) => {
                let removed = self.list.remove_local(ids);
                tracing::debug!(entity = %self.options.kind, removed = removed.len(), "Deleted");
                self.notices.push(Notice::success("Deleted"));
                Ok(())
            }
            Err(e) => {
                self.notices.push(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Bulk "find and process": mark every record matching the current
    /// filters as posted, in one batched update.
    ///
    /// Best-effort and not transactional. Queues exactly one completion
    /// notice either way.
    pub async fn find_and_process(&mut self) -> Result<BulkPosting> {
        match self.run_bulk_posting().await {
            Ok(outcome) => {
                tracing::info!(
                    entity = %self.options.kind,
                    matched = outcome.matched,
                    "Bulk posting finished"
                );
                let notice = if outcome.matched == 0 {
                    Notice::info(outcome.message())
                } else {
                    Notice::success(outcome.message())
                };
                self.notices.push(notice);
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(entity = %self.options.kind, "Bulk posting failed: {}", e);
                self.notices.push(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_bulk_posting(&self) -> Result<BulkPosting> {
        let kind = self.options.kind;
        let matched = self.gateway.list(kind, &self.query.bulk_query()).await?;
        let batch = posting_batch(&matched.result);
        if !batch.is_empty() {
            self.gateway.update(kind, &batch).await?;
        }
        Ok(BulkPosting {
            matched: batch.len(),
        })
    }
}
