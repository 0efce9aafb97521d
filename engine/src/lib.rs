//! # Stockroom Engine
//!
//! The deterministic core behind Stockroom's live tables.
//!
//! A table shows one page of a server-side paginated set and stays current
//! while other sessions create, edit and delete records. This crate holds the
//! logic for that, with no knowledge of HTTP, sockets or rendering.
//!
//! ## Design Principles
//!
//! - **No IO**: callers run requests and feed results back in
//! - **Deterministic**: time is passed in explicitly, never read
//! - **Testable**: every state transition is a plain function call
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is a JSON object with a stable, server-assigned [`RecordId`].
//! Partial writes are expressed as [`PartialUpdate`]s carrying only the
//! changed fields.
//!
//! ### Live lists
//!
//! A [`LiveList`] is the page currently on screen plus the server-side total.
//! Realtime [`ChangeNotification`]s are folded into it by the
//! [`reconcile`] rules, which keep ids unique and never grow the page past
//! its size.
//!
//! ### Optimistic edits
//!
//! An [`EditCell`] edits one field of one row. Committing merges locally
//! first and yields the partial update to send; [`PendingWrites`] tracks the
//! row until the server answers.
//!
//! ### Queries
//!
//! A [`QueryController`] owns page and [`FilterState`], issues sequenced
//! [`FetchRequest`]s and rejects stale responses.
//!
//! ## Quick Start
//!
//! ```rust
//! use stockroom_engine::{Action, ChangeNotification, EntityKind, LiveList, Record};
//! use serde_json::json;
//!
//! let mut list = LiveList::new(EntityKind::DocsWarehouse, 35);
//! let page = vec![
//!     Record::from_value(json!({"id": 1, "status": false})).unwrap(),
//!     Record::from_value(json!({"id": 2, "status": false})).unwrap(),
//! ];
//! list.replace_page(page, 2);
//!
//! let frame = r#"{"target": "docs_warehouse", "action": "edit", "result": [{"id": 2, "status": true}]}"#;
//! let notification = ChangeNotification::parse(frame).unwrap();
//! list.apply(&notification);
//!
//! assert_eq!(list.records()[1].status(), Some(true));
//! assert_eq!(list.len(), 2);
//! ```

pub mod bulk;
pub mod collection;
pub mod edit_cell;
pub mod error;
pub mod filter;
pub mod notification;
pub mod pending;
pub mod query;
pub mod reconcile;
pub mod record;

// Re-export main types at crate root
pub use bulk::{posting_batch, BulkPosting};
pub use collection::{LiveList, ViewScope};
pub use edit_cell::{CellState, ColumnSpec, CommitOutcome, EditCell};
pub use error::Error;
pub use filter::FilterState;
pub use notification::{Action, ChangeNotification, EntityKind};
pub use pending::{FailurePolicy, PendingWrites, RowSync};
pub use query::{
    FetchRequest, ListQuery, Phase, QueryController, BULK_FETCH_LIMIT,
    DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE_MS, FETCH_ALL_CHUNK,
};
pub use reconcile::ReconcileSummary;
pub use record::{DocOperation, Fields, PartialUpdate, Record, RecordId};

/// Unix time in seconds.
pub type Timestamp = i64;
