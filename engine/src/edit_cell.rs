//! Inline table cell editing with optimistic commit.
//!
//! ```text
//! Display --begin--> Editing --commit--> Committing --> Display
//!                       |                    (local merge, diff computed)
//!                       +--abandon--> Display
//! ```
//!
//! `Committing` is transient: the local merge happens synchronously and the
//! cell is back in `Display` before any request goes out. The caller ships
//! the returned [`PartialUpdate`] and reports the answer through
//! [`LiveList::confirm_write`] / [`LiveList::fail_write`].

use crate::{error::Result, Error, Fields, LiveList, PartialUpdate, Record, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field that is never editable on transfer documents.
pub const TAX_FIELD: &str = "tax";

/// Field that may be left empty by default.
pub const OPTIONAL_BY_DEFAULT: &str = "amount";

/// Column definition relevant to editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Record field shown in the column
    pub field: String,
    /// Human readable title, used in validation messages
    pub title: String,
    /// Generic editability of the column
    pub editable: bool,
    /// Whether an empty value is rejected
    pub required: bool,
}

impl ColumnSpec {
    /// An editable column. Every field except `amount` is required.
    pub fn editable(field: impl Into<String>, title: impl Into<String>) -> Self {
        let field = field.into();
        let required = field != OPTIONAL_BY_DEFAULT;
        Self {
            field,
            title: title.into(),
            editable: true,
            required,
        }
    }

    pub fn read_only(field: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            title: title.into(),
            editable: false,
            required: false,
        }
    }

    /// Builder-style override of the required rule.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Whether this column can be edited on `record`.
    ///
    /// Transfer documents never expose the tax field, whatever the column says.
    pub fn is_editable_for(&self, record: &Record) -> bool {
        self.editable && !(record.is_transfer() && self.field == TAX_FIELD)
    }

    fn validate(&self, value: &Value) -> Result<()> {
        if !self.required {
            return Ok(());
        }
        let empty = match value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        };
        if empty {
            return Err(Error::Validation {
                field: self.field.clone(),
                message: format!("{} is required", self.title),
            });
        }
        Ok(())
    }
}

/// Cell state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellState {
    /// Showing the stored value
    #[default]
    Display,
    /// An inline editor is open with a draft value
    Editing { draft: Value },
    /// Local merge in progress; never observable between calls
    Committing,
}

/// Result of committing a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The value did not change; nothing to send
    Unchanged,
    /// The record was updated locally; send this to the server
    Changed(PartialUpdate),
}

/// Editing state of one field of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct EditCell {
    record_id: RecordId,
    column: ColumnSpec,
    state: CellState,
}

impl EditCell {
    pub fn new(record_id: RecordId, column: ColumnSpec) -> Self {
        Self {
            record_id,
            column,
            state: CellState::Display,
        }
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    pub fn column(&self) -> &ColumnSpec {
        &self.column
    }

    pub fn state(&self) -> &CellState {
        &self.state
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, CellState::Editing { .. })
    }

    /// Current draft while editing.
    pub fn draft(&self) -> Option<&Value> {
        match &self.state {
            CellState::Editing { draft } => Some(draft),
            _ => None,
        }
    }

    /// Open the inline editor, seeded with the record's current value.
    pub fn begin(&mut self, record: &Record) -> Result<()> {
        if !self.column.is_editable_for(record) {
            return Err(Error::NotEditable(self.column.field.clone()));
        }
        let draft = record.get(&self.column.field).cloned().unwrap_or(Value::Null);
        self.state = CellState::Editing { draft };
        Ok(())
    }

    /// Replace the draft value.
    pub fn input(&mut self, value: Value) -> Result<()> {
        match &mut self.state {
            CellState::Editing { draft } => {
                *draft = value;
                Ok(())
            }
            _ => Err(Error::NotEditing),
        }
    }

    /// Close the editor without committing.
    pub fn abandon(&mut self) {
        self.state = CellState::Display;
    }

    /// Enter or blur: validate, merge into `list`, and return what to send.
    ///
    /// A validation failure keeps the editor open.
    pub fn commit(&mut self, list: &mut LiveList) -> Result<CommitOutcome> {
        let draft = match &self.state {
            CellState::Editing { draft } => draft.clone(),
            _ => return Err(Error::NotEditing),
        };
        self.column.validate(&draft)?;

        self.state = CellState::Committing;
        let mut patch = Fields::new();
        patch.insert(self.column.field.clone(), draft);
        let outcome = list.apply_local_edit(&self.record_id, &patch);
        self.state = CellState::Display;

        Ok(match outcome? {
            Some(update) => CommitOutcome::Changed(update),
            None => CommitOutcome::Unchanged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityKind, RowSync};
    use serde_json::json;

    fn list_with(records: Vec<Value>) -> LiveList {
        let mut list = LiveList::new(EntityKind::DocsPurchases, 10);
        let records = records
            .into_iter()
            .map(|v| Record::from_value(v).unwrap())
            .collect::<Vec<_>>();
        let count = records.len() as u64;
        list.replace_page(records, count);
        list
    }

    #[test]
    fn commit_sends_only_changed_field() {
        let mut list = list_with(vec![json!({"id": 1, "comment": "old", "sum": 5})]);
        let mut cell = EditCell::new(RecordId::Int(1), ColumnSpec::editable("comment", "Comment"));

        cell.begin(list.get(&RecordId::Int(1)).unwrap()).unwrap();
        assert_eq!(cell.draft(), Some(&json!("old")));
        cell.input(json!("new")).unwrap();

        let outcome = cell.commit(&mut list).unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Changed(PartialUpdate::new(RecordId::Int(1)).with("comment", json!("new")))
        );
        assert_eq!(cell.state(), &CellState::Display);
        assert_eq!(list.row_sync(&RecordId::Int(1)), RowSync::Pending);
    }

    #[test]
    fn commit_same_value_is_unchanged() {
        let mut list = list_with(vec![json!({"id": 1, "comment": "same"})]);
        let mut cell = EditCell::new(RecordId::Int(1), ColumnSpec::editable("comment", "Comment"));

        cell.begin(list.get(&RecordId::Int(1)).unwrap()).unwrap();
        assert_eq!(cell.commit(&mut list).unwrap(), CommitOutcome::Unchanged);
        assert_eq!(list.row_sync(&RecordId::Int(1)), RowSync::Synced);
    }

    #[test]
    fn required_field_rejects_empty_and_stays_open() {
        let mut list = list_with(vec![json!({"id": 1, "number": "7"})]);
        let mut cell = EditCell::new(RecordId::Int(1), ColumnSpec::editable("number", "Number"));

        cell.begin(list.get(&RecordId::Int(1)).unwrap()).unwrap();
        cell.input(json!("  ")).unwrap();

        let err = cell.commit(&mut list).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "number"));
        assert!(cell.is_editing());
        assert_eq!(list.get(&RecordId::Int(1)).unwrap().get("number"), Some(&json!("7")));
    }

    #[test]
    fn amount_is_optional_by_default() {
        let mut list = list_with(vec![json!({"id": 1, "amount": 3})]);
        let mut cell = EditCell::new(RecordId::Int(1), ColumnSpec::editable("amount", "Amount"));

        cell.begin(list.get(&RecordId::Int(1)).unwrap()).unwrap();
        cell.input(Value::Null).unwrap();
        assert!(matches!(cell.commit(&mut list), Ok(CommitOutcome::Changed(_))));
    }

    #[test]
    fn tax_is_locked_on_transfers() {
        let transfer = Record::from_value(json!({"id": 1, "type": "transfer", "tax": 0})).unwrap();
        let incoming = Record::from_value(json!({"id": 2, "type": "incoming", "tax": 0})).unwrap();
        let tax = ColumnSpec::editable("tax", "Tax");
        let amount = ColumnSpec::editable("amount", "Amount");

        assert!(!tax.is_editable_for(&transfer));
        assert!(tax.is_editable_for(&incoming));
        assert!(amount.is_editable_for(&transfer));

        let mut cell = EditCell::new(RecordId::Int(1), tax);
        assert_eq!(cell.begin(&transfer), Err(Error::NotEditable("tax".into())));
        assert_eq!(cell.state(), &CellState::Display);
    }

    #[test]
    fn read_only_column_cannot_begin() {
        let record = Record::from_value(json!({"id": 1, "number": "1"})).unwrap();
        let mut cell = EditCell::new(RecordId::Int(1), ColumnSpec::read_only("number", "Number"));
        assert!(cell.begin(&record).is_err());
    }

    #[test]
    fn abandon_discards_draft() {
        let mut list = list_with(vec![json!({"id": 1, "comment": "keep"})]);
        let mut cell = EditCell::new(RecordId::Int(1), ColumnSpec::editable("comment", "Comment"));

        cell.begin(list.get(&RecordId::Int(1)).unwrap()).unwrap();
        cell.input(json!("drop me")).unwrap();
        cell.abandon();

        assert_eq!(cell.commit(&mut list), Err(Error::NotEditing));
        assert_eq!(cell.input(json!("x")), Err(Error::NotEditing));
        assert_eq!(list.get(&RecordId::Int(1)).unwrap().get("comment"), Some(&json!("keep")));
    }
}
