//! Record types for entity rows held by a table.
//!
//! A record is a JSON object with a stable, server-assigned `id`. Every other
//! attribute is opaque to the engine except the handful of document fields
//! used by the editability and posting rules.

use crate::{error::Result, Error, Timestamp};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field map of a record.
pub type Fields = Map<String, Value>;

/// Name of the identity field.
pub const ID_FIELD: &str = "id";

/// Opaque record identifier as assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl RecordId {
    /// Read an id from a bare JSON scalar.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) => Some(RecordId::Str(s.clone())),
            _ => None,
        }
    }

    /// Read an id from either a bare scalar or an object carrying `id`.
    ///
    /// Delete notifications are not consistent about which of the two they send.
    pub fn from_reference(value: &Value) -> Option<Self> {
        match value {
            Value::Object(obj) => obj.get(ID_FIELD).and_then(Self::from_value),
            other => Self::from_value(other),
        }
    }

    /// Convert back to the JSON scalar the server expects.
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Str(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Str(value)
    }
}

/// Movement kind of a warehouse document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocOperation {
    /// Increases stock on a warehouse
    Incoming,
    /// Decreases stock on a warehouse
    Outgoing,
    /// Moves stock between two warehouses
    Transfer,
}

impl DocOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocOperation::Incoming => "incoming",
            DocOperation::Outgoing => "outgoing",
            DocOperation::Transfer => "transfer",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "incoming" => Some(DocOperation::Incoming),
            "outgoing" => Some(DocOperation::Outgoing),
            "transfer" => Some(DocOperation::Transfer),
            _ => None,
        }
    }
}

/// A single entity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Fields", into = "Fields")]
pub struct Record {
    id: RecordId,
    fields: Fields,
}

impl Record {
    /// Build a record from a field map. The map must carry a usable `id`.
    pub fn new(fields: Fields) -> Result<Self> {
        let id = fields
            .get(ID_FIELD)
            .ok_or(Error::MissingId)
            .and_then(|v| {
                RecordId::from_value(v)
                    .ok_or_else(|| Error::InvalidRecord(format!("unusable id: {}", v)))
            })?;
        Ok(Self { id, fields })
    }

    /// Build a record from an arbitrary JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::new(fields),
            other => Err(Error::InvalidRecord(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a single field. The identity field cannot be rewritten.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field != ID_FIELD {
            self.fields.insert(field, value);
        }
    }

    /// Remove a field. The identity field cannot be removed.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            return None;
        }
        self.fields.remove(field)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Shallow merge: every field in `patch` overwrites the stored field,
    /// fields absent from `patch` are kept.
    pub fn merge(&mut self, patch: &Fields) {
        for (key, value) in patch {
            if key != ID_FIELD {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    /// Copy of this record with `patch` merged over it.
    pub fn merged(&self, patch: &Fields) -> Self {
        let mut next = self.clone();
        next.merge(patch);
        next
    }

    /// Fields of `next` whose value differs from this record, tagged with the id.
    pub fn diff(&self, next: &Record) -> PartialUpdate {
        let mut update = PartialUpdate::new(self.id.clone());
        for (key, value) in &next.fields {
            if key != ID_FIELD && self.fields.get(key) != Some(value) {
                update.fields.insert(key.clone(), value.clone());
            }
        }
        update
    }

    /// Posted (`true`) or draft (`false`). `None` when the entity has no status.
    pub fn status(&self) -> Option<bool> {
        self.fields.get("status").and_then(Value::as_bool)
    }

    pub fn operation(&self) -> Option<DocOperation> {
        self.fields
            .get("operation")
            .and_then(Value::as_str)
            .and_then(DocOperation::parse)
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    /// Tag partition key the record is scoped to.
    pub fn tags(&self) -> Option<&str> {
        self.fields.get("tags").and_then(Value::as_str)
    }

    /// Whether the record is a transfer between warehouses.
    pub fn is_transfer(&self) -> bool {
        self.doc_type() == Some(DocOperation::Transfer.as_str())
            || self.operation() == Some(DocOperation::Transfer)
    }

    /// Document date (`dated`, unix seconds).
    pub fn dated(&self) -> Option<DateTime<Utc>> {
        let secs = self.fields.get("dated").and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().map(|f| f.trunc() as Timestamp))
        })?;
        Utc.timestamp_opt(secs, 0).single()
    }
}

impl TryFrom<Fields> for Record {
    type Error = Error;

    fn try_from(fields: Fields) -> Result<Self> {
        Record::new(fields)
    }
}

impl From<Record> for Fields {
    fn from(record: Record) -> Self {
        record.fields
    }
}

/// A partial update: the record id plus only the fields that changed.
///
/// Serialises flat, e.g. `{"id": 2, "status": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialUpdate {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Fields,
}

impl PartialUpdate {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: Fields::new(),
        }
    }

    /// Builder-style method to add a changed field.
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        let field = field.into();
        if field != ID_FIELD {
            self.fields.insert(field, value);
        }
        self
    }

    /// Mark a document as posted.
    pub fn posting(id: RecordId) -> Self {
        Self::new(id).with("status", Value::Bool(true))
    }

    /// True when nothing actually changed.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
