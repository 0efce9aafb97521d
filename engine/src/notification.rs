//! Change notifications pushed over the realtime channel.
//!
//! Frames are JSON objects `{ "target": ..., "action": ..., "result": ... }`
//! where `result` is a single object or an array of them.

use crate::{error::Result, Error, Record, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Entity types served by the backend. The string form is both the realtime
/// `target` and the REST resource path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organizations,
    Warehouses,
    Nomenclature,
    DocsWarehouse,
    DocsPurchases,
    DocsSales,
    Contracts,
    Contragents,
    Categories,
    Manufacturers,
    Units,
    Prices,
    Pictures,
    LoyalityTransactions,
    LoyalityReport,
}

impl EntityKind {
    pub const ALL: [EntityKind; 15] = [
        EntityKind::Organizations,
        EntityKind::Warehouses,
        EntityKind::Nomenclature,
        EntityKind::DocsWarehouse,
        EntityKind::DocsPurchases,
        EntityKind::DocsSales,
        EntityKind::Contracts,
        EntityKind::Contragents,
        EntityKind::Categories,
        EntityKind::Manufacturers,
        EntityKind::Units,
        EntityKind::Prices,
        EntityKind::Pictures,
        EntityKind::LoyalityTransactions,
        EntityKind::LoyalityReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Organizations => "organizations",
            EntityKind::Warehouses => "warehouses",
            EntityKind::Nomenclature => "nomenclature",
            EntityKind::DocsWarehouse => "docs_warehouse",
            EntityKind::DocsPurchases => "docs_purchases",
            EntityKind::DocsSales => "docs_sales",
            EntityKind::Contracts => "contracts",
            EntityKind::Contragents => "contragents",
            EntityKind::Categories => "categories",
            EntityKind::Manufacturers => "manufacturers",
            EntityKind::Units => "units",
            EntityKind::Prices => "prices",
            EntityKind::Pictures => "pictures",
            EntityKind::LoyalityTransactions => "loyality_transactions",
            EntityKind::LoyalityReport => "loyality_report",
        }
    }

    /// Resource path used for reads.
    pub fn path(&self) -> &'static str {
        self.as_str()
    }

    /// Resource path used for creates and batch updates.
    ///
    /// Warehouse documents are patched through the alternative endpoint, which
    /// recalculates stock movements.
    pub fn write_path(&self) -> &'static str {
        match self {
            EntityKind::DocsWarehouse => "alt_docs_warehouse",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::MalformedFrame(format!("unknown target: {}", s)))
    }
}

/// What happened to the records in a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Edit,
    Delete,
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Action::Create),
            "edit" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            other => Err(Error::MalformedFrame(format!("unknown action: {}", other))),
        }
    }
}

/// A server-pushed change to one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub target: EntityKind,
    pub action: Action,
    /// Records (create/edit) or ids / id-carrying objects (delete).
    pub result: Vec<Value>,
}

impl ChangeNotification {
    pub fn new(target: EntityKind, action: Action, result: Vec<Value>) -> Self {
        Self {
            target,
            action,
            result,
        }
    }

    /// Parse a decoded frame. A single-object `result` is treated as a
    /// one-element batch; a missing or null `result` is an empty batch.
    pub fn from_frame(frame: &Value) -> Result<Self> {
        let obj = frame
            .as_object()
            .ok_or_else(|| Error::MalformedFrame("frame must be an object".into()))?;

        let target = obj
            .get("target")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedFrame("missing target".into()))?
            .parse()?;

        let action = obj
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedFrame("missing action".into()))?
            .parse()?;

        let result = match obj.get("result") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(single) => vec![single.clone()],
        };

        Ok(Self::new(target, action, result))
    }

    /// Parse a raw text frame.
    pub fn parse(text: &str) -> Result<Self> {
        let frame: Value = serde_json::from_str(text)
            .map_err(|e| Error::MalformedFrame(format!("invalid json: {}", e)))?;
        Self::from_frame(&frame)
    }

    /// Records carried by a create or edit notification. Entries without a
    /// usable id are skipped.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.result
            .iter()
            .filter_map(|v| Record::from_value(v.clone()).ok())
    }

    /// Ids referenced by the notification, whatever shape the entries take.
    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.result.iter().filter_map(RecordId::from_reference)
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }
}
