/// Collaborator interface to the remote key-value store
///
/// The driver core never speaks a wire protocol itself. It builds the request
/// types below and hands them to a [`StoreClient`], which owns transport,
/// authentication and retries.

use crate::{canonical_number, Item, Key, KeySchema, KeyValue, Result, Value};
use serde::{Deserialize, Serialize};

/// Provisioned throughput for a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throughput {
    pub read_capacity_units: u64,
    pub write_capacity_units: u64,
}

/// Billing mode chosen at table creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingMode {
    /// No throughput hints given
    PayPerRequest,
    Provisioned(Throughput),
}

/// Table creation request
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableRequest {
    pub table: String,
    pub key_schema: KeySchema,
    pub billing_mode: BillingMode,
}

/// Table metadata as reported by the store
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescription {
    pub table: String,
    pub key_schema: KeySchema,
    pub billing_mode: BillingMode,
    pub item_count: u64,
}

/// Equality filter applied by the store to query/scan results
pub type Filter = Vec<(String, Value)>;

/// Attribute equality as the store evaluates it: numbers compare by value
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::N(x), Value::N(y)) => {
            let x = canonical_number(x);
            x.is_some() && x == canonical_number(y)
        }
        _ => a == b,
    }
}

/// True when every filter attribute is present on `item` with an equal value
pub fn matches_filter(item: &Item, filter: &[(String, Value)]) -> bool {
    filter
        .iter()
        .all(|(name, expected)| item.get(name).is_some_and(|v| values_equal(v, expected)))
}

/// Point read by full primary key
#[derive(Debug, Clone, PartialEq)]
pub struct GetItemRequest {
    pub table: String,
    pub key: Key,
}

/// Read of one partition, ordered by sort key
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table: String,
    pub partition_key: KeyValue,
    pub filter: Filter,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Key>,
}

/// Full table scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub table: String,
    pub filter: Filter,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Key>,
}

/// One page of query or scan results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    /// Present when more items may follow
    pub last_evaluated_key: Option<Key>,
}

/// Condition a write must satisfy against the item's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// The item must not exist yet (insert semantics)
    ItemNotExists,
    /// The item must already exist (update/delete of a known row)
    ItemExists,
}

impl WriteCondition {
    pub fn holds(&self, current: Option<&Item>) -> bool {
        match self {
            WriteCondition::ItemNotExists => current.is_none(),
            WriteCondition::ItemExists => current.is_some(),
        }
    }
}

/// A fully bound single-item write, ready to submit
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    Put {
        table: String,
        key: Key,
        item: Item,
        condition: Option<WriteCondition>,
    },
    Update {
        table: String,
        key: Key,
        /// SET assignments in statement order
        set: Vec<(String, Value)>,
        condition: Option<WriteCondition>,
    },
    Delete {
        table: String,
        key: Key,
        condition: Option<WriteCondition>,
    },
}

impl WriteOperation {
    pub fn table(&self) -> &str {
        match self {
            Self::Put { table, .. } | Self::Update { table, .. } | Self::Delete { table, .. } => {
                table
            }
        }
    }

    pub fn key(&self) -> &Key {
        match self {
            Self::Put { key, .. } | Self::Update { key, .. } | Self::Delete { key, .. } => key,
        }
    }

    pub fn condition(&self) -> Option<WriteCondition> {
        match self {
            Self::Put { condition, .. }
            | Self::Update { condition, .. }
            | Self::Delete { condition, .. } => *condition,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Blocking request/response client for the store.
///
/// Implementations report remote rejections as [`crate::Error::Store`] with
/// the store's code, and deadline expiry or cancellation as
/// [`crate::Error::Cancelled`]. None of the methods retry on behalf of the
/// driver.
pub trait StoreClient: Send + Sync {
    fn create_table(&self, request: CreateTableRequest) -> Result<()>;

    fn delete_table(&self, table: &str) -> Result<()>;

    /// Returns `RESOURCE_NOT_FOUND` for an unknown table
    fn describe_table(&self, table: &str) -> Result<TableDescription>;

    fn list_tables(&self) -> Result<Vec<String>>;

    fn put_item(&self, op: WriteOperation) -> Result<()>;

    fn update_item(&self, op: WriteOperation) -> Result<()>;

    fn delete_item(&self, op: WriteOperation) -> Result<()>;

    fn get_item(&self, request: GetItemRequest) -> Result<Option<Item>>;

    fn query(&self, request: QueryRequest) -> Result<Page>;

    fn scan(&self, request: ScanRequest) -> Result<Page>;

    /// Applies every operation or none of them
    fn transact_write(&self, ops: Vec<WriteOperation>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_condition_holds() {
        let item = Item::new();
        assert!(WriteCondition::ItemNotExists.holds(None));
        assert!(!WriteCondition::ItemNotExists.holds(Some(&item)));
        assert!(WriteCondition::ItemExists.holds(Some(&item)));
        assert!(!WriteCondition::ItemExists.holds(None));
    }

    #[test]
    fn test_matches_filter() {
        let mut item = Item::new();
        item.insert("n".into(), Value::N("1.50".into()));
        item.insert("s".into(), Value::S("x".into()));

        assert!(matches_filter(&item, &[]));
        assert!(matches_filter(&item, &[("n".into(), Value::N("1.5".into()))]));
        assert!(matches_filter(&item, &[("n".into(), Value::N("15e-1".into()))]));
        assert!(!matches_filter(&item, &[("s".into(), Value::S("y".into()))]));
        assert!(!matches_filter(&item, &[("missing".into(), Value::Null)]));
    }

    #[test]
    fn test_write_operation_accessors() {
        let key = Key::new(KeyValue::S("1".into()));
        let op = WriteOperation::Delete {
            table: "t".into(),
            key: key.clone(),
            condition: Some(WriteCondition::ItemExists),
        };
        assert_eq!(op.table(), "t");
        assert_eq!(op.key(), &key);
        assert_eq!(op.kind(), "delete");
        assert_eq!(op.condition(), Some(WriteCondition::ItemExists));
    }
}
