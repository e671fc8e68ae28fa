/// In-memory store for testing and embedded use
///
/// Implements [`StoreClient`] with the same semantics the driver expects from a
/// remote store: conditioned single-item writes, paged query/scan, and an
/// all-or-nothing `transact_write`. All data is lost when the last clone is
/// dropped.

use crate::error::store_code;
use crate::store::{
    matches_filter, BillingMode, CreateTableRequest, Filter, GetItemRequest, Page, QueryRequest,
    ScanRequest, StoreClient, TableDescription, WriteOperation,
};
use crate::{Error, Item, Key, KeySchema, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;

/// Most operations accepted in one `transact_write` call
pub const MAX_TRANSACT_ITEMS: usize = 100;

/// Store operations, used for call accounting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateTable,
    DeleteTable,
    DescribeTable,
    ListTables,
    PutItem,
    UpdateItem,
    DeleteItem,
    GetItem,
    Query,
    Scan,
    TransactWrite,
}

impl StoreOp {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StoreOp::PutItem | StoreOp::UpdateItem | StoreOp::DeleteItem | StoreOp::TransactWrite
        )
    }
}

struct MemoryTable {
    key_schema: KeySchema,
    billing_mode: BillingMode,
    items: BTreeMap<Key, Item>,
}

impl MemoryTable {
    fn check_item_key(&self, key: &Key, item: &Item) -> Result<()> {
        match self.key_schema.key_of(item) {
            Some(item_key) if &item_key == key => Ok(()),
            Some(_) => Err(Error::store(
                store_code::VALIDATION,
                "Item key attributes do not match the request key",
            )),
            None => Err(Error::store(
                store_code::VALIDATION,
                "One or more parameter values were invalid: Missing the key attributes in the item",
            )),
        }
    }

    fn check_key_shape(&self, key: &Key) -> Result<()> {
        if key.sk.is_some() != self.key_schema.sort_key.is_some() {
            return Err(Error::store(
                store_code::VALIDATION,
                "The provided key element does not match the schema",
            ));
        }
        Ok(())
    }
}

struct MemoryStoreInner {
    tables: HashMap<String, MemoryTable>,
}

impl MemoryStoreInner {
    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables.get(name).ok_or_else(|| table_not_found(name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable> {
        self.tables.get_mut(name).ok_or_else(|| table_not_found(name))
    }

    /// Validates an operation and evaluates its condition without writing
    fn check(&self, op: &WriteOperation) -> Result<()> {
        let table = self.table(op.table())?;
        table.check_key_shape(op.key())?;
        if let WriteOperation::Put { key, item, .. } = op {
            table.check_item_key(key, item)?;
        }
        if let WriteOperation::Update { set, .. } = op {
            if let Some((name, _)) = set.iter().find(|(n, _)| table.key_schema.is_key_column(n)) {
                return Err(Error::store(
                    store_code::VALIDATION,
                    format!("Cannot update attribute {}. This attribute is part of the key", name),
                ));
            }
        }
        if let Some(condition) = op.condition() {
            if !condition.holds(table.items.get(op.key())) {
                return Err(Error::store(
                    store_code::CONDITIONAL_CHECK_FAILED,
                    format!("The conditional request failed for key {}", op.key()),
                ));
            }
        }
        Ok(())
    }

    /// Applies an already checked operation
    fn apply(&mut self, op: WriteOperation) -> Result<()> {
        match op {
            WriteOperation::Put { table, key, item, .. } => {
                self.table_mut(&table)?.items.insert(key, item);
            }
            WriteOperation::Update { table, key, set, .. } => {
                let table = self.table_mut(&table)?;
                let schema = table.key_schema.clone();
                let item = table.items.entry(key.clone()).or_insert_with(|| {
                    let mut fresh = Item::new();
                    schema.stamp_key(&key, &mut fresh);
                    fresh
                });
                for (name, value) in set {
                    item.insert(name, value);
                }
            }
            WriteOperation::Delete { table, key, .. } => {
                self.table_mut(&table)?.items.remove(&key);
            }
        }
        Ok(())
    }
}

fn table_not_found(name: &str) -> Error {
    Error::store(
        store_code::RESOURCE_NOT_FOUND,
        format!("Requested resource not found: Table: {} not found", name),
    )
}

/// Pages through `items` after `start`, evaluating at most `limit` entries
fn page_of<'a>(
    items: impl Iterator<Item = (&'a Key, &'a Item)>,
    filter: &Filter,
    limit: Option<usize>,
) -> Page {
    let mut page = Page::default();
    let mut items = items.peekable();
    let mut evaluated = 0;

    while let Some((key, item)) = items.next() {
        evaluated += 1;
        if matches_filter(item, filter) {
            page.items.push(item.clone());
        }
        if limit.is_some_and(|l| evaluated >= l) {
            if items.peek().is_some() {
                page.last_evaluated_key = Some(key.clone());
            }
            break;
        }
    }
    page
}

/// In-memory [`StoreClient`]
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
    calls: Arc<Mutex<HashMap<StoreOp, u64>>>,
    failures: Arc<Mutex<HashMap<StoreOp, Error>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryStoreInner {
                tables: HashMap::new(),
            })),
            calls: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Makes the next call of `op` fail with `error` instead of executing
    pub fn fail_next(&self, op: StoreOp, error: Error) {
        self.failures.lock().insert(op, error);
    }

    /// Number of calls received for `op`, including injected failures
    pub fn call_count(&self, op: StoreOp) -> u64 {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Number of calls received for any write operation
    pub fn write_call_count(&self) -> u64 {
        self.calls
            .lock()
            .iter()
            .filter(|(op, _)| op.is_write())
            .map(|(_, n)| n)
            .sum()
    }

    /// Number of items currently stored in `table`
    pub fn item_count(&self, table: &str) -> Result<usize> {
        Ok(self.inner.read().table(table)?.items.len())
    }

    fn enter(&self, op: StoreOp) -> Result<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        match self.failures.lock().remove(&op) {
            Some(err) => {
                debug!(?op, error = %err, "Injected store failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn single_write(&self, op: WriteOperation) -> Result<()> {
        let mut inner = self.inner.write();
        inner.check(&op)?;
        inner.apply(op)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreClient for MemoryStore {
    fn create_table(&self, request: CreateTableRequest) -> Result<()> {
        self.enter(StoreOp::CreateTable)?;
        let mut inner = self.inner.write();
        if inner.tables.contains_key(&request.table) {
            return Err(Error::store(
                store_code::RESOURCE_IN_USE,
                format!("Table already exists: {}", request.table),
            ));
        }
        inner.tables.insert(
            request.table,
            MemoryTable {
                key_schema: request.key_schema,
                billing_mode: request.billing_mode,
                items: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn delete_table(&self, table: &str) -> Result<()> {
        self.enter(StoreOp::DeleteTable)?;
        self.inner
            .write()
            .tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| table_not_found(table))
    }

    fn describe_table(&self, table: &str) -> Result<TableDescription> {
        self.enter(StoreOp::DescribeTable)?;
        let inner = self.inner.read();
        let t = inner.table(table)?;
        Ok(TableDescription {
            table: table.to_string(),
            key_schema: t.key_schema.clone(),
            billing_mode: t.billing_mode,
            item_count: t.items.len() as u64,
        })
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        self.enter(StoreOp::ListTables)?;
        let mut names: Vec<String> = self.inner.read().tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn put_item(&self, op: WriteOperation) -> Result<()> {
        self.enter(StoreOp::PutItem)?;
        self.single_write(op)
    }

    fn update_item(&self, op: WriteOperation) -> Result<()> {
        self.enter(StoreOp::UpdateItem)?;
        self.single_write(op)
    }

    fn delete_item(&self, op: WriteOperation) -> Result<()> {
        self.enter(StoreOp::DeleteItem)?;
        self.single_write(op)
    }

    fn get_item(&self, request: GetItemRequest) -> Result<Option<Item>> {
        self.enter(StoreOp::GetItem)?;
        let inner = self.inner.read();
        let table = inner.table(&request.table)?;
        table.check_key_shape(&request.key)?;
        Ok(table.items.get(&request.key).cloned())
    }

    fn query(&self, request: QueryRequest) -> Result<Page> {
        self.enter(StoreOp::Query)?;
        let inner = self.inner.read();
        let table = inner.table(&request.table)?;
        let pk = request.partition_key;
        let start = match request.exclusive_start_key {
            Some(key) => Bound::Excluded(key),
            None => Bound::Included(Key { pk: pk.clone(), sk: None }),
        };
        let items = table
            .items
            .range((start, Bound::Unbounded))
            .take_while(|(k, _)| k.pk == pk);
        Ok(page_of(items, &request.filter, request.limit))
    }

    fn scan(&self, request: ScanRequest) -> Result<Page> {
        self.enter(StoreOp::Scan)?;
        let inner = self.inner.read();
        let table = inner.table(&request.table)?;
        let start = match request.exclusive_start_key {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let items = table.items.range((start, Bound::Unbounded));
        Ok(page_of(items, &request.filter, request.limit))
    }

    fn transact_write(&self, ops: Vec<WriteOperation>) -> Result<()> {
        self.enter(StoreOp::TransactWrite)?;
        if ops.is_empty() || ops.len() > MAX_TRANSACT_ITEMS {
            return Err(Error::store(
                store_code::VALIDATION,
                format!(
                    "Transaction must contain between 1 and {} operations, got {}",
                    MAX_TRANSACT_ITEMS,
                    ops.len()
                ),
            ));
        }
        {
            let mut seen = HashSet::new();
            for op in &ops {
                if !seen.insert((op.table(), op.key())) {
                    return Err(Error::store(
                        store_code::VALIDATION,
                        "Transaction request cannot include multiple operations on one item",
                    ));
                }
            }
        }

        // Hold the write lock across both phases so the batch is atomic
        let mut inner = self.inner.write();

        // Phase 1: check every operation
        let mut reasons = Vec::with_capacity(ops.len());
        let mut failed = false;
        for op in &ops {
            match inner.check(op) {
                Ok(()) => reasons.push("None"),
                Err(e) if e.is_conditional_check_failed() => {
                    failed = true;
                    reasons.push("ConditionalCheckFailed");
                }
                Err(e) => return Err(e),
            }
        }
        if failed {
            return Err(Error::store(
                store_code::TRANSACTION_CANCELED,
                format!(
                    "Transaction cancelled, please refer cancellation reasons for specific reasons [{}]",
                    reasons.join(", ")
                ),
            ));
        }

        // Phase 2: all checks passed, apply every write
        let count = ops.len();
        for op in ops {
            inner.apply(op)?;
        }
        debug!(count, "Applied transact_write batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WriteCondition;
    use crate::{KeyAttribute, KeyType, KeyValue, Value};

    fn store_with_table(sort_key: bool) -> MemoryStore {
        let store = MemoryStore::new();
        let mut schema = KeySchema::new(KeyAttribute::new("id", KeyType::String));
        if sort_key {
            schema = schema.with_sort_key(KeyAttribute::new("n", KeyType::Number));
        }
        store
            .create_table(CreateTableRequest {
                table: "t".into(),
                key_schema: schema,
                billing_mode: BillingMode::PayPerRequest,
            })
            .unwrap();
        store
    }

    fn key(id: &str) -> Key {
        Key::new(KeyValue::S(id.into()))
    }

    fn put(id: &str, condition: Option<WriteCondition>) -> WriteOperation {
        let mut item = Item::new();
        item.insert("id".into(), Value::string(id));
        WriteOperation::Put {
            table: "t".into(),
            key: key(id),
            item,
            condition,
        }
    }

    #[test]
    fn test_put_get_delete() {
        let store = store_with_table(false);
        store.put_item(put("1", None)).unwrap();

        let got = store
            .get_item(GetItemRequest { table: "t".into(), key: key("1") })
            .unwrap();
        assert!(got.is_some());

        store
            .delete_item(WriteOperation::Delete {
                table: "t".into(),
                key: key("1"),
                condition: None,
            })
            .unwrap();
        assert_eq!(store.item_count("t").unwrap(), 0);
    }

    #[test]
    fn test_put_condition_item_not_exists() {
        let store = store_with_table(false);
        store.put_item(put("1", Some(WriteCondition::ItemNotExists))).unwrap();
        let err = store
            .put_item(put("1", Some(WriteCondition::ItemNotExists)))
            .unwrap_err();
        assert!(err.is_conditional_check_failed());
    }

    #[test]
    fn test_update_creates_without_condition() {
        let store = store_with_table(false);
        store
            .update_item(WriteOperation::Update {
                table: "t".into(),
                key: key("9"),
                set: vec![("x".into(), Value::number(1))],
                condition: None,
            })
            .unwrap();
        let item = store
            .get_item(GetItemRequest { table: "t".into(), key: key("9") })
            .unwrap()
            .unwrap();
        assert_eq!(item.get("id"), Some(&Value::string("9")));
        assert_eq!(item.get("x"), Some(&Value::number(1)));
    }

    #[test]
    fn test_transact_write_is_all_or_nothing() {
        let store = store_with_table(false);
        store.put_item(put("1", None)).unwrap();

        let err = store
            .transact_write(vec![
                put("2", Some(WriteCondition::ItemNotExists)),
                put("1", Some(WriteCondition::ItemNotExists)),
            ])
            .unwrap_err();
        assert_eq!(err.code(), store_code::TRANSACTION_CANCELED);
        assert!(err.to_string().contains("None, ConditionalCheckFailed"));
        assert_eq!(store.item_count("t").unwrap(), 1);
    }

    #[test]
    fn test_transact_write_rejects_duplicate_items() {
        let store = store_with_table(false);
        let err = store
            .transact_write(vec![put("1", None), put("1", None)])
            .unwrap_err();
        assert_eq!(err.code(), store_code::VALIDATION);
    }

    #[test]
    fn test_query_partition_in_sort_key_order() {
        let store = store_with_table(true);
        for (id, n) in [("a", 10), ("a", 2), ("b", 1), ("a", 7)] {
            let mut item = Item::new();
            item.insert("id".into(), Value::string(id));
            item.insert("n".into(), Value::number(n));
            store
                .put_item(WriteOperation::Put {
                    table: "t".into(),
                    key: Key::with_sk(KeyValue::S(id.into()), KeyValue::N(n.to_string())),
                    item,
                    condition: None,
                })
                .unwrap();
        }

        let page = store
            .query(QueryRequest {
                table: "t".into(),
                partition_key: KeyValue::S("a".into()),
                filter: vec![],
                limit: None,
                exclusive_start_key: None,
            })
            .unwrap();
        let ns: Vec<i64> = page.items.iter().map(|i| i["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![2, 7, 10]);
    }

    #[test]
    fn test_scan_pagination() {
        let store = store_with_table(false);
        for i in 0..5 {
            store.put_item(put(&i.to_string(), None)).unwrap();
        }

        let mut seen = 0;
        let mut start = None;
        loop {
            let page = store
                .scan(ScanRequest {
                    table: "t".into(),
                    filter: vec![],
                    limit: Some(2),
                    exclusive_start_key: start,
                })
                .unwrap();
            seen += page.items.len();
            match page.last_evaluated_key {
                Some(k) => start = Some(k),
                None => break,
            }
        }
        assert_eq!(seen, 5);
        assert_eq!(store.call_count(StoreOp::Scan), 3);
    }

    #[test]
    fn test_fail_next_is_consumed_once() {
        let store = store_with_table(false);
        store.fail_next(StoreOp::PutItem, Error::Cancelled("deadline".into()));
        assert!(matches!(store.put_item(put("1", None)), Err(Error::Cancelled(_))));
        store.put_item(put("1", None)).unwrap();
        assert_eq!(store.call_count(StoreOp::PutItem), 2);
        assert_eq!(store.write_call_count(), 2);
    }

    #[test]
    fn test_missing_table() {
        let store = MemoryStore::new();
        let err = store.describe_table("nope").unwrap_err();
        assert_eq!(err.code(), store_code::RESOURCE_NOT_FOUND);
    }
}
