/// Read results: rows and lazy, paged row sets
///
/// A `RowSet` holds at most one page of items at a time. Query and scan
/// pages are fetched on demand as the caller iterates; restarting means
/// issuing the query again.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dynql_core::dialect::Projection;
use dynql_core::store::{QueryRequest, ScanRequest};
use dynql_core::{Item, Result, StoreClient, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// One record: column name to typed value
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: HashMap<String, Value>,
}

impl Row {
    /// Builds a row from a store item. `SELECT *` lists columns in name
    /// order; an attribute list keeps its order and drops absent columns.
    pub(crate) fn from_item(mut item: Item, projection: &Projection) -> Self {
        match projection {
            Projection::All => {
                let mut columns: Vec<String> = item.keys().cloned().collect();
                columns.sort();
                Self {
                    columns,
                    values: item,
                }
            }
            Projection::Attributes(names) => {
                let mut columns = Vec::with_capacity(names.len());
                let mut values = HashMap::with_capacity(names.len());
                for name in names {
                    if let Some(v) = item.remove(name) {
                        columns.push(name.clone());
                        values.insert(name.clone(), v);
                    }
                }
                Self { columns, values }
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_item(self) -> Item {
        self.values
    }

    /// JSON object for the row; binary values are base64 strings
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .filter_map(|c| self.values.get(c).map(|v| (c.clone(), value_to_json(v))))
            .collect();
        serde_json::Value::Object(map)
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::N(n) => {
            if let Ok(i) = n.parse::<i64>() {
                serde_json::Value::Number(i.into())
            } else if let Ok(f) = n.parse::<f64>() {
                serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .unwrap_or_else(|| serde_json::Value::String(n.clone()))
            } else {
                serde_json::Value::String(n.clone())
            }
        }
        Value::S(s) => serde_json::Value::String(s.clone()),
        Value::B(bytes) => serde_json::Value::String(STANDARD.encode(bytes)),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Null => serde_json::Value::Null,
        Value::L(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::M(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect(),
        ),
    }
}

/// Where the next page comes from
enum Source {
    /// Everything is already buffered
    Buffered,
    Query(QueryRequest),
    Scan(ScanRequest),
}

/// Forward-only sequence of rows
pub struct RowSet {
    store: Arc<dyn StoreClient>,
    source: Source,
    projection: Projection,
    buffer: VecDeque<Item>,
    page_size: usize,
    done: bool,
}

impl RowSet {
    pub(crate) fn buffered(store: Arc<dyn StoreClient>, items: Vec<Item>, projection: Projection) -> Self {
        Self {
            store,
            source: Source::Buffered,
            projection,
            buffer: items.into(),
            page_size: 0,
            done: true,
        }
    }

    pub(crate) fn query(
        store: Arc<dyn StoreClient>,
        request: QueryRequest,
        projection: Projection,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            source: Source::Query(request),
            projection,
            buffer: VecDeque::new(),
            page_size,
            done: false,
        }
    }

    pub(crate) fn scan(
        store: Arc<dyn StoreClient>,
        request: ScanRequest,
        projection: Projection,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            source: Source::Scan(request),
            projection,
            buffer: VecDeque::new(),
            page_size,
            done: false,
        }
    }

    /// Drains the set, stopping at the first error
    pub fn collect_rows(self) -> Result<Vec<Row>> {
        self.collect()
    }

    fn fetch_page(&mut self) -> Result<()> {
        let limit = Some(self.page_size);
        let page = match &mut self.source {
            Source::Buffered => {
                self.done = true;
                return Ok(());
            }
            Source::Query(request) => {
                request.limit = limit;
                let page = self.store.query(request.clone())?;
                request.exclusive_start_key = page.last_evaluated_key.clone();
                page
            }
            Source::Scan(request) => {
                request.limit = limit;
                let page = self.store.scan(request.clone())?;
                request.exclusive_start_key = page.last_evaluated_key.clone();
                page
            }
        };

        debug!(items = page.items.len(), more = page.last_evaluated_key.is_some(), "Fetched page");
        self.done = page.last_evaluated_key.is_none();
        self.buffer.extend(page.items);
        Ok(())
    }
}

impl Iterator for RowSet {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(Row::from_item(item, &self.projection)));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
