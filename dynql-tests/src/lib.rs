/// Test utilities and helpers for dynql integration tests
///
/// Every helper works against a fresh in-process `MemoryStore`, so tests can
/// inspect call counters and inject store failures.

use dynql_api::{Connection, Row, Value};
use dynql_core::{DriverConfig, MemoryStore};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per process. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Connection over a fresh memory store, keeping a handle to the store
pub struct TestConnection {
    pub store: MemoryStore,
    pub conn: Connection,
}

impl TestConnection {
    /// New connection with default configuration
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    pub fn with_config(config: DriverConfig) -> Self {
        init_tracing();
        let store = MemoryStore::new();
        let conn = Connection::with_config(Arc::new(store.clone()), config)
            .expect("Failed to open connection");
        Self { store, conn }
    }

    /// New connection with `tbltest` (partition key `id`, string) created
    pub fn with_test_table() -> Self {
        let tc = Self::new();
        tc.conn
            .exec("CREATE TABLE tbltest WITH pk=id:string", &[])
            .expect("Failed to create table");
        tc
    }

    /// Insert one `tbltest` row per id, with a `duration` attribute
    pub fn seed(&self, ids: &[&str]) {
        for (i, id) in ids.iter().enumerate() {
            self.conn
                .exec(
                    "INSERT INTO tbltest VALUE {'id': ?, 'duration': ?}",
                    &[Value::from(*id), Value::from(i)],
                )
                .expect("Failed to seed row");
        }
    }

    /// Number of items currently stored in `table`
    pub fn count(&self, table: &str) -> usize {
        self.store.item_count(table).expect("Failed to count items")
    }
}

impl Default for TestConnection {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a query and collect every row
pub fn fetch_all(conn: &Connection, sql: &str, params: &[Value]) -> anyhow::Result<Vec<Row>> {
    Ok(conn.query(sql, params)?.collect_rows()?)
}

/// String values of `column` across `rows`, sorted
pub fn column_strings(rows: &[Row], column: &str) -> Vec<String> {
    let mut out: Vec<String> = rows
        .iter()
        .filter_map(|r| r.get(column).and_then(|v| v.as_string()).map(str::to_string))
        .collect();
    out.sort();
    out
}

/// Assert that a value is a number with expected value
pub fn assert_number_eq(value: &Value, expected: &str) {
    match value {
        Value::N(n) => assert_eq!(n, expected),
        _ => panic!("Expected number, got {:?}", value),
    }
}

/// Assert that a value is a string with expected value
pub fn assert_string_eq(value: &Value, expected: &str) {
    match value {
        Value::S(s) => assert_eq!(s, expected),
        _ => panic!("Expected string, got {:?}", value),
    }
}
