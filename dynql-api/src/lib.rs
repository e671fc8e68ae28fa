use dynql_core::{DriverConfig, Result, StoreClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use dynql_core::{params, Error as DynqlError, MissingKeyPolicy, Value};

mod catalog;
mod executor;

pub mod prepared;
pub use prepared::PreparedStatement;

pub mod result;
pub use result::ExecResult;

pub mod rows;
pub use rows::{Row, RowSet};

pub mod transaction;
pub use transaction::{Transaction, TxState};

use catalog::SchemaCache;

/// Driver connection handle over a [`StoreClient`]
pub struct Connection {
    store: Arc<dyn StoreClient>,
    catalog: SchemaCache,
    config: DriverConfig,
    tx_open: AtomicBool,
}

impl Connection {
    /// Create a connection with the default configuration
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self {
            catalog: SchemaCache::new(store.clone()),
            store,
            config: DriverConfig::default(),
            tx_open: AtomicBool::new(false),
        }
    }

    /// Create a connection with a custom configuration
    pub fn with_config(store: Arc<dyn StoreClient>, config: DriverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            catalog: SchemaCache::new(store.clone()),
            store,
            config,
            tx_open: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run a statement immediately (autocommit)
    ///
    /// # Examples
    ///
    /// ```
    /// use dynql_api::{params, Connection};
    /// use dynql_core::MemoryStore;
    /// use std::sync::Arc;
    ///
    /// let conn = Connection::new(Arc::new(MemoryStore::new()));
    /// conn.exec("CREATE TABLE users WITH pk=id:string", &[]).unwrap();
    ///
    /// let res = conn
    ///     .exec("INSERT INTO users VALUE {'id': ?, 'name': ?}", &params!["u1", "Alice"])
    ///     .unwrap();
    /// assert_eq!(res.rows_affected(), 1);
    /// ```
    pub fn exec(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let compiled = self.compile(sql)?;
        self.execute_compiled(&compiled, params)
    }

    /// Run a read statement and return its rows lazily
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<RowSet> {
        let compiled = self.compile(sql)?;
        self.query_compiled(&compiled, params)
    }

    /// Compile a statement for repeated execution
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement<'_>> {
        let compiled = self.compile(sql)?;
        Ok(PreparedStatement::new(self, compiled))
    }

    /// Open a transaction. Fails while another one is open on this connection.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        if self
            .tx_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DynqlError::TransactionState(
                "a transaction is already open on this connection".to_string(),
            ));
        }
        Ok(Transaction::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynql_core::MemoryStore;

    #[test]
    fn test_with_config_validates() {
        let err = Connection::with_config(
            Arc::new(MemoryStore::new()),
            DriverConfig::new().with_scan_page_size(0),
        )
        .err()
        .unwrap();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_statement_length_limit() {
        let conn = Connection::with_config(
            Arc::new(MemoryStore::new()),
            DriverConfig::new().with_max_statement_length(16),
        )
        .unwrap();
        let err = conn.exec("CREATE TABLE tbltest WITH pk=id:string", &[]).unwrap_err();
        assert_eq!(err.code(), "SYNTAX_ERROR");
    }

    #[test]
    fn test_single_open_transaction() {
        let conn = Connection::new(Arc::new(MemoryStore::new()));
        let mut tx = conn.begin().unwrap();
        let err = conn.begin().err().unwrap();
        assert_eq!(err.code(), "TRANSACTION_STATE_ERROR");

        tx.rollback().unwrap();
        assert!(conn.begin().is_ok());
    }

    #[test]
    fn test_connection_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Connection>();
    }
}
