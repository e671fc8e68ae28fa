/// Buffered transactions
///
/// Writes issued on a [`Transaction`] are compiled and bound immediately but
/// held locally. `commit` sends the whole queue as one `transact_write`
/// batch; `rollback` (or dropping the handle) discards it without any store
/// call.

use crate::prepared::PreparedStatement;
use crate::{Connection, ExecResult};
use dynql_core::dialect::{CompiledStatement, OperationPlanner, Plan};
use dynql_core::error::store_code;
use dynql_core::store::WriteOperation;
use dynql_core::{Error, Result, Value};
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Open,
    Committed,
    RolledBack,
}

/// An open transaction on a [`Connection`]. At most one exists per
/// connection at a time.
pub struct Transaction<'c> {
    conn: &'c Connection,
    ops: Vec<WriteOperation>,
    state: TxState,
}

impl<'c> Transaction<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            ops: Vec::new(),
            state: TxState::Open,
        }
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queue a write. Returns a provisional `rows_affected` of 1; nothing is
    /// sent until `commit`.
    pub fn exec(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.ensure_open("exec")?;
        let compiled = self.conn.compile(sql)?;
        self.queue(&compiled, params)
    }

    /// Queue a write from a prepared statement
    pub fn exec_prepared(&mut self, stmt: &PreparedStatement<'_>, params: &[Value]) -> Result<ExecResult> {
        self.ensure_open("exec")?;
        self.queue(stmt.compiled(), params)
    }

    fn queue(&mut self, compiled: &CompiledStatement, params: &[Value]) -> Result<ExecResult> {
        if !compiled.statement.is_write() {
            return Err(Error::Validation(format!(
                "only INSERT, UPDATE and DELETE can run inside a transaction, got {}",
                compiled.statement.kind()
            )));
        }

        let op = match OperationPlanner::plan(compiled, params)? {
            Plan::Write(op) => op,
            other => {
                return Err(Error::Internal(format!(
                    "write statement planned as {}",
                    other.kind()
                )))
            }
        };

        let limit = self.conn.config.max_transaction_items;
        if self.ops.len() >= limit {
            return Err(Error::Validation(format!(
                "transaction cannot hold more than {} operations",
                limit
            )));
        }
        if self
            .ops
            .iter()
            .any(|queued| queued.table() == op.table() && queued.key() == op.key())
        {
            return Err(Error::Validation(format!(
                "item {} in table {} is already written by this transaction",
                op.key(),
                op.table()
            )));
        }

        debug!(kind = op.kind(), table = op.table(), queued = self.ops.len() + 1, "Queued write");
        self.ops.push(op);
        Ok(ExecResult::new(1))
    }

    /// Apply every queued write atomically
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open("commit")?;

        if self.ops.is_empty() {
            self.finish(TxState::Committed);
            info!(operations = 0, "Committed empty transaction");
            return Ok(());
        }

        let count = self.ops.len();
        match self.conn.store.transact_write(self.ops.clone()) {
            Ok(()) => {
                self.finish(TxState::Committed);
                info!(operations = count, "Committed transaction");
                Ok(())
            }
            // Cancellation leaves the transaction open with its queue intact
            Err(e @ Error::Cancelled(_)) => {
                warn!(operations = count, error = %e, "Commit cancelled, transaction still open");
                Err(e)
            }
            Err(e) => {
                self.finish(TxState::RolledBack);
                warn!(operations = count, error = %e, "Commit failed");
                Err(match e {
                    Error::Store { code, message } if code == store_code::TRANSACTION_CANCELED => {
                        Error::Transaction(message)
                    }
                    Error::Store { code, message } => {
                        Error::Transaction(format!("[{}] {}", code, message))
                    }
                    other => Error::Transaction(other.to_string()),
                })
            }
        }
    }

    /// Discard every queued write
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open("rollback")?;
        let count = self.ops.len();
        self.finish(TxState::RolledBack);
        info!(operations = count, "Rolled back transaction");
        Ok(())
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        match self.state {
            TxState::Open => Ok(()),
            TxState::Committed => Err(Error::TransactionState(format!(
                "cannot {}: transaction already committed",
                action
            ))),
            TxState::RolledBack => Err(Error::TransactionState(format!(
                "cannot {}: transaction already rolled back",
                action
            ))),
        }
    }

    fn finish(&mut self, state: TxState) {
        self.ops.clear();
        self.state = state;
        self.conn.tx_open.store(false, Ordering::Release);
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TxState::Open {
            warn!(operations = self.ops.len(), "Open transaction dropped, discarding queued writes");
            self.finish(TxState::RolledBack);
        }
    }
}
