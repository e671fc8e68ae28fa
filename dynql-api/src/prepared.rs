use crate::rows::RowSet;
use crate::{Connection, ExecResult};
use dynql_core::dialect::CompiledStatement;
use dynql_core::{Result, Value};

/// A statement compiled once and bound on every execution
pub struct PreparedStatement<'c> {
    conn: &'c Connection,
    compiled: CompiledStatement,
}

impl<'c> PreparedStatement<'c> {
    pub(crate) fn new(conn: &'c Connection, compiled: CompiledStatement) -> Self {
        Self { conn, compiled }
    }

    /// Number of `?` parameters each execution must supply
    pub fn placeholder_count(&self) -> usize {
        self.compiled.placeholder_count
    }

    pub fn exec(&self, params: &[Value]) -> Result<ExecResult> {
        self.conn.execute_compiled(&self.compiled, params)
    }

    pub fn query(&self, params: &[Value]) -> Result<RowSet> {
        self.conn.query_compiled(&self.compiled, params)
    }

    pub(crate) fn compiled(&self) -> &CompiledStatement {
        &self.compiled
    }
}
