/// Autocommit execution
///
/// Each statement is compiled, bound and sent to the store immediately.
/// Store errors are returned as-is; nothing here retries.

use crate::rows::RowSet;
use crate::{Connection, ExecResult};
use dynql_core::dialect::{
    CompiledStatement, DialectParser, OperationPlanner, Plan, Projection, ReadPlan, ReadRequest,
    StatementCompiler,
};
use dynql_core::error::store_code;
use dynql_core::store::{matches_filter, WriteOperation};
use dynql_core::{Error, Item, MissingKeyPolicy, Result, Value};
use tracing::debug;

impl Connection {
    /// Parse and compile `sql` against this connection's schema cache
    pub(crate) fn compile(&self, sql: &str) -> Result<CompiledStatement> {
        let ast = DialectParser::parse_with_limit(sql, self.config.max_statement_length)?;
        StatementCompiler::compile(ast, &self.catalog)
    }

    pub(crate) fn execute_compiled(
        &self,
        compiled: &CompiledStatement,
        params: &[Value],
    ) -> Result<ExecResult> {
        let plan = OperationPlanner::plan(compiled, params)?;
        debug!(
            kind = compiled.statement.kind(),
            table = compiled.statement.table().unwrap_or(""),
            "Executing statement"
        );

        match plan {
            Plan::CreateTable {
                request,
                if_not_exists,
            } => {
                let table = request.table.clone();
                let key_schema = request.key_schema.clone();
                match self.store.create_table(request) {
                    Ok(()) => self.catalog.register(&table, key_schema),
                    Err(e) if if_not_exists && e.code() == store_code::RESOURCE_IN_USE => {
                        // Existing table keeps its own schema
                        self.catalog.evict(&table);
                    }
                    Err(e) => return Err(e),
                }
                Ok(ExecResult::new(0))
            }
            Plan::DropTable { table, if_exists } => {
                match self.store.delete_table(&table) {
                    Ok(()) => {}
                    Err(e) if if_exists && e.code() == store_code::RESOURCE_NOT_FOUND => {}
                    Err(e) => return Err(e),
                }
                self.catalog.evict(&table);
                Ok(ExecResult::new(0))
            }
            Plan::ListTables => {
                self.store.list_tables()?;
                Ok(ExecResult::new(0))
            }
            Plan::Read(read) => {
                for row in self.read_rows(read)? {
                    row?;
                }
                Ok(ExecResult::new(0))
            }
            Plan::Write(op) => self.execute_write(op),
        }
    }

    pub(crate) fn query_compiled(
        &self,
        compiled: &CompiledStatement,
        params: &[Value],
    ) -> Result<RowSet> {
        if !compiled.statement.is_read() {
            return Err(Error::Validation(format!(
                "query expects SELECT or LIST TABLES, got {}; use exec instead",
                compiled.statement.kind()
            )));
        }

        let plan = OperationPlanner::plan(compiled, params)?;
        debug!(
            kind = compiled.statement.kind(),
            table = compiled.statement.table().unwrap_or(""),
            "Querying"
        );

        match plan {
            Plan::ListTables => {
                let items = self
                    .store
                    .list_tables()?
                    .into_iter()
                    .map(|name| {
                        let mut item = Item::new();
                        item.insert("table_name".to_string(), Value::S(name));
                        item
                    })
                    .collect();
                Ok(RowSet::buffered(self.store.clone(), items, Projection::All))
            }
            Plan::Read(read) => self.read_rows(read),
            other => Err(Error::Internal(format!(
                "read statement planned as {}",
                other.kind()
            ))),
        }
    }

    fn read_rows(&self, read: ReadPlan) -> Result<RowSet> {
        let page_size = self.config.scan_page_size;
        Ok(match read.request {
            ReadRequest::Get { request, filter } => {
                let items = self
                    .store
                    .get_item(request)?
                    .filter(|item| matches_filter(item, &filter))
                    .into_iter()
                    .collect();
                RowSet::buffered(self.store.clone(), items, read.projection)
            }
            ReadRequest::Query(request) => {
                RowSet::query(self.store.clone(), request, read.projection, page_size)
            }
            ReadRequest::Scan(request) => {
                RowSet::scan(self.store.clone(), request, read.projection, page_size)
            }
        })
    }

    fn execute_write(&self, op: WriteOperation) -> Result<ExecResult> {
        let tolerates_missing = matches!(
            op,
            WriteOperation::Update { .. } | WriteOperation::Delete { .. }
        ) && self.config.missing_key_policy == MissingKeyPolicy::ZeroRows;

        let kind = op.kind();
        let result = match op {
            WriteOperation::Put { .. } => self.store.put_item(op),
            WriteOperation::Update { .. } => self.store.update_item(op),
            WriteOperation::Delete { .. } => self.store.delete_item(op),
        };

        match result {
            Ok(()) => Ok(ExecResult::new(1)),
            Err(e) if tolerates_missing && e.is_conditional_check_failed() => {
                debug!(kind, "Key not found, no rows affected");
                Ok(ExecResult::new(0))
            }
            Err(e) => Err(e),
        }
    }
}
