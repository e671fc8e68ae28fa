/// Binds parameters into compiled statements and produces store requests
///
/// Every plan is a single store call (or a paged sequence of them for
/// reads). Parameters are consumed strictly in placeholder order.

use super::statement::*;
use crate::store::{
    CreateTableRequest, Filter, GetItemRequest, QueryRequest, ScanRequest, WriteCondition,
    WriteOperation,
};
use crate::{canonical_number, Error, Item, Key, KeyValue, Result, Value};
use std::collections::HashMap;

/// How a read reaches the store
#[derive(Debug, Clone, PartialEq)]
pub enum ReadRequest {
    /// Point lookup; `filter` is applied to the returned item
    Get {
        request: GetItemRequest,
        filter: Filter,
    },
    Query(QueryRequest),
    Scan(ScanRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadPlan {
    pub request: ReadRequest,
    pub projection: Projection,
}

impl ReadPlan {
    pub fn table(&self) -> &str {
        match &self.request {
            ReadRequest::Get { request, .. } => &request.table,
            ReadRequest::Query(q) => &q.table,
            ReadRequest::Scan(s) => &s.table,
        }
    }
}

/// A bound statement, ready to execute
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    CreateTable {
        request: CreateTableRequest,
        if_not_exists: bool,
    },
    DropTable {
        table: String,
        if_exists: bool,
    },
    ListTables,
    Read(ReadPlan),
    Write(WriteOperation),
}

impl Plan {
    pub fn kind(&self) -> &'static str {
        match self {
            Plan::CreateTable { .. } => "create_table",
            Plan::DropTable { .. } => "drop_table",
            Plan::ListTables => "list_tables",
            Plan::Read(p) => match p.request {
                ReadRequest::Get { .. } => "get_item",
                ReadRequest::Query(_) => "query",
                ReadRequest::Scan(_) => "scan",
            },
            Plan::Write(op) => op.kind(),
        }
    }
}

/// Resolves operands against a parameter slice
struct Binder<'a> {
    params: &'a [Value],
}

impl<'a> Binder<'a> {
    fn value(&self, operand: &Operand) -> Result<Value> {
        match operand {
            Operand::Value(v) => Ok(v.clone()),
            Operand::Placeholder(PlaceholderRef(i)) => {
                let value = self.params.get(*i).ok_or_else(|| {
                    Error::Bind(format!("no parameter for placeholder {}", i + 1))
                })?;
                Self::check_numbers(value, *i)?;
                Ok(value.clone())
            }
            Operand::List(items) => Ok(Value::L(
                items.iter().map(|o| self.value(o)).collect::<Result<_>>()?,
            )),
            Operand::Map(entries) => Ok(Value::M(
                entries
                    .iter()
                    .map(|(k, o)| Ok((k.clone(), self.value(o)?)))
                    .collect::<Result<_>>()?,
            )),
        }
    }

    /// Numbers arrive as text; reject anything that is not a decimal number
    fn check_numbers(value: &Value, index: usize) -> Result<()> {
        match value {
            Value::N(n) if canonical_number(n).is_none() => Err(Error::Bind(format!(
                "parameter {} is not a valid number: '{}'",
                index + 1,
                n
            ))),
            Value::L(items) => items.iter().try_for_each(|v| Self::check_numbers(v, index)),
            Value::M(entries) => entries.values().try_for_each(|v| Self::check_numbers(v, index)),
            _ => Ok(()),
        }
    }

    fn key_value(&self, key: &KeyOperand) -> Result<KeyValue> {
        let value = self.value(&key.operand)?;
        KeyValue::from_value(&value, key.attribute.key_type).ok_or_else(|| {
            Error::Bind(format!(
                "key attribute '{}' expects type {}, got {}",
                key.attribute.name,
                key.attribute.key_type.type_name(),
                value.type_name()
            ))
        })
    }

    fn key(&self, cond: &KeyCondition) -> Result<Key> {
        let pk = self.key_value(&cond.partition_key)?;
        Ok(match &cond.sort_key {
            Some(sk) => Key::with_sk(pk, self.key_value(sk)?),
            None => Key::new(pk),
        })
    }

    fn pairs(&self, pairs: &[(String, Operand)]) -> Result<Vec<(String, Value)>> {
        pairs
            .iter()
            .map(|(name, o)| Ok((name.clone(), self.value(o)?)))
            .collect()
    }
}

/// Compiled statement + parameters to store plan
pub struct OperationPlanner;

impl OperationPlanner {
    pub fn plan(compiled: &CompiledStatement, params: &[Value]) -> Result<Plan> {
        if params.len() != compiled.placeholder_count {
            return Err(Error::Bind(format!(
                "expected {} parameters, got {}",
                compiled.placeholder_count,
                params.len()
            )));
        }
        let binder = Binder { params };

        match &compiled.statement {
            Statement::CreateTable(ct) => Ok(Plan::CreateTable {
                request: CreateTableRequest {
                    table: ct.table.clone(),
                    key_schema: ct.key_schema.clone(),
                    billing_mode: ct.billing_mode,
                },
                if_not_exists: ct.if_not_exists,
            }),
            Statement::DropTable(dt) => Ok(Plan::DropTable {
                table: dt.table.clone(),
                if_exists: dt.if_exists,
            }),
            Statement::ListTables => Ok(Plan::ListTables),
            Statement::Insert(ins) => Self::plan_insert(&binder, ins),
            Statement::Select(sel) => Self::plan_select(&binder, sel),
            Statement::Update(upd) => Ok(Plan::Write(WriteOperation::Update {
                table: upd.table.clone(),
                key: binder.key(&upd.key)?,
                set: binder.pairs(&upd.assignments)?,
                condition: Some(WriteCondition::ItemExists),
            })),
            Statement::Delete(del) => Ok(Plan::Write(WriteOperation::Delete {
                table: del.table.clone(),
                key: binder.key(&del.key)?,
                condition: Some(WriteCondition::ItemExists),
            })),
        }
    }

    fn plan_insert(binder: &Binder<'_>, ins: &Insert) -> Result<Plan> {
        let item: Item = binder.pairs(&ins.attributes)?.into_iter().collect::<HashMap<_, _>>();

        let schema = &ins.key_schema;
        for attr in std::iter::once(&schema.partition_key).chain(schema.sort_key.as_ref()) {
            let value = item.get(&attr.name).unwrap_or(&Value::Null);
            if KeyValue::from_value(value, attr.key_type).is_none() {
                return Err(Error::Bind(format!(
                    "key attribute '{}' expects type {}, got {}",
                    attr.name,
                    attr.key_type.type_name(),
                    value.type_name()
                )));
            }
        }
        let key = schema
            .key_of(&item)
            .ok_or_else(|| Error::Internal("key extraction failed after type check".into()))?;

        Ok(Plan::Write(WriteOperation::Put {
            table: ins.table.clone(),
            key,
            item,
            condition: Some(WriteCondition::ItemNotExists),
        }))
    }

    fn plan_select(binder: &Binder<'_>, sel: &Select) -> Result<Plan> {
        let filter = binder.pairs(&sel.filter)?;
        let request = match &sel.access {
            ReadAccess::Key(cond) => ReadRequest::Get {
                request: GetItemRequest {
                    table: sel.table.clone(),
                    key: binder.key(cond)?,
                },
                filter,
            },
            ReadAccess::Partition(pk) => ReadRequest::Query(QueryRequest {
                table: sel.table.clone(),
                partition_key: binder.key_value(pk)?,
                filter,
                limit: None,
                exclusive_start_key: None,
            }),
            ReadAccess::Scan => ReadRequest::Scan(ScanRequest {
                table: sel.table.clone(),
                filter,
                limit: None,
                exclusive_start_key: None,
            }),
        };

        Ok(Plan::Read(ReadPlan {
            request,
            projection: sel.projection.clone(),
        }))
    }
}
