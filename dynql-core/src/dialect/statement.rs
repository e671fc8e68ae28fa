/// Compiled, validated statements
///
/// Produced by the compiler, consumed by the planner. Operands still hold
/// unresolved placeholders; binding happens at plan time.

use crate::store::BillingMode;
use crate::{KeyAttribute, KeySchema, Value};

/// Position of a `?` in the caller's parameter sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceholderRef(pub usize);

/// A value that is either known now or bound from parameters later
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Placeholder(PlaceholderRef),
    List(Vec<Operand>),
    Map(Vec<(String, Operand)>),
}

/// Convenience: a literal operand
impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

/// Equality on one key attribute
#[derive(Debug, Clone, PartialEq)]
pub struct KeyOperand {
    pub attribute: KeyAttribute,
    pub operand: Operand,
}

/// Equality constraints covering the full primary key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub partition_key: KeyOperand,
    pub sort_key: Option<KeyOperand>,
}

/// Attributes returned by a read
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Attributes(Vec<String>),
}

/// How a SELECT reaches its rows
#[derive(Debug, Clone, PartialEq)]
pub enum ReadAccess {
    /// Full key given: direct lookup
    Key(KeyCondition),
    /// Only the partition key given on a table with a sort key
    Partition(KeyOperand),
    Scan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: String,
    pub key_schema: KeySchema,
    pub billing_mode: BillingMode,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub table: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub key_schema: KeySchema,
    pub attributes: Vec<(String, Operand)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    pub projection: Projection,
    pub access: ReadAccess,
    /// Non-key equalities applied to every candidate row
    pub filter: Vec<(String, Operand)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub key: KeyCondition,
    pub assignments: Vec<(String, Operand)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub key: KeyCondition,
}

/// Closed set of statement kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    DropTable(DropTable),
    ListTables,
    Insert(Insert),
    Select(Select),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateTable(_) => "CREATE TABLE",
            Statement::DropTable(_) => "DROP TABLE",
            Statement::ListTables => "LIST TABLES",
            Statement::Insert(_) => "INSERT",
            Statement::Select(_) => "SELECT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            Statement::CreateTable(s) => Some(&s.table),
            Statement::DropTable(s) => Some(&s.table),
            Statement::ListTables => None,
            Statement::Insert(s) => Some(&s.table),
            Statement::Select(s) => Some(&s.table),
            Statement::Update(s) => Some(&s.table),
            Statement::Delete(s) => Some(&s.table),
        }
    }

    /// Single-item writes: the only statements a transaction may queue
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Statement::Insert(_) | Statement::Update(_) | Statement::Delete(_)
        )
    }

    /// Statements that return rows
    pub fn is_read(&self) -> bool {
        matches!(self, Statement::Select(_) | Statement::ListTables)
    }
}

/// A statement together with its placeholder count
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub statement: Statement,
    pub placeholder_count: usize,
}
