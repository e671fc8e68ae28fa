/// Abstract syntax tree for dialect statements
///
/// One variant per leading keyword. The tree keeps source-level shapes
/// (option text, raw literals, placeholder indexes); meaning is assigned by
/// the compiler.

use super::lexer::Position;
use crate::Value;

/// Top-level dialect statement
#[derive(Debug, Clone, PartialEq)]
pub enum DialectStatement {
    CreateTable(CreateTableStatement),
    DropTable(DropTableStatement),
    ListTables,
    Insert(InsertStatement),
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl DialectStatement {
    /// Number of `?` placeholders in the statement
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut visit = |e: &Expr| count += e.placeholder_count();
        match self {
            DialectStatement::CreateTable(_)
            | DialectStatement::DropTable(_)
            | DialectStatement::ListTables => {}
            DialectStatement::Insert(s) => s.attributes.iter().for_each(|(_, e)| visit(e)),
            DialectStatement::Select(s) => {
                if let Some(wc) = &s.where_clause {
                    wc.conditions.iter().for_each(|c| visit(&c.value));
                }
            }
            DialectStatement::Update(s) => {
                s.set_assignments.iter().for_each(|a| visit(&a.value));
                s.where_clause.conditions.iter().for_each(|c| visit(&c.value));
            }
            DialectStatement::Delete(s) => {
                s.where_clause.conditions.iter().for_each(|c| visit(&c.value));
            }
        }
        count
    }
}

/// CREATE TABLE [IF NOT EXISTS] name WITH opt [WITH opt ...]
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table_name: String,
    pub if_not_exists: bool,
    pub options: Vec<WithOption>,
}

/// A single `WITH name=value[:type]` clause
#[derive(Debug, Clone, PartialEq)]
pub struct WithOption {
    pub name: String,
    pub value: String,
    /// Text after `:` (key type for pk/sk)
    pub type_name: Option<String>,
    pub position: Position,
}

/// DROP TABLE [IF EXISTS] name
#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub table_name: String,
    pub if_exists: bool,
}

/// INSERT INTO name VALUE {...}
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table_name: String,
    /// Attributes in source order
    pub attributes: Vec<(String, Expr)>,
}

/// SELECT list
#[derive(Debug, Clone, PartialEq)]
pub enum SelectList {
    /// SELECT *
    All,
    /// SELECT attr1, attr2, ...
    Attributes(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table_name: String,
    pub select_list: SelectList,
    pub where_clause: Option<WhereClause>,
}

/// WHERE clause with AND-ed equality conditions
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub conditions: Vec<Condition>,
}

impl WhereClause {
    /// Get condition for a specific attribute
    pub fn get_condition(&self, attr_name: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.attribute == attr_name)
    }

    pub fn has_condition(&self, attr_name: &str) -> bool {
        self.get_condition(attr_name).is_some()
    }
}

/// `attribute = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub attribute: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table_name: String,
    pub set_assignments: Vec<SetAssignment>,
    pub where_clause: WhereClause,
}

/// SET attr = value
#[derive(Debug, Clone, PartialEq)]
pub struct SetAssignment {
    pub attribute: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table_name: String,
    pub where_clause: WhereClause,
}

/// Literal value as written in the source
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Number (kept as text for precision)
    Number(String),
    String(String),
    Boolean(bool),
    Null,
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Number(n) => Value::N(n.clone()),
            Literal::String(s) => Value::S(s.clone()),
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }
}

/// Value expression: literal, placeholder, or nested document
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Zero-based index of the `?` in source order
    Placeholder(usize),
    Map(Vec<(String, Expr)>),
    List(Vec<Expr>),
}

impl Expr {
    pub fn placeholder_count(&self) -> usize {
        match self {
            Expr::Literal(_) => 0,
            Expr::Placeholder(_) => 1,
            Expr::Map(entries) => entries.iter().map(|(_, e)| e.placeholder_count()).sum(),
            Expr::List(items) => items.iter().map(Expr::placeholder_count).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(attr: &str, value: Expr) -> Condition {
        Condition {
            attribute: attr.to_string(),
            value,
        }
    }

    #[test]
    fn test_where_clause_get_condition() {
        let where_clause = WhereClause {
            conditions: vec![
                cond("id", Expr::Literal(Literal::String("1".into()))),
                cond("age", Expr::Placeholder(0)),
            ],
        };

        assert!(where_clause.get_condition("id").is_some());
        assert!(where_clause.has_condition("age"));
        assert!(where_clause.get_condition("name").is_none());
    }

    #[test]
    fn test_placeholder_count_walks_nested_values() {
        let stmt = DialectStatement::Insert(InsertStatement {
            table_name: "t".into(),
            attributes: vec![
                ("id".into(), Expr::Placeholder(0)),
                (
                    "doc".into(),
                    Expr::Map(vec![
                        ("a".into(), Expr::Placeholder(1)),
                        ("b".into(), Expr::List(vec![Expr::Placeholder(2), Expr::Literal(Literal::Null)])),
                    ]),
                ),
            ],
        });
        assert_eq!(stmt.placeholder_count(), 3);
        assert_eq!(DialectStatement::ListTables.placeholder_count(), 0);
    }

    #[test]
    fn test_literal_to_value() {
        assert_eq!(Literal::Number("42".into()).to_value(), Value::N("42".into()));
        assert_eq!(Literal::String("x".into()).to_value(), Value::S("x".into()));
        assert_eq!(Literal::Boolean(true).to_value(), Value::Bool(true));
        assert_eq!(Literal::Null.to_value(), Value::Null);
    }
}
