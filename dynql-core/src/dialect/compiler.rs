/// Compiles dialect ASTs into validated statements
///
/// Enforces the store's addressing rules before anything reaches the
/// network:
/// - CREATE TABLE must declare a partition key; options are a closed set
/// - INSERT must carry every key attribute
/// - UPDATE/DELETE must name the full primary key with equality, nothing else
/// - SELECT picks a direct lookup, a partition query, or a scan

use super::ast::*;
use super::statement::*;
use crate::error::store_code;
use crate::store::{BillingMode, Throughput};
use crate::{Error, KeyAttribute, KeySchema, KeyType, KeyValue, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Source of table key schemas for the compiler
pub trait Catalog {
    /// Key schema of `table`; unknown tables report `RESOURCE_NOT_FOUND`
    fn key_schema(&self, table: &str) -> Result<KeySchema>;
}

impl Catalog for HashMap<String, KeySchema> {
    fn key_schema(&self, table: &str) -> Result<KeySchema> {
        self.get(table).cloned().ok_or_else(|| {
            Error::store(
                store_code::RESOURCE_NOT_FOUND,
                format!("Requested resource not found: Table: {} not found", table),
            )
        })
    }
}

fn table_name_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,255}$"))
        .as_ref()
        .map_err(|e| Error::Internal(format!("table name pattern: {}", e)))
}

/// Store-imposed table naming rule: 3-255 chars of `[A-Za-z0-9_.-]`
pub fn validate_table_name(name: &str) -> Result<()> {
    if table_name_pattern()?.is_match(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "invalid table name '{}': must be 3-255 characters of [A-Za-z0-9_.-]",
            name
        )))
    }
}

/// AST to statement compiler
pub struct StatementCompiler;

impl StatementCompiler {
    /// Compile a parsed statement, reading key schemas from `catalog`
    pub fn compile(ast: DialectStatement, catalog: &dyn Catalog) -> Result<CompiledStatement> {
        let placeholder_count = ast.placeholder_count();
        let statement = match ast {
            DialectStatement::CreateTable(s) => Statement::CreateTable(Self::compile_create_table(s)?),
            DialectStatement::DropTable(s) => {
                validate_table_name(&s.table_name)?;
                Statement::DropTable(DropTable {
                    table: s.table_name,
                    if_exists: s.if_exists,
                })
            }
            DialectStatement::ListTables => Statement::ListTables,
            DialectStatement::Insert(s) => {
                validate_table_name(&s.table_name)?;
                let schema = catalog.key_schema(&s.table_name)?;
                Statement::Insert(Self::compile_insert(s, schema)?)
            }
            DialectStatement::Select(s) => {
                validate_table_name(&s.table_name)?;
                let schema = catalog.key_schema(&s.table_name)?;
                Statement::Select(Self::compile_select(s, &schema)?)
            }
            DialectStatement::Update(s) => {
                validate_table_name(&s.table_name)?;
                let schema = catalog.key_schema(&s.table_name)?;
                Statement::Update(Self::compile_update(s, &schema)?)
            }
            DialectStatement::Delete(s) => {
                validate_table_name(&s.table_name)?;
                let schema = catalog.key_schema(&s.table_name)?;
                Statement::Delete(Self::compile_delete(s, &schema)?)
            }
        };

        Ok(CompiledStatement {
            statement,
            placeholder_count,
        })
    }

    fn compile_create_table(stmt: CreateTableStatement) -> Result<CreateTable> {
        validate_table_name(&stmt.table_name)?;

        let mut seen = HashSet::new();
        let mut partition_key = None;
        let mut sort_key = None;
        let mut rcu = None;
        let mut wcu = None;

        for option in stmt.options {
            let name = option.name.to_ascii_lowercase();
            if !seen.insert(name.clone()) {
                return Err(Error::Compile(format!(
                    "option '{}' given more than once (line {}, column {})",
                    option.name, option.position.line, option.position.column
                )));
            }
            match name.as_str() {
                "pk" => partition_key = Some(Self::key_attribute(&option)?),
                "sk" => sort_key = Some(Self::key_attribute(&option)?),
                "rcu" => rcu = Some(Self::capacity(&option)?),
                "wcu" => wcu = Some(Self::capacity(&option)?),
                _ => {
                    return Err(Error::Compile(format!(
                        "unknown table option '{}', expected one of pk, sk, rcu, wcu",
                        option.name
                    )))
                }
            }
        }

        let partition_key = partition_key.ok_or_else(|| {
            Error::Compile(format!(
                "CREATE TABLE {} requires a partition key: WITH pk=<name>:<type>",
                stmt.table_name
            ))
        })?;
        let mut key_schema = KeySchema::new(partition_key);
        if let Some(sk) = sort_key {
            if sk.name == key_schema.partition_key.name {
                return Err(Error::Compile(format!(
                    "partition key and sort key cannot both be '{}'",
                    sk.name
                )));
            }
            key_schema = key_schema.with_sort_key(sk);
        }

        // Provisioned mode needs both units; one given stands in for the other
        let billing_mode = match (rcu, wcu) {
            (None, None) => BillingMode::PayPerRequest,
            (r, w) => {
                let read = r.or(w).unwrap_or(1);
                let write = w.or(r).unwrap_or(1);
                BillingMode::Provisioned(Throughput {
                    read_capacity_units: read,
                    write_capacity_units: write,
                })
            }
        };

        Ok(CreateTable {
            table: stmt.table_name,
            key_schema,
            billing_mode,
            if_not_exists: stmt.if_not_exists,
        })
    }

    fn key_attribute(option: &WithOption) -> Result<KeyAttribute> {
        let type_name = option.type_name.as_deref().ok_or_else(|| {
            Error::Compile(format!(
                "option '{}' must have the form {}=<name>:<type>",
                option.name, option.name
            ))
        })?;
        let key_type = KeyType::parse(type_name).ok_or_else(|| {
            Error::Compile(format!(
                "invalid key type '{}' for option '{}', expected string, number or binary",
                type_name, option.name
            ))
        })?;
        Ok(KeyAttribute::new(option.value.clone(), key_type))
    }

    fn capacity(option: &WithOption) -> Result<u64> {
        if option.type_name.is_some() {
            return Err(Error::Compile(format!(
                "option '{}' takes a plain number",
                option.name
            )));
        }
        match option.value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(Error::Compile(format!(
                "option '{}' must be a positive integer, got '{}'",
                option.name, option.value
            ))),
        }
    }

    fn compile_insert(stmt: InsertStatement, key_schema: KeySchema) -> Result<Insert> {
        let attributes = Self::unique_attributes(stmt.attributes, "VALUE")?;

        let key_attrs = std::iter::once(&key_schema.partition_key).chain(key_schema.sort_key.as_ref());
        for attr in key_attrs {
            match attributes.iter().find(|(name, _)| name == &attr.name) {
                Some((_, operand)) => Self::check_key_literal(attr, operand)?,
                None => {
                    return Err(Error::Validation(format!(
                        "INSERT into {} must supply key attribute '{}'",
                        stmt.table_name, attr.name
                    )))
                }
            }
        }

        Ok(Insert {
            table: stmt.table_name,
            key_schema,
            attributes,
        })
    }

    fn compile_select(stmt: SelectStatement, schema: &KeySchema) -> Result<Select> {
        let projection = match stmt.select_list {
            SelectList::All => Projection::All,
            SelectList::Attributes(attrs) => {
                let mut seen = HashSet::new();
                if let Some(dup) = attrs.iter().find(|a| !seen.insert(a.as_str())) {
                    return Err(Error::Compile(format!(
                        "attribute '{}' selected more than once",
                        dup
                    )));
                }
                Projection::Attributes(attrs)
            }
        };

        let conditions = match stmt.where_clause {
            Some(wc) => Self::unique_conditions(wc)?,
            None => Vec::new(),
        };

        let pk_name = &schema.partition_key.name;
        let sk_name = schema.sort_key.as_ref().map(|sk| &sk.name);
        let has_pk = conditions.iter().any(|(n, _)| n == pk_name);
        let has_sk = sk_name.is_some_and(|sk| conditions.iter().any(|(n, _)| n == sk));

        let (access, filter) = if !has_pk {
            (ReadAccess::Scan, conditions)
        } else {
            let mut pk = None;
            let mut sk = None;
            let mut filter = Vec::new();
            for (name, operand) in conditions {
                if &name == pk_name {
                    pk = Some(operand);
                } else if has_sk && Some(&name) == sk_name {
                    sk = Some(operand);
                } else {
                    filter.push((name, operand));
                }
            }
            let partition_key = Self::key_operand(&schema.partition_key, pk)?;
            let access = match (&schema.sort_key, sk) {
                (Some(attr), Some(operand)) => ReadAccess::Key(KeyCondition {
                    partition_key,
                    sort_key: Some(Self::key_operand(attr, Some(operand))?),
                }),
                (Some(_), None) => ReadAccess::Partition(partition_key),
                (None, _) => ReadAccess::Key(KeyCondition {
                    partition_key,
                    sort_key: None,
                }),
            };
            (access, filter)
        };

        Ok(Select {
            table: stmt.table_name,
            projection,
            access,
            filter,
        })
    }

    fn compile_update(stmt: UpdateStatement, schema: &KeySchema) -> Result<Update> {
        let pairs = stmt
            .set_assignments
            .into_iter()
            .map(|a| (a.attribute, a.value))
            .collect();
        let assignments = Self::unique_attributes(pairs, "SET")?;
        if let Some((name, _)) = assignments.iter().find(|(n, _)| schema.is_key_column(n)) {
            return Err(Error::Compile(format!(
                "cannot SET key attribute '{}'",
                name
            )));
        }

        let key = Self::full_key(stmt.where_clause, schema, "UPDATE")?;
        Ok(Update {
            table: stmt.table_name,
            key,
            assignments,
        })
    }

    fn compile_delete(stmt: DeleteStatement, schema: &KeySchema) -> Result<Delete> {
        let key = Self::full_key(stmt.where_clause, schema, "DELETE")?;
        Ok(Delete {
            table: stmt.table_name,
            key,
        })
    }

    /// WHERE of a point write: exactly the key columns, each once
    fn full_key(wc: WhereClause, schema: &KeySchema, verb: &str) -> Result<KeyCondition> {
        let conditions = Self::unique_conditions(wc)?;
        if let Some((name, _)) = conditions.iter().find(|(n, _)| !schema.is_key_column(n)) {
            return Err(Error::Validation(format!(
                "{} WHERE clause may only constrain key attributes, found '{}'",
                verb, name
            )));
        }

        let mut by_name: HashMap<String, Operand> = conditions.into_iter().collect();
        let pk = by_name.remove(&schema.partition_key.name);
        if pk.is_none() {
            return Err(Error::Validation(format!(
                "{} must specify partition key '{}' in WHERE clause",
                verb, schema.partition_key.name
            )));
        }
        let partition_key = Self::key_operand(&schema.partition_key, pk)?;

        let sort_key = match &schema.sort_key {
            Some(attr) => {
                let sk = by_name.remove(&attr.name);
                if sk.is_none() {
                    return Err(Error::Validation(format!(
                        "{} must specify sort key '{}' in WHERE clause",
                        verb, attr.name
                    )));
                }
                Some(Self::key_operand(attr, sk)?)
            }
            None => None,
        };

        Ok(KeyCondition {
            partition_key,
            sort_key,
        })
    }

    fn key_operand(attr: &KeyAttribute, operand: Option<Operand>) -> Result<KeyOperand> {
        let operand = operand.ok_or_else(|| {
            Error::Validation(format!("missing key attribute '{}'", attr.name))
        })?;
        Self::check_key_literal(attr, &operand)?;
        Ok(KeyOperand {
            attribute: attr.clone(),
            operand,
        })
    }

    /// Literal key values are type-checked now; placeholders at bind time
    fn check_key_literal(attr: &KeyAttribute, operand: &Operand) -> Result<()> {
        match operand {
            Operand::Placeholder(_) => Ok(()),
            Operand::Value(v) if KeyValue::from_value(v, attr.key_type).is_some() => Ok(()),
            Operand::Value(v) => Err(Error::Validation(format!(
                "key attribute '{}' expects type {}, got {}",
                attr.name,
                attr.key_type.type_name(),
                v.type_name()
            ))),
            Operand::List(_) | Operand::Map(_) => Err(Error::Validation(format!(
                "key attribute '{}' cannot be a list or map",
                attr.name
            ))),
        }
    }

    fn unique_conditions(wc: WhereClause) -> Result<Vec<(String, Operand)>> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(wc.conditions.len());
        for c in wc.conditions {
            if !seen.insert(c.attribute.clone()) {
                return Err(Error::Compile(format!(
                    "attribute '{}' appears more than once in WHERE clause",
                    c.attribute
                )));
            }
            out.push((c.attribute, Self::operand(c.value)?));
        }
        Ok(out)
    }

    fn unique_attributes(pairs: Vec<(String, Expr)>, clause: &str) -> Result<Vec<(String, Operand)>> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(pairs.len());
        for (name, expr) in pairs {
            if !seen.insert(name.clone()) {
                return Err(Error::Compile(format!(
                    "duplicate attribute '{}' in {} clause",
                    name, clause
                )));
            }
            out.push((name, Self::operand(expr)?));
        }
        Ok(out)
    }

    fn operand(expr: Expr) -> Result<Operand> {
        Ok(match expr {
            Expr::Literal(lit) => lit.to_value().into(),
            Expr::Placeholder(i) => Operand::Placeholder(PlaceholderRef(i)),
            Expr::List(items) => {
                Operand::List(items.into_iter().map(Self::operand).collect::<Result<_>>()?)
            }
            Expr::Map(entries) => Operand::Map(Self::unique_attributes(entries, "map")?),
        })
    }
}
