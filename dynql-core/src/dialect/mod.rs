/// Dialect front end: text to bound store plan
///
/// Pipeline: `lexer` -> `parser` (AST) -> `compiler` (validated statement,
/// key rules applied) -> `planner` (parameters bound, store request built).

pub mod lexer;
pub mod ast;
pub mod parser;
pub mod statement;
pub mod compiler;
pub mod planner;

pub use ast::DialectStatement;
pub use compiler::{validate_table_name, Catalog, StatementCompiler};
pub use parser::{DialectParser, MAX_NESTING_DEPTH, MAX_STATEMENT_LENGTH};
pub use planner::{OperationPlanner, Plan, ReadPlan, ReadRequest};
pub use statement::*;
