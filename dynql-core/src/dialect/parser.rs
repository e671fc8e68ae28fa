/// Recursive-descent parser for the dialect
///
/// The leading keyword selects the sub-grammar. Every failure is reported as
/// [`Error::Syntax`] at the offending token, or just past the end of input.

use super::ast::*;
use super::lexer::{end_position, tokenize, Position, Token, TokenKind};
use crate::Result;

/// Longest accepted statement, in characters
pub const MAX_STATEMENT_LENGTH: usize = 8192;

/// Deepest accepted nesting of map and list literals
pub const MAX_NESTING_DEPTH: usize = 32;

/// Dialect statement parser
pub struct DialectParser {
    tokens: Vec<Token>,
    index: usize,
    end: Position,
    placeholders: usize,
    depth: usize,
}

impl DialectParser {
    /// Parse a single statement with the default length limit
    pub fn parse(sql: &str) -> Result<DialectStatement> {
        Self::parse_with_limit(sql, MAX_STATEMENT_LENGTH)
    }

    /// Parse a single statement, rejecting text longer than `max_length` chars
    pub fn parse_with_limit(sql: &str, max_length: usize) -> Result<DialectStatement> {
        if sql.trim().is_empty() {
            return Err(Position::new(1, 1).syntax_error("statement cannot be empty"));
        }
        let length = sql.chars().count();
        if length > max_length {
            return Err(Position::new(1, 1).syntax_error(format!(
                "statement too long: {} chars (max {})",
                length, max_length
            )));
        }

        let mut parser = DialectParser {
            tokens: tokenize(sql)?,
            index: 0,
            end: end_position(sql),
            placeholders: 0,
            depth: 0,
        };
        let statement = parser.parse_statement()?;

        parser.consume(&TokenKind::SemiColon);
        if let Some(token) = parser.peek() {
            return Err(token
                .position
                .syntax_error(format!("unexpected '{}' after end of statement", token.kind)));
        }
        Ok(statement)
    }

    fn parse_statement(&mut self) -> Result<DialectStatement> {
        let token = self.next_token("a statement keyword")?;
        let keyword = match &token.kind {
            TokenKind::Word { value, quoted: false } => value.to_ascii_uppercase(),
            other => {
                return Err(token
                    .position
                    .syntax_error(format!("expected a statement keyword, found '{}'", other)))
            }
        };

        match keyword.as_str() {
            "CREATE" => self.parse_create_table().map(DialectStatement::CreateTable),
            "DROP" => self.parse_drop_table().map(DialectStatement::DropTable),
            "LIST" => {
                self.expect_keyword("TABLES")?;
                Ok(DialectStatement::ListTables)
            }
            "INSERT" => self.parse_insert().map(DialectStatement::Insert),
            "SELECT" => self.parse_select().map(DialectStatement::Select),
            "UPDATE" => self.parse_update().map(DialectStatement::Update),
            "DELETE" => self.parse_delete().map(DialectStatement::Delete),
            _ => Err(token.position.syntax_error(format!(
                "unsupported statement '{}', expected CREATE, DROP, LIST, INSERT, SELECT, UPDATE or DELETE",
                keyword
            ))),
        }
    }

    /// CREATE TABLE [IF NOT EXISTS] name (WITH name=value[:type])*
    fn parse_create_table(&mut self) -> Result<CreateTableStatement> {
        self.expect_keyword("TABLE")?;
        let if_not_exists = if self.parse_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
            true
        } else {
            false
        };
        let table_name = self.parse_identifier("table name")?;

        let mut options = Vec::new();
        while self.parse_keyword("WITH") {
            options.push(self.parse_with_option()?);
            // Tolerate `WITH a=1, WITH b=2`
            self.consume(&TokenKind::Comma);
        }

        Ok(CreateTableStatement {
            table_name,
            if_not_exists,
            options,
        })
    }

    fn parse_with_option(&mut self) -> Result<WithOption> {
        let position = self.current_position();
        let name = self.parse_identifier("option name")?;
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_option_atom("option value")?;
        let type_name = if self.consume(&TokenKind::Colon) {
            Some(self.parse_option_atom("key type")?)
        } else {
            None
        };
        Ok(WithOption {
            name,
            value,
            type_name,
            position,
        })
    }

    fn parse_option_atom(&mut self, expected: &str) -> Result<String> {
        let token = self.next_token(expected)?;
        match token.kind {
            TokenKind::Word { value, .. } => Ok(value),
            TokenKind::Number(n) => Ok(n),
            TokenKind::String(s) => Ok(s),
            other => Err(token
                .position
                .syntax_error(format!("expected {}, found '{}'", expected, other))),
        }
    }

    /// DROP TABLE [IF EXISTS] name
    fn parse_drop_table(&mut self) -> Result<DropTableStatement> {
        self.expect_keyword("TABLE")?;
        let if_exists = if self.parse_keyword("IF") {
            self.expect_keyword("EXISTS")?;
            true
        } else {
            false
        };
        let table_name = self.parse_identifier("table name")?;
        Ok(DropTableStatement {
            table_name,
            if_exists,
        })
    }

    /// INSERT INTO name VALUE {map}
    fn parse_insert(&mut self) -> Result<InsertStatement> {
        self.expect_keyword("INTO")?;
        let table_name = self.parse_identifier("table name")?;
        self.expect_keyword("VALUE")?;
        let attributes = self.parse_map()?;
        Ok(InsertStatement {
            table_name,
            attributes,
        })
    }

    /// SELECT * | a, b FROM name [WHERE ...]
    fn parse_select(&mut self) -> Result<SelectStatement> {
        let select_list = if self.consume(&TokenKind::Star) {
            SelectList::All
        } else {
            let mut attributes = vec![self.parse_identifier("attribute name or *")?];
            while self.consume(&TokenKind::Comma) {
                attributes.push(self.parse_identifier("attribute name")?);
            }
            SelectList::Attributes(attributes)
        };
        self.expect_keyword("FROM")?;
        let table_name = self.parse_identifier("table name")?;

        let where_clause = if self.parse_keyword("WHERE") {
            Some(self.parse_where_conditions()?)
        } else {
            None
        };

        Ok(SelectStatement {
            table_name,
            select_list,
            where_clause,
        })
    }

    /// UPDATE name SET a=v [, b=v] WHERE ...
    fn parse_update(&mut self) -> Result<UpdateStatement> {
        let table_name = self.parse_identifier("table name")?;
        self.expect_keyword("SET")?;

        let mut set_assignments = Vec::new();
        loop {
            let attribute = self.parse_identifier("attribute name")?;
            self.expect(&TokenKind::Eq)?;
            let value = self.parse_expr()?;
            set_assignments.push(SetAssignment { attribute, value });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        self.expect_keyword("WHERE")?;
        let where_clause = self.parse_where_conditions()?;
        Ok(UpdateStatement {
            table_name,
            set_assignments,
            where_clause,
        })
    }

    /// DELETE FROM name WHERE ...
    fn parse_delete(&mut self) -> Result<DeleteStatement> {
        self.expect_keyword("FROM")?;
        let table_name = self.parse_identifier("table name")?;
        self.expect_keyword("WHERE")?;
        let where_clause = self.parse_where_conditions()?;
        Ok(DeleteStatement {
            table_name,
            where_clause,
        })
    }

    /// cond [AND cond]*, where cond is `attr = value`
    fn parse_where_conditions(&mut self) -> Result<WhereClause> {
        let mut conditions = Vec::new();
        loop {
            let attribute = self.parse_identifier("attribute name")?;
            self.expect(&TokenKind::Eq)?;
            let value = self.parse_expr()?;
            conditions.push(Condition { attribute, value });
            if !self.parse_keyword("AND") {
                break;
            }
        }
        Ok(WhereClause { conditions })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let token = self.next_token("a value")?;
        match token.kind {
            TokenKind::String(s) => Ok(Expr::Literal(Literal::String(s))),
            TokenKind::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            TokenKind::Minus => {
                let next = self.next_token("a number")?;
                match next.kind {
                    TokenKind::Number(n) => Ok(Expr::Literal(Literal::Number(format!("-{}", n)))),
                    other => Err(next
                        .position
                        .syntax_error(format!("expected a number after '-', found '{}'", other))),
                }
            }
            TokenKind::Placeholder => {
                let index = self.placeholders;
                self.placeholders += 1;
                Ok(Expr::Placeholder(index))
            }
            TokenKind::LBrace => {
                self.index -= 1;
                Ok(Expr::Map(self.parse_map()?))
            }
            TokenKind::LBracket => {
                self.enter_nested(token.position)?;
                let mut items = Vec::new();
                if !self.consume(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.consume(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RBracket)?;
                }
                self.depth -= 1;
                Ok(Expr::List(items))
            }
            ref kind if kind.is_keyword("TRUE") => Ok(Expr::Literal(Literal::Boolean(true))),
            ref kind if kind.is_keyword("FALSE") => Ok(Expr::Literal(Literal::Boolean(false))),
            ref kind if kind.is_keyword("NULL") => Ok(Expr::Literal(Literal::Null)),
            other => Err(token
                .position
                .syntax_error(format!("expected a value, found '{}'", other))),
        }
    }

    /// { 'key': value, ... }
    fn parse_map(&mut self) -> Result<Vec<(String, Expr)>> {
        let position = self.current_position();
        self.expect(&TokenKind::LBrace)?;
        self.enter_nested(position)?;
        let mut entries = Vec::new();
        if self.consume(&TokenKind::RBrace) {
            self.depth -= 1;
            return Ok(entries);
        }
        loop {
            let token = self.next_token("an attribute name")?;
            let name = match token.kind {
                TokenKind::String(s) => s,
                TokenKind::Word { value, .. } => value,
                other => {
                    return Err(token
                        .position
                        .syntax_error(format!("expected an attribute name, found '{}'", other)))
                }
            };
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expr()?;
            entries.push((name, value));
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        self.depth -= 1;
        Ok(entries)
    }

    /// Opens one map or list level; too deep a literal fails at its opening bracket
    fn enter_nested(&mut self, position: Position) -> Result<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(position.syntax_error(format!(
                "value nested deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        Ok(())
    }

    /// Quoted or unquoted identifier
    fn parse_identifier(&mut self, expected: &str) -> Result<String> {
        let token = self.next_token(expected)?;
        match token.kind {
            TokenKind::Word { value, .. } => Ok(value),
            other => Err(token
                .position
                .syntax_error(format!("expected {}, found '{}'", expected, other))),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn current_position(&self) -> Position {
        self.peek().map(|t| t.position).unwrap_or(self.end)
    }

    fn next_token(&mut self, expected: &str) -> Result<Token> {
        match self.tokens.get(self.index) {
            Some(token) => {
                self.index += 1;
                Ok(token.clone())
            }
            None => Err(self
                .end
                .syntax_error(format!("expected {}, found end of input", expected))),
        }
    }

    /// Consumes the next token if it equals `kind`
    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        let token = self.next_token(&format!("'{}'", kind))?;
        if &token.kind == kind {
            Ok(())
        } else {
            Err(token
                .position
                .syntax_error(format!("expected '{}', found '{}'", kind, token.kind)))
        }
    }

    /// Consumes the next token if it is `keyword`
    fn parse_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.kind.is_keyword(keyword)) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        let token = self.next_token(keyword)?;
        if token.kind.is_keyword(keyword) {
            Ok(())
        } else {
            Err(token
                .position
                .syntax_error(format!("expected {}, found '{}'", keyword, token.kind)))
        }
    }
}
