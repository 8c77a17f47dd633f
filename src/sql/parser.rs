//! SQL parser.
//!
//! Recursive descent for statements, precedence climbing for expressions.
//! Binding order, loosest to tightest: OR < AND < NOT < comparison <
//! additive (+ - ||) < multiplicative (* / %) < unary < primary.

use crate::value::ValueKind;

use super::ast::*;
use super::error::SyntaxError;
use super::lexer::Lexer;
use super::token::{Keyword, Token, TokenKind};

/// The SQL parser.
///
/// Owns a one-token lookahead (`current`); the rare second token of
/// lookahead (distinguishing `NOT IN` from a bare NOT) goes through the
/// lexer's save/restore peek.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Creates a parser over `input`.
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self { lexer, current }
    }

    /// Parses one statement.
    ///
    /// Returns `Ok(None)` when the input is empty (whitespace and comments
    /// only). Never panics; malformed input becomes a [`SyntaxError`]
    /// carrying the offending token and its position.
    pub fn parse(&mut self) -> Result<Option<Statement>, SyntaxError> {
        if self.current.is_eof() {
            return Ok(None);
        }
        let statement = self.parse_statement()?;
        self.consume(&TokenKind::Semicolon);
        if !self.current.is_eof() {
            return Err(SyntaxError::unexpected("end of statement", &self.current));
        }
        Ok(Some(statement))
    }

    // -- token plumbing ----------------------------------------------------

    /// Consumes the current token, returning it and pulling the next.
    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    /// The token after `current`, via lexer state save/restore.
    fn peek(&mut self) -> Token {
        self.lexer.peek_token()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current.kind == *kind
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, SyntaxError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(SyntaxError::unexpected(what, &self.current))
        }
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current.kind, TokenKind::Keyword(kw) if kw == keyword)
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), SyntaxError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(SyntaxError::unexpected(keyword.as_str(), &self.current))
        }
    }

    /// Accepts an identifier, or a non-reserved keyword doubling as one
    /// (so `key`, `date`, or `text` work as column and table names).
    fn identifier(&mut self, what: &str) -> Result<String, SyntaxError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenKind::Keyword(kw) if !kw.is_reserved() => {
                let name = kw.as_str().to_lowercase();
                self.advance();
                Ok(name)
            }
            _ => Err(SyntaxError::unexpected(what, &self.current)),
        }
    }

    // -- statements --------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        if self.consume_keyword(Keyword::Begin) {
            self.consume_keyword(Keyword::Transaction);
            return Ok(Statement::Begin);
        }
        if self.consume_keyword(Keyword::Commit) {
            return Ok(Statement::Commit);
        }
        if self.consume_keyword(Keyword::Rollback) {
            return Ok(Statement::Rollback);
        }
        if self.check_keyword(Keyword::Select) {
            let select = self.parse_select()?;
            return Ok(Statement::Select(Box::new(select)));
        }
        if self.consume_keyword(Keyword::Insert) {
            return self.parse_insert();
        }
        if self.consume_keyword(Keyword::Update) {
            return self.parse_update();
        }
        if self.consume_keyword(Keyword::Delete) {
            return self.parse_delete();
        }
        if self.consume_keyword(Keyword::Create) {
            if self.consume_keyword(Keyword::Table) {
                return self.parse_create_table();
            }
            let unique = self.consume_keyword(Keyword::Unique);
            if self.consume_keyword(Keyword::Index) {
                return self.parse_create_index(unique);
            }
            return Err(SyntaxError::unexpected("TABLE or INDEX", &self.current));
        }
        if self.consume_keyword(Keyword::Drop) {
            if self.consume_keyword(Keyword::Table) {
                let if_exists = self.parse_if_exists()?;
                let name = self.identifier("a table name")?;
                return Ok(Statement::DropTable(DropTableStmt { name, if_exists }));
            }
            if self.consume_keyword(Keyword::Index) {
                let if_exists = self.parse_if_exists()?;
                let name = self.identifier("an index name")?;
                return Ok(Statement::DropIndex(DropIndexStmt { name, if_exists }));
            }
            return Err(SyntaxError::unexpected("TABLE or INDEX", &self.current));
        }
        Err(SyntaxError::unexpected("a statement", &self.current))
    }

    fn parse_if_exists(&mut self) -> Result<bool, SyntaxError> {
        if self.consume_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Exists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_select(&mut self) -> Result<SelectStmt, SyntaxError> {
        self.expect_keyword(Keyword::Select)?;
        let distinct = self.consume_keyword(Keyword::Distinct);

        let mut columns = vec![self.parse_select_item()?];
        while self.consume(&TokenKind::Comma) {
            columns.push(self.parse_select_item()?);
        }

        let from = if self.consume_keyword(Keyword::From) {
            Some(self.parse_table_ref()?)
        } else {
            None
        };

        let where_clause = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.consume_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            group_by.push(self.parse_expr()?);
            while self.consume(&TokenKind::Comma) {
                group_by.push(self.parse_expr()?);
            }
        }

        let having = if self.consume_keyword(Keyword::Having) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.consume_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            loop {
                let expr = self.parse_expr()?;
                let desc = if self.consume_keyword(Keyword::Desc) {
                    true
                } else {
                    self.consume_keyword(Keyword::Asc);
                    false
                };
                order_by.push(OrderByItem { expr, desc });
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let limit = if self.consume_keyword(Keyword::Limit) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let offset = if self.consume_keyword(Keyword::Offset) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(SelectStmt {
            distinct,
            columns,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_item(&mut self) -> Result<SelectItem, SyntaxError> {
        if self.consume(&TokenKind::Asterisk) {
            return Ok(SelectItem::Wildcard);
        }
        let expr = self.parse_expr()?;
        let alias = if self.consume_keyword(Keyword::As) {
            Some(self.identifier("an alias")?)
        } else if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            None
        };
        Ok(SelectItem::Expr { expr, alias })
    }

    fn parse_table_ref(&mut self) -> Result<TableRef, SyntaxError> {
        let left = self.parse_base_table()?;
        if self.check_keyword(Keyword::Inner) || self.check_keyword(Keyword::Join) {
            self.consume_keyword(Keyword::Inner);
            self.expect_keyword(Keyword::Join)?;
            let right = self.parse_base_table()?;
            self.expect_keyword(Keyword::On)?;
            let on = self.parse_expr()?;
            if self.check_keyword(Keyword::Inner) || self.check_keyword(Keyword::Join) {
                return Err(SyntaxError::unexpected(
                    "end of FROM clause (one join per query)",
                    &self.current,
                ));
            }
            return Ok(TableRef::Join {
                left: Box::new(left),
                right: Box::new(right),
                on,
            });
        }
        Ok(left)
    }

    fn parse_base_table(&mut self) -> Result<TableRef, SyntaxError> {
        let name = self.identifier("a table name")?;
        let alias = if self.consume_keyword(Keyword::As) {
            Some(self.identifier("an alias")?)
        } else if let TokenKind::Identifier(alias) = &self.current.kind {
            let alias = alias.clone();
            self.advance();
            Some(alias)
        } else {
            None
        };
        Ok(TableRef::Table { name, alias })
    }

    fn parse_insert(&mut self) -> Result<Statement, SyntaxError> {
        self.expect_keyword(Keyword::Into)?;
        let table = self.identifier("a table name")?;

        let mut columns = Vec::new();
        if self.consume(&TokenKind::LParen) {
            columns.push(self.identifier("a column name")?);
            while self.consume(&TokenKind::Comma) {
                columns.push(self.identifier("a column name")?);
            }
            self.expect(TokenKind::RParen, "')'")?;
        }

        self.expect_keyword(Keyword::Values)?;
        let mut values = vec![self.parse_value_row()?];
        while self.consume(&TokenKind::Comma) {
            values.push(self.parse_value_row()?);
        }

        Ok(Statement::Insert(Box::new(InsertStmt {
            table,
            columns,
            values,
        })))
    }

    fn parse_value_row(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut row = vec![self.parse_expr()?];
        while self.consume(&TokenKind::Comma) {
            row.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(row)
    }

    fn parse_update(&mut self) -> Result<Statement, SyntaxError> {
        let table = self.identifier("a table name")?;
        self.expect_keyword(Keyword::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.identifier("a column name")?;
            self.expect(TokenKind::Eq, "'='")?;
            let value = self.parse_expr()?;
            assignments.push((column, value));
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        let where_clause = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(Statement::Update(Box::new(UpdateStmt {
            table,
            assignments,
            where_clause,
        })))
    }

    fn parse_delete(&mut self) -> Result<Statement, SyntaxError> {
        self.expect_keyword(Keyword::From)?;
        let table = self.identifier("a table name")?;
        let where_clause = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Statement::Delete(Box::new(DeleteStmt {
            table,
            where_clause,
        })))
    }

    fn parse_create_table(&mut self) -> Result<Statement, SyntaxError> {
        let if_not_exists = if self.consume_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            true
        } else {
            false
        };
        let name = self.identifier("a table name")?;

        self.expect(TokenKind::LParen, "'('")?;
        let mut columns = vec![self.parse_column_def()?];
        while self.consume(&TokenKind::Comma) {
            columns.push(self.parse_column_def()?);
        }
        self.expect(TokenKind::RParen, "')'")?;

        Ok(Statement::CreateTable(Box::new(CreateTableStmt {
            name,
            if_not_exists,
            columns,
        })))
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef, SyntaxError> {
        let name = self.identifier("a column name")?;
        let (kind, max_length) = self.parse_data_type()?;

        let mut def = ColumnDef {
            name,
            kind,
            max_length,
            not_null: false,
            primary_key: false,
            unique: false,
            default: None,
        };

        loop {
            if self.consume_keyword(Keyword::Primary) {
                self.expect_keyword(Keyword::Key)?;
                def.primary_key = true;
            } else if self.consume_keyword(Keyword::Not) {
                self.expect_keyword(Keyword::Null)?;
                def.not_null = true;
            } else if self.consume_keyword(Keyword::Unique) {
                def.unique = true;
            } else if self.consume_keyword(Keyword::Default) {
                def.default = Some(self.parse_expr()?);
            } else {
                return Ok(def);
            }
        }
    }

    fn parse_data_type(&mut self) -> Result<(ValueKind, u32), SyntaxError> {
        let TokenKind::Keyword(keyword) = self.current.kind else {
            return Err(SyntaxError::unexpected("a data type", &self.current));
        };
        let kind = match keyword {
            Keyword::Bool | Keyword::Boolean => ValueKind::Bool,
            Keyword::Tinyint => ValueKind::Int8,
            Keyword::Smallint => ValueKind::Int16,
            Keyword::Int | Keyword::Integer => ValueKind::Int32,
            Keyword::Bigint => ValueKind::Int64,
            Keyword::Real | Keyword::Float => ValueKind::Float32,
            Keyword::Double => {
                self.advance();
                self.consume_keyword(Keyword::Precision);
                return Ok((ValueKind::Float64, 0));
            }
            Keyword::Decimal | Keyword::Numeric => {
                self.advance();
                // Precision/scale are accepted and currently ignored.
                if self.consume(&TokenKind::LParen) {
                    self.expect_integer("a precision")?;
                    if self.consume(&TokenKind::Comma) {
                        self.expect_integer("a scale")?;
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                }
                return Ok((ValueKind::Decimal, 0));
            }
            Keyword::Char => return self.parse_char_type(ValueKind::Char),
            Keyword::Varchar => return self.parse_char_type(ValueKind::Varchar),
            Keyword::Text => ValueKind::Text,
            Keyword::Date => ValueKind::Date,
            Keyword::Time => ValueKind::Time,
            Keyword::Timestamp => ValueKind::Timestamp,
            Keyword::Json => ValueKind::Json,
            Keyword::Blob => ValueKind::Blob,
            _ => return Err(SyntaxError::unexpected("a data type", &self.current)),
        };
        self.advance();
        Ok((kind, 0))
    }

    fn parse_char_type(&mut self, kind: ValueKind) -> Result<(ValueKind, u32), SyntaxError> {
        self.advance();
        let mut max_length = 0;
        if self.consume(&TokenKind::LParen) {
            max_length = self.expect_integer("a length")? as u32;
            self.expect(TokenKind::RParen, "')'")?;
        }
        Ok((kind, max_length))
    }

    fn expect_integer(&mut self, what: &str) -> Result<i64, SyntaxError> {
        if let TokenKind::Integer(n) = self.current.kind {
            self.advance();
            Ok(n)
        } else {
            Err(SyntaxError::unexpected(what, &self.current))
        }
    }

    fn parse_create_index(&mut self, unique: bool) -> Result<Statement, SyntaxError> {
        let name = self.identifier("an index name")?;
        self.expect_keyword(Keyword::On)?;
        let table = self.identifier("a table name")?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut columns = vec![self.identifier("a column name")?];
        while self.consume(&TokenKind::Comma) {
            columns.push(self.identifier("a column name")?);
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(Statement::CreateIndex(CreateIndexStmt {
            name,
            table,
            columns,
            unique,
        }))
    }

    // -- expressions -------------------------------------------------------

    /// Parses an expression (the OR level).
    pub fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.consume_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_not()?;
        while self.consume_keyword(Keyword::And) {
            let right = self.parse_not()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, SyntaxError> {
        // `NOT IN` belongs to the comparison level, so only a NOT that is
        // not immediately followed by IN is a prefix operator here.
        if self.check_keyword(Keyword::Not)
            && !matches!(self.peek().kind, TokenKind::Keyword(Keyword::In))
        {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.parse_additive()?;

        if self.consume_keyword(Keyword::Is) {
            let negated = self.consume_keyword(Keyword::Not);
            self.expect_keyword(Keyword::Null)?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        if self.check_keyword(Keyword::Not)
            && matches!(self.peek().kind, TokenKind::Keyword(Keyword::In))
        {
            self.advance(); // NOT
            self.advance(); // IN
            let list = self.parse_paren_expr_list()?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
                negated: true,
            });
        }
        if self.consume_keyword(Keyword::In) {
            let list = self.parse_paren_expr_list()?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
                negated: false,
            });
        }

        let op = match self.current.kind {
            TokenKind::Eq => BinaryOperator::Eq,
            TokenKind::Neq => BinaryOperator::Neq,
            TokenKind::Lt => BinaryOperator::Lt,
            TokenKind::LtEq => BinaryOperator::LtEq,
            TokenKind::Gt => BinaryOperator::Gt,
            TokenKind::GtEq => BinaryOperator::GtEq,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_paren_expr_list(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut list = vec![self.parse_expr()?];
        while self.consume(&TokenKind::Comma) {
            list.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(list)
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                TokenKind::Concat => BinaryOperator::Concat,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Asterisk => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::Percent => BinaryOperator::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.current.kind {
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Plus => UnaryOperator::Plus,
            _ => return self.parse_primary(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.current.kind.clone() {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Integer(n))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Float(n))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::String(s))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Boolean(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Boolean(false))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                self.parse_identifier_tail(name)
            }
            // Non-reserved keywords double as column names and function
            // names in expression position.
            TokenKind::Keyword(kw) if !kw.is_reserved() => {
                self.advance();
                self.parse_identifier_tail(kw.as_str().to_lowercase())
            }
            _ => Err(SyntaxError::unexpected("an expression", &self.current)),
        }
    }

    /// Continues a primary that started with an identifier: a qualified
    /// column (`t.c`), a function call (`f(...)`), or a bare column.
    fn parse_identifier_tail(&mut self, name: String) -> Result<Expr, SyntaxError> {
        if self.consume(&TokenKind::Dot) {
            let column = self.identifier("a column name")?;
            return Ok(Expr::Column {
                table: Some(name),
                name: column,
            });
        }

        if self.consume(&TokenKind::LParen) {
            let name = name.to_uppercase();
            if self.consume(&TokenKind::Asterisk) {
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(Expr::Function {
                    name,
                    args: vec![],
                    distinct: false,
                    star: true,
                });
            }
            if self.consume(&TokenKind::RParen) {
                return Ok(Expr::Function {
                    name,
                    args: vec![],
                    distinct: false,
                    star: false,
                });
            }
            let distinct = self.consume_keyword(Keyword::Distinct);
            let mut args = vec![self.parse_expr()?];
            while self.consume(&TokenKind::Comma) {
                args.push(self.parse_expr()?);
            }
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::Function {
                name,
                args,
                distinct,
                star: false,
            });
        }

        Ok(Expr::Column { table: None, name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Statement {
        Parser::new(sql)
            .parse()
            .unwrap_or_else(|e| panic!("parse failed for {sql:?}: {e}"))
            .expect("statement expected")
    }

    fn parse_err(sql: &str) -> SyntaxError {
        match Parser::new(sql).parse() {
            Err(e) => e,
            Ok(stmt) => panic!("expected error for {sql:?}, got {stmt:?}"),
        }
    }

    #[test]
    fn test_empty_input_is_none() {
        assert_eq!(Parser::new("").parse().unwrap(), None);
        assert_eq!(Parser::new("  -- nothing\n").parse().unwrap(), None);
    }

    #[test]
    fn test_select_basic() {
        let Statement::Select(select) = parse("SELECT id, age FROM users WHERE age > 25;") else {
            panic!("expected SELECT");
        };
        assert_eq!(select.columns.len(), 2);
        assert_eq!(
            select.from,
            Some(TableRef::Table {
                name: "users".into(),
                alias: None
            })
        );
        assert_eq!(
            select.where_clause,
            Some(Expr::BinaryOp {
                left: Box::new(Expr::Column {
                    table: None,
                    name: "age".into()
                }),
                op: BinaryOperator::Gt,
                right: Box::new(Expr::Integer(25)),
            })
        );
    }

    #[test]
    fn test_select_all_clauses() {
        let Statement::Select(select) = parse(
            "SELECT DISTINCT cat, COUNT(val) FROM t WHERE val > 0 GROUP BY cat \
             HAVING COUNT(val) > 1 ORDER BY cat DESC LIMIT 10 OFFSET 5",
        ) else {
            panic!("expected SELECT");
        };
        assert!(select.distinct);
        assert_eq!(select.group_by.len(), 1);
        assert!(select.having.is_some());
        assert_eq!(select.order_by.len(), 1);
        assert!(select.order_by[0].desc);
        assert_eq!(select.limit, Some(Expr::Integer(10)));
        assert_eq!(select.offset, Some(Expr::Integer(5)));
    }

    #[test]
    fn test_select_without_from_is_error() {
        // The motivating negative case: the offending token is FROM.
        let err = parse_err("SELECT FROM users;");
        assert_eq!(err.token, "FROM");
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 8);
    }

    #[test]
    fn test_select_join() {
        let Statement::Select(select) =
            parse("SELECT u.id, o.total FROM users u JOIN orders o ON u.id = o.user_id")
        else {
            panic!("expected SELECT");
        };
        let Some(TableRef::Join { left, right, .. }) = select.from else {
            panic!("expected a join");
        };
        assert_eq!(
            *left,
            TableRef::Table {
                name: "users".into(),
                alias: Some("u".into())
            }
        );
        assert_eq!(
            *right,
            TableRef::Table {
                name: "orders".into(),
                alias: Some("o".into())
            }
        );
    }

    #[test]
    fn test_insert_multi_row() {
        let Statement::Insert(insert) =
            parse("INSERT INTO users (id, age) VALUES (1, 20), (2, 30), (3, 40)")
        else {
            panic!("expected INSERT");
        };
        assert_eq!(insert.table, "users");
        assert_eq!(insert.columns, vec!["id", "age"]);
        assert_eq!(insert.values.len(), 3);
        assert_eq!(insert.values[1], vec![Expr::Integer(2), Expr::Integer(30)]);
    }

    #[test]
    fn test_insert_without_columns() {
        let Statement::Insert(insert) = parse("INSERT INTO t VALUES (1, 'x')") else {
            panic!("expected INSERT");
        };
        assert!(insert.columns.is_empty());
        assert_eq!(insert.values.len(), 1);
    }

    #[test]
    fn test_update() {
        let Statement::Update(update) = parse("UPDATE users SET age = age + 1 WHERE id = 3")
        else {
            panic!("expected UPDATE");
        };
        assert_eq!(update.table, "users");
        assert_eq!(update.assignments.len(), 1);
        assert_eq!(update.assignments[0].0, "age");
        assert!(update.where_clause.is_some());
    }

    #[test]
    fn test_delete() {
        let Statement::Delete(delete) = parse("DELETE FROM users WHERE id = 3") else {
            panic!("expected DELETE");
        };
        assert_eq!(delete.table, "users");
        assert!(delete.where_clause.is_some());
    }

    #[test]
    fn test_create_table() {
        let Statement::CreateTable(create) = parse(
            "CREATE TABLE IF NOT EXISTS users (\
               id BIGINT PRIMARY KEY, \
               name VARCHAR(64) NOT NULL, \
               email TEXT UNIQUE, \
               age INT DEFAULT 0)",
        ) else {
            panic!("expected CREATE TABLE");
        };
        assert!(create.if_not_exists);
        assert_eq!(create.columns.len(), 4);
        assert!(create.columns[0].primary_key);
        assert_eq!(create.columns[0].kind, ValueKind::Int64);
        assert!(create.columns[1].not_null);
        assert_eq!(create.columns[1].max_length, 64);
        assert!(create.columns[2].unique);
        assert_eq!(create.columns[3].default, Some(Expr::Integer(0)));
    }

    #[test]
    fn test_create_table_keyword_column_names() {
        let Statement::CreateTable(create) = parse("CREATE TABLE t (key INT, date DATE)") else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(create.columns[0].name, "key");
        assert_eq!(create.columns[1].name, "date");
    }

    #[test]
    fn test_double_precision() {
        let Statement::CreateTable(create) = parse("CREATE TABLE t (x DOUBLE PRECISION)") else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(create.columns[0].kind, ValueKind::Float64);
    }

    #[test]
    fn test_create_and_drop_index() {
        let Statement::CreateIndex(create) = parse("CREATE UNIQUE INDEX idx_email ON users (email)")
        else {
            panic!("expected CREATE INDEX");
        };
        assert!(create.unique);
        assert_eq!(create.table, "users");
        assert_eq!(create.columns, vec!["email"]);

        assert_eq!(
            parse("DROP INDEX IF EXISTS idx_email"),
            Statement::DropIndex(DropIndexStmt {
                name: "idx_email".into(),
                if_exists: true,
            })
        );
        assert_eq!(
            parse("DROP TABLE users"),
            Statement::DropTable(DropTableStmt {
                name: "users".into(),
                if_exists: false,
            })
        );
    }

    #[test]
    fn test_transaction_statements() {
        assert_eq!(parse("BEGIN"), Statement::Begin);
        assert_eq!(parse("BEGIN TRANSACTION"), Statement::Begin);
        assert_eq!(parse("COMMIT"), Statement::Commit);
        assert_eq!(parse("ROLLBACK"), Statement::Rollback);
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let Statement::Select(select) = parse("SELECT 1 + 2 * 3") else {
            panic!();
        };
        let SelectItem::Expr { expr, .. } = &select.columns[0] else {
            panic!();
        };
        assert_eq!(
            expr.to_string(),
            "(1 + (2 * 3))"
        );

        // a OR b AND c parses as a OR (b AND c)
        let Statement::Select(select) = parse("SELECT a OR b AND c") else {
            panic!();
        };
        let SelectItem::Expr { expr, .. } = &select.columns[0] else {
            panic!();
        };
        assert_eq!(expr.to_string(), "(a OR (b AND c))");

        // NOT binds looser than comparison: NOT x = y is NOT (x = y)
        let Statement::Select(select) = parse("SELECT NOT x = y") else {
            panic!();
        };
        let SelectItem::Expr { expr, .. } = &select.columns[0] else {
            panic!();
        };
        assert_eq!(expr.to_string(), "(NOT (x = y))");
    }

    #[test]
    fn test_is_null_and_in() {
        let Statement::Select(select) =
            parse("SELECT x IS NULL, y IS NOT NULL, z IN (1, 2), w NOT IN (3)")
        else {
            panic!();
        };
        let texts: Vec<String> = select.columns.iter().map(|c| c.to_string()).collect();
        assert_eq!(texts[0], "(x IS NULL)");
        assert_eq!(texts[1], "(y IS NOT NULL)");
        assert_eq!(texts[2], "(z IN (1, 2))");
        assert_eq!(texts[3], "(w NOT IN (3))");
    }

    #[test]
    fn test_function_calls() {
        let Statement::Select(select) =
            parse("SELECT COUNT(*), count(val), SUM(DISTINCT x), upper(name)")
        else {
            panic!();
        };
        let texts: Vec<String> = select.columns.iter().map(|c| c.to_string()).collect();
        // Function names normalize to upper-case.
        assert_eq!(texts[0], "COUNT(*)");
        assert_eq!(texts[1], "COUNT(val)");
        assert_eq!(texts[2], "SUM(DISTINCT x)");
        assert_eq!(texts[3], "UPPER(name)");
    }

    #[test]
    fn test_int_vs_float_literals_preserved() {
        let Statement::Select(select) = parse("SELECT 2, 2.0") else {
            panic!();
        };
        let SelectItem::Expr { expr: a, .. } = &select.columns[0] else {
            panic!();
        };
        let SelectItem::Expr { expr: b, .. } = &select.columns[1] else {
            panic!();
        };
        assert_eq!(*a, Expr::Integer(2));
        assert_eq!(*b, Expr::Float(2.0));
    }

    #[test]
    fn test_error_reports_position() {
        let err = parse_err("SELECT id FROM");
        assert_eq!(err.token, "end of input");

        let err = parse_err("SELECT * FROM users WHERE");
        assert_eq!(err.token, "end of input");

        let err = parse_err("INSERT INTO t VALUES (1");
        assert_eq!(err.token, "end of input");

        let err = parse_err("CREATE VIEW v");
        assert_eq!(err.token, "VIEW");
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let err = parse_err("SELECT 1; SELECT 2");
        assert_eq!(err.token, "SELECT");
    }

    #[test]
    fn test_roundtrip_canonical_statements() {
        // parse -> to_string -> parse must yield a structurally equal AST.
        let statements = [
            "SELECT id FROM users WHERE (age > 25)",
            "SELECT DISTINCT cat, COUNT(val) FROM t GROUP BY cat HAVING (COUNT(val) > 1) \
             ORDER BY cat DESC LIMIT 10 OFFSET 5",
            "SELECT u.id FROM users AS u JOIN orders AS o ON (u.id = o.user_id)",
            "INSERT INTO users (id, age) VALUES (1, 20), (2, 30)",
            "UPDATE users SET age = (age + 1) WHERE (id = 3)",
            "DELETE FROM users WHERE ((id = 3) OR (id IS NULL))",
            "CREATE TABLE users (id BIGINT PRIMARY KEY, name VARCHAR(64) NOT NULL)",
            "CREATE UNIQUE INDEX idx ON users (email)",
            "DROP TABLE IF EXISTS users",
            "DROP INDEX idx",
            "BEGIN",
            "COMMIT",
            "ROLLBACK",
            "SELECT ('a' || 'b'), (1 + 2.5), (- x)",
        ];
        for sql in statements {
            let first = Parser::new(sql)
                .parse()
                .unwrap_or_else(|e| panic!("parse failed for {sql:?}: {e}"))
                .unwrap();
            let printed = first.to_string();
            let second = Parser::new(&printed)
                .parse()
                .unwrap_or_else(|e| panic!("reparse failed for {printed:?}: {e}"))
                .unwrap();
            assert_eq!(first, second, "round trip changed {sql:?} -> {printed:?}");
        }
    }
}
