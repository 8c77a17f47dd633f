//! SQL front-end: lexer, parser, and the AST.
//!
//! The lexer is a hand-written single pass producing tokens that carry the
//! line and column of their first character. The parser is recursive
//! descent for statements with precedence climbing for expressions. Parse
//! failures never panic; they surface as a [`SyntaxError`] naming the
//! offending token and its position.

mod ast;
mod error;
mod lexer;
mod parser;
mod token;

pub use ast::{
    is_aggregate_name, BinaryOperator, ColumnDef, CreateIndexStmt, CreateTableStmt, DeleteStmt, DropIndexStmt,
    DropTableStmt, Expr, InsertStmt, OrderByItem, SelectItem, SelectStmt, Statement, TableRef,
    UnaryOperator, UpdateStmt,
};
pub use error::SyntaxError;
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Keyword, Pos, Token, TokenKind};

/// Parses one SQL statement.
///
/// Returns `Ok(None)` when the input is only whitespace and comments.
pub fn parse(sql: &str) -> Result<Option<Statement>, SyntaxError> {
    Parser::new(sql).parse()
}
