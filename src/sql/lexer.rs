//! SQL lexer.
//!
//! Single-pass and hand-written. Skips whitespace and `--` line comments;
//! tracks the 1-based line and column of every token's first character.
//! Strings may be single- or double-quoted and understand the backslash
//! escapes `\n \t \r \' \" \\`.

use super::token::{Keyword, Pos, Token, TokenKind};

/// Saved lexer position, used to implement peeking by state restore.
#[derive(Debug, Clone, Copy)]
pub struct LexerState {
    pos: usize,
    line: u32,
    column: u32,
}

/// The SQL lexer.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `input`.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Saves the current position.
    pub fn save(&self) -> LexerState {
        LexerState {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    /// Restores a previously saved position.
    pub fn restore(&mut self, state: LexerState) {
        self.pos = state.pos;
        self.line = state.line;
        self.column = state.column;
    }

    /// Returns the next token without consuming it.
    ///
    /// Implemented by save/advance/restore rather than by buffering a
    /// current token; the parser owns the one-token lookahead.
    pub fn peek_token(&mut self) -> Token {
        let state = self.save();
        let token = self.next_token();
        self.restore(state);
        token
    }

    /// Returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let pos = Pos::new(self.line, self.column);

        let Some(ch) = self.current_char() else {
            return Token::new(TokenKind::Eof, pos);
        };

        if ch == '\'' || ch == '"' {
            return self.scan_string(ch, pos);
        }

        if ch.is_ascii_digit()
            || (ch == '.' && self.peek_char().is_some_and(|c| c.is_ascii_digit()))
        {
            return self.scan_number(pos);
        }

        if is_ident_start(ch) {
            return self.scan_identifier_or_keyword(pos);
        }

        self.scan_operator_or_delimiter(pos)
    }

    /// Tokenizes the whole input, ending with an EOF token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.input[self.pos..].starts_with(prefix)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.current_char().is_some_and(char::is_whitespace) {
                self.advance();
            }
            // Line comment: -- to end of line.
            if self.starts_with("--") {
                while let Some(ch) = self.advance() {
                    if ch == '\n' {
                        break;
                    }
                }
                continue;
            }
            return;
        }
    }

    fn scan_string(&mut self, quote: char, pos: Pos) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    // Unterminated string: surface what was read with an
                    // error marker so the parser reports the position.
                    return Token::new(TokenKind::Error(format!("{quote}{value}")), pos);
                }
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\'') => value.push('\''),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    // Unknown escapes keep the escaped character.
                    Some(other) => value.push(other),
                    None => {
                        return Token::new(TokenKind::Error(format!("{quote}{value}")), pos);
                    }
                },
                Some(ch) if ch == quote => return Token::new(TokenKind::String(value), pos),
                Some(ch) => value.push(ch),
            }
        }
    }

    fn scan_number(&mut self, pos: Pos) -> Token {
        let start = self.pos;
        let mut is_float = false;

        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.current_char() == Some('.')
            && self.peek_char().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if let Some('e' | 'E') = self.current_char() {
            if matches!(self.peek_char(), Some(c) if c.is_ascii_digit() || c == '+' || c == '-') {
                is_float = true;
                self.advance();
                if let Some('+' | '-') = self.current_char() {
                    self.advance();
                }
                while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = &self.input[start..self.pos];
        if is_float {
            match text.parse::<f64>() {
                Ok(n) => Token::new(TokenKind::Float(n), pos),
                Err(_) => Token::new(TokenKind::Error(text.to_string()), pos),
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => Token::new(TokenKind::Integer(n), pos),
                Err(_) => Token::new(TokenKind::Error(text.to_string()), pos),
            }
        }
    }

    fn scan_identifier_or_keyword(&mut self, pos: Pos) -> Token {
        let start = self.pos;
        while self.current_char().is_some_and(is_ident_continue) {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        match Keyword::parse(text) {
            Some(keyword) => Token::new(TokenKind::Keyword(keyword), pos),
            None => Token::new(TokenKind::Identifier(text.to_string()), pos),
        }
    }

    fn scan_operator_or_delimiter(&mut self, pos: Pos) -> Token {
        // Two-character operators first.
        for (text, kind) in [
            ("<>", TokenKind::Neq),
            ("!=", TokenKind::Neq),
            ("<=", TokenKind::LtEq),
            (">=", TokenKind::GtEq),
            ("||", TokenKind::Concat),
        ] {
            if self.starts_with(text) {
                self.advance();
                self.advance();
                return Token::new(kind, pos);
            }
        }

        let ch = self.advance().expect("caller checked for EOF");
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Asterisk,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => TokenKind::Eq,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            other => TokenKind::Error(other.to_string()),
        };
        Token::new(kind, pos)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("   \n\t "), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("SELECT id FROM users"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Identifier("id".into()),
                TokenKind::Keyword(Keyword::From),
                TokenKind::Identifier("users".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("select SeLeCt"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_preserve_int_vs_float() {
        assert_eq!(
            kinds("42 3.14 1e3 2.5e-3 0"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Float(3.14),
                TokenKind::Float(1e3),
                TokenKind::Float(2.5e-3),
                TokenKind::Integer(0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_single_and_double_quoted() {
        assert_eq!(
            kinds(r#"'hello' "world""#),
            vec![
                TokenKind::String("hello".into()),
                TokenKind::String("world".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r"'a\nb\t\'c\\'"),
            vec![TokenKind::String("a\nb\t'c\\".into()), TokenKind::Eof]
        );
        assert_eq!(
            kinds(r#"'say \"hi\"'"#),
            vec![TokenKind::String("say \"hi\"".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string_is_error_token() {
        let tokens = Lexer::new("'oops").tokenize();
        assert!(matches!(tokens[0].kind, TokenKind::Error(_)));
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("= <> != < <= > >= + - * / % ||"),
            vec![
                TokenKind::Eq,
                TokenKind::Neq,
                TokenKind::Neq,
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Asterisk,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Concat,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(
            kinds("( ) , ; . :"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Dot,
                TokenKind::Colon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_line_comments_skipped() {
        assert_eq!(
            kinds("SELECT -- the select list\n1"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Integer(1),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("-- only a comment"), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_line_and_column_tracking() {
        let tokens = Lexer::new("SELECT id\n  FROM users").tokenize();
        assert_eq!(tokens[0].pos, Pos::new(1, 1)); // SELECT
        assert_eq!(tokens[1].pos, Pos::new(1, 8)); // id
        assert_eq!(tokens[2].pos, Pos::new(2, 3)); // FROM
        assert_eq!(tokens[3].pos, Pos::new(2, 8)); // users
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new("SELECT 1");
        let peeked = lexer.peek_token();
        assert_eq!(peeked.kind, TokenKind::Keyword(Keyword::Select));
        let next = lexer.next_token();
        assert_eq!(next.kind, TokenKind::Keyword(Keyword::Select));
        assert_eq!(lexer.next_token().kind, TokenKind::Integer(1));
    }

    #[test]
    fn test_unexpected_character() {
        let tokens = Lexer::new("SELECT @").tokenize();
        assert_eq!(tokens[1].kind, TokenKind::Error("@".into()));
    }

    #[test]
    fn test_dot_between_identifiers() {
        assert_eq!(
            kinds("users.id"),
            vec![
                TokenKind::Identifier("users".into()),
                TokenKind::Dot,
                TokenKind::Identifier("id".into()),
                TokenKind::Eof,
            ]
        );
    }
}
