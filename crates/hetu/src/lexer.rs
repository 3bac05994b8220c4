//! Source text → token stream (spec §4.2).

use std::rc::Rc;

use crate::errors::{ErrorKind, HResult, HetuError};
use crate::intern::Interner;
use crate::lexicon::Keyword;
use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a [u8],
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    file: Rc<str>,
    interner: &'a mut Interner,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: Rc<str>, interner: &'a mut Interner) -> Self {
        Self { source: source.as_bytes(), chars: source.chars().collect(), pos: 0, line: 1, column: 1, file, interner }
    }

    /// Lexes the entire input, returning an ordered token list terminated by
    /// end-of-file (spec §4.2).
    pub fn tokenize(mut self) -> HResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let span = self.span_here();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, span));
                break;
            };

            if is_ident_start(c) {
                tokens.push(self.lex_identifier(span));
                continue;
            }
            if c.is_ascii_digit() {
                tokens.push(self.lex_number(span)?);
                continue;
            }
            if c == '"' || c == '\'' {
                tokens.push(self.lex_string(span, c)?);
                continue;
            }
            tokens.push(self.lex_operator(span)?);
        }
        Ok(tokens)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek_at(1) == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_identifier(&mut self, span: Span) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let kind = match text.as_str() {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "null" => TokenKind::Null,
            _ => match Keyword::lookup(&text) {
                Some(kw) => TokenKind::Keyword(kw),
                None => TokenKind::Identifier(self.interner.intern(&text)),
            },
        };
        Token::new(kind, span)
    }

    fn lex_number(&mut self, span: Span) -> HResult<Token> {
        let start = self.pos;
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    self.advance();
                } else {
                    break;
                }
            }
            let text: String = self.chars[start + 2..self.pos].iter().collect();
            let value = i64::from_str_radix(&text, 16).unwrap_or(0) as f64;
            return Ok(Token::new(TokenKind::Number(value), span));
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let value: f64 = text.parse().map_err(|_| {
            self.error(ErrorKind::UnexpectedCharacter, span.clone(), format!("invalid numeric literal `{text}`"))
        })?;
        Ok(Token::new(TokenKind::Number(value), span))
    }

    fn lex_string(&mut self, span: Span, quote: char) -> HResult<Token> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error(
                        ErrorKind::UnterminatedString,
                        span,
                        "unterminated string literal".to_string(),
                    ));
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('\\') => value.push('\\'),
                        Some('0') => value.push('\0'),
                        Some(other) => value.push(other),
                        None => {
                            return Err(self.error(
                                ErrorKind::UnterminatedString,
                                span,
                                "unterminated string literal".to_string(),
                            ));
                        }
                    }
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Ok(Token::new(TokenKind::Str(self.interner.intern(&value)), span))
    }

    fn lex_operator(&mut self, span: Span) -> HResult<Token> {
        // Longest match first (spec §4.2): `...`, `||`, `&&`, `==`, `!=`, `<=`, `>=`.
        if self.matches_str("...") {
            return Ok(Token::new(TokenKind::Ellipsis, span));
        }
        let two = (self.peek(), self.peek_at(1));
        let kind = match two {
            (Some('|'), Some('|')) => {
                self.advance();
                self.advance();
                TokenKind::OrOr
            }
            (Some('&'), Some('&')) => {
                self.advance();
                self.advance();
                TokenKind::AndAnd
            }
            (Some('='), Some('=')) => {
                self.advance();
                self.advance();
                TokenKind::EqEq
            }
            (Some('!'), Some('=')) => {
                self.advance();
                self.advance();
                TokenKind::NotEq
            }
            (Some('<'), Some('=')) => {
                self.advance();
                self.advance();
                TokenKind::Le
            }
            (Some('>'), Some('=')) => {
                self.advance();
                self.advance();
                TokenKind::Ge
            }
            _ => {
                let c = self.peek().expect("checked by caller");
                self.advance();
                match c {
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    '%' => TokenKind::Percent,
                    '<' => TokenKind::Lt,
                    '>' => TokenKind::Gt,
                    '!' => TokenKind::Bang,
                    '=' => TokenKind::Eq,
                    '.' => TokenKind::Dot,
                    ',' => TokenKind::Comma,
                    ':' => TokenKind::Colon,
                    ';' => TokenKind::Semicolon,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    other => {
                        return Err(self.error(
                            ErrorKind::UnexpectedCharacter,
                            span,
                            format!("unexpected character `{other}`"),
                        ));
                    }
                }
            }
        };
        Ok(Token::new(kind, span))
    }

    fn matches_str(&mut self, s: &str) -> bool {
        let chars: Vec<char> = s.chars().collect();
        for (i, expected) in chars.iter().enumerate() {
            if self.peek_at(i) != Some(*expected) {
                return false;
            }
        }
        for _ in 0..chars.len() {
            self.advance();
        }
        true
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn span_here(&self) -> Span {
        Span::new(Rc::clone(&self.file), self.line, self.column)
    }

    fn error(&self, kind: ErrorKind, span: Span, message: String) -> HetuError {
        let _ = self.source; // byte form retained for future UTF-8 diagnostics
        HetuError::new(kind, span.file, span.line, span.column, message)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<TokenKind> {
        let mut interner = Interner::new();
        let file: Rc<str> = Rc::from("test.ht");
        Lexer::new(src, file, &mut interner).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let kinds = lex("var year = 2020");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(Keyword::Var),
                TokenKind::Identifier(Rc::from("year")),
                TokenKind::Eq,
                TokenKind::Number(2020.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn longest_match_operators() {
        let kinds = lex("a != b && c || d <= e");
        assert!(kinds.contains(&TokenKind::NotEq));
        assert!(kinds.contains(&TokenKind::AndAnd));
        assert!(kinds.contains(&TokenKind::OrOr));
        assert!(kinds.contains(&TokenKind::Le));
    }

    #[test]
    fn hex_and_decimal_numbers() {
        let kinds = lex("0xFF 3.14");
        assert_eq!(kinds[0], TokenKind::Number(255.0));
        assert_eq!(kinds[1], TokenKind::Number(3.14));
    }

    #[test]
    fn string_escapes() {
        let kinds = lex(r#"'hi\n' "world""#);
        assert_eq!(kinds[0], TokenKind::Str(Rc::from("hi\n")));
        assert_eq!(kinds[1], TokenKind::Str(Rc::from("world")));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut interner = Interner::new();
        let file: Rc<str> = Rc::from("test.ht");
        let result = Lexer::new("'oops", file, &mut interner).tokenize();
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind, ErrorKind::UnterminatedString);
    }

    #[test]
    fn comments_are_discarded() {
        let kinds = lex("// comment\nvar /* inline */ x = 1");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(Keyword::Var),
                TokenKind::Identifier(Rc::from("x")),
                TokenKind::Eq,
                TokenKind::Number(1.0),
                TokenKind::Eof,
            ]
        );
    }
}
