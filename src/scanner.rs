//! Lexical analyzer.

use crate::diag::LexError;
use crate::token::{self, Token, TokenKind};

/// Turn a source buffer into a token sequence.
///
/// Lexical faults do not stop the scan; they are collected and returned
/// alongside whatever tokens could still be produced. An `EOF` token is
/// always last.
pub fn scan(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut scanner = Scanner::new(source);
    scanner.scan_tokens();
    (scanner.tokens, scanner.errors)
}

struct Scanner<'s> {
    source: &'s str,
    bytes: &'s [u8],
    tokens: Vec<Token>,
    errors: Vec<LexError>,

    start: usize,
    current: usize,
    line: u32,
}

impl<'s> Scanner<'s> {
    fn new(source: &str) -> Scanner<'_> {
        Scanner {
            source,
            bytes: source.as_bytes(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    fn scan_tokens(&mut self) {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }
        self.tokens
            .push(Token::new(TokenKind::Eof, "", None, self.line));
    }

    fn scan_token(&mut self) {
        let ch = self.advance();
        match ch {
            b':' => self.add_token(TokenKind::Colon),
            b';' => self.add_token(TokenKind::Semicolon),
            b'(' => self.add_token(TokenKind::LeftParen),
            b')' => self.add_token(TokenKind::RightParen),
            b'[' => self.add_token(TokenKind::LeftBracket),
            b']' => self.add_token(TokenKind::RightBracket),
            b'{' => self.add_token(TokenKind::LeftBrace),
            b'}' => self.add_token(TokenKind::RightBrace),
            b',' => self.add_token(TokenKind::Comma),
            b'.' => self.add_token(TokenKind::Dot),
            b'-' => self.add_token(TokenKind::Minus),
            b'+' => self.add_token(TokenKind::Plus),
            b'*' => self.add_token(TokenKind::Star),
            b'=' => {
                let kind = if self.match_byte(b'=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.add_token(kind);
            }
            b'!' => {
                let kind = if self.match_byte(b'=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind);
            }
            b'<' => {
                let kind = if self.match_byte(b'=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            b'>' => {
                let kind = if self.match_byte(b'=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind);
            }
            b'/' => {
                if self.match_byte(b'/') {
                    // A comment goes until the end of the line.
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }
            b'"' => self.string(),
            b' ' | b'\r' | b'\t' => (),
            b'\n' => self.line += 1,
            _ if ch.is_ascii_digit() => self.number(),
            _ if is_alpha(ch) => self.identifier(),
            _ => self.errors.push(LexError::new(
                self.line,
                format!("Unexpected character: {}", ch as char),
            )),
        }
    }

    fn string(&mut self) {
        while self.peek() != b'"' && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.errors
                .push(LexError::new(self.line, "Unterminated string."));
            return;
        }

        // The closing quote.
        self.advance();

        let value = self.source[self.start + 1..self.current - 1].to_string();
        self.add_literal_token(TokenKind::Str, value);
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A fractional part needs a digit after the dot.
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let value: f64 = self.source[self.start..self.current]
            .parse()
            .unwrap_or_default();
        self.add_literal_token(TokenKind::Number, token::number_literal(value));
    }

    fn identifier(&mut self) {
        while is_alphanumeric(self.peek()) {
            self.advance();
        }

        let text = &self.source[self.start..self.current];
        let kind = token::keyword(text).unwrap_or(TokenKind::Identifier);
        self.add_token(kind);
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme = &self.source[self.start..self.current];
        self.tokens.push(Token::new(kind, lexeme, None, self.line));
    }

    fn add_literal_token(&mut self, kind: TokenKind, literal: String) {
        let lexeme = &self.source[self.start..self.current];
        self.tokens
            .push(Token::new(kind, lexeme, Some(literal), self.line));
    }

    fn advance(&mut self) -> u8 {
        let ch = self.bytes[self.current];
        self.current += 1;
        ch
    }

    fn match_byte(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.bytes[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.bytes[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.bytes.len() {
            0
        } else {
            self.bytes[self.current + 1]
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }
}

fn is_alpha(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_alphanumeric(ch: u8) -> bool {
    is_alpha(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let (tokens, errors) = scan(input);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_input_yields_only_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn fixed_tokens() {
        assert_eq!(
            kinds("+-*/()[]{},.;: = == ! != < <= > >="),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Semicolon,
                TokenKind::Colon,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators_are_greedy() {
        // "===" is "==" then "=".
        assert_eq!(
            kinds("==="),
            vec![TokenKind::EqualEqual, TokenKind::Equal, TokenKind::Eof]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        let (tokens, _) = scan("var foo while whale _bar t42");
        let expected = [
            (TokenKind::Var, "var"),
            (TokenKind::Identifier, "foo"),
            (TokenKind::While, "while"),
            (TokenKind::Identifier, "whale"),
            (TokenKind::Identifier, "_bar"),
            (TokenKind::Identifier, "t42"),
            (TokenKind::Eof, ""),
        ];
        for (token, (kind, lexeme)) in tokens.iter().zip(expected) {
            assert_eq!(token.kind, kind);
            assert_eq!(token.lexeme, lexeme);
        }
    }

    #[test]
    fn number_literals_are_canonicalized() {
        let (tokens, errors) = scan("1 42 3.14 0.5");
        assert!(errors.is_empty());
        let literals: Vec<_> = tokens[..4]
            .iter()
            .map(|t| t.literal.clone().unwrap())
            .collect();
        assert_eq!(literals, vec!["1.0", "42.0", "3.14", "0.5"]);
        assert_eq!(tokens[0].lexeme, "1");
    }

    #[test]
    fn trailing_dot_is_not_part_of_a_number() {
        assert_eq!(
            kinds("1."),
            vec![TokenKind::Number, TokenKind::Dot, TokenKind::Eof]
        );
    }

    #[test]
    fn string_literal_drops_quotes() {
        let (tokens, errors) = scan("\"hello\"");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "\"hello\"");
        assert_eq!(tokens[0].literal.as_deref(), Some("hello"));
    }

    #[test]
    fn strings_may_span_lines() {
        let (tokens, errors) = scan("\"a\nb\" 1");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].literal.as_deref(), Some("a\nb"));
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let (tokens, errors) = scan("\"oops");
        assert_eq!(tokens.len(), 1); // just EOF
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "[line: 1] Error: Unterminated string.");
    }

    #[test]
    fn comments_and_whitespace_are_ignored() {
        assert_eq!(
            kinds("true // false\nnil"),
            vec![TokenKind::True, TokenKind::Nil, TokenKind::Eof]
        );
    }

    #[test]
    fn unexpected_character_does_not_stop_the_scan() {
        let (tokens, errors) = scan("1 @ 2 #");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]
        );
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0].to_string(),
            "[line: 1] Error: Unexpected character: @"
        );
    }

    #[test]
    fn line_numbers_are_monotonic() {
        let (tokens, _) = scan("1\n2 3\n\n4");
        let lines: Vec<_> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 2, 4, 4]);
        assert!(lines.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn lexemes_reconstruct_the_source_without_blanks() {
        let source = "var x = 1; // init\nprint x + 2;";
        let stripped: String = source
            .replace("// init", "")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let (tokens, errors) = scan(source);
        assert!(errors.is_empty());
        let joined: String = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(joined, stripped);
    }

    #[test]
    fn eof_is_always_last() {
        for input in ["", "1 + 2", "@", "\"open"] {
            let (tokens, _) = scan(input);
            assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
        }
    }
}
