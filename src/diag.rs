//! The three disjoint error kinds of the pipeline.

use thiserror::Error;

use crate::token::Token;

/// Lexical fault. The scanner aggregates these and keeps scanning.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("[line: {line}] Error: {message}")]
pub struct LexError {
    pub line: u32,
    pub message: String,
}

impl LexError {
    pub fn new(line: u32, message: impl Into<String>) -> LexError {
        LexError {
            line,
            message: message.into(),
        }
    }
}

/// Static fault raised by the parser or the resolver. The first fault aborts
/// the pass; there is no recovery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("[line: {line}] Error at '{lexeme}': {message}")]
pub struct SyntaxError {
    pub line: u32,
    pub lexeme: String,
    pub message: String,
}

impl SyntaxError {
    pub fn new(token: &Token, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: token.line,
            lexeme: token.lexeme.clone(),
            message: message.into(),
        }
    }
}

/// Evaluation fault. Aborts the program; there is no catch surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("[line: {line}] {message}")]
pub struct RuntimeError {
    pub line: u32,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            line: token.line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    #[test]
    fn error_display_forms() {
        let token = Token::new(TokenKind::Semicolon, ";", None, 7);
        assert_eq!(
            LexError::new(3, "Unexpected character: @").to_string(),
            "[line: 3] Error: Unexpected character: @"
        );
        assert_eq!(
            SyntaxError::new(&token, "Expect expression.").to_string(),
            "[line: 7] Error at ';': Expect expression."
        );
        assert_eq!(
            RuntimeError::new(&token, "Operands must be numbers.").to_string(),
            "[line: 7] Operands must be numbers."
        );
    }
}
