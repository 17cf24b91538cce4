//! Recursive-descent parser.

use std::rc::Rc;

use crate::ast::{Expr, ExprId, FunctionDecl, Literal, Stmt};
use crate::diag::SyntaxError;
use crate::token::{Token, TokenKind};

/// Parameter and argument lists are capped at this many slots.
pub const MAX_ARITY: usize = 8;

/// Single-pass parser over a scanned token sequence.
///
/// Two entry points: [`Parser::parse_program`] consumes declarations until
/// `EOF`, [`Parser::parse_expression`] parses exactly one expression. Both
/// stop at the first fault.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_id: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Parser {
        Parser::with_first_id(tokens, 0)
    }

    /// A session that parses more than once hands each parser the next free
    /// node id, so identities never repeat across parses.
    pub fn with_first_id(tokens: Vec<Token>, first_id: u32) -> Parser {
        Parser {
            tokens,
            current: 0,
            next_id: first_id,
        }
    }

    /// First id not handed out by this parser.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn parse_program(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            stmts.push(self.declaration()?);
        }
        Ok(stmts)
    }

    pub fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.expression()
    }

    fn declaration(&mut self) -> Result<Stmt, SyntaxError> {
        if self.match_kind(TokenKind::Fun) {
            return self.function();
        }
        if self.match_kind(TokenKind::Var) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn function(&mut self) -> Result<Stmt, SyntaxError> {
        let name = self.consume(TokenKind::Identifier, "Expect function name.")?;
        self.consume(TokenKind::LeftParen, "Expect '(' after function name.")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARITY {
                    return Err(SyntaxError::new(
                        self.peek(),
                        format!("Cannot have more than {} parameters.", MAX_ARITY),
                    ));
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;

        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.")?;
        let body = self.block_body()?;

        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    fn var_declaration(&mut self) -> Result<Stmt, SyntaxError> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;

        let initializer = if self.match_kind(TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        if self.match_kind(TokenKind::Print) {
            return self.print_statement();
        }
        if self.match_kind(TokenKind::Return) {
            return self.return_statement();
        }
        if self.match_kind(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_kind(TokenKind::For) {
            return self.for_statement();
        }
        if self.match_kind(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_kind(TokenKind::LeftBrace) {
            return Ok(Stmt::Block(self.block_body()?));
        }
        self.expression_statement()
    }

    fn print_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(expr))
    }

    fn return_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;
        Ok(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    /// `for (init; cond; incr) body` desugars into
    /// `{ init; while (cond) { body; incr; } }`.
    fn for_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_kind(TokenKind::Semicolon) {
            None
        } else if self.match_kind(TokenKind::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after condition.")?;

        let increment = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::RightParen, "Expect ')' after clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expr(increment)]);
        }
        let condition = condition.unwrap_or(Expr::Literal(Literal::Bool(true)));
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };
        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            stmts.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(stmts)
    }

    fn expression_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expr(expr))
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.assignment()
    }

    /// Right-associative. The left-hand side is parsed as a normal expression
    /// first; seeing `=` turns a `Variable` into `Assign` and an `Index` into
    /// `SetIndex`. Anything else cannot be assigned to.
    fn assignment(&mut self) -> Result<Expr, SyntaxError> {
        let expr = self.or()?;

        if self.match_kind(TokenKind::Equal) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Index {
                    target,
                    index,
                    bracket,
                } => Ok(Expr::SetIndex {
                    target,
                    index,
                    value: Box::new(value),
                    bracket,
                }),
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: self.new_id(),
                    name,
                    value: Box::new(value),
                }),
                _ => Err(SyntaxError::new(&equals, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.and()?;
        while self.match_kind(TokenKind::Or) {
            let op = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.equality()?;
        while self.match_kind(TokenKind::And) {
            let op = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.comparison()?;
        while self.match_kinds(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let op = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.term()?;
        while self.match_kinds(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let op = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.factor()?;
        while self.match_kinds(&[TokenKind::Plus, TokenKind::Minus]) {
            let op = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.unary()?;
        while self.match_kinds(&[TokenKind::Slash, TokenKind::Star]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        if self.match_kinds(&[TokenKind::Bang, TokenKind::Minus]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                op,
                right: Box::new(right),
            });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_kind(TokenKind::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.match_kind(TokenKind::LeftBracket) {
                let index = self.expression()?;
                self.consume(TokenKind::RightBracket, "Expect ']' after index.")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                    bracket: self.previous().clone(),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, SyntaxError> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_ARITY {
                    return Err(SyntaxError::new(
                        self.peek(),
                        format!("Cannot have more than {} arguments.", MAX_ARITY),
                    ));
                }
                args.push(self.expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren: self.previous().clone(),
            args,
        })
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        if self.match_kind(TokenKind::LeftBrace) {
            return self.object_literal();
        }
        if self.match_kind(TokenKind::LeftBracket) {
            return self.array_literal();
        }
        if self.match_kind(TokenKind::True) {
            return Ok(Expr::Literal(Literal::Bool(true)));
        }
        if self.match_kind(TokenKind::False) {
            return Ok(Expr::Literal(Literal::Bool(false)));
        }
        if self.match_kind(TokenKind::Nil) {
            return Ok(Expr::Literal(Literal::Nil));
        }
        if self.match_kind(TokenKind::Number) {
            let prev = self.previous();
            let value = prev
                .literal
                .as_deref()
                .unwrap_or_default()
                .parse::<f64>()
                .map_err(|_| SyntaxError::new(prev, "Invalid number."))?;
            return Ok(Expr::Literal(Literal::Number(value)));
        }
        if self.match_kind(TokenKind::Str) {
            let literal = self.previous().literal.clone().unwrap_or_default();
            return Ok(Expr::Literal(Literal::Str(literal)));
        }
        if self.match_kind(TokenKind::Identifier) {
            let name = self.previous().clone();
            return Ok(Expr::Variable {
                id: self.new_id(),
                name,
            });
        }
        if self.match_kind(TokenKind::LeftParen) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(SyntaxError::new(self.peek(), "Expect expression."))
    }

    /// Brace-delimited pairs of bare-identifier keys and expression values.
    /// A `{` in expression position always means an object literal; blocks
    /// only exist in statement position.
    fn object_literal(&mut self) -> Result<Expr, SyntaxError> {
        let mut pairs = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            let key = self.consume(TokenKind::Identifier, "Expect property name.")?;
            self.consume(TokenKind::Colon, "Expect ':' after property name.")?;
            let value = self.expression()?;
            pairs.push((key.lexeme, value));

            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after object properties.")?;
        Ok(Expr::Object { pairs })
    }

    fn array_literal(&mut self) -> Result<Expr, SyntaxError> {
        let mut items = Vec::new();
        if !self.check(TokenKind::RightBracket) {
            loop {
                items.push(self.expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBracket, "Expect ']' after array elements.")?;
        Ok(Expr::Array { items })
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn match_kinds(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|kind| self.check(*kind)) {
            self.advance();
            return true;
        }
        false
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        Err(SyntaxError::new(self.peek(), message))
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn new_id(&mut self) -> ExprId {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        id
    }
}
