//! API to control the interpreter.

use std::error::Error;
use std::fmt;
use std::io::Write;

use log::debug;

use crate::diag::{LexError, RuntimeError, SyntaxError};
use crate::eval::Evaluator;
use crate::parser::Parser;
use crate::resolver;
use crate::scanner;
use crate::token::Token;
use crate::value::Value;

/// Tree-walk interpreter session.
///
/// Session state (the globals, the resolved bindings) persists across calls,
/// so a function defined by one `run` call is available to later ones:
///
/// ```
/// use rune::interpreter::{Interpreter, RuneError};
///
/// let mut output: Vec<u8> = Vec::new();
/// let mut interp = Interpreter::new(&mut output);
///
/// let func_def = r#"
///     fun max(x, y) {
///         if (x > y) { return x; }
///         return y;
///     }
/// "#;
/// interp.run(func_def)?;
///
/// interp.run("print max(10, 20);").expect("interpreter error");
/// interp.run("print max(5, 4);").expect("interpreter error");
///
/// assert_eq!(output, b"20\n5\n");
/// # Ok::<(), RuneError>(())
/// ```
#[derive(Debug)]
pub struct Interpreter<'a, W: Write> {
    evaluator: Evaluator<'a, W>,
    next_expr_id: u32,
}

/// Errors an interpreter session can raise.
#[derive(Debug)]
pub enum RuneError {
    /// Lexical faults, aggregated over the whole scan.
    Lex(Vec<LexError>),

    /// First parse or resolve fault.
    Syntax(SyntaxError),

    /// Evaluation fault.
    Runtime(RuntimeError),
}

impl fmt::Display for RuneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuneError::Lex(errors) => {
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            RuneError::Syntax(e) => write!(f, "{}", e),
            RuneError::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl Error for RuneError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RuneError::Lex(_) => None,
            RuneError::Syntax(e) => Some(e),
            RuneError::Runtime(e) => Some(e),
        }
    }
}

impl From<SyntaxError> for RuneError {
    fn from(e: SyntaxError) -> RuneError {
        RuneError::Syntax(e)
    }
}

impl From<RuntimeError> for RuneError {
    fn from(e: RuntimeError) -> RuneError {
        RuneError::Runtime(e)
    }
}

impl<'a, W: Write> Interpreter<'a, W> {
    pub fn new(output: &'a mut W) -> Interpreter<'a, W> {
        Interpreter {
            evaluator: Evaluator::new(output),
            next_expr_id: 0,
        }
    }

    /// Scans, parses, resolves and executes a whole program.
    pub fn run(&mut self, source: &str) -> Result<(), RuneError> {
        let tokens = self.scan(source)?;

        let mut parser = Parser::with_first_id(tokens, self.next_expr_id);
        let parsed = parser.parse_program();
        self.next_expr_id = parser.next_id();
        let stmts = parsed?;

        let locals = resolver::resolve(&stmts)?;
        debug!(
            "executing {} statements ({} resolved locals)",
            stmts.len(),
            locals.len()
        );
        self.evaluator.add_locals(locals);
        self.evaluator.eval_stmts(&stmts)?;
        Ok(())
    }

    /// Parses a single expression and evaluates it against the session
    /// state. No resolver pass: variables resolve against the globals, so
    /// the native callables are in reach.
    pub fn evaluate(&mut self, source: &str) -> Result<Value, RuneError> {
        let tokens = self.scan(source)?;

        let mut parser = Parser::with_first_id(tokens, self.next_expr_id);
        let parsed = parser.parse_expression();
        self.next_expr_id = parser.next_id();
        let expr = parsed?;

        Ok(self.evaluator.evaluate(&expr)?)
    }

    fn scan(&self, source: &str) -> Result<Vec<Token>, RuneError> {
        let (tokens, errors) = scanner::scan(source);
        if !errors.is_empty() {
            return Err(RuneError::Lex(errors));
        }
        Ok(tokens)
    }
}
