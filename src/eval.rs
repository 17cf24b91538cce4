//! Expression evaluation and statement execution.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::ast::{Expr, ExprId, Literal, Stmt};
use crate::builtins;
use crate::diag::RuntimeError;
use crate::env::Env;
use crate::resolver::Locals;
use crate::token::{Token, TokenKind};
use crate::value::{Function, Value};

const MAX_RECURSION_DEPTH: usize = 999;

/// Outcome of executing a statement: either fall through to the next one or
/// unwind to the nearest enclosing call with a return value. Kept apart from
/// `RuntimeError` by construction: a `return` is not a fault.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// Tree walker.
///
/// Carries the global environment (pre-populated with the native callables),
/// the environment statements currently execute in, the resolver's distance
/// side-table, and the recursion guard. `print` output goes to `output`.
#[derive(Debug)]
pub struct Evaluator<'a, W: Write> {
    output: &'a mut W,
    globals: Rc<Env>,
    environment: Rc<Env>,
    locals: Locals,
    depth: usize,
}

impl<'a, W: Write> Evaluator<'a, W> {
    pub fn new(output: &'a mut W) -> Evaluator<'a, W> {
        let globals = Env::new();
        builtins::install(&globals);
        Evaluator {
            output,
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            depth: 0,
        }
    }

    /// Merges freshly resolved distances into the side-table. Node ids are
    /// unique per parse, so entries never collide across runs.
    pub fn add_locals(&mut self, locals: Locals) {
        self.locals.extend(locals);
    }

    pub fn eval_stmts(&mut self, stmts: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in stmts {
            if let Flow::Return(_) = self.execute(stmt)? {
                break;
            }
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value).map_err(|err| RuntimeError {
                    line: 0,
                    message: format!("I/O error: {}", err),
                })?;
                Ok(Flow::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(initializer) => self.evaluate(initializer)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
                Ok(Flow::Normal)
            }
            Stmt::Function(decl) => {
                let function = Function {
                    decl: Rc::clone(decl),
                    closure: Rc::clone(&self.environment),
                };
                self.environment
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => {
                let env = Env::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(stmts, env)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let flow @ Flow::Return(_) = self.execute(body)? {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
        }
    }

    fn execute_block(&mut self, stmts: &[Stmt], env: Rc<Env>) -> Result<Flow, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = self.run_block(stmts);
        self.environment = previous;
        result
    }

    fn run_block(&mut self, stmts: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            if let flow @ Flow::Return(_) = self.execute(stmt)? {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Nil => Value::Nil,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::str(s),
            }),
            Expr::Variable { id, name } => self.look_up(*id, name),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(&distance) => {
                        self.environment
                            .assign_at(distance, &name.lexeme, value.clone());
                    }
                    None => self.globals.assign(name, value.clone())?,
                }
                // Assignment is an expression; it yields the assigned value.
                Ok(value)
            }
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Unary { op, right } => {
                let right = self.evaluate(right)?;
                match op.kind {
                    TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
                    TokenKind::Minus => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::new(op, "Operand must be a number.")),
                    },
                    _ => unreachable!("unary operator {:?}", op.kind),
                }
            }
            Expr::Binary { left, op, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(op, left, right)
            }
            Expr::Logical { left, op, right } => {
                let left = self.evaluate(left)?;
                // Short-circuit, yielding the operand itself rather than a
                // coerced boolean.
                if op.kind == TokenKind::Or {
                    if left.is_truthy() {
                        return Ok(left);
                    }
                } else if !left.is_truthy() {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            Expr::Call {
                callee,
                paren,
                args,
            } => {
                if self.depth >= MAX_RECURSION_DEPTH {
                    return Err(RuntimeError::new(paren, "Stack overflow."));
                }
                self.depth += 1;
                let result = self.call(callee, paren, args);
                self.depth -= 1;
                result
            }
            Expr::Array { items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate(item)?);
                }
                Ok(Value::array(values))
            }
            Expr::Object { pairs } => {
                let mut object = HashMap::with_capacity(pairs.len());
                for (key, value) in pairs {
                    object.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(Value::object(object))
            }
            Expr::Index {
                target,
                index,
                bracket,
            } => {
                let target = self.evaluate(target)?;
                let index = self.evaluate(index)?;
                index_value(&target, &index, bracket)
            }
            Expr::SetIndex {
                target,
                index,
                value,
                bracket,
            } => {
                let target = self.evaluate(target)?;
                let index = self.evaluate(index)?;
                let value = self.evaluate(value)?;
                set_index_value(&target, &index, value, bracket)
            }
        }
    }

    fn look_up(&self, id: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(self.environment.get_at(distance, &name.lexeme)),
            None => self.globals.get(name),
        }
    }

    fn call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        args: &[Expr],
    ) -> Result<Value, RuntimeError> {
        let callee = self.evaluate(callee)?;

        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.evaluate(arg)?);
        }

        match callee {
            Value::Function(function) => {
                let arity = function.decl.params.len();
                if evaluated.len() != arity {
                    return Err(RuntimeError::new(
                        paren,
                        format!("Expected {} arguments but got {}.", arity, evaluated.len()),
                    ));
                }
                self.call_function(&function, evaluated)
            }
            Value::Native(native) => {
                if native.arity >= 0 && evaluated.len() != native.arity as usize {
                    return Err(RuntimeError::new(
                        paren,
                        format!(
                            "Expected {} arguments but got {}.",
                            native.arity,
                            evaluated.len()
                        ),
                    ));
                }
                (native.func)(&evaluated, paren)
            }
            _ => Err(RuntimeError::new(paren, "Can only call functions.")),
        }
    }

    fn call_function(
        &mut self,
        function: &Function,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let env = Env::with_enclosing(Rc::clone(&function.closure));
        for (param, arg) in function.decl.params.iter().zip(args) {
            env.define(&param.lexeme, arg);
        }
        match self.execute_block(&function.decl.body, env)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

fn binary(op: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match op.kind {
        TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
        TokenKind::BangEqual => Ok(Value::Bool(left != right)),
        TokenKind::Plus => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::Str(l), Value::Str(r)) => Ok(Value::str(&format!("{}{}", l, r))),
            _ => Err(RuntimeError::new(
                op,
                "Operands must be two numbers or two strings.",
            )),
        },
        TokenKind::Minus => {
            let (l, r) = number_operands(op, &left, &right)?;
            Ok(Value::Number(l - r))
        }
        TokenKind::Star => {
            let (l, r) = number_operands(op, &left, &right)?;
            Ok(Value::Number(l * r))
        }
        TokenKind::Slash => {
            // A zero divisor follows IEEE-754: infinity or NaN.
            let (l, r) = number_operands(op, &left, &right)?;
            Ok(Value::Number(l / r))
        }
        TokenKind::Less => {
            let (l, r) = number_operands(op, &left, &right)?;
            Ok(Value::Bool(l < r))
        }
        TokenKind::LessEqual => {
            let (l, r) = number_operands(op, &left, &right)?;
            Ok(Value::Bool(l <= r))
        }
        TokenKind::Greater => {
            let (l, r) = number_operands(op, &left, &right)?;
            Ok(Value::Bool(l > r))
        }
        TokenKind::GreaterEqual => {
            let (l, r) = number_operands(op, &left, &right)?;
            Ok(Value::Bool(l >= r))
        }
        _ => unreachable!("binary operator {:?}", op.kind),
    }
}

fn number_operands(
    op: &Token,
    left: &Value,
    right: &Value,
) -> Result<(f64, f64), RuntimeError> {
    if let (Value::Number(l), Value::Number(r)) = (left, right) {
        Ok((*l, *r))
    } else {
        Err(RuntimeError::new(op, "Operands must be numbers."))
    }
}

fn index_value(target: &Value, index: &Value, bracket: &Token) -> Result<Value, RuntimeError> {
    match target {
        Value::Array(items) => {
            let Value::Number(n) = index else {
                return Err(RuntimeError::new(bracket, "Array index must be a number."));
            };
            let items = items.borrow();
            let idx = *n as i64; // truncates toward zero
            if idx < 0 || idx as usize >= items.len() {
                return Err(RuntimeError::new(
                    bracket,
                    format!("Index out of bounds: {} of {}", idx, items.len()),
                ));
            }
            Ok(items[idx as usize].clone())
        }
        Value::Object(pairs) => {
            let Value::Str(key) = index else {
                return Err(RuntimeError::new(bracket, "Object keys must be strings."));
            };
            match pairs.borrow().get(key.as_ref()) {
                Some(value) => Ok(value.clone()),
                None => Err(RuntimeError::new(
                    bracket,
                    format!("Undefined property '{}'.", key),
                )),
            }
        }
        _ => Err(RuntimeError::new(
            bracket,
            "Indexing is only supported on arrays and objects.",
        )),
    }
}

fn set_index_value(
    target: &Value,
    index: &Value,
    value: Value,
    bracket: &Token,
) -> Result<Value, RuntimeError> {
    match target {
        Value::Array(items) => {
            let Value::Number(n) = index else {
                return Err(RuntimeError::new(bracket, "Array index must be a number."));
            };
            let mut items = items.borrow_mut();
            let idx = *n as i64;
            // Arrays do not grow on assignment.
            if idx < 0 || idx as usize >= items.len() {
                return Err(RuntimeError::new(
                    bracket,
                    format!("Index out of bounds: {} of {}", idx, items.len()),
                ));
            }
            items[idx as usize] = value.clone();
            Ok(value)
        }
        Value::Object(pairs) => {
            let Value::Str(key) = index else {
                return Err(RuntimeError::new(
                    bracket,
                    "Object properties must be accessed with string keys.",
                ));
            };
            pairs.borrow_mut().insert(key.to_string(), value.clone());
            Ok(value)
        }
        _ => Err(RuntimeError::new(
            bracket,
            "Indexing is only supported on arrays and objects.",
        )),
    }
}
