//! Static binding pre-pass.
//!
//! Walks the AST with a stack of lexical scopes and records, for every local
//! variable reference, how many environments separate the use site from the
//! binding site. The interpreter reads the resulting side-table and never
//! searches by name for locals. References that match no scope are left out
//! of the table and fall back to the globals at runtime.

use std::collections::HashMap;

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::diag::SyntaxError;
use crate::token::Token;

/// Distance side-table: node identity → enclosing-environment hops.
pub type Locals = HashMap<ExprId, usize>;

pub fn resolve(stmts: &[Stmt]) -> Result<Locals, SyntaxError> {
    let mut resolver = Resolver::default();
    resolver.resolve_stmts(stmts)?;
    Ok(resolver.locals)
}

#[derive(Debug, Default)]
struct Resolver {
    // Innermost scope last. The global scope is implicit and never pushed.
    scopes: Vec<HashMap<String, bool>>,
    in_function: bool,
    locals: Locals,
}

impl Resolver {
    fn resolve_stmts(&mut self, stmts: &[Stmt]) -> Result<(), SyntaxError> {
        for stmt in stmts {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<(), SyntaxError> {
        match stmt {
            Stmt::Expr(expr) | Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Var { name, initializer } => {
                self.declare(name)?;
                // The initializer resolves while the name is declared but not
                // yet defined, which is how `var a = a;` gets caught.
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer)?;
                }
                self.define(name);
                Ok(())
            }
            Stmt::Block(stmts) => {
                self.begin_scope();
                self.resolve_stmts(stmts)?;
                self.end_scope();
                Ok(())
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch)?;
                }
                Ok(())
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)
            }
            Stmt::Function(decl) => {
                self.declare(&decl.name)?;
                self.define(&decl.name);
                self.resolve_function(decl)
            }
            Stmt::Return { keyword, value } => {
                if !self.in_function {
                    return Err(SyntaxError::new(
                        keyword,
                        "Cannot return from top-level code.",
                    ));
                }
                if let Some(value) = value {
                    self.resolve_expr(value)?;
                }
                Ok(())
            }
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) -> Result<(), SyntaxError> {
        match expr {
            Expr::Literal(_) => Ok(()),
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        return Err(SyntaxError::new(
                            name,
                            "Cannot read local variable in its own initializer.",
                        ));
                    }
                }
                self.resolve_local(*id, name);
                Ok(())
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
                Ok(())
            }
            Expr::Grouping(inner) => self.resolve_expr(inner),
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }
            Expr::Call { callee, args, .. } => {
                self.resolve_expr(callee)?;
                for arg in args {
                    self.resolve_expr(arg)?;
                }
                Ok(())
            }
            Expr::Array { items } => {
                for item in items {
                    self.resolve_expr(item)?;
                }
                Ok(())
            }
            Expr::Index { target, index, .. } => {
                self.resolve_expr(target)?;
                self.resolve_expr(index)
            }
            Expr::SetIndex {
                target,
                index,
                value,
                ..
            } => {
                self.resolve_expr(target)?;
                self.resolve_expr(index)?;
                self.resolve_expr(value)
            }
            Expr::Object { pairs } => {
                for (_, value) in pairs {
                    self.resolve_expr(value)?;
                }
                Ok(())
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl) -> Result<(), SyntaxError> {
        let enclosing = std::mem::replace(&mut self.in_function, true);
        self.begin_scope();
        for param in &decl.params {
            self.declare(param)?;
            self.define(param);
        }
        self.resolve_stmts(&decl.body)?;
        self.end_scope();
        self.in_function = enclosing;
        Ok(())
    }

    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (hops, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.locals.insert(id, hops);
                return;
            }
        }
        // Not in any scope: a global, looked up by name at runtime.
    }

    fn declare(&mut self, name: &Token) -> Result<(), SyntaxError> {
        let Some(scope) = self.scopes.last_mut() else {
            return Ok(());
        };
        if scope.contains_key(&name.lexeme) {
            return Err(SyntaxError::new(
                name,
                "Variable with this name already declared in this scope.",
            ));
        }
        scope.insert(name.lexeme.clone(), false);
        Ok(())
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner;

    fn resolve_prg(input: &str) -> Result<Locals, SyntaxError> {
        let (tokens, errors) = scanner::scan(input);
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        let stmts = Parser::new(tokens).parse_program().expect("parse error");
        resolve(&stmts)
    }

    /// Collects the ids of every `Variable` node named `name`, in source
    /// order, so tests can look distances up without guessing ids.
    fn variable_ids(stmts: &[Stmt], name: &str) -> Vec<ExprId> {
        fn walk_stmt(stmt: &Stmt, name: &str, out: &mut Vec<ExprId>) {
            match stmt {
                Stmt::Expr(e) | Stmt::Print(e) => walk_expr(e, name, out),
                Stmt::Var { initializer, .. } => {
                    if let Some(e) = initializer {
                        walk_expr(e, name, out);
                    }
                }
                Stmt::Block(stmts) => stmts.iter().for_each(|s| walk_stmt(s, name, out)),
                Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    walk_expr(condition, name, out);
                    walk_stmt(then_branch, name, out);
                    if let Some(e) = else_branch {
                        walk_stmt(e, name, out);
                    }
                }
                Stmt::While { condition, body } => {
                    walk_expr(condition, name, out);
                    walk_stmt(body, name, out);
                }
                Stmt::Function(decl) => decl.body.iter().for_each(|s| walk_stmt(s, name, out)),
                Stmt::Return { value, .. } => {
                    if let Some(e) = value {
                        walk_expr(e, name, out);
                    }
                }
            }
        }

        fn walk_expr(expr: &Expr, name: &str, out: &mut Vec<ExprId>) {
            match expr {
                Expr::Literal(_) => {}
                Expr::Variable { id, name: n } => {
                    if n.lexeme == name {
                        out.push(*id);
                    }
                }
                Expr::Assign { value, .. } => walk_expr(value, name, out),
                Expr::Grouping(inner) => walk_expr(inner, name, out),
                Expr::Unary { right, .. } => walk_expr(right, name, out),
                Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                    walk_expr(left, name, out);
                    walk_expr(right, name, out);
                }
                Expr::Call { callee, args, .. } => {
                    walk_expr(callee, name, out);
                    args.iter().for_each(|a| walk_expr(a, name, out));
                }
                Expr::Array { items } => items.iter().for_each(|i| walk_expr(i, name, out)),
                Expr::Index { target, index, .. } => {
                    walk_expr(target, name, out);
                    walk_expr(index, name, out);
                }
                Expr::SetIndex {
                    target,
                    index,
                    value,
                    ..
                } => {
                    walk_expr(target, name, out);
                    walk_expr(index, name, out);
                    walk_expr(value, name, out);
                }
                Expr::Object { pairs } => {
                    pairs.iter().for_each(|(_, v)| walk_expr(v, name, out))
                }
            }
        }

        let mut out = Vec::new();
        stmts.iter().for_each(|s| walk_stmt(s, name, &mut out));
        out
    }

    fn parse(input: &str) -> Vec<Stmt> {
        let (tokens, _) = scanner::scan(input);
        Parser::new(tokens).parse_program().expect("parse error")
    }

    #[test]
    fn global_references_are_left_unresolved() {
        let locals = resolve_prg("var a = 1; print a;").unwrap();
        assert!(locals.is_empty());
    }

    #[test]
    fn block_local_resolves_at_distance_zero() {
        let stmts = parse("{ var a = 1; print a; }");
        let locals = resolve(&stmts).unwrap();
        let ids = variable_ids(&stmts, "a");
        assert_eq!(ids.len(), 1);
        assert_eq!(locals.get(&ids[0]), Some(&0));
    }

    #[test]
    fn nested_block_reference_counts_hops() {
        let stmts = parse("{ var a = 1; { { print a; } } }");
        let locals = resolve(&stmts).unwrap();
        let ids = variable_ids(&stmts, "a");
        assert_eq!(locals.get(&ids[0]), Some(&2));
    }

    #[test]
    fn closure_reference_counts_the_function_scope() {
        let stmts = parse("{ var a = 1; fun f() { print a; } }");
        let locals = resolve(&stmts).unwrap();
        let ids = variable_ids(&stmts, "a");
        assert_eq!(locals.get(&ids[0]), Some(&1));
    }

    #[test]
    fn identical_references_resolve_independently() {
        let stmts = parse("{ var a = 1; { print a; } print a; }");
        let locals = resolve(&stmts).unwrap();
        let ids = variable_ids(&stmts, "a");
        assert_eq!(ids.len(), 2);
        assert_eq!(locals.get(&ids[0]), Some(&1));
        assert_eq!(locals.get(&ids[1]), Some(&0));
    }

    #[test]
    fn parameters_resolve_like_locals() {
        let stmts = parse("fun f(x) { return x; }");
        let locals = resolve(&stmts).unwrap();
        let ids = variable_ids(&stmts, "x");
        assert_eq!(locals.get(&ids[0]), Some(&0));
    }

    #[test]
    fn self_reference_in_initializer_is_rejected() {
        match resolve_prg("var a = \"outer\"; { var a = a; }") {
            Err(e) => assert_eq!(
                e.message,
                "Cannot read local variable in its own initializer."
            ),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn redeclaration_in_same_scope_is_rejected() {
        match resolve_prg("{ var a = 1; var a = 2; }") {
            Err(e) => assert_eq!(
                e.message,
                "Variable with this name already declared in this scope."
            ),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn global_redeclaration_is_allowed() {
        assert!(resolve_prg("var a = 1; var a = 2;").is_ok());
    }

    #[test]
    fn shadowing_in_inner_scope_is_allowed() {
        assert!(resolve_prg("{ var a = 1; { var a = 2; print a; } }").is_ok());
    }

    #[test]
    fn top_level_return_is_rejected() {
        match resolve_prg("return 1;") {
            Err(e) => assert_eq!(e.message, "Cannot return from top-level code."),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn top_level_return_after_a_function_is_still_rejected() {
        match resolve_prg("fun f() { return 1; } return 2;") {
            Err(e) => assert_eq!(e.message, "Cannot return from top-level code."),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn return_inside_nested_function_is_allowed() {
        assert!(resolve_prg("fun f() { fun g() { return 1; } return g; }").is_ok());
    }
}
