//! Runtime environments.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::Rc;

use crate::diag::RuntimeError;
use crate::token::Token;
use crate::value::Value;

/// A name→value mapping plus an optional link to the enclosing environment.
///
/// Environments are shared through `Rc` because closures keep their defining
/// chain alive past block exit; the bindings sit behind a `RefCell` so
/// assignment works through a shared handle.
#[derive(Debug)]
pub struct Env {
    enclosing: Option<Rc<Env>>,
    values: RefCell<HashMap<String, Value>>,
}

impl Env {
    pub fn new() -> Rc<Env> {
        Rc::new(Env {
            enclosing: None,
            values: RefCell::new(HashMap::new()),
        })
    }

    pub fn with_enclosing(enclosing: Rc<Env>) -> Rc<Env> {
        Rc::new(Env {
            enclosing: Some(enclosing),
            values: RefCell::new(HashMap::new()),
        })
    }

    /// Binds `name` in this environment, shadowing any outer binding.
    pub fn define(&self, name: &str, value: Value) {
        self.values.borrow_mut().insert(name.to_string(), value);
    }

    /// Reads `name` from the innermost environment that binds it.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.get(name),
            None => Err(RuntimeError::new(
                name,
                format!("Undefined variable '{}'.", name.lexeme),
            )),
        }
    }

    /// Rebinds `name` in the innermost environment that already binds it.
    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        match self.values.borrow_mut().entry(name.lexeme.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(value);
                Ok(())
            }
            Entry::Vacant(_) => match &self.enclosing {
                Some(enclosing) => enclosing.assign(name, value),
                None => Err(RuntimeError::new(
                    name,
                    format!("Undefined variable '{}'.", name.lexeme),
                )),
            },
        }
    }

    /// Reads `name` exactly `distance` environments out. The resolver
    /// guarantees the binding exists there.
    pub fn get_at(self: &Rc<Env>, distance: usize, name: &str) -> Value {
        self.ancestor(distance)
            .values
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Rebinds `name` exactly `distance` environments out.
    pub fn assign_at(self: &Rc<Env>, distance: usize, name: &str, value: Value) {
        self.ancestor(distance)
            .values
            .borrow_mut()
            .insert(name.to_string(), value);
    }

    fn ancestor(self: &Rc<Env>, distance: usize) -> Rc<Env> {
        let mut env = Rc::clone(self);
        for _ in 0..distance {
            let enclosing = env
                .enclosing
                .clone()
                .expect("environment chain shorter than resolved distance");
            env = enclosing;
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenKind::Identifier, lexeme, None, 1)
    }

    #[test]
    fn define_then_get() -> Result<(), RuntimeError> {
        let env = Env::new();
        env.define("a", Value::Number(1.0));
        assert_eq!(env.get(&name("a"))?, Value::Number(1.0));
        Ok(())
    }

    #[test]
    fn get_unknown_name() {
        let env = Env::new();
        match env.get(&name("ghost")) {
            Err(e) => assert_eq!(e.message, "Undefined variable 'ghost'."),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn get_walks_outward() -> Result<(), RuntimeError> {
        let outer = Env::new();
        outer.define("a", Value::Number(1.0));
        let inner = Env::with_enclosing(outer);
        assert_eq!(inner.get(&name("a"))?, Value::Number(1.0));
        Ok(())
    }

    #[test]
    fn define_shadows_outer_binding() -> Result<(), RuntimeError> {
        let outer = Env::new();
        outer.define("a", Value::Number(1.0));
        let inner = Env::with_enclosing(Rc::clone(&outer));
        inner.define("a", Value::Number(2.0));
        assert_eq!(inner.get(&name("a"))?, Value::Number(2.0));
        assert_eq!(outer.get(&name("a"))?, Value::Number(1.0));
        Ok(())
    }

    #[test]
    fn assign_rebinds_at_the_binding_site() -> Result<(), RuntimeError> {
        let outer = Env::new();
        outer.define("a", Value::Number(1.0));
        let inner = Env::with_enclosing(Rc::clone(&outer));
        inner.assign(&name("a"), Value::Number(5.0))?;
        assert_eq!(outer.get(&name("a"))?, Value::Number(5.0));
        Ok(())
    }

    #[test]
    fn assign_unknown_name() {
        let env = Env::new();
        match env.assign(&name("ghost"), Value::Nil) {
            Err(e) => assert_eq!(e.message, "Undefined variable 'ghost'."),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn distance_addressing() {
        let global = Env::new();
        global.define("a", Value::Number(1.0));
        let middle = Env::with_enclosing(Rc::clone(&global));
        middle.define("a", Value::Number(2.0));
        let inner = Env::with_enclosing(Rc::clone(&middle));

        assert_eq!(inner.get_at(1, "a"), Value::Number(2.0));
        assert_eq!(inner.get_at(2, "a"), Value::Number(1.0));

        inner.assign_at(2, "a", Value::Number(9.0));
        assert_eq!(global.get_at(0, "a"), Value::Number(9.0));
        assert_eq!(middle.get_at(0, "a"), Value::Number(2.0));
    }
}
