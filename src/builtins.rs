//! Native callables installed into the global environment.

use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::diag::RuntimeError;
use crate::env::Env;
use crate::token::Token;
use crate::value::{Native, Value};

const HTTP_TIMEOUT: Duration = Duration::from_secs(2);

pub fn install(globals: &Env) {
    define(
        globals,
        Native {
            name: "clock",
            arity: 0,
            repr: "<native fn>",
            func: clock,
        },
    );
    define(
        globals,
        Native {
            name: "len",
            arity: 1,
            repr: "<native fn>",
            func: len,
        },
    );
    define(
        globals,
        Native {
            name: "append",
            arity: -1,
            repr: "<native fn>",
            func: append,
        },
    );
    define(
        globals,
        Native {
            name: "json",
            arity: 1,
            repr: "<native json>",
            func: json,
        },
    );
}

fn define(globals: &Env, native: Native) {
    globals.define(native.name, Value::Native(Rc::new(native)));
}

/// Whole seconds since the Unix epoch.
fn clock(_args: &[Value], _token: &Token) -> Result<Value, RuntimeError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch");
    Ok(Value::Number(now.as_secs() as f64))
}

/// Byte length of a string or element count of an array.
fn len(args: &[Value], token: &Token) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Str(s) => Ok(Value::Number(s.len() as f64)),
        Value::Array(items) => Ok(Value::Number(items.borrow().len() as f64)),
        _ => Err(RuntimeError::new(
            token,
            "len() can only be called on strings and arrays.",
        )),
    }
}

/// Copies the array and appends the remaining arguments to the copy. The
/// caller's array is left untouched.
fn append(args: &[Value], token: &Token) -> Result<Value, RuntimeError> {
    if args.len() < 2 {
        return Err(RuntimeError::new(
            token,
            "Can't append to nothing, pass an array to append to. Example: append([1, 2, 3], 4)",
        ));
    }
    match &args[0] {
        Value::Array(items) => {
            let mut extended = items.borrow().clone();
            extended.extend(args[1..].iter().cloned());
            Ok(Value::array(extended))
        }
        _ => Err(RuntimeError::new(token, "Can only append to arrays.")),
    }
}

/// Fetches `url` and decodes the response body as a JSON object.
fn json(args: &[Value], token: &Token) -> Result<Value, RuntimeError> {
    let Value::Str(url) = &args[0] else {
        return Err(RuntimeError::new(token, "json() expects a URL string."));
    };

    let agent = ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build();
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => {
            return Err(RuntimeError::new(
                token,
                format!("Error fetching {}: Status code {}", url, code),
            ));
        }
        Err(err) => {
            return Err(RuntimeError::new(
                token,
                format!("Error fetching {}: {}", url, err),
            ));
        }
    };
    if response.status() != 200 {
        return Err(RuntimeError::new(
            token,
            format!("Error fetching {}: Status code {}", url, response.status()),
        ));
    }

    let body: serde_json::Value = response.into_json().map_err(|err| {
        RuntimeError::new(token, format!("Error parsing JSON from {}: {}", url, err))
    })?;
    match body {
        serde_json::Value::Object(fields) => Ok(from_json_object(fields)),
        _ => Err(RuntimeError::new(
            token,
            format!("Error parsing JSON from {}: body is not an object", url),
        )),
    }
}

fn from_json_object(fields: serde_json::Map<String, serde_json::Value>) -> Value {
    let pairs = fields
        .into_iter()
        .map(|(key, value)| (key, from_json(value)))
        .collect();
    Value::object(pairs)
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::str(&s),
        serde_json::Value::Array(items) => {
            Value::array(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(fields) => from_json_object(fields),
    }
}
