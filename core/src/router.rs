//! Resolution of symbolic action names into request descriptors.
//!
//! # Design
//! Four shapes are recognised, case-insensitively:
//!
//! | Action          | Method | filters arg | body arg |
//! |-----------------|--------|-------------|----------|
//! | `get<Table>`    | GET    | 0           | -        |
//! | `update<Table>` | POST   | 0           | 1        |
//! | `create<Table>` | PUT    | -           | 0        |
//! | `delete<Table>` | DELETE | 0           | -        |
//!
//! plus `get<Table>ById(n)`, which reads the single row of the pluralised
//! table whose `id` is `n`. Anything else is `UnsupportedOperation`, reported
//! before a request is composed.

use serde_json::Value;

use crate::error::ApiError;
use crate::filter::{Filters, Operator};
use crate::http::HttpMethod;

/// Verb prefix of an action name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Update,
    Create,
    Delete,
}

impl Verb {
    const ALL: [(&'static str, Verb); 4] = [
        ("get", Verb::Get),
        ("update", Verb::Update),
        ("create", Verb::Create),
        ("delete", Verb::Delete),
    ];

    pub fn method(self) -> HttpMethod {
        match self {
            Verb::Get => HttpMethod::Get,
            Verb::Update => HttpMethod::Post,
            Verb::Create => HttpMethod::Put,
            Verb::Delete => HttpMethod::Delete,
        }
    }

    fn filters_arg(self) -> Option<usize> {
        match self {
            Verb::Create => None,
            Verb::Get | Verb::Update | Verb::Delete => Some(0),
        }
    }

    fn body_arg(self) -> Option<usize> {
        match self {
            Verb::Update => Some(1),
            Verb::Create => Some(0),
            Verb::Get | Verb::Delete => None,
        }
    }
}

/// A resolved action, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub method: HttpMethod,
    pub endpoint: String,
    pub filters: Filters,
    pub body: Option<Value>,
    /// Caller wants the first row (or null) rather than the whole list.
    pub single: bool,
}

/// Map `name` and its arguments onto an [`Operation`].
pub fn resolve(name: &str, args: &[Value]) -> Result<Operation, ApiError> {
    let lower = name.to_ascii_lowercase();
    let unsupported = || ApiError::UnsupportedOperation(name.to_string());

    let (verb, table) = Verb::ALL
        .iter()
        .find_map(|(prefix, verb)| lower.strip_prefix(prefix).map(|rest| (*verb, rest)))
        .ok_or_else(unsupported)?;
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(unsupported());
    }

    if verb == Verb::Get {
        if let Some(resource) = table.strip_suffix("byid").filter(|r| !r.is_empty()) {
            return by_id(name, resource, args);
        }
    }

    let filters = match verb.filters_arg().and_then(|i| args.get(i)) {
        None | Some(Value::Null) => Filters::new(),
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k, scalar_text(v))).collect(),
        Some(_) => {
            return Err(ApiError::UnsupportedOperation(format!(
                "{name}: filters must be an object"
            )))
        }
    };
    let body = verb
        .body_arg()
        .and_then(|i| args.get(i))
        .filter(|v| !v.is_null())
        .cloned();

    Ok(Operation {
        method: verb.method(),
        endpoint: table.to_string(),
        filters,
        body,
        single: false,
    })
}

fn by_id(name: &str, resource: &str, args: &[Value]) -> Result<Operation, ApiError> {
    let id = match args {
        [Value::Number(n)] if n.is_i64() || n.is_u64() => n.to_string(),
        _ => {
            return Err(ApiError::UnsupportedOperation(format!(
                "{name} takes exactly one integer id"
            )))
        }
    };
    let table = format!("{resource}s");
    let mut filters = Filters::new();
    filters.set(&format!("{table}.id"), Operator::Eq, id);

    Ok(Operation {
        method: HttpMethod::Get,
        endpoint: table,
        filters,
        body: None,
        single: true,
    })
}

/// Filter values travel as text: strings verbatim, null as empty, the rest
/// as their JSON rendering.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
