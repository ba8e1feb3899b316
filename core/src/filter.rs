//! Filter encoding for resource paths.
//!
//! Filters travel as path segments of the form `/{field}{op}{value}`. Callers
//! decorate the field name with a trailing operator marker (`name~`, `age<`);
//! an undecorated name means equality.

use std::fmt;

/// Comparison operator of a filter segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    #[default]
    Eq,
    /// Substring match.
    Like,
    Lt,
    Gt,
    Ne,
}

impl Operator {
    pub fn as_char(self) -> char {
        match self {
            Operator::Eq => '=',
            Operator::Like => '~',
            Operator::Lt => '<',
            Operator::Gt => '>',
            Operator::Ne => '!',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(Operator::Eq),
            '~' => Some(Operator::Like),
            '<' => Some(Operator::Lt),
            '>' => Some(Operator::Gt),
            '!' => Some(Operator::Ne),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Split a decorated key into the bare field name and its operator.
///
/// Only one trailing marker is stripped; `"a=="` yields `("a=", Eq)`.
pub fn split_operator(key: &str) -> (&str, Operator) {
    match key.chars().next_back().and_then(Operator::from_char) {
        Some(op) => (&key[..key.len() - 1], op),
        None => (key, Operator::Eq),
    }
}

/// A single field constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: Operator,
    pub value: String,
}

impl Filter {
    fn segment(&self) -> String {
        format!(
            "/{}{}{}",
            urlencoding::encode(&self.field),
            self.op,
            urlencoding::encode(&self.value)
        )
    }
}

/// Ordered set of filters.
///
/// Segments are emitted in insertion order. Writing the same field and
/// operator twice replaces the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    entries: Vec<Filter>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert using a decorated key such as `"widgets.name~"`.
    pub fn insert(&mut self, key: &str, value: impl fmt::Display) -> &mut Self {
        let (field, op) = split_operator(key);
        self.set(field, op, value)
    }

    /// Insert with an explicit operator.
    pub fn set(&mut self, field: &str, op: Operator, value: impl fmt::Display) -> &mut Self {
        let value = value.to_string();
        match self
            .entries
            .iter_mut()
            .find(|f| f.field == field && f.op == op)
        {
            Some(existing) => existing.value = value,
            None => self.entries.push(Filter {
                field: field.to_string(),
                op,
                value,
            }),
        }
        self
    }

    /// Chaining form of [`Filters::insert`].
    pub fn with(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, field: &str, op: Operator) -> Option<&str> {
        self.entries
            .iter()
            .find(|f| f.field == field && f.op == op)
            .map(|f| f.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as path segments. Empty filters render as `""`.
    pub fn encode(&self) -> String {
        self.entries.iter().map(Filter::segment).collect()
    }
}

impl<K: AsRef<str>, V: fmt::Display> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Filters::new();
        for (key, value) in iter {
            filters.insert(key.as_ref(), value);
        }
        filters
    }
}
