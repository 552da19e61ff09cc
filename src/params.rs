use crate::codec::{encode_field, encode_value, SqlValue};
use crate::error::{QueryError, Result};
use crate::schema::{Dialect, Entity};
use serde_json::Value;

/// Ordered set of named query parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, SqlValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every declared field of `record`, whether or not the statement uses it.
    pub fn from_record<T: Entity>(record: &T, dialect: Dialect) -> Result<Self> {
        let table = T::table()?;
        let object = match serde_json::to_value(record)? {
            Value::Object(map) => map,
            other => {
                return Err(QueryError::Schema(format!(
                    "{} did not serialize to an object: {}",
                    table.name, other
                )))
            }
        };

        let mut params = Self::new();
        for field in &table.fields {
            let value = object.get(&field.name).unwrap_or(&Value::Null);
            params.insert(field.name.clone(), encode_field(field, value, dialect)?);
        }
        Ok(params)
    }

    /// Bind an ad-hoc name/value map.
    pub fn from_map<K, V>(values: impl IntoIterator<Item = (K, V)>, dialect: Dialect) -> Self
    where
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let mut params = Self::new();
        for (name, value) in values {
            params.insert(name, encode_value(value.into(), dialect));
        }
        params
    }

    /// Insert or replace a parameter, keeping its original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn extend(&mut self, other: ParameterSet) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<SqlValue> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Statement rewritten to positional placeholders with values in bind order
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Rewrite `@name` placeholders for `dialect`.
///
/// Each distinct name is bound once and reused on repeat. Parameters the
/// statement never mentions are dropped; a placeholder with no parameter is an
/// error. Quoted literals and identifiers are copied untouched.
pub fn compile(sql: &str, params: &ParameterSet, dialect: Dialect) -> Result<CompiledStatement> {
    let mut out = String::with_capacity(sql.len());
    let mut order: Vec<&str> = Vec::new();
    let mut values = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '@' if chars
                .peek()
                .is_some_and(|(_, next)| next.is_ascii_alphabetic() || *next == '_') =>
            {
                let start = i + 1;
                let mut end = start;
                while let Some((j, next)) = chars.peek().copied() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        end = j + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }

                let name = &sql[start..end];
                let position = match order.iter().position(|n| *n == name) {
                    Some(position) => position,
                    None => {
                        let value = params.get(name).ok_or_else(|| {
                            QueryError::Execution(format!("No value bound for parameter @{}", name))
                        })?;
                        order.push(name);
                        values.push(value.clone());
                        order.len() - 1
                    }
                };
                out.push_str(&dialect.placeholder(position + 1));
            }
            _ => out.push(c),
        }
    }

    Ok(CompiledStatement { sql: out, values })
}
