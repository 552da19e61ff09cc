//! Typed filter conditions over entity fields and their translation into
//! parameterized SQL.
//!
//! Callers describe a filter with [`Predicate`] values; translation checks
//! every field against the table descriptor and binds every literal, so no
//! caller text reaches the statement.

use crate::codec::encode_field;
use crate::error::{QueryError, Result};
use crate::params::ParameterSet;
use crate::schema::{Dialect, FieldDescriptor, TableDescriptor, RESERVED_PREFIX};
use serde_json::Value;
use std::fmt;

/// Comparison operators for a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl CompareOp {
    fn is_ordering(&self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Ne => write!(f, "<>"),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Le => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Ge => write!(f, ">="),
            CompareOp::Like => write!(f, "LIKE"),
        }
    }
}

/// Logical operators for combining predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "AND"),
            LogicalOp::Or => write!(f, "OR"),
        }
    }
}

/// Boolean expression over the fields of one entity
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    IsNull(String),
    IsNotNull(String),
    Logical {
        op: LogicalOp,
        operands: Vec<Predicate>,
    },
}

impl Predicate {
    fn compare(field: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    /// SQL `LIKE` with `%` and `_` wildcards; text fields only
    pub fn like(field: &str, pattern: impl Into<String>) -> Self {
        Self::compare(field, CompareOp::Like, Value::String(pattern.into()))
    }

    pub fn is_in<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn is_null(field: &str) -> Self {
        Predicate::IsNull(field.to_string())
    }

    pub fn is_not_null(field: &str) -> Self {
        Predicate::IsNotNull(field.to_string())
    }

    /// Every operand must hold; an empty list is always true
    pub fn all(operands: Vec<Predicate>) -> Self {
        Predicate::Logical {
            op: LogicalOp::And,
            operands,
        }
    }

    /// At least one operand must hold; an empty list is always false
    pub fn any(operands: Vec<Predicate>) -> Self {
        Predicate::Logical {
            op: LogicalOp::Or,
            operands,
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        self.combine(LogicalOp::And, other)
    }

    pub fn or(self, other: Predicate) -> Self {
        self.combine(LogicalOp::Or, other)
    }

    fn combine(self, op: LogicalOp, other: Predicate) -> Self {
        match self {
            Predicate::Logical { op: own, mut operands } if own == op => {
                operands.push(other);
                Predicate::Logical { op, operands }
            }
            first => Predicate::Logical {
                op,
                operands: vec![first, other],
            },
        }
    }

    /// Translate into a filter fragment for `table`
    pub fn translate(&self, table: &TableDescriptor, dialect: Dialect) -> Result<Filter> {
        translate(self, table, dialect)
    }
}

/// Parameterized boolean fragment ready to follow `WHERE`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub sql: String,
    pub params: ParameterSet,
}

/// Translate `predicate` into SQL with one `@__pN` parameter per literal.
pub fn translate(predicate: &Predicate, table: &TableDescriptor, dialect: Dialect) -> Result<Filter> {
    let mut translator = Translator {
        table,
        dialect,
        params: ParameterSet::new(),
    };
    let sql = translator.visit(predicate)?;
    Ok(Filter {
        sql,
        params: translator.params,
    })
}

struct Translator<'a> {
    table: &'a TableDescriptor,
    dialect: Dialect,
    params: ParameterSet,
}

impl<'a> Translator<'a> {
    fn visit(&mut self, predicate: &Predicate) -> Result<String> {
        match predicate {
            Predicate::Compare { field, op, value } => {
                let descriptor = self.field(field)?;
                check_operator(self.table, descriptor, *op)?;
                if value.is_null() {
                    return Err(QueryError::Translation(format!(
                        "Null literal compared with {}.{}; use is_null or is_not_null",
                        self.table.name, field
                    )));
                }
                let param = self.bind(descriptor, value)?;
                Ok(format!("{} {} @{}", self.dialect.quote(field), op, param))
            }
            Predicate::In {
                field,
                values,
                negated,
            } => {
                let descriptor = self.field(field)?;
                if values.is_empty() {
                    return Err(QueryError::Translation(format!(
                        "Empty membership list for {}.{}",
                        self.table.name, field
                    )));
                }
                let mut params = Vec::with_capacity(values.len());
                for value in values {
                    if value.is_null() {
                        return Err(QueryError::Translation(format!(
                            "Null in membership list for {}.{}",
                            self.table.name, field
                        )));
                    }
                    params.push(format!("@{}", self.bind(descriptor, value)?));
                }
                let keyword = if *negated { "NOT IN" } else { "IN" };
                Ok(format!(
                    "{} {} ({})",
                    self.dialect.quote(field),
                    keyword,
                    params.join(", ")
                ))
            }
            Predicate::IsNull(field) => {
                self.field(field)?;
                Ok(format!("{} IS NULL", self.dialect.quote(field)))
            }
            Predicate::IsNotNull(field) => {
                self.field(field)?;
                Ok(format!("{} IS NOT NULL", self.dialect.quote(field)))
            }
            Predicate::Logical { op, operands } => {
                if operands.is_empty() {
                    return Ok(match op {
                        LogicalOp::And => "1 = 1".to_string(),
                        LogicalOp::Or => "1 = 0".to_string(),
                    });
                }
                let parts = operands
                    .iter()
                    .map(|operand| self.visit(operand))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})", parts.join(&format!(" {} ", op))))
            }
        }
    }

    fn field(&self, name: &str) -> Result<&'a FieldDescriptor> {
        let table: &'a TableDescriptor = self.table;
        table.field(name).ok_or_else(|| {
            QueryError::Translation(format!("Unknown field {} on {}", name, table.name))
        })
    }

    fn bind(&mut self, field: &FieldDescriptor, value: &Value) -> Result<String> {
        let encoded = encode_field(field, value, self.dialect)
            .map_err(|e| QueryError::Translation(e.to_string()))?;
        let name = format!("{}p{}", RESERVED_PREFIX, self.params.len());
        self.params.insert(name.clone(), encoded);
        Ok(name)
    }
}

fn check_operator(table: &TableDescriptor, field: &FieldDescriptor, op: CompareOp) -> Result<()> {
    let unsupported = match op {
        CompareOp::Like => field.collection || !field.field_type.is_text(),
        op if op.is_ordering() => field.collection || !field.field_type.is_ordered(),
        _ => false,
    };
    if unsupported {
        return Err(QueryError::Translation(format!(
            "Operator {} is not supported on {}.{} ({}{})",
            op,
            table.name,
            field.name,
            field.field_type.name(),
            if field.collection { " collection" } else { "" }
        )));
    }
    Ok(())
}
