use crate::backend::{DatabaseBackend, QueryResult};
use crate::codec::SqlValue;
use crate::error::{QueryError, Result};
use crate::mapper::map_rows;
use crate::params::{compile, CompiledStatement, ParameterSet};
use crate::schema::{Dialect, Entity};
use std::sync::Arc;
use tracing::trace;

/// Runs named-parameter statements against a backend.
///
/// Statements use `@name` placeholders; they are rewritten for the backend's
/// dialect and bound from the [`ParameterSet`] on every call.
pub struct Executor<B: DatabaseBackend> {
    backend: Arc<B>,
}

impl<B: DatabaseBackend> Clone for Executor<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: DatabaseBackend> Executor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_shared(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    fn prepare(&self, sql: &str, params: &ParameterSet) -> Result<CompiledStatement> {
        let compiled = compile(sql, params, self.dialect())?;
        trace!(sql = %compiled.sql, bind_count = compiled.values.len(), "prepared statement");
        Ok(compiled)
    }

    /// Execute a statement and return the affected row count
    pub async fn execute(&self, sql: &str, params: &ParameterSet) -> Result<u64> {
        let compiled = self.prepare(sql, params)?;
        let affected = self.backend.execute(&compiled.sql, &compiled.values).await?;
        trace!(affected, "statement executed");
        Ok(affected)
    }

    /// Run a query and return the raw rows
    pub async fn query(&self, sql: &str, params: &ParameterSet) -> Result<QueryResult> {
        let compiled = self.prepare(sql, params)?;
        let rows = self.backend.query(&compiled.sql, &compiled.values).await?;
        trace!(rows = rows.len(), "query returned");
        Ok(rows)
    }

    /// Single value of a one-column query, `None` when no row comes back
    pub async fn scalar(&self, sql: &str, params: &ParameterSet) -> Result<Option<SqlValue>> {
        let rows = self.query(sql, params).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        if row.columns.len() != 1 {
            return Err(QueryError::Execution(format!(
                "Scalar query returned {} columns",
                row.columns.len()
            )));
        }
        Ok(row.columns.into_values().next())
    }

    /// Run a query and map every row to `T`
    pub async fn query_as<T: Entity>(&self, sql: &str, params: &ParameterSet) -> Result<Vec<T>> {
        let rows = self.query(sql, params).await?;
        map_rows(&rows)
    }

    /// Run a query and map the first row, if any
    pub async fn query_first<T: Entity>(&self, sql: &str, params: &ParameterSet) -> Result<Option<T>> {
        let rows = self.query(sql, params).await?;
        Ok(map_rows(&rows[..rows.len().min(1)])?.pop())
    }
}
