use crate::codec::SqlValue;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::schema::Dialect;
use async_trait::async_trait;
use std::collections::HashMap;

/// Row from a query result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRow {
    pub columns: HashMap<String, SqlValue>,
}

impl QueryRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: SqlValue) {
        self.columns.insert(key, value);
    }

    /// Column value; names match case-sensitively
    pub fn get(&self, key: &str) -> Option<&SqlValue> {
        self.columns.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.columns
            .get(key)
            .and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.columns.get(key).and_then(SqlValue::as_i64)
    }
}

/// Result of a query
pub type QueryResult = Vec<QueryRow>;

/// Database backend trait
///
/// Statements arrive already rewritten to the backend's positional
/// placeholders. Every call checks a connection out of the driver's pool and
/// returns it before completing, whatever the outcome.
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Connect using the store configuration, creating the database if missing
    async fn connect(config: &StoreConfig) -> Result<Self>
    where
        Self: Sized;

    fn dialect(&self) -> Dialect;

    /// Execute a statement and return the affected row count
    async fn execute(&self, sql: &str, values: &[SqlValue]) -> Result<u64>;

    /// Query and return all rows
    async fn query(&self, sql: &str, values: &[SqlValue]) -> Result<QueryResult>;

    /// Column names of `table`, or `None` when the table does not exist
    async fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Close the pool
    async fn close(&self) -> Result<()>;
}
