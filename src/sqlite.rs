use crate::backend::{DatabaseBackend, QueryResult, QueryRow};
use crate::codec::{format_timestamp, SqlValue, ValueKind};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::schema::Dialect;
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool,
    SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::debug;

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Create a new SQLite backend with connection pool
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Each connection to an in-memory database sees its own database
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await?
        };

        debug!(url, in_memory, "opened SQLite pool");
        Ok(Self { pool })
    }

    /// Create an in-memory SQLite database
    pub async fn memory() -> Result<Self> {
        Self::new("sqlite::memory:", 1).await
    }

    /// Create a file-based SQLite database
    pub async fn file(path: &str) -> Result<Self> {
        Self::new(&format!("sqlite://{}", path), StoreConfig::default().max_connections).await
    }

    fn bind_value<'q>(
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
        value: &SqlValue,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match value {
            SqlValue::Null(_) => query.bind(Option::<String>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(n) => query.bind(*n),
            SqlValue::Float(n) => query.bind(*n),
            // Untyped only; decimal fields are bound as scaled integers
            SqlValue::Decimal(d) => query.bind(d.to_string()),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Uuid(u) => query.bind(*u),
            SqlValue::Timestamp(t) => query.bind(format_timestamp(t)),
            SqlValue::Time(t) => query.bind(t.to_string()),
            SqlValue::Bytes(b) => query.bind(b.clone()),
            SqlValue::List(items) => query.bind(items.join(",")),
        }
    }

    /// Convert SQLite row to QueryRow using each value's storage class
    fn convert_row(row: &SqliteRow) -> Result<QueryRow> {
        let mut query_row = QueryRow::new();

        for column in row.columns() {
            let index = column.ordinal();
            let storage = {
                let raw = row.try_get_raw(index)?;
                if raw.is_null() {
                    None
                } else {
                    Some(raw.type_info().name().to_string())
                }
            };

            let value = match storage.as_deref() {
                None => SqlValue::Null(ValueKind::Text),
                Some("INTEGER") => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
                Some("REAL") => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
                Some("BLOB") => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
                Some(_) => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
            };
            query_row.insert(column.name().to_string(), value);
        }

        Ok(query_row)
    }

    /// Get list of all tables
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
    async fn connect(config: &StoreConfig) -> Result<Self> {
        Self::new(&config.connection_string, config.max_connections).await
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, values: &[SqlValue]) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        let mut query = sqlx::query(sql);
        for value in values {
            query = Self::bind_value(query, value);
        }
        let result = query.execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str, values: &[SqlValue]) -> Result<QueryResult> {
        let mut conn = self.pool.acquire().await?;
        let mut query = sqlx::query(sql);
        for value in values {
            query = Self::bind_value(query, value);
        }
        let rows = query.fetch_all(&mut *conn).await?;

        rows.iter().map(Self::convert_row).collect()
    }

    async fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.iter().map(|row| row.get::<String, _>("name")).collect()))
    }

    fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
