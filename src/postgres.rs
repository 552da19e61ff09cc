use crate::backend::{DatabaseBackend, QueryResult, QueryRow};
use crate::codec::{SqlValue, ValueKind};
use crate::config::StoreConfig;
use crate::error::{QueryError, Result};
use crate::params::{compile, ParameterSet};
use crate::schema::{Dialect, SchemaGenerator};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Row, TypeInfo};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Database used for existence checks before the target database is created
const MAINTENANCE_DATABASE: &str = "postgres";

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Create a new PostgreSQL backend with connection pool
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let options = PgConnectOptions::from_str(url)?;
        Self::ensure_database(&options).await?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create the target database through the maintenance database when it is missing
    async fn ensure_database(options: &PgConnectOptions) -> Result<()> {
        let Some(name) = options.get_database().map(str::to_string) else {
            return Ok(());
        };
        if name == MAINTENANCE_DATABASE {
            return Ok(());
        }

        let generator = SchemaGenerator::new();
        let dialect = Dialect::Postgres;
        let mut conn: PgConnection = options
            .clone()
            .database(MAINTENANCE_DATABASE)
            .connect()
            .await?;

        if let Some(check) = generator.database_exists_query(dialect) {
            let params = ParameterSet::new().with("name", name.as_str());
            let compiled = compile(check, &params, dialect)?;
            let mut query = sqlx::query(&compiled.sql);
            for value in &compiled.values {
                query = Self::bind_value(query, value);
            }

            if query.fetch_optional(&mut conn).await?.is_none() {
                if let Some(create) = generator.create_database_statement(dialect, &name) {
                    sqlx::query(&create).execute(&mut conn).await?;
                    info!(database = %name, "created database");
                }
            }
        }

        conn.close().await?;
        Ok(())
    }

    fn bind_value<'q>(
        query: Query<'q, Postgres, PgArguments>,
        value: &SqlValue,
    ) -> Query<'q, Postgres, PgArguments> {
        match value {
            SqlValue::Null(kind) => match kind {
                ValueKind::Bool => query.bind(Option::<bool>::None),
                ValueKind::Int => query.bind(Option::<i64>::None),
                ValueKind::Float => query.bind(Option::<f64>::None),
                ValueKind::Decimal => query.bind(Option::<Decimal>::None),
                ValueKind::Text => query.bind(Option::<String>::None),
                ValueKind::Uuid => query.bind(Option::<Uuid>::None),
                ValueKind::Timestamp => query.bind(Option::<DateTime<Utc>>::None),
                ValueKind::Time => query.bind(Option::<NaiveTime>::None),
                ValueKind::Bytes => query.bind(Option::<Vec<u8>>::None),
            },
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(n) => query.bind(*n),
            SqlValue::Float(n) => query.bind(*n),
            SqlValue::Decimal(d) => query.bind(*d),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Uuid(u) => query.bind(*u),
            SqlValue::Timestamp(t) => query.bind(*t),
            SqlValue::Time(t) => query.bind(*t),
            SqlValue::Bytes(b) => query.bind(b.clone()),
            SqlValue::List(items) => query.bind(items.join(",")),
        }
    }

    /// Convert PostgreSQL row to QueryRow by declared column type
    fn convert_row(row: &PgRow) -> Result<QueryRow> {
        let mut query_row = QueryRow::new();

        for column in row.columns() {
            let index = column.ordinal();
            let type_name = column.type_info().name();

            let value = match type_name {
                "BOOL" => typed(row.try_get::<Option<bool>, _>(index)?, ValueKind::Bool, SqlValue::Bool),
                "INT2" => typed(row.try_get::<Option<i16>, _>(index)?, ValueKind::Int, |n| {
                    SqlValue::Int(n.into())
                }),
                "INT4" => typed(row.try_get::<Option<i32>, _>(index)?, ValueKind::Int, |n| {
                    SqlValue::Int(n.into())
                }),
                "INT8" => typed(row.try_get::<Option<i64>, _>(index)?, ValueKind::Int, SqlValue::Int),
                "FLOAT4" => typed(row.try_get::<Option<f32>, _>(index)?, ValueKind::Float, |n| {
                    SqlValue::Float(n.into())
                }),
                "FLOAT8" => typed(row.try_get::<Option<f64>, _>(index)?, ValueKind::Float, SqlValue::Float),
                "NUMERIC" => typed(
                    row.try_get::<Option<Decimal>, _>(index)?,
                    ValueKind::Decimal,
                    SqlValue::Decimal,
                ),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                    typed(row.try_get::<Option<String>, _>(index)?, ValueKind::Text, SqlValue::Text)
                }
                "UUID" => typed(row.try_get::<Option<Uuid>, _>(index)?, ValueKind::Uuid, SqlValue::Uuid),
                "TIMESTAMPTZ" => typed(
                    row.try_get::<Option<DateTime<Utc>>, _>(index)?,
                    ValueKind::Timestamp,
                    SqlValue::Timestamp,
                ),
                "TIMESTAMP" => typed(
                    row.try_get::<Option<NaiveDateTime>, _>(index)?,
                    ValueKind::Timestamp,
                    |t| SqlValue::Timestamp(t.and_utc()),
                ),
                "TIME" => typed(row.try_get::<Option<NaiveTime>, _>(index)?, ValueKind::Time, SqlValue::Time),
                "BYTEA" => typed(row.try_get::<Option<Vec<u8>>, _>(index)?, ValueKind::Bytes, SqlValue::Bytes),
                other => {
                    return Err(QueryError::codec(
                        column.name(),
                        format!("unsupported PostgreSQL type {}", other),
                    ))
                }
            };
            query_row.insert(column.name().to_string(), value);
        }

        Ok(query_row)
    }
}

fn typed<T>(value: Option<T>, kind: ValueKind, wrap: impl FnOnce(T) -> SqlValue) -> SqlValue {
    value.map_or(SqlValue::Null(kind), wrap)
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    async fn connect(config: &StoreConfig) -> Result<Self> {
        Self::new(&config.connection_string, config.max_connections).await
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
        let rows = sqlx::query(
            "SELECT column_name::text AS name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;

        debug!(table, columns = rows.len(), "introspected table");
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
