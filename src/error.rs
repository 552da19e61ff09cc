use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Initialization error: {0}")]
    Initialization(#[source] Box<QueryError>),

    #[error("Unsupported type for {table}.{field}: {detail}")]
    UnsupportedType {
        table: String,
        field: String,
        detail: String,
    },

    #[error("No {table} record with key {key}")]
    RecordNotFound { table: String, key: String },

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Value codec error on column {column}: {detail}")]
    Codec { column: String, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(any(feature = "postgres", feature = "sqlite"))]
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl QueryError {
    pub(crate) fn codec(column: &str, detail: impl Into<String>) -> Self {
        QueryError::Codec {
            column: column.to_string(),
            detail: detail.into(),
        }
    }

    /// Wraps a failure raised while bringing the schema up to date.
    pub fn initialization(err: QueryError) -> Self {
        QueryError::Initialization(Box::new(err))
    }

    /// True for failures raised by the driver rather than by this crate.
    pub fn is_execution(&self) -> bool {
        match self {
            QueryError::Execution(_) => true,
            #[cfg(any(feature = "postgres", feature = "sqlite"))]
            QueryError::Sqlx(_) => true,
            _ => false,
        }
    }
}
