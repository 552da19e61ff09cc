use crate::error::{QueryError, Result};
use ::config::{Config, Environment};
use serde::Deserialize;

/// Prefix of the environment variables read by [`StoreConfig::from_env`]
pub const ENV_PREFIX: &str = "INVENTORY";

/// Configuration for the storage provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Driver connection string, e.g. `sqlite://inventory.db` or `postgres://host/inventory`
    #[serde(alias = "db_url")]
    pub connection_string: String,
    /// Upper bound on pooled connections
    #[serde(alias = "db_max_connections")]
    pub max_connections: u32,
    /// Page size used when a request leaves it at zero
    pub default_page_size: u32,
    /// Largest page size a request may ask for
    pub max_page_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection_string: "sqlite::memory:".to_string(),
            max_connections: 5,
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl StoreConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `INVENTORY_*` environment variables.
    ///
    /// Reads `INVENTORY_DB_URL`, `INVENTORY_DB_MAX_CONNECTIONS`,
    /// `INVENTORY_DEFAULT_PAGE_SIZE` and `INVENTORY_MAX_PAGE_SIZE`.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Layer `environment` over the defaults and validate the result
    pub fn from_environment(environment: Environment) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(environment)
            .build()
            .and_then(|built| built.try_deserialize())
            .map_err(|e| QueryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(QueryError::Config("connection_string is empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(QueryError::Config("max_connections must be at least 1".to_string()));
        }
        if self.max_page_size == 0 {
            return Err(QueryError::Config("max_page_size must be at least 1".to_string()));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(QueryError::Config(format!(
                "default_page_size must be between 1 and {}",
                self.max_page_size
            )));
        }
        Ok(())
    }
}
