use crate::backend::DatabaseBackend;
use crate::error::Result;
use crate::executor::Executor;
use crate::params::ParameterSet;
use crate::schema::SchemaGenerator;
use std::sync::Arc;
use tracing::{debug, info};

/// DDL applied by one schema sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Tables that did not exist and were created
    pub tables_created: Vec<String>,
    /// `(table, column)` pairs added to existing tables
    pub columns_added: Vec<(String, String)>,
}

impl SyncReport {
    /// True when the live schema already matched every descriptor
    pub fn is_empty(&self) -> bool {
        self.tables_created.is_empty() && self.columns_added.is_empty()
    }
}

/// SchemaSync brings a live database in line with the registered descriptors.
///
/// Sync is forward-only: missing tables are created and missing columns are
/// added, nothing is dropped or altered. Running it twice performs no DDL the
/// second time.
pub struct SchemaSync<B: DatabaseBackend> {
    executor: Executor<B>,
    generator: Arc<SchemaGenerator>,
}

impl<B: DatabaseBackend> SchemaSync<B> {
    pub fn new(executor: Executor<B>, generator: Arc<SchemaGenerator>) -> Self {
        Self { executor, generator }
    }

    /// Initialize or upgrade the database schema.
    ///
    /// Not safe to run from two processes at once against the same database;
    /// deployments serialize startup with an external lock.
    pub async fn run(&self) -> Result<SyncReport> {
        let dialect = self.executor.dialect();
        let backend = self.executor.backend();
        let mut report = SyncReport::default();

        // Render everything first so an unmappable field fails before any DDL runs
        let create_statements = self.generator.generate_ddl(dialect)?;

        for (table, create) in self.generator.tables().iter().zip(create_statements) {
            match backend.table_columns(&table.name).await? {
                None => {
                    debug!(table = %table.name, sql = %create, "creating table");
                    self.executor.execute(&create, &ParameterSet::new()).await?;
                    report.tables_created.push(table.name.clone());
                }
                Some(existing) => {
                    for field in &table.fields {
                        if existing.iter().any(|column| *column == field.name) {
                            continue;
                        }
                        let alter = self.generator.add_column_statement(dialect, table, field)?;
                        debug!(table = %table.name, column = %field.name, sql = %alter, "adding column");
                        self.executor.execute(&alter, &ParameterSet::new()).await?;
                        report
                            .columns_added
                            .push((table.name.clone(), field.name.clone()));
                    }
                }
            }
        }

        info!(
            tables = self.generator.tables().len(),
            tables_created = report.tables_created.len(),
            columns_added = report.columns_added.len(),
            "schema synchronized"
        );
        Ok(report)
    }
}
