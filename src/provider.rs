use crate::backend::DatabaseBackend;
use crate::config::StoreConfig;
use crate::error::{QueryError, Result};
use crate::executor::Executor;
use crate::query::PageLimits;
use crate::repository::Repository;
use crate::schema::{Entity, SchemaGenerator};
use crate::sync::{SchemaSync, SyncReport};
use std::sync::Arc;
use tracing::info;

/// Storage provider over one database.
///
/// Construction connects, creates the database when missing and brings every
/// registered table up to date before any repository is handed out.
pub struct StorageProvider<B: DatabaseBackend> {
    executor: Executor<B>,
    generator: Arc<SchemaGenerator>,
    limits: PageLimits,
    sync_report: SyncReport,
}

impl<B: DatabaseBackend> StorageProvider<B> {
    /// Connect with `config` and synchronize the schema of `generator`'s entities
    pub async fn connect(config: &StoreConfig, generator: SchemaGenerator) -> Result<Self> {
        config.validate()?;
        let backend = B::connect(config)
            .await
            .map_err(QueryError::initialization)?;
        Self::with_backend(backend, config, generator).await
    }

    /// Use an already connected backend
    pub async fn with_backend(backend: B, config: &StoreConfig, generator: SchemaGenerator) -> Result<Self> {
        let executor = Executor::new(backend);
        let generator = Arc::new(generator);

        let sync_report = SchemaSync::new(executor.clone(), Arc::clone(&generator))
            .run()
            .await
            .map_err(QueryError::initialization)?;

        info!(
            dialect = ?executor.dialect(),
            entities = generator.tables().len(),
            "storage provider ready"
        );
        Ok(Self {
            executor,
            generator,
            limits: PageLimits::from(config),
            sync_report,
        })
    }

    /// Repository for a registered entity type
    pub fn repository<T: Entity>(&self) -> Result<Repository<T, B>> {
        if !self.generator.is_registered::<T>() {
            return Err(QueryError::Schema(format!(
                "{} is not registered with this provider",
                std::any::type_name::<T>()
            )));
        }
        Repository::new(self.executor.clone(), self.limits)
    }

    /// DDL applied while the provider was constructed
    pub fn sync_report(&self) -> &SyncReport {
        &self.sync_report
    }

    pub fn executor(&self) -> &Executor<B> {
        &self.executor
    }

    pub fn generator(&self) -> &SchemaGenerator {
        &self.generator
    }

    pub fn is_connected(&self) -> bool {
        self.executor.backend().is_connected()
    }

    pub async fn close(&self) -> Result<()> {
        self.executor.backend().close().await
    }
}
