use crate::backend::DatabaseBackend;
use crate::codec::{encode_value, SqlValue};
use crate::error::{QueryError, Result};
use crate::executor::Executor;
use crate::params::ParameterSet;
use crate::predicate::Predicate;
use crate::query::{OwnerScope, Page, PageLimits, PageRequest, QueryBuilder};
use crate::schema::{Entity, FieldType, TableDescriptor};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Add, read, update, delete, list and page records of one entity type.
///
/// Every operation takes an [`OwnerScope`]; for tables with an ownership
/// column a scoped call only ever sees or touches rows of that owner.
pub struct Repository<T: Entity, B: DatabaseBackend> {
    executor: Executor<B>,
    table: Arc<TableDescriptor>,
    limits: PageLimits,
    _record: PhantomData<fn() -> T>,
}

impl<T: Entity, B: DatabaseBackend> Clone for Repository<T, B> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            table: Arc::clone(&self.table),
            limits: self.limits,
            _record: PhantomData,
        }
    }
}

impl<T: Entity, B: DatabaseBackend> Repository<T, B> {
    pub fn new(executor: Executor<B>, limits: PageLimits) -> Result<Self> {
        Ok(Self {
            executor,
            table: T::table()?,
            limits,
            _record: PhantomData,
        })
    }

    pub fn table(&self) -> &TableDescriptor {
        &self.table
    }

    fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.table, self.executor.dialect())
    }

    fn key_value(&self, key: impl Into<SqlValue>) -> SqlValue {
        encode_value(key.into(), self.executor.dialect())
    }

    /// Insert `record` and return it as stored.
    ///
    /// An auto-increment key left at zero is assigned by the database. A nil
    /// UUID key is replaced with a fresh one and an empty text key with the
    /// text form of one. A scoped call stamps the scope's owner on the row.
    pub async fn add(&self, scope: &OwnerScope, record: &T) -> Result<T> {
        let mut params = ParameterSet::from_record(record, self.executor.dialect())?;
        let key = self.table.primary_key();

        let unset = match params.get(&key.name) {
            None | Some(SqlValue::Null(_)) => true,
            Some(SqlValue::Int(n)) => *n == 0,
            Some(SqlValue::Uuid(id)) => id.is_nil(),
            Some(SqlValue::Text(code)) => code.is_empty(),
            Some(_) => false,
        };

        let include_key = !(unset && key.is_auto_increment());
        if unset {
            match key.field_type {
                FieldType::Uuid => params.insert(key.name.clone(), Uuid::new_v4()),
                FieldType::Text => params.insert(key.name.clone(), Uuid::new_v4().to_string()),
                _ => {}
            }
        }

        if let (Some(owner_column), Some(owner)) = (&self.table.owner_column, scope.owner()) {
            params.insert(owner_column.clone(), owner);
        }

        let insert = self.builder().insert(include_key);
        let stored = self
            .executor
            .query_first::<T>(&insert.sql, &params)
            .await?
            .ok_or_else(|| {
                QueryError::Execution(format!("Insert into {} returned no row", self.table.name))
            })?;

        debug!(table = %self.table.name, "added record");
        Ok(stored)
    }

    /// Record with primary key `key`, if visible in the scope
    pub async fn get(&self, scope: &OwnerScope, key: impl Into<SqlValue>) -> Result<Option<T>> {
        let query = self.builder().select_by_key(scope, self.key_value(key))?;
        self.executor.query_first(&query.sql, &query.params).await
    }

    /// Overwrite the stored row with the same key as `record`.
    ///
    /// Runs as one conditional statement; `RecordNotFound` when no row with
    /// that key is visible in the scope.
    pub async fn update(&self, scope: &OwnerScope, record: &T) -> Result<()> {
        let mut params = ParameterSet::from_record(record, self.executor.dialect())?;
        let key = params
            .get(&self.table.primary_key().name)
            .cloned()
            .unwrap_or(SqlValue::Null(self.table.primary_key().field_type.into()));

        let update = self.builder().update(scope, key.clone())?;
        params.extend(update.params);

        let affected = self.executor.execute(&update.sql, &params).await?;
        if affected == 0 {
            return Err(self.not_found(&key));
        }
        debug!(table = %self.table.name, key = %key, "updated record");
        Ok(())
    }

    /// Delete the row with primary key `key`; `RecordNotFound` when none is visible
    pub async fn delete(&self, scope: &OwnerScope, key: impl Into<SqlValue>) -> Result<()> {
        let key = self.key_value(key);
        let delete = self.builder().delete(scope, key.clone())?;

        let affected = self.executor.execute(&delete.sql, &delete.params).await?;
        if affected == 0 {
            return Err(self.not_found(&key));
        }
        debug!(table = %self.table.name, key = %key, "deleted record");
        Ok(())
    }

    /// Every visible record in primary key order
    pub async fn list(&self, scope: &OwnerScope) -> Result<Vec<T>> {
        let query = self.builder().select(scope, None)?;
        self.executor.query_as(&query.sql, &query.params).await
    }

    /// One page of visible records with the total count
    pub async fn page(&self, scope: &OwnerScope, request: &PageRequest) -> Result<Page<T>> {
        let paged = self.builder().page(scope, request, self.limits)?;

        let total_items = count_value(
            self.executor
                .scalar(&paged.count.sql, &paged.count.params)
                .await?,
        )?;
        let items = self
            .executor
            .query_as(&paged.page.sql, &paged.page.params)
            .await?;

        debug!(
            table = %self.table.name,
            page = paged.page_number,
            size = paged.page_size,
            total_items,
            "fetched page"
        );
        Ok(Page {
            total_items,
            page_size: paged.page_size,
            page_number: paged.page_number,
            items,
        })
    }

    /// Visible records matching `predicate`, in primary key order
    pub async fn find(&self, scope: &OwnerScope, predicate: &Predicate) -> Result<Vec<T>> {
        let query = self.builder().select(scope, Some(predicate))?;
        self.executor.query_as(&query.sql, &query.params).await
    }

    /// First visible record matching `predicate` by primary key
    pub async fn find_first(&self, scope: &OwnerScope, predicate: &Predicate) -> Result<Option<T>> {
        let query = self.builder().select_first(scope, Some(predicate))?;
        self.executor.query_first(&query.sql, &query.params).await
    }

    /// Number of visible records, optionally filtered
    pub async fn count(&self, scope: &OwnerScope, predicate: Option<&Predicate>) -> Result<u64> {
        let query = self.builder().count(scope, predicate)?;
        count_value(self.executor.scalar(&query.sql, &query.params).await?)
    }

    /// First record matching `predicate`, adding `record` when there is none.
    ///
    /// The lookup and the insert are separate statements: two concurrent
    /// callers can both miss and both insert.
    pub async fn first_or_add(&self, scope: &OwnerScope, predicate: &Predicate, record: &T) -> Result<T> {
        if let Some(found) = self.find_first(scope, predicate).await? {
            return Ok(found);
        }
        self.add(scope, record).await
    }

    fn not_found(&self, key: &SqlValue) -> QueryError {
        QueryError::RecordNotFound {
            table: self.table.name.clone(),
            key: key.to_string(),
        }
    }
}

fn count_value(value: Option<SqlValue>) -> Result<u64> {
    match value {
        None => Ok(0),
        Some(SqlValue::Int(n)) => u64::try_from(n)
            .map_err(|_| QueryError::Execution(format!("Negative row count {}", n))),
        Some(other) => Err(QueryError::Execution(format!(
            "Row count is not an integer: {:?}",
            other
        ))),
    }
}
